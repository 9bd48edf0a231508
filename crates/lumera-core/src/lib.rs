pub mod cache;
pub mod error;
pub mod geo;
pub mod page;
pub mod transport;

pub use cache::{CacheKey, ResponseCache};
pub use error::{GatewayError, Result, UpstreamError};
pub use geo::GeoPoint;
pub use page::{Listing, Page};
pub use transport::{RetryPolicy, send_with_retry};
