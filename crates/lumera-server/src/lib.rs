pub mod api;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;

pub use api::ApiError;
pub use config::{AppConfig, BookingSettings, CmsSettings, LoggingConfig, ServerConfig};
pub use observability::init_tracing;
pub use server::{AppState, GatewayServer, build_app};
