pub mod client;
pub mod config;
pub mod enrich;
pub mod query;
pub mod token;

pub use client::{CmsClient, ListOptions, ResolveOptions};
pub use config::CmsConfig;
pub use enrich::overlay_coordinates;
pub use token::TokenManager;
