//! Client for the booking/CRM backend.
//!
//! The booking side is a thin passthrough: payloads cross the gateway
//! unmodified apart from lead normalization and the pinned franchise
//! identifier. Its franchise listing doubles as the source of the geo
//! directory used to enrich content records.

pub mod client;
pub mod directory;
pub mod model;

pub use client::{BookingClient, BookingConfig};
pub use directory::GeoDirectory;
pub use model::{LeadRequest, ScheduleRequest};
