use serde::{Deserialize, Serialize};

/// Geocoordinates sourced from the booking backend, keyed by external id.
///
/// Either coordinate may be absent; an absent coordinate never overwrites an
/// existing value during enrichment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoPoint {
    pub fn new(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}
