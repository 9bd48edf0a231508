use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use lumera_core::error::{Result, UpstreamError};
use lumera_core::geo::GeoPoint;

const SERVICE: &str = "booking";

/// Franchise geo directory extracted from the booking backend's listing.
///
/// Franchise ids become the external-id allow-list for content queries, and
/// their coordinates feed the enrichment overlay. The directory is rebuilt
/// per request from the (cached) franchise payload and never cached itself.
#[derive(Debug, Clone, Default)]
pub struct GeoDirectory {
    pub allowed_ids: BTreeSet<String>,
    pub points: HashMap<String, GeoPoint>,
}

impl GeoDirectory {
    /// Parses a `{franchises: [{id, address: {latitude?, longitude?}}]}`
    /// payload. A payload without the `franchises` array is a contract
    /// violation and surfaces as an upstream error; individual entries
    /// without a numeric id are skipped.
    pub fn from_franchises(payload: &Value) -> Result<Self> {
        let Some(franchises) = payload.get("franchises").and_then(Value::as_array) else {
            return Err(UpstreamError::payload(SERVICE, "payload has no 'franchises' array").into());
        };

        let mut directory = Self::default();
        for franchise in franchises {
            let Some(id) = franchise.get("id").and_then(Value::as_i64) else {
                continue;
            };
            let external_id = id.to_string();

            let address = franchise.get("address");
            let latitude = address
                .and_then(|a| a.get("latitude"))
                .and_then(Value::as_f64);
            let longitude = address
                .and_then(|a| a.get("longitude"))
                .and_then(Value::as_f64);

            directory.allowed_ids.insert(external_id.clone());
            directory
                .points
                .insert(external_id, GeoPoint::new(latitude, longitude));
        }
        Ok(directory)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed_ids.is_empty()
    }
}
