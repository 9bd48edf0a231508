use std::time::Duration;

use serde_json::{Value, json};

use lumera_core::error::{Result, UpstreamError};
use lumera_core::transport::{RetryPolicy, send_with_retry};

use crate::model::{LeadRequest, ScheduleRequest};

const SERVICE: &str = "booking";

/// Settings for the booking-backend integration.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Base URL of the public booking API, without a trailing slash.
    pub base_url: String,
    /// Static token sent on every request.
    pub public_token: String,
    /// Partner identifier pinned onto every schedule creation.
    pub franchise_identifier: u32,
}

impl BookingConfig {
    pub fn new(base_url: impl Into<String>, public_token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            public_token: public_token.into(),
            franchise_identifier: 2,
        }
    }

    #[must_use]
    pub fn with_franchise_identifier(mut self, identifier: u32) -> Self {
        self.franchise_identifier = identifier;
        self
    }
}

/// Client for the booking/CRM backend.
pub struct BookingClient {
    http: reqwest::Client,
    config: BookingConfig,
    policy: RetryPolicy,
}

impl BookingClient {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    pub fn new(config: BookingConfig, policy: RetryPolicy) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(12))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            config,
            policy,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(self.url(path))
            .header("Accept", "application/json")
            .header("x-public-token", &self.config.public_token)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(self.url(path))
            .header("Accept", "application/json")
            .header("x-public-token", &self.config.public_token)
    }

    /// The public franchise listing, passed through verbatim.
    pub async fn franchises(&self) -> Result<Value> {
        let response = send_with_retry(SERVICE, &self.policy, self.get("franchises")).await?;
        decode(response).await
    }

    /// Creates a lead. Blank optional fields are normalized away before the
    /// payload leaves the gateway.
    pub async fn create_lead(&self, lead: LeadRequest) -> Result<Value> {
        let lead = lead.normalized();
        tracing::debug!(franchise_id = lead.franchise_id, "forwarding lead");
        let request = self.post("lead").json(&lead);
        let response = send_with_retry(SERVICE, &self.policy, request).await?;
        decode(response).await
    }

    /// Available schedule hours for a franchise on a given date
    /// (`dd/MM/yyyy`). Extra query parameters are forwarded verbatim.
    pub async fn schedule_hours(
        &self,
        franchise_id: u32,
        date: &str,
        extra: &[(String, String)],
    ) -> Result<Value> {
        let mut query: Vec<(&str, String)> = vec![
            ("date", date.to_string()),
            (
                "franchiseIdentifier",
                self.config.franchise_identifier.to_string(),
            ),
        ];
        for (name, value) in extra {
            if !value.trim().is_empty() {
                query.push((name.as_str(), value.clone()));
            }
        }

        let request = self
            .get(&format!("budget-schedule/{franchise_id}/hours"))
            .query(&query);
        let response = send_with_retry(SERVICE, &self.policy, request).await?;
        decode(response).await
    }

    /// Books a schedule slot. The franchise identifier always comes from
    /// configuration, never from the caller.
    pub async fn create_schedule(
        &self,
        franchise_id: u32,
        schedule: ScheduleRequest,
    ) -> Result<Value> {
        let payload = json!({
            "date": schedule.date,
            "franchiseIdentifier": self.config.franchise_identifier,
            "hour": schedule.hour,
            "name": schedule.name,
            "cellPhone": schedule.cell_phone,
            "roomId": schedule.room_id,
        });
        let request = self
            .post(&format!("budget-schedule/{franchise_id}/create"))
            .json(&payload);
        let response = send_with_retry(SERVICE, &self.policy, request).await?;
        decode(response).await
    }
}

impl std::fmt::Debug for BookingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

async fn decode(response: reqwest::Response) -> Result<Value> {
    response
        .json()
        .await
        .map_err(|e| UpstreamError::payload(SERVICE, e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let config = BookingConfig::new("https://booking.example.com///", "tok");
        assert_eq!(config.base_url, "https://booking.example.com");
        assert_eq!(config.franchise_identifier, 2);
    }
}
