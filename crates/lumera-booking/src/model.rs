use serde::{Deserialize, Serialize};

/// Lead capture payload, forwarded to the booking backend after
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    pub franchise_id: u32,
    pub name: String,
    pub cell_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_campaign_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_set_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook_wacl_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_check_days: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<bool>,
}

impl LeadRequest {
    /// Collapses blank optional strings to `None` so they are omitted from
    /// the outbound payload.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.email,
            &mut self.observation,
            &mut self.origin,
            &mut self.campaign_slug,
            &mut self.ad_campaign_name,
            &mut self.ad_set_name,
            &mut self.ad_name,
            &mut self.facebook_source_id,
            &mut self.facebook_wacl_id,
        ] {
            if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }
}

/// Schedule creation payload accepted at the gateway boundary.
///
/// The outbound body is rebuilt by the client: the franchise identifier is
/// pinned from configuration and fields the booking backend does not accept
/// (such as `email`) are dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    /// Booking date in `dd/MM/yyyy`.
    pub date: String,
    /// Slot in `HH:mm`.
    pub hour: String,
    pub name: String,
    pub cell_phone: String,
    pub room_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
