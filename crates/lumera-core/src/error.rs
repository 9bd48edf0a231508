use thiserror::Error;

/// A failed call to one of the upstream integrations.
///
/// Every upstream failure crossing the integration boundary is translated
/// into one of these variants; raw `reqwest` errors never escape the
/// transport layer.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-success status (after the retry
    /// budget was spent for retryable statuses).
    #[error("{service} returned status {status}")]
    Status {
        service: &'static str,
        status: u16,
        /// Raw response body, captured best-effort.
        body: Option<String>,
        /// Human-readable message extracted from a JSON `{"message": ...}` body.
        message: Option<String>,
    },

    /// A connection-level failure that survived the retry budget.
    #[error("{service} request failed: {detail}")]
    Network {
        service: &'static str,
        detail: String,
    },

    /// Every attempt ran into the per-attempt timeout.
    #[error("{service} timed out")]
    Timeout { service: &'static str },

    /// The upstream answered 2xx but the payload is not what the contract
    /// promises (missing envelope fields, undecodable JSON).
    #[error("{service} returned an unexpected payload: {detail}")]
    Payload {
        service: &'static str,
        detail: String,
    },
}

impl UpstreamError {
    /// Builds a `Status` error from a captured body, extracting the upstream
    /// message when the body is JSON with a string `message` field.
    pub fn status(service: &'static str, status: u16, body: Option<String>) -> Self {
        let message = body.as_deref().and_then(extract_message);
        Self::Status {
            service,
            status,
            body,
            message,
        }
    }

    pub fn payload(service: &'static str, detail: impl Into<String>) -> Self {
        Self::Payload {
            service,
            detail: detail.into(),
        }
    }

    /// The upstream service this error originated from.
    pub fn service(&self) -> &'static str {
        match self {
            Self::Status { service, .. }
            | Self::Network { service, .. }
            | Self::Timeout { service }
            | Self::Payload { service, .. } => service,
        }
    }

    /// The upstream HTTP status, when the upstream answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Extracted human-readable upstream message, if any.
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// True for upstream 4xx answers, which map to the same status at the
    /// gateway boundary instead of a 502.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Gateway-level error type shared by the integration crates.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Malformed caller input, rejected before any network call.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the underlying upstream error, if this is one.
    pub fn as_upstream(&self) -> Option<&UpstreamError> {
        match self {
            Self::Upstream(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Pulls a string `message` field out of a JSON error body.
///
/// Malformed JSON and non-string `message` fields are tolerated and yield
/// `None`; the caller keeps the raw body either way.
pub fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_from_json_body() {
        let err = UpstreamError::status(
            "booking",
            422,
            Some(r#"{"message":"slot already taken","field":"hour"}"#.to_string()),
        );
        assert_eq!(err.upstream_message(), Some("slot already taken"));
        assert_eq!(err.upstream_status(), Some(422));
        assert!(err.is_client_error());
    }

    #[test]
    fn malformed_body_yields_no_message() {
        let err = UpstreamError::status("cms", 500, Some("<html>oops</html>".to_string()));
        assert_eq!(err.upstream_message(), None);
        assert_eq!(err.upstream_body(), Some("<html>oops</html>"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn non_string_message_is_ignored() {
        assert_eq!(extract_message(r#"{"message": 42}"#), None);
        assert_eq!(extract_message(r#"{"detail": "x"}"#), None);
        assert_eq!(extract_message(r#"{"message": "ok"}"#), Some("ok".into()));
    }

    #[test]
    fn missing_body_is_tolerated() {
        let err = UpstreamError::status("cms", 503, None);
        assert_eq!(err.upstream_message(), None);
        assert_eq!(err.upstream_body(), None);
        assert_eq!(err.to_string(), "cms returned status 503");
    }

    #[test]
    fn classification() {
        assert!(UpstreamError::status("cms", 404, None).is_not_found());
        assert!(!UpstreamError::status("cms", 500, None).is_not_found());
        assert!(UpstreamError::Timeout { service: "cms" }.is_timeout());
        assert_eq!(
            UpstreamError::Network {
                service: "booking",
                detail: "connection refused".into()
            }
            .service(),
            "booking"
        );
    }

    #[test]
    fn validation_error_display() {
        let err = GatewayError::validation("page and pageSize must be provided together");
        assert_eq!(
            err.to_string(),
            "invalid request: page and pageSize must be provided together"
        );
        assert!(err.as_upstream().is_none());
    }
}
