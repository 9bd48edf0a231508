//! Error mapping at the gateway boundary.
//!
//! Every failure leaving a handler is rendered as an
//! `application/problem+json` body with a stable machine-readable `code`.
//! Upstream 4xx answers keep their status; 5xx and connection failures
//! become 502, timeouts become 504.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use lumera_core::error::{GatewayError, UpstreamError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gateway(GatewayError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Gateway(GatewayError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gateway(GatewayError::Upstream(upstream)) => match upstream {
                UpstreamError::Status { status, .. } if (400..500).contains(status) => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                UpstreamError::Status { .. }
                | UpstreamError::Network { .. }
                | UpstreamError::Payload { .. } => StatusCode::BAD_GATEWAY,
                UpstreamError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            },
        }
    }

    pub fn to_problem(&self) -> Problem {
        let status = self.status_code();
        let detail = match self {
            Self::BadRequest(message) | Self::NotFound(message) => message.clone(),
            Self::Gateway(GatewayError::Validation(message)) => message.clone(),
            // Internal details stay in the logs.
            Self::Gateway(GatewayError::Internal(_)) => "Internal error".to_string(),
            Self::Gateway(GatewayError::Upstream(upstream)) => upstream
                .upstream_message()
                .map(str::to_owned)
                .unwrap_or_else(|| "Upstream integration error".to_string()),
        };

        let upstream = match self {
            Self::Gateway(GatewayError::Upstream(e)) => Some(e),
            _ => None,
        };

        Problem {
            title: title_for(status),
            status: status.as_u16(),
            detail,
            code: code_for(status),
            service: upstream.map(UpstreamError::service),
            upstream_status: upstream.and_then(UpstreamError::upstream_status),
            upstream_body: upstream
                .and_then(UpstreamError::upstream_body)
                .map(str::to_owned),
        }
    }
}

/// RFC 7807-style error body.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub title: &'static str,
    pub status: u16,
    pub detail: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_body: Option<String>,
}

fn title_for(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "Bad request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        429 => "Too many requests",
        500 => "Internal error",
        502 => "Upstream integration error",
        504 => "Upstream integration timeout",
        _ => "Error",
    }
}

fn code_for(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "bad_request",
        401 => "unauthorized",
        403 => "forbidden",
        404 => "not_found",
        429 => "too_many_requests",
        500 => "internal_error",
        504 => "external_api_timeout",
        _ => "external_api_error",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let problem = self.to_problem();

        match &self {
            ApiError::Gateway(GatewayError::Upstream(upstream)) => {
                tracing::error!(
                    service = upstream.service(),
                    upstream_status = upstream.upstream_status(),
                    client_status = problem.status,
                    "upstream integration failure"
                );
            }
            ApiError::Gateway(GatewayError::Internal(detail)) => {
                tracing::error!(detail = %detail, "unhandled internal failure");
            }
            _ => {
                tracing::debug!(status = problem.status, detail = %problem.detail, "request rejected");
            }
        }

        let mut response = (self.status_code(), Json(problem)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
