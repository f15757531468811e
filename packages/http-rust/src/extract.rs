//! Binding filters to axum requests.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use filterkit_core::error_map::count_messages;
use filterkit_core::{ErrorMap, Filter, FilterError, FilterProvider};
use http_body_util::LengthLimitError;
use serde_json::json;

use crate::config::HttpConfig;
use crate::input::{InputError, RequestInput};

/// Why a request could not be turned into a valid filter.
#[derive(Debug, thiserror::Error)]
pub enum RequestFilterError {
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("request failed validation with {} error(s)", count_messages(.0))]
    Invalid(ErrorMap),
}

impl RequestFilterError {
    /// Returns the HTTP status code for this error.
    ///
    /// - Unreadable or malformed input: 400 Bad Request
    /// - Oversized body: 413 Payload Too Large
    /// - Invalid filter: 422 Unprocessable Entity
    /// - Filter misconfiguration or broken input plumbing: 500
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Body(_) | Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Filter(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RequestFilterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Invalid(errors) => json!({ "status": status.as_u16(), "errors": errors }),
            Self::Filter(err) => {
                // Configuration details stay in the logs.
                tracing::error!(error = %err, "filter construction failed");
                json!({ "status": status.as_u16(), "error": "internal server error" })
            }
            other => json!({ "status": status.as_u16(), "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Reads the body of `request`, then builds filter `name` over it.
///
/// # Errors
///
/// Returns [`RequestFilterError`] when the body is too large or cannot be
/// read, the input is malformed, or the filter cannot be built.
pub async fn bind_request(
    provider: &FilterProvider,
    name: &str,
    request: Request,
    config: &HttpConfig,
) -> Result<Filter, RequestFilterError> {
    let (parts, body) = request.into_parts();
    let body = read_body(body, config.max_body_bytes).await?;
    let input = RequestInput::from_parts(&parts, &body, config)?;
    tracing::debug!(
        filter = name,
        method = %parts.method,
        path = parts.uri.path(),
        body_bytes = body.len(),
        "binding request"
    );
    Ok(provider.create(name, Arc::new(input))?)
}

/// As [`bind_request`], and rejects invalid filters.
///
/// # Errors
///
/// Everything [`bind_request`] returns, plus
/// [`RequestFilterError::Invalid`] carrying the filter's error map.
pub async fn validate_request(
    provider: &FilterProvider,
    name: &str,
    request: Request,
    config: &HttpConfig,
) -> Result<Filter, RequestFilterError> {
    let mut filter = bind_request(provider, name, request, config).await?;
    if filter.is_valid() {
        Ok(filter)
    } else {
        let errors = filter.errors().clone();
        tracing::debug!(filter = name, errors = count_messages(&errors), "request rejected");
        Err(RequestFilterError::Invalid(errors))
    }
}

async fn read_body(body: Body, limit: usize) -> Result<bytes::Bytes, RequestFilterError> {
    axum::body::to_bytes(body, limit).await.map_err(|err| {
        if std::error::Error::source(&err).is_some_and(|source| source.is::<LengthLimitError>()) {
            RequestFilterError::BodyTooLarge { limit }
        } else {
            RequestFilterError::Body(err)
        }
    })
}
