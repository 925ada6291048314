//! Mapping of crate errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::Error;

impl Error {
    /// Status code returned to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::ConfigurationDisabled(_) | Error::UnknownEntity { .. } => StatusCode::NOT_FOUND,
            Error::MalformedIdentifier(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Gateway(_) => StatusCode::BAD_GATEWAY,
            Error::PartialMutationFailure { .. }
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::ConfigurationDisabled(_) => "configuration_disabled",
            Error::UnknownEntity { .. } => "unknown_entity",
            Error::MalformedIdentifier(_) => "malformed_identifier",
            Error::InvalidInput(_) => "invalid_input",
            Error::Validation(_) => "validation",
            Error::Gateway(_) => "gateway_error",
            Error::PartialMutationFailure { .. } => "partial_mutation_failure",
            Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::Other(_) => "internal",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        } else {
            tracing::debug!(code = self.code(), "Request rejected: {}", self);
        }

        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let Error::Validation(errors) = &self {
            body["fields"] = json!(errors);
        }
        (status, Json(body)).into_response()
    }
}
