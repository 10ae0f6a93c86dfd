use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mims_core::{CapabilityError, MimsError};

#[derive(Debug)]
pub struct MimsAxumError(pub anyhow::Error);

impl From<anyhow::Error> for MimsAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<MimsError> for MimsAxumError {
    fn from(e: MimsError) -> Self {
        Self(e.into_anyhow())
    }
}

impl From<CapabilityError> for MimsAxumError {
    fn from(e: CapabilityError) -> Self {
        Self(anyhow::Error::new(e))
    }
}

impl IntoResponse for MimsAxumError {
    fn into_response(self) -> Response {
        // Capability errors anywhere in the chain become 400; other MimsErrors keep
        // their status; anything else is a 500 GENERAL_ERROR.
        let safe = MimsError::normalize(self.0).sanitize_for_client();
        if safe.status() >= 500 {
            tracing::error!(code = safe.code, message = %safe.message, "request failed");
        }
        let status = StatusCode::from_u16(safe.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(safe.to_json())).into_response()
    }
}
