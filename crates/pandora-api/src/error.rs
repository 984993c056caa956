use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pandora_core::PandoraError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Pandora(#[from] PandoraError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Pandora(err) => match err {
                PandoraError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                PandoraError::ModelNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
                PandoraError::Upstream(_) => StatusCode::BAD_GATEWAY,
                PandoraError::Network(_) => StatusCode::GATEWAY_TIMEOUT,
                PandoraError::Inference(_)
                | PandoraError::Config(_)
                | PandoraError::Io(_)
                | PandoraError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
