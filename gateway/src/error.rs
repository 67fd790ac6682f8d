// gateway/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Faults raised while authenticating and forwarding a socket upgrade.
///
/// Expected outcomes (unknown route, invalid token) are plain responses, not
/// errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    TokenStore(#[from] StoreError),

    #[error("actor {actor} unavailable: {reason}")]
    ActorUnavailable { actor: String, reason: String },
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::TokenStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::ActorUnavailable { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Details stay in the logs
        let message = match self {
            GatewayError::TokenStore(_) => "Service unavailable",
            GatewayError::ActorUnavailable { .. } => "Bad gateway",
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
