// gateway/src/upgrade.rs
//! Token-authenticated forwarding of WebSocket upgrades to per-user actors.
//!
//! Each step is a hard gate and runs strictly after the previous one:
//! token present, token known, record decodes, actor resolved, request
//! forwarded. Every rejection produces the same response so callers cannot
//! tell which check failed.
use actix_web::{Error, HttpResponse};
use async_trait::async_trait;
use common::models::session::SessionRecord;
use std::fmt;
use std::sync::Arc;

use crate::actors::directory::ActorDirectory;
use crate::error::GatewayError;
use crate::routing::{Dispatch, Inbound, Stage};
use crate::store::TokenStore;

/// Query parameter carrying the session token
pub const AUTH_TOKEN_PARAM: &str = "auth_token";

const INVALID_TOKEN: &str = "Invalid token";

// Logged, never sent to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MissingToken,
    UnknownToken,
    MalformedRecord,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingToken => write!(f, "missing or empty {}", AUTH_TOKEN_PARAM),
            Rejection::UnknownToken => write!(f, "token not in store"),
            Rejection::MalformedRecord => write!(f, "stored session record is malformed"),
        }
    }
}

pub struct UpgradeHandler {
    tokens: Arc<dyn TokenStore>,
    actors: Arc<dyn ActorDirectory>,
}

impl UpgradeHandler {
    pub fn new(tokens: Arc<dyn TokenStore>, actors: Arc<dyn ActorDirectory>) -> Self {
        Self { tokens, actors }
    }

    pub async fn forward(&self, inbound: Inbound) -> Result<HttpResponse, Error> {
        let token = match token_from_query(inbound.req.query_string()) {
            Some(token) => token,
            None => return Ok(reject(Rejection::MissingToken)),
        };

        let raw = match self.tokens.get(&token).await.map_err(GatewayError::from)? {
            Some(raw) => raw,
            None => return Ok(reject(Rejection::UnknownToken)),
        };

        let record = match SessionRecord::decode(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Token store returned a record that fails the session schema: {}", e);
                return Ok(reject(Rejection::MalformedRecord));
            }
        };

        let actor_id = self.actors.id_from_name(&record.identity_id.to_string());
        let stub = self.actors.get(&actor_id).await?;

        tracing::debug!("Forwarding socket upgrade to actor {}", actor_id);
        stub.fetch(inbound).await
    }
}

#[async_trait(?Send)]
impl Stage for UpgradeHandler {
    async fn handle(&self, inbound: Inbound) -> Result<Dispatch, Error> {
        Ok(Dispatch::Handled(self.forward(inbound).await?))
    }
}

/// First `auth_token` value, if present and non-empty
fn token_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == AUTH_TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn reject(rejection: Rejection) -> HttpResponse {
    tracing::debug!("Rejected socket upgrade: {}", rejection);
    HttpResponse::BadRequest()
        .content_type("text/plain; charset=utf-8")
        .body(INVALID_TOKEN)
}
