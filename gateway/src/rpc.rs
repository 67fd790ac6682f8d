// gateway/src/rpc.rs
//! Procedure registry mounted under an RPC endpoint prefix.
//!
//! `/trpc/<name>` runs the procedure registered as `<name>`. Queries pass
//! their input as a JSON `input` query parameter, mutations as a JSON body.
use actix_web::{http::{Method, StatusCode}, Error, HttpResponse};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::routing::{read_body, Dispatch, Inbound, Stage};

// Largest accepted mutation body
const MAX_INPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("No procedure found on path \"{0}\"")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl RpcError {
    fn code(&self) -> &'static str {
        match self {
            RpcError::NotFound(_) => "NOT_FOUND",
            RpcError::BadRequest(_) => "BAD_REQUEST",
            RpcError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            RpcError::NotFound(_) => StatusCode::NOT_FOUND,
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_response(self) -> HttpResponse {
        HttpResponse::build(self.status()).json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }))
    }
}

pub type Procedure = Box<dyn Fn(Value) -> Result<Value, RpcError> + Send + Sync>;

pub struct RpcRouter {
    endpoint: String,
    procedures: HashMap<String, Procedure>,
}

impl RpcRouter {
    /// `endpoint` is the mount prefix without a trailing slash, e.g. `/trpc`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            procedures: HashMap::new(),
        }
    }

    pub fn procedure<F>(mut self, name: impl Into<String>, procedure: F) -> Self
    where
        F: Fn(Value) -> Result<Value, RpcError> + Send + Sync + 'static,
    {
        self.procedures.insert(name.into(), Box::new(procedure));
        self
    }

    fn procedure_name<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.endpoint.as_str())
            .unwrap_or(path)
            .trim_start_matches('/')
    }

    async fn call(&self, inbound: Inbound) -> Result<Value, RpcError> {
        let name = self.procedure_name(inbound.path()).to_string();
        let procedure = self
            .procedures
            .get(&name)
            .ok_or_else(|| RpcError::NotFound(name.clone()))?;

        let input = if inbound.method() == Method::GET {
            query_input(inbound.req.query_string())?
        } else {
            let body = read_body(inbound.payload, MAX_INPUT_BYTES)
                .await
                .map_err(|e| RpcError::BadRequest(e.to_string()))?;
            if body.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&body).map_err(|e| RpcError::BadRequest(e.to_string()))?
            }
        };

        tracing::debug!("Calling procedure {}", name);
        procedure(input)
    }
}

#[async_trait(?Send)]
impl Stage for RpcRouter {
    async fn handle(&self, inbound: Inbound) -> Result<Dispatch, Error> {
        // Everything under the endpoint belongs to this router, including unknown procedures
        let resp = match self.call(inbound).await {
            Ok(data) => HttpResponse::Ok().json(json!({ "result": { "data": data } })),
            Err(e) => {
                if matches!(e, RpcError::Internal(_)) {
                    tracing::error!("Procedure failed: {}", e);
                }
                e.into_response()
            }
        };
        Ok(Dispatch::Handled(resp))
    }
}

fn query_input(query: &str) -> Result<Value, RpcError> {
    match url::form_urlencoded::parse(query.as_bytes()).find(|(key, _)| key == "input") {
        Some((_, raw)) => serde_json::from_str(&raw).map_err(|e| RpcError::BadRequest(e.to_string())),
        None => Ok(Value::Null),
    }
}

/// Procedures served by the gateway binary itself
pub fn gateway_router(release: &str) -> RpcRouter {
    let release = release.to_string();
    RpcRouter::new("/trpc").procedure("healthcheck", move |_| {
        Ok(json!({ "status": "ok", "release": release }))
    })
}
