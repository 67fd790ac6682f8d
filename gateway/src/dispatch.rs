// gateway/src/dispatch.rs
//! Dispatch core: the primary route table first, the legacy table second.
//!
//! ```text
//! primary  ANY /trpc/*       -> RPC sub-dispatcher
//!          GET /api/ws       -> socket upgrade
//! legacy   ANY /api/team/*   -> team sub-dispatcher
//!          ANY *             -> 404 {"message":"Not found"}
//! ```
use actix_web::{web, Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::actors::directory::ActorDirectory;
use crate::routing::{Dispatch, Inbound, RouteTable, Stage};
use crate::store::TokenStore;
use crate::upgrade::UpgradeHandler;

/// Shared infrastructure handed to the core at construction
pub struct GatewayDeps {
    pub token_store: Arc<dyn TokenStore>,
    pub actors: Arc<dyn ActorDirectory>,
    /// Mounted under `/trpc/*`
    pub rpc: Arc<dyn Stage>,
    /// Mounted under `/api/team/*` in the legacy table
    pub team: Arc<dyn Stage>,
}

pub struct DispatchCore {
    stages: Vec<Arc<dyn Stage>>,
}

impl DispatchCore {
    pub fn new(deps: GatewayDeps) -> Self {
        Self::from_stages(vec![
            Arc::new(primary_table(&deps)),
            Arc::new(legacy_table(&deps)),
        ])
    }

    /// Compose arbitrary stages; each is tried only if all earlier ones declined
    pub fn from_stages(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub async fn handle(&self, inbound: Inbound) -> Result<HttpResponse, Error> {
        let mut inbound = inbound;
        for stage in &self.stages {
            match stage.handle(inbound).await? {
                Dispatch::Handled(resp) => return Ok(resp),
                Dispatch::Unclaimed(rest) => inbound = rest,
            }
        }

        tracing::debug!("No stage claimed {} {}", inbound.method(), inbound.path());
        Ok(not_found())
    }
}

pub fn primary_table(deps: &GatewayDeps) -> RouteTable {
    let upgrade = UpgradeHandler::new(deps.token_store.clone(), deps.actors.clone());

    RouteTable::new("primary")
        .all("/trpc/*", deps.rpc.clone())
        .get("/api/ws", Arc::new(upgrade))
}

pub fn legacy_table(deps: &GatewayDeps) -> RouteTable {
    RouteTable::new("legacy")
        .all("/api/team/*", deps.team.clone())
        .all("*", Arc::new(NotFound))
}

pub fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "message": "Not found" }))
}

/// Catch-all entry of the legacy table
pub struct NotFound;

#[async_trait(?Send)]
impl Stage for NotFound {
    async fn handle(&self, _inbound: Inbound) -> Result<Dispatch, Error> {
        Ok(Dispatch::Handled(not_found()))
    }
}

/// Default service of the actix `App`; every request enters here
pub async fn dispatch(
    req: HttpRequest,
    payload: web::Payload,
    core: web::Data<DispatchCore>,
) -> Result<HttpResponse, Error> {
    core.handle(Inbound::new(req, payload.into_inner())).await
}
