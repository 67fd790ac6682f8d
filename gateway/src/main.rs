// gateway/src/main.rs
// Edge gateway - main.rs

use actix::Actor;
use actix_web::{web, App, HttpServer};
use common::{setup_tracing, with_bootstrap_tracing, Config};
use gateway::actors::directory::LocalActorDirectory;
use gateway::dispatch::{dispatch, DispatchCore, GatewayDeps};
use gateway::middleware::{Observe, Reporter, TracingReporter};
use gateway::routing::RouteTable;
use gateway::rpc::gateway_router;
use gateway::store::{ActorTokenStore, TokenStoreActor};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration; the configured log level is not known yet
    let config = with_bootstrap_tracing(Config::from_env);

    // Setup tracing
    setup_tracing(&config.log_level)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let server_addr = config.gateway_addr.clone();

    // Initialize the token store actor
    let token_store = TokenStoreActor::new()
        .with_ttl(config.sessions.ttl_seconds)
        .with_sweep_interval(config.sessions.sweep_interval_seconds)
        .start();

    // Team handlers register here as they move over from the legacy API
    let team = RouteTable::new("team");
    if team.is_empty() {
        tracing::warn!("Route table {} has no entries, its requests will get 404", team.name());
    } else {
        tracing::info!("Route table {} serves {} entries", team.name(), team.len());
    }

    let deps = GatewayDeps {
        token_store: Arc::new(ActorTokenStore::new(token_store)),
        actors: Arc::new(LocalActorDirectory::new(config.sockets.clone())),
        rpc: Arc::new(gateway_router(&config.release)),
        team: Arc::new(team),
    };

    let core = web::Data::new(DispatchCore::new(deps));
    let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter::new(config.release.clone()));

    tracing::info!("Starting gateway {} on {}", config.release, server_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Observe::new(reporter.clone()))
            .app_data(core.clone())
            .default_service(web::to(dispatch))
    })
    .bind(&server_addr)?
    .run()
    .await
}
