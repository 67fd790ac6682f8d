// gateway/src/actors/directory.rs
//! Addressing of per-identity actors.
//!
//! A directory maps a stable name to an actor that is created on first
//! reference and then reused for every later request with the same name.
use actix::{Actor, Addr};
use actix_web::{http::{header, StatusCode}, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use async_trait::async_trait;
use common::SocketConfig;
use dashmap::DashMap;
use std::fmt;
use uuid::Uuid;

use super::socket_session::SocketSessionActor;
use super::user_socket::{AttachSocket, UserSocketActor};
use crate::error::GatewayError;
use crate::routing::Inbound;

/// Address of an actor, derived deterministically from its name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId {
    name: String,
    id: Uuid,
}

impl ActorId {
    pub fn from_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Handle to a resolved actor that accepts forwarded requests
#[async_trait(?Send)]
pub trait ActorStub {
    /// Hand the original request to the actor and return its response unchanged
    async fn fetch(&self, inbound: Inbound) -> Result<HttpResponse, Error>;
}

/// Get-or-create lookup of actors by name
#[async_trait(?Send)]
pub trait ActorDirectory: Send + Sync {
    fn id_from_name(&self, name: &str) -> ActorId {
        ActorId::from_name(name)
    }

    /// Resolve the actor for `id`, creating it if it does not exist yet
    async fn get(&self, id: &ActorId) -> Result<Box<dyn ActorStub>, GatewayError>;
}

/// Directory of [`UserSocketActor`]s living in this process
pub struct LocalActorDirectory {
    actors: DashMap<ActorId, Addr<UserSocketActor>>,
    sockets: SocketConfig,
}

impl LocalActorDirectory {
    pub fn new(sockets: SocketConfig) -> Self {
        Self {
            actors: DashMap::new(),
            sockets,
        }
    }

    /// Get-or-create. The map entry stays locked while the actor starts, so
    /// racing callers for one id always observe the same instance.
    pub fn resolve(&self, id: &ActorId) -> Addr<UserSocketActor> {
        let mut entry = self
            .actors
            .entry(id.clone())
            .or_insert_with(|| UserSocketActor::new(id.clone()).start());

        // An actor whose arbiter went away is replaced rather than forgotten
        if !entry.connected() {
            tracing::warn!("User socket actor {} is gone, starting a new one", id);
            *entry = UserSocketActor::new(id.clone()).start();
        }

        entry.clone()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

#[async_trait(?Send)]
impl ActorDirectory for LocalActorDirectory {
    async fn get(&self, id: &ActorId) -> Result<Box<dyn ActorStub>, GatewayError> {
        Ok(Box::new(LocalActorStub {
            id: id.clone(),
            addr: self.resolve(id),
            sockets: self.sockets.clone(),
        }))
    }
}

pub struct LocalActorStub {
    id: ActorId,
    addr: Addr<UserSocketActor>,
    sockets: SocketConfig,
}

#[async_trait(?Send)]
impl ActorStub for LocalActorStub {
    async fn fetch(&self, inbound: Inbound) -> Result<HttpResponse, Error> {
        let Inbound { req, payload } = inbound;

        if !is_websocket_upgrade(&req) {
            return Ok(HttpResponse::build(StatusCode::UPGRADE_REQUIRED).body("Expected Upgrade: websocket"));
        }

        let session = SocketSessionActor::new(self.addr.clone(), &self.sockets);
        let socket_id = session.socket_id();

        // Start WebSocket connection with callback to capture actor address
        let (addr, resp) = ws::start_with_addr(session, &req, payload)?;

        self.addr
            .send(AttachSocket { socket_id, addr })
            .await
            .map_err(|e| GatewayError::ActorUnavailable {
                actor: self.id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(resp)
    }
}

fn is_websocket_upgrade(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.eq_ignore_ascii_case("websocket"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::user_socket::GetInstanceInfo;
    use actix_web::{body::to_bytes, test::TestRequest};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_id_from_name_is_deterministic() {
        assert_eq!(ActorId::from_name("42"), ActorId::from_name("42"));
        assert_ne!(ActorId::from_name("42").uuid(), ActorId::from_name("43").uuid());
        assert_eq!(ActorId::from_name("42").name(), "42");
    }

    #[actix_web::test]
    async fn test_resolve_reuses_instance() {
        let directory = LocalActorDirectory::new(SocketConfig::default());
        let id = directory.id_from_name("42");

        let first = directory.resolve(&id).send(GetInstanceInfo).await.unwrap();
        let second = directory.resolve(&id).send(GetInstanceInfo).await.unwrap();

        assert_eq!(first.instance_id, second.instance_id);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_racing_workers_create_one_instance() {
        const WORKERS: usize = 8;

        let directory = Arc::new(LocalActorDirectory::new(SocketConfig::default()));
        let barrier = Arc::new(Barrier::new(WORKERS));
        let answered = Arc::new(AtomicUsize::new(0));
        assert!(directory.is_empty());

        // One system per thread, like the HttpServer workers sharing a directory
        let workers: Vec<_> = (0..WORKERS)
            .map(|_| {
                let directory = directory.clone();
                let barrier = barrier.clone();
                let answered = answered.clone();
                thread::spawn(move || {
                    actix::System::new().block_on(async move {
                        barrier.wait();
                        let info = directory
                            .resolve(&ActorId::from_name("42"))
                            .send(GetInstanceInfo)
                            .await
                            .unwrap();

                        // The winning worker hosts the actor, so keep every system up until all have answers
                        answered.fetch_add(1, Ordering::SeqCst);
                        while answered.load(Ordering::SeqCst) < WORKERS {
                            actix::clock::sleep(Duration::from_millis(5)).await;
                        }
                        info.instance_id
                    })
                })
            })
            .collect();

        let ids: HashSet<Uuid> = workers.into_iter().map(|worker| worker.join().unwrap()).collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(directory.len(), 1);
    }

    #[actix_web::test]
    async fn test_distinct_identities_get_distinct_instances() {
        let directory = LocalActorDirectory::new(SocketConfig::default());

        let a = directory.resolve(&directory.id_from_name("1")).send(GetInstanceInfo).await.unwrap();
        let b = directory.resolve(&directory.id_from_name("2")).send(GetInstanceInfo).await.unwrap();

        assert_ne!(a.instance_id, b.instance_id);
        assert_eq!(directory.len(), 2);
    }

    #[actix_web::test]
    async fn test_plain_request_requires_upgrade() {
        let directory = LocalActorDirectory::new(SocketConfig::default());
        let stub = directory.get(&directory.id_from_name("42")).await.unwrap();

        let (req, payload) = TestRequest::get().uri("/api/ws?auth_token=t").to_http_parts();
        let resp = stub.fetch(Inbound::new(req, payload)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UPGRADE_REQUIRED);
        let body = to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(body, "Expected Upgrade: websocket");
    }
}
