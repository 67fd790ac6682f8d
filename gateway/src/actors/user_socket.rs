// gateway/src/actors/user_socket.rs
use actix::{Actor, Addr, Context, Handler, Message, MessageResult};
use chrono::{DateTime, Utc};
use common::{PushToUser, SystemMessage};
use std::collections::HashMap;
use uuid::Uuid;

use super::directory::ActorId;
use super::socket_session::{SocketSessionActor, SocketText};

/// Actor message: A socket was accepted for this identity
#[derive(Message)]
#[rtype(result = "usize")]
pub struct AttachSocket {
    pub socket_id: Uuid,
    pub addr: Addr<SocketSessionActor>,
}

/// Actor message: A socket of this identity closed
#[derive(Message)]
#[rtype(result = "()")]
pub struct DetachSocket {
    pub socket_id: Uuid,
}

/// Actor message: Describe this actor instance
#[derive(Message)]
#[rtype(result = "InstanceInfo")]
pub struct GetInstanceInfo;

#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub actor_id: ActorId,
    pub instance_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub open_sockets: usize,
}

/// Stateful actor owning every real-time connection of one identity.
///
/// Created lazily by the actor directory on first reference and kept for
/// the lifetime of the process.
pub struct UserSocketActor {
    id: ActorId,
    instance_id: Uuid,
    created_at: DateTime<Utc>,
    sockets: HashMap<Uuid, Addr<SocketSessionActor>>,
}

impl UserSocketActor {
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            instance_id: Uuid::new_v4(),
            created_at: Utc::now(),
            sockets: HashMap::new(),
        }
    }

    // Send a system event to every open socket
    fn announce(&self, event: SystemMessage) {
        let content = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize system message: {}", e);
                return;
            }
        };

        for addr in self.sockets.values() {
            addr.do_send(SocketText { content: content.clone() });
        }
    }
}

impl Actor for UserSocketActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("User socket actor {} started (instance {})", self.id, self.instance_id);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("User socket actor {} stopped", self.id);
    }
}

impl Handler<AttachSocket> for UserSocketActor {
    type Result = MessageResult<AttachSocket>;

    fn handle(&mut self, msg: AttachSocket, _ctx: &mut Self::Context) -> Self::Result {
        self.sockets.insert(msg.socket_id, msg.addr);
        tracing::info!("Socket {} attached to {}", msg.socket_id, self.id);

        self.announce(SystemMessage::SocketAttached {
            socket_id: msg.socket_id,
            open_sockets: self.sockets.len(),
        });

        MessageResult(self.sockets.len())
    }
}

impl Handler<DetachSocket> for UserSocketActor {
    type Result = ();

    fn handle(&mut self, msg: DetachSocket, _ctx: &mut Self::Context) -> Self::Result {
        if self.sockets.remove(&msg.socket_id).is_some() {
            tracing::info!("Socket {} detached from {}", msg.socket_id, self.id);

            self.announce(SystemMessage::SocketDetached {
                socket_id: msg.socket_id,
                open_sockets: self.sockets.len(),
            });
        }
    }
}

// Entry point for notifiers outside the request path: anything holding the
// actor's address (resolved through the directory) can push to all sockets.
impl Handler<PushToUser> for UserSocketActor {
    type Result = MessageResult<PushToUser>;

    fn handle(&mut self, msg: PushToUser, _ctx: &mut Self::Context) -> Self::Result {
        for addr in self.sockets.values() {
            addr.do_send(SocketText { content: msg.content.clone() });
        }

        tracing::debug!("Pushed notification to {} sockets of {}", self.sockets.len(), self.id);
        MessageResult(self.sockets.len())
    }
}

impl Handler<GetInstanceInfo> for UserSocketActor {
    type Result = MessageResult<GetInstanceInfo>;

    fn handle(&mut self, _msg: GetInstanceInfo, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(InstanceInfo {
            actor_id: self.id.clone(),
            instance_id: self.instance_id,
            created_at: self.created_at,
            open_sockets: self.sockets.len(),
        })
    }
}
