// common/src/messages.rs
use actix::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification pushed to every open socket of one identity.
///
/// Sent by notifiers outside the request path straight to the user actor.
#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[rtype(result = "usize")]
pub struct PushToUser {
    pub content: String,
}

/// Lifecycle events emitted by a per-user socket actor
#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[serde(tag = "type", rename_all = "snake_case")]
#[rtype(result = "()")]
pub enum SystemMessage {
    SocketAttached {
        socket_id: Uuid,
        open_sockets: usize,
    },
    SocketDetached {
        socket_id: Uuid,
        open_sockets: usize,
    },
    HeartbeatTimeout {
        socket_id: Uuid,
    },
}
