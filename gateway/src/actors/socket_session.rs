// gateway/src/actors/socket_session.rs
use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Message, StreamHandler};
use actix_web_actors::ws;
use common::{SocketConfig, SystemMessage};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::user_socket::{DetachSocket, UserSocketActor};

/// Text frame to deliver to the connected client
#[derive(Message)]
#[rtype(result = "()")]
pub struct SocketText {
    pub content: String,
}

/// One accepted WebSocket connection, owned by a [`UserSocketActor`]
pub struct SocketSessionActor {
    socket_id: Uuid,
    user: Addr<UserSocketActor>,
    last_heartbeat: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl SocketSessionActor {
    pub fn new(user: Addr<UserSocketActor>, config: &SocketConfig) -> Self {
        Self {
            socket_id: Uuid::new_v4(),
            user,
            last_heartbeat: Instant::now(),
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_seconds.max(1)),
            client_timeout: Duration::from_secs(config.client_timeout_seconds),
        }
    }

    pub fn socket_id(&self) -> Uuid {
        self.socket_id
    }

    // Ping the client and drop it after `client_timeout` of silence
    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.client_timeout {
                let event = SystemMessage::HeartbeatTimeout { socket_id: act.socket_id };
                tracing::warn!("Socket heartbeat timeout: {:?}", event);

                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }
}

impl Actor for SocketSessionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("Socket {} opened", self.socket_id);
        self.last_heartbeat = Instant::now();
        self.heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("Socket {} closed", self.socket_id);
        self.user.do_send(DetachSocket { socket_id: self.socket_id });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for SocketSessionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            },
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            },
            Ok(ws::Message::Text(text)) => {
                // The channel is server push only; inbound text just keeps it alive
                self.last_heartbeat = Instant::now();
                tracing::trace!("Ignoring text from socket {}: {}", self.socket_id, text);
            },
            Ok(ws::Message::Binary(_)) => {
                self.last_heartbeat = Instant::now();
            },
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!("Socket {} closing: {:?}", self.socket_id, reason);
                ctx.close(reason);
                ctx.stop();
            },
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => (),
            Err(e) => {
                tracing::warn!("WebSocket protocol error on {}: {}", self.socket_id, e);
                ctx.stop();
            }
        }
    }
}

impl Handler<SocketText> for SocketSessionActor {
    type Result = ();

    fn handle(&mut self, msg: SocketText, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.content);
    }
}
