use actix::fut::WrapFuture;
use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};
use tokio::sync::mpsc::error::TrySendError;

use sketchroom_system::codec::{self, WireFormat};
use sketchroom_system::{ConnectionId, RoomCommand, RoomEvent};

use crate::config::ServerConfig;
use crate::connection_tx_storage::ConnectionTx;
use crate::server::{ServerCommand, ServerTx};

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect { tx: ConnectionTx },
    Disconnect { from: ConnectionId },
    RoomCommand { from: ConnectionId, command: RoomCommand },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    RoomEvent(RoomEvent),
    Disconnected { connection_id: ConnectionId },
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

#[derive(Debug)]
enum ConnectionState {
    /// Waiting for the server to assign an id. Commands received meanwhile are held.
    Idle { pending: Vec<RoomCommand> },
    Connected(ConnectionId),
    Closed,
}

impl ConnectionState {
    fn new() -> Self {
        ConnectionState::Idle {
            pending: Vec::new(),
        }
    }

    /// Returns the command to forward now, if the connection has an id.
    fn accept(&mut self, command: RoomCommand, limit: usize) -> Option<ConnectionCommand> {
        match self {
            ConnectionState::Connected(from) => Some(ConnectionCommand::RoomCommand {
                from: *from,
                command,
            }),
            ConnectionState::Idle { pending } if pending.len() < limit => {
                log::debug!("Holding {:?} until connected", command);
                pending.push(command);
                None
            }
            ConnectionState::Idle { .. } => {
                log::warn!("Too many commands before connect, dropping {:?}", command);
                None
            }
            ConnectionState::Closed => {
                log::debug!("Connection closed, dropping {:?}", command);
                None
            }
        }
    }

    /// Held commands come back in arrival order, stamped with the new id.
    fn connect(&mut self, connection_id: ConnectionId) -> Vec<ConnectionCommand> {
        if let ConnectionState::Closed = self {
            return Vec::new();
        }
        let previous = std::mem::replace(self, ConnectionState::Connected(connection_id));
        match previous {
            ConnectionState::Idle { pending } => pending
                .into_iter()
                .map(|command| ConnectionCommand::RoomCommand {
                    from: connection_id,
                    command,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn close(&mut self) -> Option<ConnectionId> {
        match std::mem::replace(self, ConnectionState::Closed) {
            ConnectionState::Connected(connection_id) => Some(connection_id),
            _ => None,
        }
    }
}

struct ConnectionActor {
    state: ConnectionState,
    srv_tx: ServerTx,
    channel_capacity: usize,
    max_frame_size: usize,
    /// Replies follow the format of the last frame the client sent.
    wire_format: WireFormat,
}

impl ConnectionActor {
    /// A full server channel pauses this connection until there is room, so
    /// commands keep their order.
    fn forward(&mut self, command: ConnectionCommand, ctx: &mut ws::WebsocketContext<Self>) {
        match self.srv_tx.try_send(ServerCommand::Connection(command)) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                log::debug!("Server channel is full, waiting");
                let mut srv_tx = self.srv_tx.clone();
                ctx.wait(
                    async move {
                        if srv_tx.send(command).await.is_err() {
                            log::error!("Server channel closed while waiting");
                        }
                    }
                    .into_actor(self),
                );
            }
            Err(TrySendError::Closed(_)) => {
                log::error!("Server channel is closed, closing connection");
                ctx.stop();
            }
        }
    }

    fn ingress(
        &mut self,
        format: WireFormat,
        bytes: &[u8],
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        log::debug!("Ingress size: {}", bytes.len());
        self.wire_format = format;
        match codec::decode::<RoomCommand>(format, bytes) {
            Ok(command) => {
                log::debug!("Ingress {:?}", command);
                if let Some(command) = self.state.accept(command, self.channel_capacity) {
                    self.forward(command, ctx);
                }
            }
            Err(err) => {
                log::warn!("Closing connection ({:?}): {}", self.state, err);
                ctx.close(Some(CloseReason {
                    code: CloseCode::Invalid,
                    description: None,
                }));
            }
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(self.channel_capacity);

        self.forward(ConnectionCommand::Connect { tx }, ctx);

        let addr = ctx.address().recipient();

        tokio::spawn(async move {
            log::info!("connection green thread - started");
            while let Some(msg) = rx.recv().await {
                if addr.do_send(ConnectionActorMessage(msg)).is_err() {
                    log::warn!("Connection actor is gone");
                    break;
                }
            }
            log::info!("connection green thread - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let Some(id) = self.state.close() {
            let command = ServerCommand::Connection(ConnectionCommand::Disconnect { from: id });
            match self.srv_tx.try_send(command) {
                Ok(()) => {}
                Err(TrySendError::Full(command)) => {
                    let mut srv_tx = self.srv_tx.clone();
                    tokio::spawn(async move {
                        if srv_tx.send(command).await.is_err() {
                            log::warn!("Could not report disconnect of {}", id);
                        }
                    });
                }
                Err(TrySendError::Closed(_)) => {
                    log::warn!("Could not report disconnect of {}", id);
                }
            }
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Binary(bin)) => self.ingress(WireFormat::Bincode, &bin, ctx),
            Ok(ws::Message::Text(text)) => self.ingress(WireFormat::Json, text.as_bytes(), ctx),
            Ok(ws::Message::Close(_)) => {
                if let Some(from) = self.state.close() {
                    self.forward(ConnectionCommand::Disconnect { from }, ctx);
                }
                ctx.stop();
            }
            Err(ws::ProtocolError::Overflow) => {
                log::warn!("Frame exceeds {} bytes, closing connection", self.max_frame_size);
                ctx.close(Some(CloseReason {
                    code: CloseCode::Size,
                    description: None,
                }));
                ctx.stop();
            }
            Err(err) => {
                log::warn!("WebSocket protocol error: {}", err);
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        let connection_event = msg.0;
        log::debug!("Egress {:?}", connection_event);
        match connection_event {
            ConnectionEvent::Connected { connection_id } => {
                for command in self.state.connect(connection_id) {
                    self.forward(command, ctx);
                }
            }
            ConnectionEvent::Disconnected { connection_id } => {
                log::info!("Server closed connection {}", connection_id);
                ctx.close(Some(CloseReason {
                    code: CloseCode::Policy,
                    description: None,
                }));
            }
            ConnectionEvent::RoomEvent(event) => {
                match codec::encode(self.wire_format, &event) {
                    Ok(bytes) => match self.wire_format {
                        WireFormat::Bincode => ctx.binary(bytes),
                        WireFormat::Json => match String::from_utf8(bytes) {
                            Ok(text) => ctx.text(text),
                            Err(err) => log::error!("Non UTF-8 JSON frame: {}", err),
                        },
                    },
                    Err(err) => log::error!("Failed to encode {:?}: {}", event, err),
                }
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, Error> {
    let actor = ConnectionActor {
        srv_tx: srv_tx.get_ref().clone(),
        state: ConnectionState::new(),
        channel_capacity: config.channel_capacity,
        max_frame_size: config.max_frame_size,
        wire_format: WireFormat::Bincode,
    };
    let mut response = ws::handshake(&req)?;
    let codec = actix_http::ws::Codec::new().max_size(config.max_frame_size);
    Ok(response.streaming(ws::WebsocketContext::with_codec(actor, stream, codec)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(user: &str) -> RoomCommand {
        RoomCommand::Join {
            room: "lobby".into(),
            user_identity: user.into(),
        }
    }

    #[test]
    fn commands_before_connect_should_be_held_and_flushed_in_order() {
        let mut state = ConnectionState::new();
        assert!(state.accept(join("alice"), 8).is_none());
        assert!(state
            .accept(
                RoomCommand::Undo {
                    room: "lobby".into(),
                    user_identity: "alice".into(),
                },
                8,
            )
            .is_none());

        let flushed = state.connect(7);
        assert_eq!(flushed.len(), 2);
        assert!(matches!(
            &flushed[0],
            ConnectionCommand::RoomCommand { from: 7, command } if command == &join("alice")
        ));
        assert!(matches!(
            &flushed[1],
            ConnectionCommand::RoomCommand { from: 7, command: RoomCommand::Undo { .. } }
        ));

        assert!(matches!(
            state.accept(join("alice"), 8),
            Some(ConnectionCommand::RoomCommand { from: 7, .. })
        ));
    }

    #[test]
    fn held_commands_should_be_bounded() {
        let mut state = ConnectionState::new();
        for _ in 0..3 {
            state.accept(join("alice"), 2);
        }
        assert_eq!(state.connect(1).len(), 2);
    }

    #[test]
    fn closed_connection_should_drop_commands() {
        let mut state = ConnectionState::new();
        state.connect(3);
        assert_eq!(state.close(), Some(3));
        assert_eq!(state.close(), None);
        assert!(state.accept(join("alice"), 8).is_none());
        assert!(state.connect(4).is_empty());
        assert_eq!(state.close(), None);
    }
}
