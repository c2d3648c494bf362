use tokio::sync::mpsc::{channel, Sender};

use sketchroom_system::{ConnectionId, RoomCommand, RoomEvent};

use crate::admin::AdminCommand;
use crate::connection::{ConnectionCommand, ConnectionEvent};
use crate::connection_tx_storage::ConnectionTxStorage;
use crate::server_state::{ServerError, ServerState};

pub type ServerTx = Sender<ServerCommand>;

pub type Delivery = (ConnectionId, RoomEvent);

#[derive(Debug)]
pub enum ServerCommand {
    Connection(ConnectionCommand),
    Admin(AdminCommand),
}

/// Decides who receives what for one inbound command. Membership changes are applied here.
pub fn route(
    state: &mut ServerState,
    from: ConnectionId,
    command: RoomCommand,
) -> Result<Vec<Delivery>, ServerError> {
    match command {
        RoomCommand::Join {
            room,
            user_identity,
        } => {
            let outcome = state.join_room(from, &room, &user_identity)?;
            if outcome.created {
                log::info!("Room {} created, owned by {}", room, user_identity);
            }
            // A rejoining owner may have missed work done while it was away.
            let bootstrap_from = if outcome.is_owner {
                state.begin_catch_up(&room)
            } else {
                let owner = state.owner_connection(&room);
                if owner.is_none() {
                    log::warn!("Owner of room {} is offline, no bootstrap", room);
                }
                owner
            };
            let mut deliveries = vec![(
                from,
                RoomEvent::Joined {
                    is_owner: outcome.is_owner,
                    catching_up: bootstrap_from.is_some(),
                },
            )];
            deliveries.extend(to_others(
                state,
                &room,
                from,
                RoomEvent::MemberJoined { user_identity },
            ));
            deliveries.extend(bootstrap_from.map(|source| (source, RoomEvent::BootstrapRequest)));
            Ok(deliveries)
        }
        RoomCommand::FullSnapshot { room, replica } => {
            let sender_is_owner = {
                let member = state.member(from, &room)?;
                state.is_owner(&room, &member.user_identity)
            };
            if sender_is_owner {
                return Ok(to_others(state, &room, from, RoomEvent::FullSnapshot(replica)));
            }
            if state.finish_catch_up(&room, from) {
                log::info!("Connection {} caught up the owner of {}", from, room);
                return Ok(state
                    .owner_connection(&room)
                    .map(|owner| (owner, RoomEvent::FullSnapshot(replica)))
                    .into_iter()
                    .collect());
            }
            Err(ServerError::NotOwner(room))
        }
        RoomCommand::ActionCommit {
            room,
            user_identity,
            action,
        } => {
            check_identity(state, from, &room, &user_identity)?;
            Ok(to_others(
                state,
                &room,
                from,
                RoomEvent::ActionCommitted {
                    user_identity,
                    action,
                },
            ))
        }
        RoomCommand::Undo {
            room,
            user_identity,
        } => {
            check_identity(state, from, &room, &user_identity)?;
            Ok(to_others(
                state,
                &room,
                from,
                RoomEvent::UndoNotify { user_identity },
            ))
        }
        RoomCommand::Redo {
            room,
            user_identity,
        } => {
            check_identity(state, from, &room, &user_identity)?;
            Ok(to_others(
                state,
                &room,
                from,
                RoomEvent::RedoNotify { user_identity },
            ))
        }
    }
}

/// Tells the rest of the room, and finds a new catch-up source if the leaver was one.
pub fn leave(state: &mut ServerState, connection_id: ConnectionId) -> Vec<Delivery> {
    let departure = match state.leave_room(connection_id) {
        Some(departure) => departure,
        None => return Vec::new(),
    };
    log::info!("{} left room {}", departure.user_identity, departure.room);
    let mut deliveries = to_others(
        state,
        &departure.room,
        connection_id,
        RoomEvent::MemberLeft {
            user_identity: departure.user_identity,
        },
    );
    if departure.interrupted_catch_up {
        if let Some(owner) = state.owner_connection(&departure.room) {
            match state.begin_catch_up(&departure.room) {
                Some(source) => deliveries.push((source, RoomEvent::BootstrapRequest)),
                None => {
                    log::warn!("Nobody left to catch up the owner of {}", departure.room);
                    deliveries.push((
                        owner,
                        RoomEvent::Joined {
                            is_owner: true,
                            catching_up: false,
                        },
                    ));
                }
            }
        }
    }
    deliveries
}

fn check_identity(
    state: &ServerState,
    from: ConnectionId,
    room: &str,
    user_identity: &str,
) -> Result<(), ServerError> {
    let member = state.member(from, room)?;
    if member.user_identity != user_identity {
        return Err(ServerError::IdentityMismatch(from, user_identity.to_owned()));
    }
    Ok(())
}

fn to_others(
    state: &ServerState,
    room: &str,
    without: ConnectionId,
    event: RoomEvent,
) -> Vec<Delivery> {
    state
        .connection_ids_in_room(room)
        .into_iter()
        .filter(|connection_id| *connection_id != without)
        .map(|connection_id| (connection_id, event.clone()))
        .collect()
}

struct Server {
    server_state: ServerState,
    connections: ConnectionTxStorage,
}

impl Server {
    fn new() -> Self {
        Self {
            server_state: ServerState::new(),
            connections: ConnectionTxStorage::new(),
        }
    }

    fn handle_server_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connection(command) => self.handle_connection_command(command),
            ServerCommand::Admin(command) => self.handle_admin_command(command),
        }
    }

    fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx } => {
                let connection_id = self.server_state.create_connection();
                self.connections.insert(connection_id, tx);
                self.connections
                    .send(&connection_id, ConnectionEvent::Connected { connection_id });
            }
            ConnectionCommand::Disconnect { from } => {
                self.leave_room(from);
                if self.connections.remove(&from).is_none() {
                    log::debug!("Connection {} was already removed", from);
                }
            }
            ConnectionCommand::RoomCommand { from, command } => {
                match route(&mut self.server_state, from, command) {
                    Ok(deliveries) => self.deliver(deliveries),
                    Err(err) if err.closes_connection() => {
                        log::warn!("Closing connection {}: {}", from, err);
                        self.connections.send(
                            &from,
                            ConnectionEvent::Disconnected {
                                connection_id: from,
                            },
                        );
                    }
                    Err(err) => log::warn!("Dropping command from {}: {}", from, err),
                }
            }
        }
    }

    fn handle_admin_command(&mut self, command: AdminCommand) {
        match command {
            AdminCommand::ListRooms { tx } => {
                if tx.send(self.server_state.describe_rooms()).is_err() {
                    log::warn!("Admin requester went away");
                }
            }
        }
    }

    fn leave_room(&mut self, connection_id: ConnectionId) {
        let deliveries = leave(&mut self.server_state, connection_id);
        self.deliver(deliveries);
    }

    fn deliver(&mut self, deliveries: Vec<Delivery>) {
        for (to, event) in deliveries {
            self.connections.send(&to, ConnectionEvent::RoomEvent(event));
        }
    }
}

pub fn spawn_server(capacity: usize) -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ServerCommand>(capacity);

    tokio::spawn(async move {
        let mut server = Box::new(Server::new());

        while let Some(command) = srv_rx.recv().await {
            server.handle_server_command(command);
        }
        log::info!("Server channel closed");
    });

    srv_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchroom_system::{Action, ReplicaSnapshot, Stroke};
    use tokio::sync::mpsc::Receiver;
    use tokio::sync::oneshot;

    fn segment() -> Action {
        Action::new(vec![Stroke::new(0.0, 0.0, 1.0, 1.0)]).unwrap()
    }

    fn join(state: &mut ServerState, user: &str) -> (ConnectionId, Vec<Delivery>) {
        let connection_id = state.create_connection();
        let deliveries = route(
            state,
            connection_id,
            RoomCommand::Join {
                room: "lobby".into(),
                user_identity: user.into(),
            },
        )
        .unwrap();
        (connection_id, deliveries)
    }

    fn joined(is_owner: bool, catching_up: bool) -> RoomEvent {
        RoomEvent::Joined {
            is_owner,
            catching_up,
        }
    }

    fn snapshot_from(
        state: &mut ServerState,
        from: ConnectionId,
        replica: &ReplicaSnapshot,
    ) -> Result<Vec<Delivery>, ServerError> {
        route(
            state,
            from,
            RoomCommand::FullSnapshot {
                room: "lobby".into(),
                replica: replica.clone(),
            },
        )
    }

    #[test]
    fn non_owner_join_should_ask_owner_for_bootstrap() {
        let mut state = ServerState::new();
        let (alice, deliveries) = join(&mut state, "alice");
        assert_eq!(deliveries, vec![(alice, joined(true, false))]);

        let (bob, deliveries) = join(&mut state, "bob");
        assert_eq!(
            deliveries,
            vec![
                (bob, joined(false, true)),
                (
                    alice,
                    RoomEvent::MemberJoined {
                        user_identity: "bob".into()
                    }
                ),
                (alice, RoomEvent::BootstrapRequest),
            ]
        );
    }

    #[test]
    fn rejoining_owner_should_be_caught_up_by_a_member() {
        let mut state = ServerState::new();
        let (alice, _) = join(&mut state, "alice");
        let (bob, _) = join(&mut state, "bob");
        leave(&mut state, alice);

        let (alice, deliveries) = join(&mut state, "alice");
        assert_eq!(
            deliveries,
            vec![
                (alice, joined(true, true)),
                (
                    bob,
                    RoomEvent::MemberJoined {
                        user_identity: "alice".into()
                    }
                ),
                (bob, RoomEvent::BootstrapRequest),
            ]
        );

        let replica = ReplicaSnapshot::new().with_user("bob", vec![segment()]);
        assert_eq!(
            snapshot_from(&mut state, bob, &replica),
            Ok(vec![(alice, RoomEvent::FullSnapshot(replica.clone()))])
        );
        assert_eq!(
            snapshot_from(&mut state, bob, &replica),
            Err(ServerError::NotOwner("lobby".into()))
        );

        let (carol, deliveries) = join(&mut state, "carol");
        assert_eq!(deliveries[0], (carol, joined(false, true)));
        assert_eq!(deliveries.last(), Some(&(alice, RoomEvent::BootstrapRequest)));
    }

    #[test]
    fn interrupted_catch_up_should_move_to_another_member() {
        let mut state = ServerState::new();
        let (alice, _) = join(&mut state, "alice");
        let (bob, _) = join(&mut state, "bob");
        let (carol, _) = join(&mut state, "carol");
        leave(&mut state, alice);
        let (alice, _) = join(&mut state, "alice");

        let deliveries = leave(&mut state, bob);
        assert!(deliveries.contains(&(carol, RoomEvent::BootstrapRequest)));

        let deliveries = leave(&mut state, carol);
        assert_eq!(
            deliveries,
            vec![
                (
                    alice,
                    RoomEvent::MemberLeft {
                        user_identity: "carol".into()
                    }
                ),
                (alice, joined(true, false)),
            ]
        );
    }

    #[test]
    fn joiner_should_go_live_when_owner_is_offline() {
        let mut state = ServerState::new();
        let (alice, _) = join(&mut state, "alice");
        let (_bob, _) = join(&mut state, "bob");
        leave(&mut state, alice);

        let (carol, deliveries) = join(&mut state, "carol");
        assert_eq!(deliveries[0], (carol, joined(false, false)));
        assert!(!deliveries
            .iter()
            .any(|(_, event)| event == &RoomEvent::BootstrapRequest));
    }

    #[test]
    fn owner_snapshot_should_reach_everyone_else() {
        let mut state = ServerState::new();
        let (alice, _) = join(&mut state, "alice");
        let (bob, _) = join(&mut state, "bob");
        let (carol, _) = join(&mut state, "carol");
        let replica = ReplicaSnapshot::new().with_user("alice", vec![segment()]);

        let deliveries = route(
            &mut state,
            alice,
            RoomCommand::FullSnapshot {
                room: "lobby".into(),
                replica: replica.clone(),
            },
        )
        .unwrap();
        let mut receivers: Vec<_> = deliveries.iter().map(|(to, _)| *to).collect();
        receivers.sort();
        assert_eq!(receivers, vec![bob, carol]);
        assert!(deliveries
            .iter()
            .all(|(_, event)| event == &RoomEvent::FullSnapshot(replica.clone())));

        assert_eq!(
            route(
                &mut state,
                bob,
                RoomCommand::FullSnapshot {
                    room: "lobby".into(),
                    replica,
                },
            ),
            Err(ServerError::NotOwner("lobby".into()))
        );
    }

    #[test]
    fn commit_should_exclude_sender() {
        let mut state = ServerState::new();
        let (alice, _) = join(&mut state, "alice");
        let (bob, _) = join(&mut state, "bob");

        let deliveries = route(
            &mut state,
            bob,
            RoomCommand::ActionCommit {
                room: "lobby".into(),
                user_identity: "bob".into(),
                action: segment(),
            },
        )
        .unwrap();
        assert_eq!(
            deliveries,
            vec![(
                alice,
                RoomEvent::ActionCommitted {
                    user_identity: "bob".into(),
                    action: segment(),
                }
            )]
        );
    }

    #[test]
    fn it_should_refuse_acting_for_someone_else() {
        let mut state = ServerState::new();
        let (_alice, _) = join(&mut state, "alice");
        let (bob, _) = join(&mut state, "bob");

        assert_eq!(
            route(
                &mut state,
                bob,
                RoomCommand::Undo {
                    room: "lobby".into(),
                    user_identity: "alice".into(),
                },
            ),
            Err(ServerError::IdentityMismatch(bob, "alice".into()))
        );
        assert_eq!(
            route(
                &mut state,
                bob,
                RoomCommand::Redo {
                    room: "attic".into(),
                    user_identity: "bob".into(),
                },
            ),
            Err(ServerError::NotInRoom(bob, "attic".into()))
        );
    }

    async fn next_room_event(rx: &mut Receiver<ConnectionEvent>) -> RoomEvent {
        match rx.recv().await {
            Some(ConnectionEvent::RoomEvent(event)) => event,
            other => panic!("unexpected event: {:?}", other),
        }
    }

    async fn connect(srv_tx: &mut ServerTx) -> (ConnectionId, Receiver<ConnectionEvent>) {
        let (tx, mut rx) = channel(8);
        srv_tx
            .send(ServerCommand::Connection(ConnectionCommand::Connect { tx }))
            .await
            .unwrap();
        match rx.recv().await {
            Some(ConnectionEvent::Connected { connection_id }) => (connection_id, rx),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn it_should_relay_between_connections() {
        let mut srv_tx = spawn_server(8);
        let (alice, mut alice_rx) = connect(&mut srv_tx).await;
        let (bob, mut bob_rx) = connect(&mut srv_tx).await;

        for (from, user) in &[(alice, "alice"), (bob, "bob")] {
            srv_tx
                .send(ServerCommand::Connection(ConnectionCommand::RoomCommand {
                    from: *from,
                    command: RoomCommand::Join {
                        room: "lobby".into(),
                        user_identity: (*user).into(),
                    },
                }))
                .await
                .unwrap();
        }
        assert_eq!(
            next_room_event(&mut alice_rx).await,
            RoomEvent::Joined {
                is_owner: true,
                catching_up: false
            }
        );
        assert_eq!(
            next_room_event(&mut alice_rx).await,
            RoomEvent::MemberJoined {
                user_identity: "bob".into()
            }
        );
        assert_eq!(
            next_room_event(&mut bob_rx).await,
            RoomEvent::Joined {
                is_owner: false,
                catching_up: true
            }
        );
        assert_eq!(
            next_room_event(&mut alice_rx).await,
            RoomEvent::BootstrapRequest
        );

        srv_tx
            .send(ServerCommand::Connection(ConnectionCommand::RoomCommand {
                from: alice,
                command: RoomCommand::ActionCommit {
                    room: "lobby".into(),
                    user_identity: "alice".into(),
                    action: segment(),
                },
            }))
            .await
            .unwrap();
        assert_eq!(
            next_room_event(&mut bob_rx).await,
            RoomEvent::ActionCommitted {
                user_identity: "alice".into(),
                action: segment(),
            }
        );

        let (tx, rx) = oneshot::channel();
        srv_tx
            .send(ServerCommand::Admin(AdminCommand::ListRooms { tx }))
            .await
            .unwrap();
        let rooms = rx.await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].owner, "alice");
        assert_eq!(rooms[0].members, vec!["alice".to_string(), "bob".to_string()]);

        srv_tx
            .send(ServerCommand::Connection(ConnectionCommand::Disconnect {
                from: bob,
            }))
            .await
            .unwrap();
        assert_eq!(
            next_room_event(&mut alice_rx).await,
            RoomEvent::MemberLeft {
                user_identity: "bob".into()
            }
        );
    }

    #[tokio::test]
    async fn refused_join_should_close_the_connection() {
        let mut srv_tx = spawn_server(8);
        let (bob, mut bob_rx) = connect(&mut srv_tx).await;
        let (bob_again, mut bob_again_rx) = connect(&mut srv_tx).await;

        for from in &[bob, bob_again] {
            srv_tx
                .send(ServerCommand::Connection(ConnectionCommand::RoomCommand {
                    from: *from,
                    command: RoomCommand::Join {
                        room: "lobby".into(),
                        user_identity: "bob".into(),
                    },
                }))
                .await
                .unwrap();
        }
        assert!(matches!(
            next_room_event(&mut bob_rx).await,
            RoomEvent::Joined { .. }
        ));
        match bob_again_rx.recv().await {
            Some(ConnectionEvent::Disconnected { connection_id }) => {
                assert_eq!(connection_id, bob_again)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
