use crate::room::RoomDescription;
use tokio::sync::oneshot::Sender;

#[derive(Debug)]
pub enum AdminCommand {
    ListRooms { tx: Sender<Vec<RoomDescription>> },
}
