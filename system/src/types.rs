pub type ConnectionId = u16;
pub type RoomName = String;
/// Stable identity supplied at join time. Survives reconnects, unlike `ConnectionId`.
pub type UserIdentity = String;
