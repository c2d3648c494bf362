mod capture;
pub mod codec;
pub mod materialize;
mod message;
mod room_replica;
mod room_session;
mod stroke;
mod traits;
mod types;
mod user_timeline;
mod viewport;

pub use capture::*;
pub use codec::{CodecError, WireFormat};
pub use materialize::*;
pub use message::*;
pub use room_replica::*;
pub use room_session::*;
pub use stroke::*;
pub use traits::*;
pub use types::*;
pub use user_timeline::*;
pub use viewport::*;

pub extern crate bincode;
pub extern crate euclid;
pub extern crate serde;
pub extern crate serde_json;
