//! sctl-ipc - local single-producer/multi-consumer state broadcasting.
//!
//! A [`StateServer`] owns a unix stream socket at a well-known path and
//! fans every snapshot out to all connected subscribers; any number of
//! [`StateReceiver`]s attach independently and replay the stream to a
//! callback. At most one server may hold the socket at a time.
//!
//! Wire protocol: each message is a 4-byte big-endian length prefix
//! followed by a JSON-encoded `PlayerState`.

pub mod error;
pub mod receiver;
pub mod server;
mod wire;

pub use error::IpcError;
pub use receiver::StateReceiver;
pub use server::{SOCKET_PATH, StateServer};
