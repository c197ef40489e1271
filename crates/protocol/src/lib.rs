//! Wire protocol for the workhive dispatch service.
//!
//! Every WebSocket message exchanged between the dispatch server and its
//! worker clients is exactly one encoded [`CommandContainer`]: a command tag
//! plus an optional work [`Payload`]. The byte representation is selected at
//! build time through the `wire-json` / `wire-xml` / `wire-binary` cargo
//! features; all peers of one deployment must be built with the same format.

pub mod constants;

mod codec;
mod command;
mod payload;

pub use codec::{CodecError, WireFormat, WireFrame, decode, encode, WIRE_FORMAT};
pub use command::{CommandContainer, PayloadCommand};
pub use payload::Payload;
