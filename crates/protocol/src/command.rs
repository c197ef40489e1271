//! The command envelope exchanged between server sessions and clients.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::payload::Payload;

/// Command tag carried by every message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadCommand {
    /// Uninitialized sentinel; never sent on the wire.
    #[default]
    None,
    /// Client asks the server for work.
    GetData,
    /// Server has no work available right now.
    NoData,
    /// Server hands the client a payload to process.
    Compute,
    /// Client returns a processed payload.
    Result,
    /// Either side signals a fault on its end; the peer resumes.
    Error,
}

impl PayloadCommand {
    /// Whether a container with this command must carry a payload.
    ///
    /// The remaining commands must NOT carry one.
    pub fn requires_payload(self) -> bool {
        matches!(self, PayloadCommand::Compute | PayloadCommand::Result)
    }
}

impl fmt::Display for PayloadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayloadCommand::None => "none",
            PayloadCommand::GetData => "get_data",
            PayloadCommand::NoData => "no_data",
            PayloadCommand::Compute => "compute",
            PayloadCommand::Result => "result",
            PayloadCommand::Error => "error",
        };
        f.write_str(name)
    }
}

/// The atomic message unit: a command tag plus an optional work payload.
///
/// A container exclusively owns its payload; it is built fresh for every
/// outbound message and a fresh one materializes on the peer by decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandContainer {
    command: PayloadCommand,
    #[serde(default)]
    payload: Option<Payload>,
}

impl CommandContainer {
    pub fn new(command: PayloadCommand, payload: Option<Payload>) -> Self {
        Self { command, payload }
    }

    /// Client request for work.
    pub fn get_data() -> Self {
        Self::new(PayloadCommand::GetData, None)
    }

    /// Server reply when the queue is empty.
    pub fn no_data() -> Self {
        Self::new(PayloadCommand::NoData, None)
    }

    /// Server dispatch of a work item.
    pub fn compute(payload: Payload) -> Self {
        Self::new(PayloadCommand::Compute, Some(payload))
    }

    /// Client return of a processed work item.
    pub fn result(payload: Payload) -> Self {
        Self::new(PayloadCommand::Result, Some(payload))
    }

    /// Fault signal; the peer resumes as if asked for work.
    pub fn error() -> Self {
        Self::new(PayloadCommand::Error, None)
    }

    pub fn command(&self) -> PayloadCommand {
        self.command
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Consumes the container, yielding the payload if one is attached.
    pub fn into_payload(self) -> Option<Payload> {
        self.payload
    }

    /// Processes the attached payload in place, if any.
    pub fn process(&mut self) {
        if let Some(payload) = &mut self.payload {
            payload.process();
        }
    }

    /// Whether the attached payload has been processed.
    ///
    /// A container without a payload is never processed.
    pub fn is_processed(&self) -> bool {
        self.payload.as_ref().is_some_and(Payload::is_processed)
    }
}
