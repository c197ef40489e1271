//! Build-time selectable wire formats for [`CommandContainer`].
//!
//! All three backends are always compiled (and tested); the `wire-*` cargo
//! features only choose which one [`encode`] and [`decode`] speak. The JSON
//! and XML formats travel as text frames, the bincode format as binary
//! frames.

use crate::command::{CommandContainer, PayloadCommand};

/// The wire formats the codec can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Xml,
    Binary,
}

/// The body of a single WebSocket message.
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Errors while encoding or decoding a [`CommandContainer`].
///
/// A codec error is not recoverable within a session; the session closes.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode command container: {0}")]
    Encode(String),

    #[error("failed to decode command container: {0}")]
    Decode(String),

    #[error("command {0} requires a payload")]
    MissingPayload(PayloadCommand),

    #[error("command {0} must not carry a payload")]
    UnexpectedPayload(PayloadCommand),

    #[error("expected a {expected} frame for the {format:?} wire format")]
    FrameType {
        expected: &'static str,
        format: WireFormat,
    },
}

// Feature precedence: binary > xml > json.
#[cfg(feature = "wire-binary")]
pub const WIRE_FORMAT: WireFormat = WireFormat::Binary;
#[cfg(all(feature = "wire-xml", not(feature = "wire-binary")))]
pub const WIRE_FORMAT: WireFormat = WireFormat::Xml;
#[cfg(all(
    feature = "wire-json",
    not(any(feature = "wire-xml", feature = "wire-binary"))
))]
pub const WIRE_FORMAT: WireFormat = WireFormat::Json;

#[cfg(not(any(feature = "wire-json", feature = "wire-xml", feature = "wire-binary")))]
compile_error!("enable one of the wire-json, wire-xml or wire-binary features");

/// Encodes a container into one WebSocket message body.
pub fn encode(container: &CommandContainer) -> Result<WireFrame, CodecError> {
    validate(container)?;
    match WIRE_FORMAT {
        WireFormat::Json => json::encode(container).map(WireFrame::Text),
        WireFormat::Xml => xml::encode(container).map(WireFrame::Text),
        WireFormat::Binary => binary::encode(container).map(WireFrame::Binary),
    }
}

/// Decodes one WebSocket message body into a container.
pub fn decode(frame: WireFrame) -> Result<CommandContainer, CodecError> {
    let container = match (WIRE_FORMAT, frame) {
        (WireFormat::Json, WireFrame::Text(text)) => json::decode(&text)?,
        (WireFormat::Xml, WireFrame::Text(text)) => xml::decode(&text)?,
        (WireFormat::Binary, WireFrame::Binary(data)) => binary::decode(&data)?,
        (format @ (WireFormat::Json | WireFormat::Xml), WireFrame::Binary(_)) => {
            return Err(CodecError::FrameType {
                expected: "text",
                format,
            });
        }
        (format @ WireFormat::Binary, WireFrame::Text(_)) => {
            return Err(CodecError::FrameType {
                expected: "binary",
                format,
            });
        }
    };
    validate(&container)?;
    Ok(container)
}

/// Enforces the command/payload pairing invariant.
fn validate(container: &CommandContainer) -> Result<(), CodecError> {
    let command = container.command();
    match (command.requires_payload(), container.payload().is_some()) {
        (true, false) => Err(CodecError::MissingPayload(command)),
        (false, true) => Err(CodecError::UnexpectedPayload(command)),
        _ => Ok(()),
    }
}

mod json {
    use super::CodecError;
    use crate::command::CommandContainer;

    pub(super) fn encode(container: &CommandContainer) -> Result<String, CodecError> {
        serde_json::to_string(container).map_err(|e| CodecError::Encode(e.to_string()))
    }

    pub(super) fn decode(text: &str) -> Result<CommandContainer, CodecError> {
        serde_json::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

mod xml {
    use serde::{Deserialize, Serialize};

    use super::CodecError;
    use crate::command::{CommandContainer, PayloadCommand};
    use crate::payload::Payload;

    // quick-xml cannot express an externally tagged enum behind a named
    // field, so the XML shape carries one optional element per payload
    // variant instead.
    #[derive(Serialize, Deserialize)]
    #[serde(rename = "command_container")]
    struct XmlContainer {
        command: PayloadCommand,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        random_container: Option<XmlRandomContainer>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        sleep: Option<XmlSleep>,
    }

    #[derive(Serialize, Deserialize)]
    struct XmlRandomContainer {
        #[serde(default)]
        data: Vec<f64>,
    }

    #[derive(Serialize, Deserialize)]
    struct XmlSleep {
        duration: f64,
    }

    pub(super) fn encode(container: &CommandContainer) -> Result<String, CodecError> {
        let mut shape = XmlContainer {
            command: container.command(),
            random_container: None,
            sleep: None,
        };
        match container.payload() {
            Some(Payload::RandomContainer { data }) => {
                shape.random_container = Some(XmlRandomContainer { data: data.clone() });
            }
            Some(Payload::Sleep { duration }) => {
                shape.sleep = Some(XmlSleep {
                    duration: *duration,
                });
            }
            None => {}
        }
        quick_xml::se::to_string(&shape).map_err(|e| CodecError::Encode(e.to_string()))
    }

    pub(super) fn decode(text: &str) -> Result<CommandContainer, CodecError> {
        let shape: XmlContainer =
            quick_xml::de::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))?;
        let payload = match (shape.random_container, shape.sleep) {
            (Some(container), None) => Some(Payload::RandomContainer {
                data: container.data,
            }),
            (None, Some(sleep)) => Some(Payload::Sleep {
                duration: sleep.duration,
            }),
            (None, None) => None,
            (Some(_), Some(_)) => {
                return Err(CodecError::Decode(
                    "message carries more than one payload element".into(),
                ));
            }
        };
        Ok(CommandContainer::new(shape.command, payload))
    }
}

mod binary {
    use super::CodecError;
    use crate::command::CommandContainer;

    pub(super) fn encode(container: &CommandContainer) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(container).map_err(|e| CodecError::Encode(e.to_string()))
    }

    pub(super) fn decode(data: &[u8]) -> Result<CommandContainer, CodecError> {
        bincode::deserialize(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
