//! JSON envelope protocol spoken over the duplex channel.
//!
//! Every frame in either direction is `{"type": string, "payload": any}`.
//! Inbound frames decode into the closed [`InboundMessage`] union; the
//! payload shape is fixed per kind and anything that does not fit is
//! rejected rather than partially interpreted.
//!
//! | type          | payload              |
//! |---------------|----------------------|
//! | `newSlide`    | ignored              |
//! | `newAnswer`   | answer -> count map  |
//! | `userCount`   | non-negative integer |
//! | `finished`    | ignored              |
//! | `emoji`       | `"glyph;id"`         |
//! | `emojiPopped` | `"glyph;id"`         |
//! | `shutdown`    | ignored              |

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ProtocolError;
use crate::ids::EntityId;

/// Last received answer tally: answer label to vote count.
///
/// Replaced wholesale on every `newAnswer`, never merged.
pub type ResultTally = BTreeMap<String, u64>;

/// Messages pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// The presenter advanced to the next slide.
    NewSlide,
    /// Fresh snapshot of the current slide's results.
    NewAnswer(ResultTally),
    /// Number of connected participants.
    UserCount(u64),
    /// The survey has ended.
    Finished,
    /// Another participant spawned a reaction.
    Emoji(EntityId),
    /// Another participant popped a reaction.
    EmojiPopped(EntityId),
    /// The server is going away.
    Shutdown,
}

impl InboundMessage {
    /// Wire name of this message kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewSlide => "newSlide",
            Self::NewAnswer(_) => "newAnswer",
            Self::UserCount(_) => "userCount",
            Self::Finished => "finished",
            Self::Emoji(_) => "emoji",
            Self::EmojiPopped(_) => "emojiPopped",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Messages sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum OutboundMessage {
    /// Announce a reaction this client just spawned.
    Emoji(EntityId),
    /// Announce that the local user popped a reaction.
    EmojiPopped(EntityId),
}

impl OutboundMessage {
    /// Serialize to the JSON text frame sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Raw envelope before the payload is interpreted.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Decode one inbound text frame.
///
/// Returns `Ok(None)` for message types outside the protocol, which
/// callers are expected to ignore.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] for frames that are not a JSON
/// envelope and [`ProtocolError::InvalidPayload`] when a known type
/// carries a payload of the wrong shape.
pub fn decode_inbound(text: &str) -> Result<Option<InboundMessage>, ProtocolError> {
    let Envelope { kind, payload } = serde_json::from_str(text)?;

    let message = match kind.as_str() {
        "newSlide" => InboundMessage::NewSlide,
        "newAnswer" => InboundMessage::NewAnswer(payload_as(&kind, payload)?),
        "userCount" => InboundMessage::UserCount(payload_as(&kind, payload)?),
        "finished" => InboundMessage::Finished,
        "emoji" => InboundMessage::Emoji(payload_as(&kind, payload)?),
        "emojiPopped" => InboundMessage::EmojiPopped(payload_as(&kind, payload)?),
        "shutdown" => InboundMessage::Shutdown,
        _ => return Ok(None),
    };

    Ok(Some(message))
}

fn payload_as<T: DeserializeOwned>(kind: &str, payload: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.to_owned(),
        reason: e.to_string(),
    })
}
