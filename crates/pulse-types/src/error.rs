//! Error types for wire protocol decoding and encoding.

/// Errors raised while decoding inbound frames or encoding outbound ones.
///
/// An unknown message `type` is not an error: [`decode_inbound`]
/// reports it as `Ok(None)` so callers can ignore it quietly.
///
/// [`decode_inbound`]: crate::protocol::decode_inbound
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or lacked a `type` field.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// A known message type carried a payload of the wrong shape.
    #[error("invalid payload for `{kind}`: {reason}")]
    InvalidPayload {
        /// The message type whose payload was rejected.
        kind: String,
        /// Why the payload did not fit.
        reason: String,
    },
}
