//! Shared type definitions for the Pulse audience-response client.
//!
//! This crate is the single source of truth for the wire protocol between
//! the survey server and its connected clients. Outbound message and
//! identifier types flow to `TypeScript` via `ts-rs` so the browser front
//! end speaks the same envelope.
//!
//! # Modules
//!
//! - [`ids`] -- Reaction identifiers and session tokens
//! - [`protocol`] -- Inbound/outbound message unions and frame decoding
//! - [`error`] -- Decode and encode failures

pub mod error;
pub mod ids;
pub mod protocol;

pub use error::ProtocolError;
pub use ids::{ENTITY_ID_SEPARATOR, EntityId, SessionToken};
pub use protocol::{InboundMessage, OutboundMessage, ResultTally, decode_inbound};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the wire types.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::EntityId::export_all();
        let _ = crate::ids::SessionToken::export_all();
        let _ = crate::protocol::OutboundMessage::export_all();
    }
}
