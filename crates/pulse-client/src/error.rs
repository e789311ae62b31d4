//! Error types for the client runtime.
//!
//! Only startup can fail hard. Once the event loop runs, connection loss,
//! bad frames and rejected presenter actions are logged and absorbed.

use pulse_core::ConfigError;

/// Errors that can occur while setting up or driving a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The page URL is malformed or uses an unsupported scheme.
    #[error("invalid page URL: {0}")]
    Url(String),

    /// The presenter endpoint could not be reached.
    #[error("HTTP error: {0}")]
    Http(String),
}
