//! Headless real-time client for the Pulse audience-response app.
//!
//! This crate wires the synchronization core from `pulse-core` to the
//! outside world: a WebSocket channel that reconnects on a fixed delay,
//! the presenter's next-slide HTTP action, and a page host that stands in
//! for browser navigation.
//!
//! # Architecture
//!
//! ```text
//! WebSocket --> ConnectionManager --(ConnectionEvent)--+
//! reaction timers --------------(TimerEvent)-----------+--> ClientContext::run
//! console input ----------------(Gesture)--------------+        |
//!                                                               v
//!                               StateStore --> bindings    EntityManager --> Stage
//! ```
//!
//! Everything on the right-hand side runs on one task, one event at a
//! time. Outbound frames go back through the [`connection::Transport`].
//!
//! # Modules
//!
//! - [`connection`] -- Duplex channel, reconnect loop, outbound queue
//! - [`client`] -- Context object, dispatch table, gestures, event loop
//! - [`page`] -- Page URL, derived endpoints, navigation host
//! - [`presenter`] -- Next-slide HTTP action
//! - [`headless`] -- Console views and stage
//! - [`loadtest`] -- Many-socket load generator
//! - [`error`] -- Startup failures

pub mod client;
pub mod connection;
pub mod error;
pub mod headless;
pub mod loadtest;
pub mod page;
pub mod presenter;

pub use client::{ClientContext, Gesture, forward_gestures, parse_gesture};
pub use connection::{ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionStatus, Transport};
pub use error::ClientError;
pub use page::{LoggingHost, PageHost, PageLocation};
pub use presenter::PresenterClient;

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_ENV: &str = "PULSE_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "pulse-config.yaml";
