//! Synchronization core of the Pulse audience-response client.
//!
//! Everything here is transport-agnostic: the connection manager in
//! `pulse-client` decodes network frames and feeds them into the pieces
//! below, which all run on one event loop.
//!
//! # Modules
//!
//! - [`id`] -- Short base-36 identifiers for ephemeral entities
//! - [`store`] -- Key/value state container with ordered subscribers
//! - [`reactions`] -- Floating emoji registry, particles, and lifetime timers
//! - [`view`] -- Subscribers projecting results and participant count
//! - [`config`] -- YAML configuration with environment overrides

pub mod config;
pub mod id;
pub mod reactions;
pub mod store;
pub mod view;

pub use config::{ClientConfig, ConfigError};
pub use id::generate_unique_id;
pub use reactions::{Dismissal, EntityManager, HeadlessStage, Stage, TimerEvent};
pub use store::{StateKey, StateStore, StateValue, Subscriber, SubscriberError};
pub use view::{CountBinding, CountView, ResultsBinding, ResultsView};
