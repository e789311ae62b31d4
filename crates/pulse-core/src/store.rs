//! Publish/subscribe state container between network events and views.
//!
//! The store holds one value per [`StateKey`]. [`StateStore::set_state`]
//! replaces the value wholesale and then notifies every subscriber, in
//! registration order, synchronously, on every write (there is no dirty
//! check). A subscriber that fails is logged and skipped; the remaining
//! subscribers still see the update.

use pulse_types::ResultTally;
use tracing::{debug, warn};

/// Keys of the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// Current slide's answer tally.
    Results,
    /// Number of connected participants.
    UserCount,
    /// Whether remote emoji reactions are rendered.
    EnableEmojis,
}

impl StateKey {
    /// Name of the key as used by the browser front end.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Results => "results",
            Self::UserCount => "userCount",
            Self::EnableEmojis => "enableEmojis",
        }
    }
}

impl core::fmt::Display for StateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value written to the store, tagged with the key it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    /// New answer tally (replaces the previous one entirely).
    Results(ResultTally),
    /// New participant count.
    UserCount(u64),
    /// Reaction rendering toggle.
    EnableEmojis(bool),
}

impl StateValue {
    /// The key this value is stored under.
    pub const fn key(&self) -> StateKey {
        match self {
            Self::Results(_) => StateKey::Results,
            Self::UserCount(_) => StateKey::UserCount,
            Self::EnableEmojis(_) => StateKey::EnableEmojis,
        }
    }
}

/// Failure reported by a subscriber. Logged by the store, never propagated.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

/// Observer invoked on every store write.
pub trait Subscriber: Send {
    /// Called with the written key and value.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError`] if the observer could not apply the
    /// update. The store logs it and continues with the next subscriber.
    fn notify(&mut self, key: StateKey, value: &StateValue) -> Result<(), SubscriberError>;
}

impl<F> Subscriber for F
where
    F: FnMut(StateKey, &StateValue) -> Result<(), SubscriberError> + Send,
{
    fn notify(&mut self, key: StateKey, value: &StateValue) -> Result<(), SubscriberError> {
        self(key, value)
    }
}

/// The single mutable key/value container of a client.
#[derive(Default)]
pub struct StateStore {
    results: ResultTally,
    user_count: u64,
    enable_emojis: bool,
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl StateStore {
    /// Create an empty store: no results, zero users, reactions disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber. Duplicates are not detected; there is no
    /// way to unsubscribe.
    pub fn subscribe(&mut self, subscriber: impl Subscriber + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Replace the value for `value.key()` and notify every subscriber.
    pub fn set_state(&mut self, value: StateValue) {
        let key = value.key();
        match &value {
            StateValue::Results(results) => self.results.clone_from(results),
            StateValue::UserCount(count) => self.user_count = *count,
            StateValue::EnableEmojis(enabled) => self.enable_emojis = *enabled,
        }
        debug!(key = %key, subscribers = self.subscribers.len(), "state updated");

        for (index, subscriber) in self.subscribers.iter_mut().enumerate() {
            if let Err(e) = subscriber.notify(key, &value) {
                warn!(key = %key, subscriber = index, error = %e, "subscriber failed");
            }
        }
    }

    /// Last received answer tally.
    pub const fn results(&self) -> &ResultTally {
        &self.results
    }

    /// Last received participant count.
    pub const fn user_count(&self) -> u64 {
        self.user_count
    }

    /// Whether remote reactions should be rendered.
    pub const fn emojis_enabled(&self) -> bool {
        self.enable_emojis
    }

    /// Current value stored under `key`.
    pub fn get(&self, key: StateKey) -> StateValue {
        match key {
            StateKey::Results => StateValue::Results(self.results.clone()),
            StateKey::UserCount => StateValue::UserCount(self.user_count),
            StateKey::EnableEmojis => StateValue::EnableEmojis(self.enable_emojis),
        }
    }
}

impl core::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StateStore")
            .field("results", &self.results)
            .field("user_count", &self.user_count)
            .field("enable_emojis", &self.enable_emojis)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
