//! The client event loop and the context object it owns.
//!
//! [`ClientContext`] bundles every piece of per-page state: the store, the
//! reaction registry, the page host, the outbound transport and the
//! presenter client. It is built once at startup and mutated only by
//! [`ClientContext::run`], which handles one event at a time from three
//! sources: the connection task, reaction timers, and user gestures.

use std::io::BufRead;

use pulse_core::config::ReactionsConfig;
use pulse_core::{Dismissal, EntityManager, StateStore, StateValue, Stage, Subscriber, TimerEvent};
use pulse_types::{EntityId, InboundMessage, OutboundMessage, SessionToken};
use rand::seq::IndexedRandom;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionEvent, Transport};
use crate::page::{PageHost, PageLocation, is_results_view, rewrite_target};
use crate::presenter::{PresenterClient, REJECTED_ALERT};

/// A local user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    /// The emoji button: send a random glyph from the palette.
    EmojiButton,
    /// Send a specific glyph.
    Emoji(String),
    /// Tap or touch a floating reaction.
    Dismiss {
        /// The reaction.
        id: EntityId,
        /// Which trigger fired.
        how: Dismissal,
    },
    /// Presenter asks for the next slide.
    NextSlide {
        /// Secret typed by the presenter.
        secret: String,
    },
}

/// Parse one line of console input into a gesture.
///
/// ```text
/// emoji            random glyph from the palette
/// emoji 🎉         that glyph
/// tap <id>         pop a reaction by pointer
/// touch <id>       pop a reaction by touch
/// next <secret>    advance the slide
/// ```
pub fn parse_gesture(line: &str) -> Option<Gesture> {
    let line = line.trim();
    let (command, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(command, arg)| (command, arg.trim()));

    match (command, arg) {
        ("emoji", "") => Some(Gesture::EmojiButton),
        ("emoji", glyph) => Some(Gesture::Emoji(glyph.to_owned())),
        ("tap", id) if !id.is_empty() => Some(Gesture::Dismiss {
            id: EntityId::from(id),
            how: Dismissal::Tap,
        }),
        ("touch", id) if !id.is_empty() => Some(Gesture::Dismiss {
            id: EntityId::from(id),
            how: Dismissal::TouchStart,
        }),
        ("next", secret) => Some(Gesture::NextSlide {
            secret: secret.to_owned(),
        }),
        _ => None,
    }
}

/// Forward gestures parsed from `input` until it ends or nobody listens.
///
/// Blocking; run it on a dedicated thread, never on the runtime.
/// Unrecognized lines are logged and skipped.
pub fn forward_gestures(input: impl BufRead, gestures: &mpsc::Sender<Gesture>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match parse_gesture(&line) {
            Some(gesture) => {
                if gestures.blocking_send(gesture).is_err() {
                    break;
                }
            }
            None => warn!(input = %line, "unrecognized gesture"),
        }
    }
}

/// Everything one client page owns.
pub struct ClientContext<S, H, T> {
    store: StateStore,
    reactions: EntityManager<S>,
    host: H,
    transport: T,
    presenter: PresenterClient,
    token: SessionToken,
    glyphs: Vec<String>,
    reactions_enabled: bool,
    slide_tx: mpsc::UnboundedSender<bool>,
    slide_rx: mpsc::UnboundedReceiver<bool>,
}

impl<S: Stage, H: PageHost, T: Transport> ClientContext<S, H, T> {
    /// Assemble a context for the page at `page`.
    ///
    /// Reaction timers post to `timers`; pass the matching receiver to
    /// [`run`](Self::run).
    pub fn new(
        page: &PageLocation,
        reactions: &ReactionsConfig,
        stage: S,
        host: H,
        transport: T,
        timers: mpsc::UnboundedSender<TimerEvent>,
    ) -> Self {
        let (slide_tx, slide_rx) = mpsc::unbounded_channel();
        Self {
            store: StateStore::new(),
            reactions: EntityManager::new(stage, timers),
            host,
            transport,
            presenter: PresenterClient::new(page.next_slide_url()),
            token: page.token(),
            glyphs: reactions.glyphs.clone(),
            reactions_enabled: reactions.enabled,
            slide_tx,
            slide_rx,
        }
    }

    /// Register a store subscriber.
    pub fn subscribe(&mut self, subscriber: impl Subscriber + 'static) {
        self.store.subscribe(subscriber);
    }

    /// Page-load work: publish the reaction toggle and canonicalize the
    /// survey URL.
    pub fn start(&mut self) {
        self.store
            .set_state(StateValue::EnableEmojis(self.reactions_enabled));

        let path = self.host.current_path();
        if let Some(target) = rewrite_target(&path, &self.token) {
            self.host.replace_path(&target);
        }
        info!(token = %self.token, emojis = self.reactions_enabled, "client started");
    }

    /// Apply one inbound server message.
    pub fn handle_inbound(&mut self, message: InboundMessage) {
        debug!(kind = message.kind(), "inbound message");
        match message {
            InboundMessage::NewSlide => {
                if is_results_view(&self.host.current_path()) {
                    self.host.navigate(&self.token.survey_path());
                } else {
                    self.host.reload();
                }
            }
            InboundMessage::NewAnswer(results) => {
                self.store.set_state(StateValue::Results(results));
            }
            InboundMessage::UserCount(count) => {
                self.store.set_state(StateValue::UserCount(count));
            }
            InboundMessage::Finished => self.host.navigate(&self.token.completed_path()),
            InboundMessage::Emoji(id) => {
                if self.store.emojis_enabled() {
                    let glyph = id.glyph().to_owned();
                    let _ = self.reactions.spawn(&glyph, Some(id));
                } else {
                    debug!(entity_id = %id, "reactions disabled, remote emoji ignored");
                }
            }
            InboundMessage::EmojiPopped(id) => {
                let _ = self.reactions.pop(&id);
            }
            InboundMessage::Shutdown => self.host.navigate("/"),
        }
    }

    /// Apply one event from the connection task.
    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => debug!("channel open"),
            ConnectionEvent::Message(message) => self.handle_inbound(message),
            ConnectionEvent::Closed { attempt } => debug!(attempt, "channel closed"),
        }
    }

    /// Apply one reaction timer expiry.
    pub fn handle_timer(&mut self, event: TimerEvent) {
        self.reactions.handle_timer(event);
    }

    /// Spawn a local reaction and announce it.
    ///
    /// Does nothing unless the channel is open. Returns the new reaction's
    /// identifier, or `None` if nothing was spawned.
    pub fn send_emoji(&mut self, glyph: &str) -> Option<EntityId> {
        if !self.transport.is_open() {
            debug!(glyph, "channel not open, emoji not sent");
            return None;
        }
        let id = self.reactions.spawn(glyph, None)?;
        let _ = self.transport.send(OutboundMessage::Emoji(id.clone()));
        Some(id)
    }

    /// The emoji button: a random glyph from the palette.
    pub fn send_random_emoji(&mut self) -> Option<EntityId> {
        let glyph = self.glyphs.choose(&mut rand::rng())?.clone();
        self.send_emoji(&glyph)
    }

    /// Pop a reaction the local user tapped or touched, and tell everyone
    /// else. Returns `false` if it was already gone.
    pub fn dismiss(&mut self, id: &EntityId, how: Dismissal) -> bool {
        let Some(popped) = self.reactions.dismiss(id, how) else {
            return false;
        };
        let _ = self.transport.send(OutboundMessage::EmojiPopped(popped));
        true
    }

    /// Presenter action, awaited in place. A refusal is surfaced as a
    /// generic alert.
    pub async fn advance_slide(&mut self, secret: &str) -> bool {
        let advanced = self.presenter.advance_slide(secret).await;
        self.finish_slide_request(advanced);
        advanced
    }

    /// Presenter action in the background. The outcome comes back to
    /// [`run`](Self::run) as its own event, so the loop keeps dispatching
    /// while the request is in flight.
    pub fn request_next_slide(&self, secret: String) {
        let presenter = self.presenter.clone();
        let outcome = self.slide_tx.clone();
        drop(tokio::spawn(async move {
            let advanced = presenter.advance_slide(&secret).await;
            let _ = outcome.send(advanced);
        }));
    }

    /// Apply the outcome of a next-slide request.
    pub fn finish_slide_request(&mut self, advanced: bool) {
        if !advanced {
            self.host.alert(REJECTED_ALERT);
        }
    }

    /// Apply one user gesture.
    pub fn handle_gesture(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::EmojiButton => {
                let _ = self.send_random_emoji();
            }
            Gesture::Emoji(glyph) => {
                let _ = self.send_emoji(&glyph);
            }
            Gesture::Dismiss { id, how } => {
                let _ = self.dismiss(&id, how);
            }
            Gesture::NextSlide { secret } => self.request_next_slide(secret),
        }
    }

    /// Drive the context until the connection task goes away.
    ///
    /// Events are handled strictly one at a time and no handler awaits
    /// I/O. A closed gesture channel just stops gesture input.
    pub async fn run(
        mut self,
        mut connection: mpsc::UnboundedReceiver<ConnectionEvent>,
        mut timers: mpsc::UnboundedReceiver<TimerEvent>,
        mut gestures: mpsc::Receiver<Gesture>,
    ) -> Self {
        loop {
            tokio::select! {
                event = connection.recv() => match event {
                    Some(event) => self.handle_connection_event(event),
                    None => break,
                },
                Some(event) = timers.recv() => self.handle_timer(event),
                Some(gesture) = gestures.recv() => self.handle_gesture(gesture),
                Some(advanced) = self.slide_rx.recv() => self.finish_slide_request(advanced),
            }
        }
        info!("client loop stopped");
        self
    }

    /// The state store.
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// The reaction registry.
    pub const fn reactions(&self) -> &EntityManager<S> {
        &self.reactions
    }

    /// The page host.
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// The outbound transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Session token from the page path.
    pub const fn token(&self) -> &SessionToken {
        &self.token
    }
}

impl<S, H, T> core::fmt::Debug for ClientContext<S, H, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientContext")
            .field("store", &self.store)
            .field("reactions", &self.reactions)
            .field("token", &self.token)
            .field("reactions_enabled", &self.reactions_enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pulse_core::{HeadlessStage, StateKey, SubscriberError};
    use pulse_types::ResultTally;

    use super::*;
    use crate::page::{LoggingHost, PageAction};

    #[derive(Debug, Default)]
    struct RecordingTransport {
        open: bool,
        sent: Vec<OutboundMessage>,
    }

    impl Transport for RecordingTransport {
        fn is_open(&self) -> bool {
            self.open
        }

        fn send(&mut self, message: OutboundMessage) -> bool {
            if self.open {
                self.sent.push(message);
            }
            self.open
        }
    }

    type TestContext = ClientContext<HeadlessStage, LoggingHost, RecordingTransport>;

    fn context(url: &str, enabled: bool, open: bool) -> TestContext {
        let page = PageLocation::parse(url).unwrap();
        let reactions = ReactionsConfig {
            enabled,
            ..ReactionsConfig::default()
        };
        let (timers, _rx) = mpsc::unbounded_channel();
        let mut ctx = ClientContext::new(
            &page,
            &reactions,
            HeadlessStage::new(1280.0),
            LoggingHost::new(page.path()),
            RecordingTransport {
                open,
                sent: Vec::new(),
            },
            timers,
        );
        ctx.start();
        ctx
    }

    fn tally(entries: &[(&str, u64)]) -> ResultTally {
        entries
            .iter()
            .map(|(answer, count)| ((*answer).to_owned(), *count))
            .collect()
    }

    #[test]
    fn parses_console_gestures() {
        assert_eq!(parse_gesture("emoji"), Some(Gesture::EmojiButton));
        assert_eq!(
            parse_gesture("emoji 🎉"),
            Some(Gesture::Emoji(String::from("🎉")))
        );
        assert_eq!(
            parse_gesture("touch 🎉;abc"),
            Some(Gesture::Dismiss {
                id: EntityId::from("🎉;abc"),
                how: Dismissal::TouchStart,
            })
        );
        assert_eq!(
            parse_gesture("next hunter2"),
            Some(Gesture::NextSlide {
                secret: String::from("hunter2")
            })
        );
        assert_eq!(parse_gesture("tap"), None);
        assert_eq!(parse_gesture("dance"), None);
    }

    #[test]
    fn forwards_console_lines_as_gestures() {
        let (tx, mut rx) = mpsc::channel(8);
        forward_gestures(std::io::Cursor::new("emoji\n\ndance\nnext hunter2\n"), &tx);

        assert_eq!(rx.try_recv().unwrap(), Gesture::EmojiButton);
        assert_eq!(
            rx.try_recv().unwrap(),
            Gesture::NextSlide {
                secret: String::from("hunter2")
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn forwarding_stops_once_the_loop_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        forward_gestures(std::io::Cursor::new("emoji\nemoji\nemoji\n"), &tx);
        assert!(tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn start_publishes_toggle_and_rewrites_survey_url() {
        let ctx = context("http://localhost:8000/survey/x/abc", true, true);
        assert!(ctx.store().emojis_enabled());
        assert_eq!(
            ctx.host().actions(),
            &[PageAction::ReplacePath(String::from("/survey/abc"))]
        );

        let ctx = context("http://localhost:8000/results/abc", true, true);
        assert!(ctx.host().actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn new_answer_replaces_results() {
        let mut ctx = context("http://localhost:8000/results/abc", false, true);
        ctx.handle_inbound(InboundMessage::NewAnswer(tally(&[("Cats", 3), ("Dogs", 5)])));
        assert_eq!(ctx.store().results(), &tally(&[("Cats", 3), ("Dogs", 5)]));

        ctx.handle_inbound(InboundMessage::NewAnswer(tally(&[("Dogs", 5)])));
        assert_eq!(ctx.store().results(), &tally(&[("Dogs", 5)]));
    }

    #[tokio::test(start_paused = true)]
    async fn user_count_touches_only_user_count() {
        let mut ctx = context("http://localhost:8000/results/abc", false, true);
        let seen: Arc<Mutex<Vec<StateKey>>> = Arc::default();
        let log = Arc::clone(&seen);
        ctx.subscribe(move |key: StateKey, _: &StateValue| -> Result<(), SubscriberError> {
            log.lock().unwrap().push(key);
            Ok(())
        });

        ctx.handle_inbound(InboundMessage::UserCount(7));

        assert_eq!(ctx.store().user_count(), 7);
        assert_eq!(*seen.lock().unwrap(), vec![StateKey::UserCount]);
        assert!(ctx.store().results().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_emoji_spawns_once_and_pops_idempotently() {
        let mut ctx = context("http://localhost:8000/survey/abc", true, true);
        let id = EntityId::from("🎉;abc123xyz");

        ctx.handle_inbound(InboundMessage::Emoji(id.clone()));
        ctx.handle_inbound(InboundMessage::Emoji(id.clone()));
        assert_eq!(ctx.reactions().live_count(), 1);
        assert_eq!(ctx.reactions().get(&id).unwrap().glyph, "🎉");

        ctx.handle_inbound(InboundMessage::EmojiPopped(id.clone()));
        ctx.handle_inbound(InboundMessage::EmojiPopped(id.clone()));
        assert!(!ctx.reactions().is_live(&id));
        assert!(ctx.transport().sent.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_emoji_ignored_when_disabled() {
        let mut ctx = context("http://localhost:8000/survey/abc", false, true);
        ctx.handle_inbound(InboundMessage::Emoji(EntityId::from("🎉;abc123xyz")));
        assert_eq!(ctx.reactions().live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_messages() {
        let mut ctx = context("http://localhost:8000/results/abc", false, true);
        ctx.handle_inbound(InboundMessage::NewSlide);
        ctx.handle_inbound(InboundMessage::NewSlide);
        ctx.handle_inbound(InboundMessage::Finished);
        ctx.handle_inbound(InboundMessage::Shutdown);

        assert_eq!(
            ctx.host().actions(),
            &[
                PageAction::Navigate(String::from("/survey/abc")),
                PageAction::Reload,
                PageAction::Navigate(String::from("/completed/abc")),
                PageAction::Navigate(String::from("/")),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_emoji_requires_open_channel() {
        let mut ctx = context("http://localhost:8000/survey/abc", true, false);
        assert_eq!(ctx.send_emoji("🚀"), None);
        assert_eq!(ctx.reactions().live_count(), 0);

        let mut ctx = context("http://localhost:8000/survey/abc", true, true);
        let id = ctx.send_random_emoji().unwrap();
        assert!(ctx.reactions().is_live(&id));
        assert_eq!(ctx.transport().sent, vec![OutboundMessage::Emoji(id.clone())]);
        assert_eq!(ctx.reactions().reaction_count(id.glyph()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_broadcasts_once() {
        let mut ctx = context("http://localhost:8000/survey/abc", true, true);
        let id = ctx.send_emoji("👍").unwrap();

        assert!(ctx.dismiss(&id, Dismissal::Tap));
        assert!(!ctx.dismiss(&id, Dismissal::TouchStart));

        assert_eq!(
            ctx.transport().sent,
            vec![
                OutboundMessage::Emoji(id.clone()),
                OutboundMessage::EmojiPopped(id)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_connection_task_ends() {
        let ctx = context("http://localhost:8000/results/abc", false, true);
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let (_timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (_gesture_tx, gesture_rx) = mpsc::channel(4);

        conn_tx.send(ConnectionEvent::Opened).unwrap();
        conn_tx
            .send(ConnectionEvent::Message(InboundMessage::UserCount(3)))
            .unwrap();
        drop(conn_tx);

        let ctx = ctx.run(conn_rx, timer_rx, gesture_rx).await;
        assert_eq!(ctx.store().user_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_slide_request_alerts() {
        let mut ctx = context("http://localhost:8000/results/abc", false, true);
        ctx.finish_slide_request(true);
        assert!(ctx.host().actions().is_empty());

        ctx.finish_slide_request(false);
        assert_eq!(
            ctx.host().actions(),
            &[PageAction::Alert(String::from(REJECTED_ALERT))]
        );
    }
}
