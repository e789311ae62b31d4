//! Lifecycle of floating emoji reactions.
//!
//! Reactions are spawned by a local gesture or a remote `emoji` event and
//! destroyed either when their animation runs out or when someone pops
//! them. The [`EntityManager`] keeps an explicit registry keyed by
//! [`EntityId`] so that "is this reaction on screen?" never depends on
//! what the view layer happens to show. At most one live reaction exists
//! per identifier.
//!
//! Timers (reaction lifetime, particle fade-out) run as detached Tokio
//! sleeps that post a [`TimerEvent`] back to the owning event loop, so all
//! registry and stage mutations happen in one place. Every timer handler
//! tolerates its target being gone already: a pop can race the lifetime
//! timer of the same reaction, and a reaction can be popped and respawned
//! under the same identifier before the first incarnation's timer fires.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::f64::consts::TAU;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_types::EntityId;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::debug;

use crate::id::generate_unique_id;

/// Shortest float-up animation.
pub const MIN_DURATION_SECS: f64 = 7.0;
/// Longest float-up animation (exclusive).
pub const MAX_DURATION_SECS: f64 = 13.0;
/// Longest entry delay before the animation starts (exclusive).
pub const MAX_DELAY_SECS: f64 = 2.0;
/// Rendered width of one reaction, kept inside the viewport.
pub const EMOJI_WIDTH_PX: f64 = 50.0;
/// Number of particles a popped reaction bursts into.
pub const PARTICLE_COUNT: u32 = 8;
/// How long a particle takes to fade and shrink away.
pub const PARTICLE_DURATION: Duration = Duration::from_millis(1000);
/// Slowest particle speed (exclusive upper bound is `MAX_PARTICLE_VELOCITY`).
pub const MIN_PARTICLE_VELOCITY: f64 = 5.0;
/// Fastest particle speed (exclusive).
pub const MAX_PARTICLE_VELOCITY: f64 = 10.0;
/// Pixels travelled per unit of particle velocity.
pub const PARTICLE_TRAVEL_SCALE: f64 = 20.0;

/// Screen-space position in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal offset from the left edge.
    pub x: f64,
    /// Vertical offset from the top edge.
    pub y: f64,
}

/// A live floating reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingEmoji {
    /// Identifier shared with every other client.
    pub id: EntityId,
    /// The emoji rendered.
    pub glyph: String,
    /// Horizontal start position.
    pub x: f64,
    /// Float-up animation length.
    pub duration: Duration,
    /// Delay before the animation starts.
    pub delay: Duration,
    /// Wall-clock spawn time.
    pub spawned_at: DateTime<Utc>,
    /// Distinguishes successive reactions that reuse one identifier.
    pub incarnation: u64,
}

impl FloatingEmoji {
    /// Planned time on screen: animation plus entry delay.
    pub const fn lifetime(&self) -> Duration {
        self.duration.saturating_add(self.delay)
    }

    /// Center of the reaction's start box, used when the stage cannot
    /// report where the reaction currently is.
    pub fn start_center(&self) -> Point {
        Point {
            x: self.x + EMOJI_WIDTH_PX / 2.0,
            y: 0.0,
        }
    }
}

/// Identifier of one explosion particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticleId(pub u64);

/// One short-lived piece of a popped reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Particle identifier.
    pub id: ParticleId,
    /// Same glyph as the popped reaction.
    pub glyph: String,
    /// Burst origin (the popped reaction's center).
    pub origin: Point,
    /// Horizontal travel over the particle's lifetime.
    pub dx: f64,
    /// Vertical travel over the particle's lifetime.
    pub dy: f64,
    /// Fade-and-shrink duration.
    pub duration: Duration,
}

/// How the local user dismissed a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    /// Pointer click or tap.
    Tap,
    /// Touch start on a touch screen.
    TouchStart,
}

/// Timer expiry posted back to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A reaction's lifetime ran out.
    Expire {
        /// The reaction.
        id: EntityId,
        /// Incarnation the timer was armed for.
        incarnation: u64,
    },
    /// A particle finished its animation.
    ParticleDone(ParticleId),
}

/// The view layer reactions and particles are drawn on.
pub trait Stage: Send {
    /// Width of the visible area in pixels.
    fn viewport_width(&self) -> f64;

    /// Show a new reaction.
    fn mount(&mut self, entity: &FloatingEmoji);

    /// Remove a reaction. Called at most once per mount.
    fn unmount(&mut self, id: &EntityId);

    /// Current on-screen center of a reaction, if the stage tracks it.
    fn center_of(&self, id: &EntityId) -> Option<Point>;

    /// Show an explosion particle.
    fn mount_particle(&mut self, particle: &Particle);

    /// Remove an explosion particle.
    fn unmount_particle(&mut self, id: ParticleId);
}

/// Owns the registry of live reactions and drives their lifecycle.
pub struct EntityManager<S> {
    stage: S,
    live: HashMap<EntityId, FloatingEmoji>,
    particles: HashSet<ParticleId>,
    counts: BTreeMap<String, u64>,
    next_incarnation: u64,
    next_particle: u64,
    timers: mpsc::UnboundedSender<TimerEvent>,
}

impl<S: Stage> EntityManager<S> {
    /// Create a manager drawing on `stage` and posting timer expiries
    /// to `timers`.
    pub fn new(stage: S, timers: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            stage,
            live: HashMap::new(),
            particles: HashSet::new(),
            counts: BTreeMap::new(),
            next_incarnation: 0,
            next_particle: 0,
            timers,
        }
    }

    /// Spawn a reaction, using `provided` as its identifier or
    /// synthesizing `glyph;<random>`.
    ///
    /// Returns `None` (and changes nothing) if a reaction with that
    /// identifier is already live.
    pub fn spawn(&mut self, glyph: &str, provided: Option<EntityId>) -> Option<EntityId> {
        let id = provided.unwrap_or_else(|| EntityId::new(glyph, &generate_unique_id()));

        if self.live.contains_key(&id) {
            debug!(entity_id = %id, "reaction already on screen, skipping spawn");
            return None;
        }

        let mut rng = rand::rng();
        let span = self.stage.viewport_width() - EMOJI_WIDTH_PX;
        let x = if span > 0.0 { rng.random_range(0.0..span) } else { 0.0 };
        let duration =
            Duration::from_secs_f64(rng.random_range(MIN_DURATION_SECS..MAX_DURATION_SECS));
        let delay = Duration::from_secs_f64(rng.random_range(0.0..MAX_DELAY_SECS));

        let incarnation = self.next_incarnation;
        self.next_incarnation = self.next_incarnation.wrapping_add(1);

        let entity = FloatingEmoji {
            id: id.clone(),
            glyph: glyph.to_owned(),
            x,
            duration,
            delay,
            spawned_at: Utc::now(),
            incarnation,
        };

        self.stage.mount(&entity);
        self.schedule(
            entity.lifetime(),
            TimerEvent::Expire {
                id: id.clone(),
                incarnation,
            },
        );

        let count = self.counts.entry(glyph.to_owned()).or_insert(0);
        *count = count.saturating_add(1);

        debug!(
            entity_id = %id,
            lifetime_ms = entity.lifetime().as_millis(),
            "reaction spawned"
        );
        let _ = self.live.insert(id.clone(), entity);
        Some(id)
    }

    /// Burst a live reaction into particles and remove it immediately.
    ///
    /// Returns `false` if no reaction with that identifier is live.
    pub fn pop(&mut self, id: &EntityId) -> bool {
        let Some(entity) = self.live.remove(id) else {
            debug!(entity_id = %id, "pop for absent reaction ignored");
            return false;
        };

        let origin = self
            .stage
            .center_of(id)
            .unwrap_or_else(|| entity.start_center());

        let mut rng = rand::rng();
        for i in 0..PARTICLE_COUNT {
            let angle = f64::from(i) / f64::from(PARTICLE_COUNT) * TAU;
            let velocity = rng.random_range(MIN_PARTICLE_VELOCITY..MAX_PARTICLE_VELOCITY);
            let particle = Particle {
                id: self.next_particle_id(),
                glyph: entity.glyph.clone(),
                origin,
                dx: angle.cos() * velocity * PARTICLE_TRAVEL_SCALE,
                dy: angle.sin() * velocity * PARTICLE_TRAVEL_SCALE,
                duration: PARTICLE_DURATION,
            };
            self.stage.mount_particle(&particle);
            let _ = self.particles.insert(particle.id);
            self.schedule(PARTICLE_DURATION, TimerEvent::ParticleDone(particle.id));
        }

        self.stage.unmount(id);
        debug!(entity_id = %id, "reaction popped");
        true
    }

    /// Pop a reaction in response to a local gesture.
    ///
    /// Returns the identifier to broadcast so remote clients remove their
    /// copies, or `None` if the reaction was already gone. Tap and touch
    /// are independent triggers; whichever lands second is a no-op.
    pub fn dismiss(&mut self, id: &EntityId, how: Dismissal) -> Option<EntityId> {
        debug!(entity_id = %id, gesture = ?how, "dismiss requested");
        self.pop(id).then(|| id.clone())
    }

    /// Apply a timer expiry.
    pub fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Expire { id, incarnation } => {
                let current = self.live.get(&id).map(|entity| entity.incarnation);
                if current == Some(incarnation) {
                    let _ = self.live.remove(&id);
                    self.stage.unmount(&id);
                    debug!(entity_id = %id, "reaction expired");
                } else {
                    debug!(entity_id = %id, incarnation, "stale expiry ignored");
                }
            }
            TimerEvent::ParticleDone(particle) => {
                if self.particles.remove(&particle) {
                    self.stage.unmount_particle(particle);
                }
            }
        }
    }

    /// Whether a reaction with this identifier is on screen.
    pub fn is_live(&self, id: &EntityId) -> bool {
        self.live.contains_key(id)
    }

    /// The live reaction with this identifier.
    pub fn get(&self, id: &EntityId) -> Option<&FloatingEmoji> {
        self.live.get(id)
    }

    /// Number of live reactions.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of particles still animating.
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// How many reactions with this glyph were spawned so far.
    pub fn reaction_count(&self, glyph: &str) -> u64 {
        self.counts.get(glyph).copied().unwrap_or(0)
    }

    /// Spawn counts for every glyph seen so far.
    pub fn reaction_counts(&self) -> BTreeMap<String, u64> {
        self.counts.clone()
    }

    /// The stage reactions are drawn on.
    pub const fn stage(&self) -> &S {
        &self.stage
    }

    fn next_particle_id(&mut self) -> ParticleId {
        let id = ParticleId(self.next_particle);
        self.next_particle = self.next_particle.wrapping_add(1);
        id
    }

    fn schedule(&self, after: Duration, event: TimerEvent) {
        let timers = self.timers.clone();
        drop(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // The loop may have shut down; the expiry is moot then.
            let _ = timers.send(event);
        }));
    }
}

impl<S> core::fmt::Debug for EntityManager<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityManager")
            .field("live", &self.live.len())
            .field("particles", &self.particles.len())
            .field("counts", &self.counts)
            .finish_non_exhaustive()
    }
}

/// In-memory stage for headless clients and tests.
///
/// Tracks what would be on screen without rendering anything.
#[derive(Debug, Clone)]
pub struct HeadlessStage {
    viewport_width: f64,
    mounted: BTreeMap<EntityId, FloatingEmoji>,
    particles: BTreeMap<ParticleId, Particle>,
    mount_calls: u64,
    unmount_calls: u64,
}

impl HeadlessStage {
    /// Create a stage with the given viewport width.
    pub const fn new(viewport_width: f64) -> Self {
        Self {
            viewport_width,
            mounted: BTreeMap::new(),
            particles: BTreeMap::new(),
            mount_calls: 0,
            unmount_calls: 0,
        }
    }

    /// Whether a reaction is currently mounted.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.mounted.contains_key(id)
    }

    /// Mounted reactions.
    pub fn mounted(&self) -> impl Iterator<Item = &FloatingEmoji> {
        self.mounted.values()
    }

    /// Number of mounted reactions.
    pub fn mounted_count(&self) -> usize {
        self.mounted.len()
    }

    /// Mounted particles.
    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.particles.values()
    }

    /// Number of mounted particles.
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Total reaction mounts so far.
    pub const fn mount_calls(&self) -> u64 {
        self.mount_calls
    }

    /// Total reaction unmounts so far.
    pub const fn unmount_calls(&self) -> u64 {
        self.unmount_calls
    }
}

impl Stage for HeadlessStage {
    fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    fn mount(&mut self, entity: &FloatingEmoji) {
        self.mount_calls = self.mount_calls.saturating_add(1);
        let _ = self.mounted.insert(entity.id.clone(), entity.clone());
    }

    fn unmount(&mut self, id: &EntityId) {
        self.unmount_calls = self.unmount_calls.saturating_add(1);
        let _ = self.mounted.remove(id);
    }

    fn center_of(&self, id: &EntityId) -> Option<Point> {
        self.mounted.get(id).map(FloatingEmoji::start_center)
    }

    fn mount_particle(&mut self, particle: &Particle) {
        let _ = self.particles.insert(particle.id, particle.clone());
    }

    fn unmount_particle(&mut self, id: ParticleId) {
        let _ = self.particles.remove(&id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn manager() -> (EntityManager<HeadlessStage>, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EntityManager::new(HeadlessStage::new(1280.0), tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_synthesizes_glyph_prefixed_id() {
        let (mut reactions, _timers) = manager();
        let id = reactions.spawn("🚀", None).unwrap();
        assert_eq!(id.glyph(), "🚀");
        assert_eq!(id.as_str().len(), "🚀;".len() + crate::id::UNIQUE_ID_LEN);
        assert!(reactions.stage().contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_randomizes_within_bounds() {
        let (mut reactions, _timers) = manager();
        for _ in 0..50 {
            let id = reactions.spawn("😀", None).unwrap();
            let entity = reactions.get(&id).unwrap();
            assert!(entity.x >= 0.0 && entity.x < 1280.0 - EMOJI_WIDTH_PX);
            assert!(entity.duration >= Duration::from_secs(7));
            assert!(entity.duration < Duration::from_secs(13));
            assert!(entity.delay < Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_spawn_is_a_noop() {
        let (mut reactions, _timers) = manager();
        let id = EntityId::from("🎉;abc123xyz");
        assert_eq!(reactions.spawn("🎉", Some(id.clone())), Some(id.clone()));
        assert_eq!(reactions.spawn("🎉", Some(id.clone())), None);
        assert_eq!(reactions.live_count(), 1);
        assert_eq!(reactions.stage().mount_calls(), 1);
        assert_eq!(reactions.reaction_count("🎉"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pop_bursts_into_evenly_spaced_particles() {
        let (mut reactions, _timers) = manager();
        let id = reactions.spawn("👍", None).unwrap();

        assert!(reactions.pop(&id));
        assert!(!reactions.is_live(&id));
        assert!(!reactions.stage().contains(&id));

        let particles: Vec<&Particle> = reactions.stage().particles().collect();
        assert_eq!(particles.len(), 8);
        for (i, particle) in particles.iter().enumerate() {
            let angle = f64::from(u32::try_from(i).unwrap()) / 8.0 * TAU;
            let distance = particle.dx.hypot(particle.dy);
            assert!(distance >= 100.0 && distance < 200.0);
            let expected = angle.sin().atan2(angle.cos());
            assert!((particle.dy.atan2(particle.dx) - expected).abs() < 1e-9);
            assert_eq!(particle.duration, PARTICLE_DURATION);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pop_of_absent_id_is_noop() {
        let (mut reactions, _timers) = manager();
        assert!(!reactions.pop(&EntityId::from("🎉;missing")));
        assert_eq!(reactions.live_count(), 0);
        assert_eq!(reactions.stage().particle_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_reports_id_once() {
        let (mut reactions, _timers) = manager();
        let id = reactions.spawn("😍", None).unwrap();
        assert_eq!(reactions.dismiss(&id, Dismissal::TouchStart), Some(id.clone()));
        assert_eq!(reactions.dismiss(&id, Dismissal::Tap), None);
    }

    #[tokio::test(start_paused = true)]
    async fn lifetime_timer_removes_reaction() {
        let (mut reactions, mut timers) = manager();
        let id = reactions.spawn("🎉", None).unwrap();
        let lifetime = reactions.get(&id).unwrap().lifetime();

        let start = tokio::time::Instant::now();
        let event = timers.recv().await.unwrap();
        assert!(start.elapsed() >= lifetime);
        reactions.handle_timer(event);

        assert!(!reactions.is_live(&id));
        assert!(!reactions.stage().contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_after_pop_is_tolerated() {
        let (mut reactions, mut timers) = manager();
        let id = reactions.spawn("🎉", None).unwrap();
        assert!(reactions.pop(&id));
        let unmounts = reactions.stage().unmount_calls();

        // Eight particle timers then the lifetime timer.
        for _ in 0..9 {
            let event = timers.recv().await.unwrap();
            reactions.handle_timer(event);
        }

        assert_eq!(reactions.stage().unmount_calls(), unmounts);
        assert_eq!(reactions.stage().particle_count(), 0);
        assert_eq!(reactions.particle_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_expiry_spares_respawned_reaction() {
        let (mut reactions, _timers) = manager();
        let id = EntityId::from("🚀;same");
        let _ = reactions.spawn("🚀", Some(id.clone())).unwrap();
        let first = reactions.get(&id).unwrap().incarnation;
        assert!(reactions.pop(&id));
        let _ = reactions.spawn("🚀", Some(id.clone())).unwrap();

        reactions.handle_timer(TimerEvent::Expire {
            id: id.clone(),
            incarnation: first,
        });

        assert!(reactions.is_live(&id));
        assert!(reactions.stage().contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn counts_accumulate_per_glyph() {
        let (mut reactions, _timers) = manager();
        let _ = reactions.spawn("😀", None);
        let _ = reactions.spawn("😀", None);
        let _ = reactions.spawn("🚀", None);
        assert_eq!(reactions.reaction_count("😀"), 2);
        assert_eq!(reactions.reaction_count("🚀"), 1);
        assert_eq!(reactions.reaction_count("👍"), 0);
        assert_eq!(reactions.reaction_counts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn narrow_viewport_pins_to_left_edge() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut reactions = EntityManager::new(HeadlessStage::new(20.0), tx);
        let id = reactions.spawn("👍", None).unwrap();
        assert_eq!(reactions.get(&id).unwrap().x, 0.0);
    }
}
