//! Console renderings of the results list, participant count, and
//! reaction stage.

use pulse_core::reactions::{FloatingEmoji, Particle, ParticleId, Point};
use pulse_core::view::MemoryResultsView;
use pulse_core::{CountView, HeadlessStage, ResultsView, Stage};
use pulse_types::EntityId;
use tracing::{debug, info};

/// Results list that logs every row change.
#[derive(Debug, Default)]
pub struct LoggedResults {
    rows: MemoryResultsView,
}

impl ResultsView for LoggedResults {
    fn upsert_answer(&mut self, answer: &str, count: u64) {
        info!(answer, count, "result row");
        self.rows.upsert_answer(answer, count);
    }

    fn remove_answer(&mut self, answer: &str) {
        info!(answer, "result row removed");
        self.rows.remove_answer(answer);
    }

    fn answers(&self) -> Vec<String> {
        self.rows.answers()
    }
}

/// Participant count label that logs every update.
#[derive(Debug, Default)]
pub struct LoggedCount;

impl CountView for LoggedCount {
    fn set_count(&mut self, count: u64) {
        info!(count, "participants");
    }
}

/// Reaction stage that logs what would appear and disappear.
#[derive(Debug)]
pub struct LoggedStage {
    inner: HeadlessStage,
}

impl LoggedStage {
    /// Stage with the given viewport width.
    pub const fn new(viewport_width: f64) -> Self {
        Self {
            inner: HeadlessStage::new(viewport_width),
        }
    }
}

impl Stage for LoggedStage {
    fn viewport_width(&self) -> f64 {
        self.inner.viewport_width()
    }

    fn mount(&mut self, entity: &FloatingEmoji) {
        info!(entity_id = %entity.id, x = entity.x, "reaction floats up");
        self.inner.mount(entity);
    }

    fn unmount(&mut self, id: &EntityId) {
        debug!(entity_id = %id, "reaction gone");
        self.inner.unmount(id);
    }

    fn center_of(&self, id: &EntityId) -> Option<Point> {
        self.inner.center_of(id)
    }

    fn mount_particle(&mut self, particle: &Particle) {
        self.inner.mount_particle(particle);
    }

    fn unmount_particle(&mut self, id: ParticleId) {
        self.inner.unmount_particle(id);
    }
}
