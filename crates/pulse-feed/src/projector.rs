//! Projector trait.

use pulse_ws::Update;

/// Folds domain updates into local state.
///
/// Implementations are driven by a single task, one update at a time, in
/// arrival order. Heartbeats never reach a projector.
pub trait Projector: Send + Sync + 'static {
    /// Apply one update. Returns `true` when visible state changed.
    fn apply(&mut self, update: &Update) -> bool;
}
