//! Backtest progress projection.

use crate::mirror::LiveMirror;
use crate::projector::Projector;
use pulse_ws::Update;
use serde::Serialize;
use serde_json::Value;

/// Lifecycle of a backtest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BacktestPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl BacktestPhase {
    /// Map a status label or message kind to a phase.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "idle" | "pending" | "queued" => Some(Self::Idle),
            "running" | "started" | "in_progress" | "progress" => Some(Self::Running),
            "completed" | "complete" | "done" | "finished" | "result" => Some(Self::Completed),
            "failed" | "error" | "cancelled" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Mirror of the backtest progress stream.
#[derive(Debug, Clone, Default)]
pub struct BacktestProgress {
    mirror: LiveMirror,
    phase: BacktestPhase,
    /// Percent complete, 0-100.
    progress: f64,
    result: Option<Value>,
    error: Option<String>,
}

impl BacktestProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> BacktestPhase {
        self.phase
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Final result body of a completed run.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn mirror(&self) -> &LiveMirror {
        &self.mirror
    }
}

impl Projector for BacktestProgress {
    fn apply(&mut self, update: &Update) -> bool {
        let mut changed = self.mirror.apply(update);

        let phase = update
            .status()
            .and_then(BacktestPhase::from_label)
            .or_else(|| BacktestPhase::from_label(&update.kind));

        if let Some(progress) = update.progress() {
            let progress = progress.clamp(0.0, 100.0);
            if progress != self.progress {
                self.progress = progress;
                changed = true;
            }
        }

        if let Some(phase) = phase {
            if phase != self.phase {
                if phase == BacktestPhase::Running && self.phase.is_terminal() {
                    // A new run started.
                    self.result = None;
                    self.error = None;
                }
                self.phase = phase;
                changed = true;
            }

            match phase {
                BacktestPhase::Completed => {
                    self.progress = 100.0;
                    self.result = update
                        .get("result")
                        .cloned()
                        .or_else(|| update.payload.clone());
                }
                BacktestPhase::Failed => {
                    self.error = update
                        .str_field("message")
                        .or_else(|| update.str_field("error"))
                        .map(str::to_string);
                }
                BacktestPhase::Idle | BacktestPhase::Running => {}
            }
        }

        changed
    }
}
