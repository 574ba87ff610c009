// ─── Progress ───
// Per-call aggregator shared by every install phase.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// One progress notification. `done`/`total` belong to `step`; `fraction`
/// is the overall completion across every step seen so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub step: String,
    pub done: u64,
    pub total: u64,
    pub fraction: f64,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
struct StepState {
    done: u64,
    total: u64,
}

/// Thread-safe progress aggregator, created per orchestrator call.
#[derive(Default)]
pub struct ProgressTracker {
    steps: Mutex<BTreeMap<String, StepState>>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(callback: Option<ProgressCallback>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(BTreeMap::new()),
            callback,
        })
    }

    /// Tracker that only aggregates.
    pub fn silent() -> Arc<Self> {
        Self::new(None)
    }

    pub fn set_total(&self, step: &str, total: u64) {
        self.mutate(step, |s| s.total = total);
    }

    pub fn update(&self, step: &str, done: u64, total: u64) {
        self.mutate(step, |s| {
            s.done = done;
            s.total = total;
        });
    }

    pub fn increment(&self, step: &str) {
        self.mutate(step, |s| s.done += 1);
    }

    /// Overall completion in `[0, 1]`; `done` is clamped to `total` per step.
    pub fn fraction(&self) -> f64 {
        match self.steps.lock() {
            Ok(steps) => aggregate(&steps),
            Err(poisoned) => aggregate(&poisoned.into_inner()),
        }
    }

    pub fn step(&self, step: &str) -> Option<(u64, u64)> {
        let steps = self.steps.lock().ok()?;
        steps.get(step).map(|s| (s.done, s.total))
    }

    fn mutate(&self, step: &str, f: impl FnOnce(&mut StepState)) {
        let event = {
            let mut steps = match self.steps.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let state = steps.entry(step.to_string()).or_default();
            f(state);
            let current = *state;
            ProgressEvent {
                step: step.to_string(),
                done: current.done,
                total: current.total,
                fraction: aggregate(&steps),
            }
        };

        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }
}

fn aggregate(steps: &BTreeMap<String, StepState>) -> f64 {
    let (done, total) = steps.values().fold((0u64, 0u64), |(d, t), s| {
        (d + s.done.min(s.total), t + s.total)
    });
    if total == 0 {
        0.0
    } else {
        done as f64 / total as f64
    }
}
