//! Terminal spinner for publish progress.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use qn_publish_core::progress::{Phase, ProgressSink, ProgressSnapshot};

pub struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target);
        let style = ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        Self { bar }
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for SpinnerProgress {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        self.bar.set_message(snapshot.to_string());
    }

    fn on_phase(&self, phase: Phase) {
        match phase {
            Phase::Running => self.bar.enable_steady_tick(Duration::from_millis(100)),
            Phase::Succeeded => self.bar.finish_with_message(format!("✔ {}", self.bar.message())),
            Phase::Failed => self.bar.abandon_with_message(format!("✖ {}", self.bar.message())),
            _ => {}
        }
    }
}
