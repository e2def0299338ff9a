//! Progress display for the staging stages

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Metadata,
    Prepare,
    Export,
    Rewrite,
    Exclude,
    Package,
    Collect,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Metadata => "Reading package metadata",
            Self::Prepare => "Preparing build root",
            Self::Export => "Exporting repository",
            Self::Rewrite => "Applying rewrites",
            Self::Exclude => "Applying exclusions",
            Self::Package => "Running packaging tool",
            Self::Collect => "Collecting artifacts",
        }
    }

    /// Stages that talk to the terminal themselves and must not be drawn over
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Prepare | Self::Package)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives stage transitions from the stager
pub trait StageProgress: Send + Sync {
    fn stage_started(&self, stage: Stage);

    fn stage_finished(&self, stage: Stage);

    fn stage_failed(&self, stage: Stage);
}

/// Progress sink that shows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl StageProgress for NoOpProgress {
    fn stage_started(&self, _stage: Stage) {}

    fn stage_finished(&self, _stage: Stage) {}

    fn stage_failed(&self, _stage: Stage) {}
}

/// Indicatif spinner per stage; hidden automatically when stderr is not a terminal
#[derive(Default)]
pub struct SpinnerProgress {
    current: Mutex<Option<ProgressBar>>,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn spinner(stage: Stage) -> ProgressBar {
        if stage.is_interactive() {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {wide_msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{stage}..."));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn take(&self) -> Option<ProgressBar> {
        self.current.lock().ok().and_then(|mut current| current.take())
    }
}

impl StageProgress for SpinnerProgress {
    fn stage_started(&self, stage: Stage) {
        let pb = Self::spinner(stage);
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn stage_finished(&self, stage: Stage) {
        if let Some(pb) = self.take() {
            pb.finish_and_clear();
        }
        println!("✓ {stage}");
    }

    fn stage_failed(&self, stage: Stage) {
        if let Some(pb) = self.take() {
            pb.finish_and_clear();
        }
        println!("✗ {stage}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_stages() {
        assert!(Stage::Prepare.is_interactive());
        assert!(Stage::Package.is_interactive());
        assert!(!Stage::Export.is_interactive());
    }

    #[test]
    fn test_spinner_lifecycle() {
        let progress = SpinnerProgress::new();
        progress.stage_started(Stage::Export);
        progress.stage_started(Stage::Rewrite);
        progress.stage_finished(Stage::Rewrite);
        assert!(progress.take().is_none());
    }
}
