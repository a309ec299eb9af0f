//! Engine configuration
//!
//! Plain data with sensible defaults. Applied once through `Engine::initialize`
//! and read by the main loop and the scene when they are created.

use std::time::Duration;
use crate::log::LogSeverity;

/// Name of the layer every scene creates on construction
pub const DEFAULT_LAYER_NAME: &str = "Default";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads for the parallel per-object update phase.
    /// `None` lets rayon pick one thread per logical core.
    pub update_worker_threads: Option<usize>,

    /// Frame pacing for the background main loop
    pub target_frame_time: Duration,

    /// Entries below this severity are dropped before reaching the logger
    pub min_log_severity: LogSeverity,

    /// Name of the layer created with every scene
    pub default_layer_name: String,

    /// Catch panics raised inside one object's update so the frame continues
    pub isolate_update_panics: bool,

    /// Upper bound for a single update step; longer frames are clamped
    pub max_update_step: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_worker_threads: None,
            target_frame_time: Duration::from_millis(16),
            min_log_severity: if cfg!(debug_assertions) { LogSeverity::Debug } else { LogSeverity::Info },
            default_layer_name: DEFAULT_LAYER_NAME.to_string(),
            isolate_update_panics: true,
            max_update_step: Duration::from_millis(250),
        }
    }
}

impl EngineConfig {
    pub fn with_update_worker_threads(mut self, threads: usize) -> Self {
        self.update_worker_threads = Some(threads.max(1));
        self
    }

    pub fn with_target_frame_time(mut self, frame_time: Duration) -> Self {
        self.target_frame_time = frame_time;
        self
    }

    pub fn with_min_log_severity(mut self, severity: LogSeverity) -> Self {
        self.min_log_severity = severity;
        self
    }

    pub fn with_default_layer_name(mut self, name: impl Into<String>) -> Self {
        self.default_layer_name = name.into();
        self
    }

    pub fn with_isolate_update_panics(mut self, isolate: bool) -> Self {
        self.isolate_update_panics = isolate;
        self
    }

    pub fn with_max_update_step(mut self, step: Duration) -> Self {
        self.max_update_step = step;
        self
    }

    /// Clamp a measured frame delta to `max_update_step`
    pub fn clamp_update_step(&self, elapsed: Duration) -> Duration {
        elapsed.min(self.max_update_step)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
