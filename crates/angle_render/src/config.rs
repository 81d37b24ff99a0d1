use serde::Serialize;
use std::time::Duration;

/// Generation parameters sent with every submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderParams {
    pub guidance_scale: f64,
    pub num_inference_steps: u32,
    pub width: u32,
    pub height: u32,
    pub seed: i64,
    pub randomize_seed: bool,
    /// Tells a shared backend worker which pipeline to run.
    pub worker_mode: String,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            guidance_scale: 1.0,
            num_inference_steps: 4,
            width: 1024,
            height: 1024,
            seed: 0,
            randomize_seed: true,
            worker_mode: "angles".into(),
        }
    }
}

/// Status polling budget.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Added to the delay once per completed attempt.
    pub step: Duration,
}

impl PollConfig {
    /// Delay to wait after the given zero-based attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay + self.step * attempt
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            base_delay: Duration::from_millis(1000),
            step: Duration::from_millis(250),
        }
    }
}

/// Everything the orchestrator needs besides its transport.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Maximum number of views in flight at once. Zero is treated as one.
    pub concurrency: usize,
    pub poll: PollConfig,
    pub params: RenderParams,
}

impl RenderConfig {
    pub const DEFAULT_CONCURRENCY: usize = 3;
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            concurrency: Self::DEFAULT_CONCURRENCY,
            poll: PollConfig::default(),
            params: RenderParams::default(),
        }
    }
}
