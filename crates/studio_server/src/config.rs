use angle_render::{PollConfig, RenderConfig, RenderEndpoints, RenderParams};
use clap::Parser;
use std::{fmt, net::SocketAddr, time::Duration};

/// `studio_server` - HTTP front end for character chat and multi-angle renders.
///
/// Render jobs and chat completions are delegated to hosted services; this
/// process only orchestrates them and keeps per-run state in memory.
#[derive(Parser, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Address the public HTTP API listens on.
    #[arg(long, env = "STUDIO_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Address the Prometheus metrics endpoint listens on.
    #[arg(long, env = "STUDIO_METRICS_LISTEN_ADDR", default_value = "0.0.0.0:9091")]
    pub metrics_listen_addr: SocketAddr,

    /// Render service endpoint that accepts new jobs.
    #[arg(long, env = "RENDER_SUBMIT_URL")]
    pub render_submit_url: String,

    /// Render service endpoint that reports job status (`?id=<job>`).
    #[arg(long, env = "RENDER_STATUS_URL")]
    pub render_status_url: String,

    /// Bearer token for the render service, if it requires one.
    #[arg(long, env = "RENDER_API_KEY")]
    pub render_api_key: Option<String>,

    /// Maximum number of views rendered at once.
    #[arg(long, env = "RENDER_CONCURRENCY", default_value_t = RenderConfig::DEFAULT_CONCURRENCY)]
    pub render_concurrency: usize,

    /// Status checks per queued job before giving up.
    #[arg(long, env = "RENDER_POLL_MAX_ATTEMPTS", default_value_t = 120)]
    pub poll_max_attempts: u32,

    /// Delay after the first status check, in milliseconds.
    #[arg(long, env = "RENDER_POLL_BASE_DELAY_MS", default_value_t = 1000)]
    pub poll_base_delay_ms: u64,

    /// Extra delay added after each further status check, in milliseconds.
    #[arg(long, env = "RENDER_POLL_STEP_MS", default_value_t = 250)]
    pub poll_step_ms: u64,

    /// Pipeline selector forwarded to the render worker.
    #[arg(long, env = "RENDER_WORKER_MODE", default_value = "angles")]
    pub worker_mode: String,

    /// Per-request timeout for render calls, in milliseconds.
    #[arg(long, env = "RENDER_TIMEOUT_MS", default_value_t = 60_000)]
    pub render_timeout_ms: u64,

    /// Chat completion endpoint.
    #[arg(long, env = "CHAT_COMPLETION_URL")]
    pub chat_completion_url: String,

    /// Per-request timeout for chat completions, in milliseconds.
    #[arg(long, env = "CHAT_TIMEOUT_MS", default_value_t = 60_000)]
    pub chat_timeout_ms: u64,
}

impl Config {
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            concurrency: self.render_concurrency,
            poll: PollConfig {
                max_attempts: self.poll_max_attempts,
                base_delay: Duration::from_millis(self.poll_base_delay_ms),
                step: Duration::from_millis(self.poll_step_ms),
            },
            params: RenderParams {
                worker_mode: self.worker_mode.clone(),
                ..RenderParams::default()
            },
        }
    }

    pub fn render_endpoints(&self) -> RenderEndpoints {
        RenderEndpoints {
            submit_url: self.render_submit_url.clone(),
            status_url: self.render_status_url.clone(),
            api_key: self.render_api_key.clone(),
            timeout: Duration::from_millis(self.render_timeout_ms),
        }
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_millis(self.chat_timeout_ms)
    }
}

// Hand-written so the API key never reaches the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("metrics_listen_addr", &self.metrics_listen_addr)
            .field("render_submit_url", &self.render_submit_url)
            .field("render_status_url", &self.render_status_url)
            .field("render_api_key", &self.render_api_key.as_ref().map(|_| "<redacted>"))
            .field("render_concurrency", &self.render_concurrency)
            .field("poll_max_attempts", &self.poll_max_attempts)
            .field("poll_base_delay_ms", &self.poll_base_delay_ms)
            .field("poll_step_ms", &self.poll_step_ms)
            .field("worker_mode", &self.worker_mode)
            .field("render_timeout_ms", &self.render_timeout_ms)
            .field("chat_completion_url", &self.chat_completion_url)
            .field("chat_timeout_ms", &self.chat_timeout_ms)
            .finish()
    }
}
