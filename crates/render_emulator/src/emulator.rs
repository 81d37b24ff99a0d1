//! In-memory stand-in for the hosted render service.
//!
//! Submissions echo the source image back as the "render". Whether a
//! submission is answered inline or queued, and whether it fails, is rolled
//! per request from the configured percentages.

use crate::config::Config;
use crate::metrics::EmulatorMetrics;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use dashmap::DashMap;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const INJECTED_FAILURE: &str = "emulated render failure";

/// Queued jobs nobody finished polling are dropped after this long.
pub const ABANDONED_JOB_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
enum Outcome {
    Rendered { image: String, seed: i64 },
    Failed(String),
}

#[derive(Debug)]
struct Job {
    polls: u32,
    created: Instant,
    outcome: Outcome,
}

#[derive(Debug, Deserialize)]
pub struct RunBody {
    pub input: RunInput,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunInput {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub seed: i64,
    #[serde(default)]
    pub randomize_seed: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub id: String,
}

/// A job is removed once its terminal status has been reported.
pub struct Emulator {
    config: Config,
    jobs: DashMap<String, Job>,
    job_ttl: Duration,
    metrics: Arc<EmulatorMetrics>,
}

fn roll(percent: u8) -> bool {
    percent > 0 && rand::thread_rng().gen_range(0..100u8) < percent
}

impl Emulator {
    pub fn new(config: Config, metrics: Arc<EmulatorMetrics>) -> Self {
        Self {
            config,
            jobs: DashMap::new(),
            job_ttl: ABANDONED_JOB_TTL,
            metrics,
        }
    }

    pub fn with_job_ttl(mut self, ttl: Duration) -> Self {
        self.job_ttl = ttl;
        self
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Drops queued jobs older than the TTL.
    fn evict_abandoned(&self) {
        let before = self.jobs.len();
        let ttl = self.job_ttl;
        self.jobs.retain(|_, job| job.created.elapsed() < ttl);
        let evicted = before.saturating_sub(self.jobs.len());
        if evicted > 0 {
            self.metrics.jobs_pending.sub(evicted as i64);
            tracing::debug!(evicted, "Evicted abandoned jobs");
        }
    }

    /// Sleeps for the configured latency plus jitter.
    async fn delay(&self) {
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        let total = self.config.latency_ms + jitter;
        if total > 0 {
            let start = Instant::now();
            tokio::time::sleep(Duration::from_millis(total)).await;
            self.metrics
                .latency_histogram
                .observe(start.elapsed().as_secs_f64());
        }
    }

    pub fn submit(&self, input: RunInput) -> (StatusCode, Value) {
        if input.image.trim().is_empty() {
            return (
                StatusCode::BAD_REQUEST,
                json!({ "error": "input.image is required" }),
            );
        }
        self.metrics.jobs_submitted_total.inc();
        self.evict_abandoned();

        let outcome = if roll(self.config.failure_percent) {
            self.metrics.failures_injected_total.inc();
            Outcome::Failed(INJECTED_FAILURE.into())
        } else {
            let seed = if input.randomize_seed {
                i64::from(rand::thread_rng().gen::<u32>())
            } else {
                input.seed
            };
            Outcome::Rendered {
                image: input.image,
                seed,
            }
        };

        if roll(self.config.inline_percent) {
            self.metrics.inline_renders_total.inc();
            tracing::debug!(prompt = %input.prompt, "Answering inline");
            return match outcome {
                Outcome::Rendered { image, seed } => (
                    StatusCode::OK,
                    json!({ "status": "COMPLETED", "images": [image], "seed": seed }),
                ),
                Outcome::Failed(message) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
                }
            };
        }

        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(job_id = %id, prompt = %input.prompt, "Job queued");
        self.jobs.insert(
            id.clone(),
            Job {
                polls: 0,
                created: Instant::now(),
                outcome,
            },
        );
        self.metrics.jobs_pending.inc();
        (StatusCode::OK, json!({ "id": id, "status": "IN_QUEUE" }))
    }

    pub fn status(&self, id: &str) -> (StatusCode, Value) {
        self.metrics.status_requests_total.inc();
        let Some(mut job) = self.jobs.get_mut(id) else {
            return (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("unknown job '{id}'") }),
            );
        };

        job.polls += 1;
        if job.polls < self.config.polls_to_complete {
            return (StatusCode::OK, json!({ "id": id, "status": "IN_PROGRESS" }));
        }
        drop(job);

        // A concurrent poll may have taken the terminal report already.
        let Some((_, job)) = self.jobs.remove(id) else {
            return (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("unknown job '{id}'") }),
            );
        };
        self.metrics.jobs_pending.dec();

        match job.outcome {
            Outcome::Rendered { image, seed } => (
                StatusCode::OK,
                json!({
                    "id": id,
                    "status": "COMPLETED",
                    "output": { "images": [image], "seed": seed },
                }),
            ),
            Outcome::Failed(message) => (
                StatusCode::OK,
                json!({ "id": id, "status": "FAILED", "error": message }),
            ),
        }
    }
}

pub fn router(emulator: Arc<Emulator>) -> Router {
    Router::new()
        .route("/run", post(run))
        .route("/status", get(status))
        .with_state(emulator)
}

async fn run(
    State(emulator): State<Arc<Emulator>>,
    Json(body): Json<RunBody>,
) -> (StatusCode, Json<Value>) {
    emulator.delay().await;
    let (code, body) = emulator.submit(body.input);
    (code, Json(body))
}

async fn status(
    State(emulator): State<Arc<Emulator>>,
    Query(query): Query<StatusQuery>,
) -> (StatusCode, Json<Value>) {
    emulator.delay().await;
    let (code, body) = emulator.status(&query.id);
    (code, Json(body))
}
