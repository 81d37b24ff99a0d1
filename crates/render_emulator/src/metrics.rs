use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

pub struct EmulatorMetrics {
    pub registry: Registry,
    pub jobs_submitted_total: IntCounter,
    pub inline_renders_total: IntCounter,
    pub failures_injected_total: IntCounter,
    pub status_requests_total: IntCounter,
    pub jobs_pending: IntGauge,
    pub latency_histogram: Histogram,
}

impl EmulatorMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("render_emulator".into()), None)?;

        macro_rules! reg {
            ($m:expr) => {{
                let m = $m?;
                registry.register(Box::new(m.clone()))?;
                m
            }};
        }

        Ok(Self {
            jobs_submitted_total: reg!(IntCounter::new(
                "jobs_submitted_total",
                "Total render submissions accepted"
            )),
            inline_renders_total: reg!(IntCounter::new(
                "inline_renders_total",
                "Submissions answered synchronously"
            )),
            failures_injected_total: reg!(IntCounter::new(
                "failures_injected_total",
                "Total number of injected render failures"
            )),
            status_requests_total: reg!(IntCounter::new(
                "status_requests_total",
                "Total job status requests"
            )),
            jobs_pending: reg!(IntGauge::new(
                "jobs_pending",
                "Queued jobs that have not resolved yet"
            )),
            latency_histogram: reg!(Histogram::with_opts(
                HistogramOpts::new("latency_seconds", "Added latency distribution")
                    .buckets(prometheus::exponential_buckets(0.001, 2.0, 15)?)
            )),
            registry,
        })
    }

    pub fn router(&self) -> Router {
        let reg = self.registry.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let reg = reg.clone();
                async move {
                    let mut buf = Vec::new();
                    match TextEncoder::new().encode(&reg.gather(), &mut buf) {
                        Ok(()) => String::from_utf8_lossy(&buf).into_owned().into_response(),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode metrics");
                            StatusCode::INTERNAL_SERVER_ERROR.into_response()
                        }
                    }
                }
            }),
        )
    }
}
