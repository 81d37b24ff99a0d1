use angle_render::RenderMetrics;
use anyhow::Context;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// All Prometheus collectors for the studio server.
///
/// Shared behind an `Arc`; the render collectors are handed to the
/// [`angle_render::AngleRenderer`] and register into the same registry.
pub struct Metrics {
    pub registry: Registry,
    /// Requests handled by the public API, labelled by route.
    pub http_requests_total: IntCounterVec,
    /// Chat turns received.
    pub chat_turns_total: IntCounter,
    /// Anonymous turns turned away because the free turn was spent.
    pub chat_gated_total: IntCounter,
    pub render: RenderMetrics,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("studio".into()), None)
            .context("Failed to create custom metrics registry")?;

        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric.context("Failed to create metric")?;
                registry
                    .register(Box::new(collector.clone()))
                    .context("Failed to register metric")?;
                collector
            }};
        }

        Ok(Self {
            http_requests_total: reg!(IntCounterVec::new(
                Opts::new("http_requests_total", "Total number of API requests handled"),
                &["route"]
            )),
            chat_turns_total: reg!(IntCounter::new(
                "chat_turns_total",
                "Total number of chat turns received"
            )),
            chat_gated_total: reg!(IntCounter::new(
                "chat_gated_total",
                "Anonymous chat turns rejected after the free turn"
            )),
            render: RenderMetrics::new(&registry).context("Failed to register render metrics")?,
            registry,
        })
    }

    pub fn request(&self, route: &str) {
        self.http_requests_total.with_label_values(&[route]).inc();
    }

    /// Serves the registry in text format on `/metrics`.
    pub fn router(&self) -> Router {
        let registry = self.registry.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move {
                    let mut buffer = Vec::new();
                    match TextEncoder::new().encode(&registry.gather(), &mut buffer) {
                        Ok(()) => String::from_utf8_lossy(&buffer).into_owned().into_response(),
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
