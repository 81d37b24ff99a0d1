use prometheus::{IntCounter, IntGauge, Registry};

/// Prometheus collectors for the render pipeline.
///
/// Collectors are reference-counted internally, so clones share counts.
#[derive(Clone)]
pub struct RenderMetrics {
    pub runs_started_total: IntCounter,
    pub views_completed_total: IntCounter,
    pub views_failed_total: IntCounter,
    /// Updates discarded because their run was superseded.
    pub stale_updates_dropped_total: IntCounter,
    pub poll_attempts_total: IntCounter,
    pub views_in_flight: IntGauge,
}

impl RenderMetrics {
    /// Creates the collectors and registers them with `registry`.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric?;
                registry.register(Box::new(collector.clone()))?;
                collector
            }};
        }

        Ok(Self {
            runs_started_total: reg!(IntCounter::new(
                "angle_runs_started_total",
                "Total number of angle render runs started"
            )),
            views_completed_total: reg!(IntCounter::new(
                "angle_views_completed_total",
                "Total number of views that finished with an image"
            )),
            views_failed_total: reg!(IntCounter::new(
                "angle_views_failed_total",
                "Total number of views that finished with an error"
            )),
            stale_updates_dropped_total: reg!(IntCounter::new(
                "angle_stale_updates_dropped_total",
                "Results discarded because their run was superseded"
            )),
            poll_attempts_total: reg!(IntCounter::new(
                "angle_poll_attempts_total",
                "Total number of job status requests"
            )),
            views_in_flight: reg!(IntGauge::new(
                "angle_views_in_flight",
                "Number of views currently being rendered"
            )),
        })
    }

    /// Collectors registered against a throwaway registry.
    pub fn detached() -> prometheus::Result<Self> {
        Self::new(&Registry::new())
    }
}
