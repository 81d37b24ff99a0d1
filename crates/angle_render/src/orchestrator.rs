//! Run lifecycle: one task per view, bounded dispatch, epoch-guarded updates.

use crate::api::RenderApi;
use crate::board::{RunBoard, RunSnapshot, RunToken};
use crate::config::{PollConfig, RenderConfig, RenderParams};
use crate::display;
use crate::error::RenderError;
use crate::metrics::RenderMetrics;
use crate::poll::poll_job;
use crate::prompt::view_prompt;
use crate::runner::run_bounded;
use crate::submit::{submit_view, Rendered, Submission};
use crate::view::AngleView;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Inputs for one run, taken from the current upload and slider values.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Source image as a data URL, remote URL or bare base64.
    pub image: String,
    pub elevation: f64,
    pub distance: f64,
    /// Free text appended to every view's prompt.
    pub prompt_suffix: String,
}

/// Handle to a started run.
pub struct RunHandle {
    epoch: u64,
    join: JoinHandle<()>,
}

impl RunHandle {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Waits until every view task of this run has returned.
    pub async fn wait(self) {
        if let Err(e) = self.join.await {
            tracing::error!(epoch = self.epoch, error = %e, "Angle run task panicked");
        }
    }
}

/// Drives multi-angle renders of one source image.
///
/// Starting a run supersedes the previous one immediately. Superseded work is
/// never aborted mid-request; its results are simply dropped when they land.
pub struct AngleRenderer {
    api: Arc<dyn RenderApi>,
    board: RunBoard,
    config: RenderConfig,
    metrics: RenderMetrics,
}

impl AngleRenderer {
    pub fn new(api: Arc<dyn RenderApi>, config: RenderConfig, metrics: RenderMetrics) -> Self {
        Self {
            api,
            board: RunBoard::new(),
            config,
            metrics,
        }
    }

    /// Starts rendering every preset view of `request.image`.
    ///
    /// Must be called from within a tokio runtime. Fails only on an empty
    /// image, before any state changes.
    pub fn start_run(&self, request: RunRequest) -> Result<RunHandle, RenderError> {
        if request.image.trim().is_empty() {
            return Err(RenderError::EmptyImage);
        }

        let views = AngleView::orbit(request.elevation, request.distance);
        let token = self.board.begin(&views);
        let epoch = token.epoch();
        self.metrics.runs_started_total.inc();
        tracing::info!(
            epoch,
            views = views.len(),
            concurrency = self.config.concurrency,
            "Angle run started"
        );

        let shared = Arc::new(RunShared {
            api: self.api.clone(),
            image: request.image,
            suffix: request.prompt_suffix,
            params: self.config.params.clone(),
            poll: self.config.poll.clone(),
            metrics: self.metrics.clone(),
        });

        let tasks: Vec<_> = views
            .into_iter()
            .enumerate()
            .map(|(index, view)| {
                let task = ViewTask {
                    index,
                    view,
                    token: token.clone(),
                    shared: shared.clone(),
                };
                move || task.run()
            })
            .collect();

        let concurrency = self.config.concurrency;
        let join = tokio::spawn(async move {
            run_bounded(tasks, concurrency).await;
            match token.apply(|state| state.finish()) {
                Some(phase) => tracing::info!(epoch, ?phase, "Angle run finished"),
                None => tracing::debug!(epoch, "Angle run superseded before finishing"),
            }
        });

        Ok(RunHandle { epoch, join })
    }

    /// Abandons the current run. In-flight requests finish but change nothing.
    pub fn cancel(&self) {
        let epoch = self.board.cancel();
        tracing::info!(epoch, "Angle run cancelled");
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.board.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.board.subscribe()
    }

    /// Index of the view to display for `selected`, see [`display::displayed_index`].
    pub fn displayed(&self, selected: usize) -> Option<usize> {
        display::displayed_index(&self.board.snapshot().results, selected)
    }
}

/// Per-run inputs shared by all of its view tasks.
struct RunShared {
    api: Arc<dyn RenderApi>,
    image: String,
    suffix: String,
    params: RenderParams,
    poll: PollConfig,
    metrics: RenderMetrics,
}

struct ViewTask {
    index: usize,
    view: AngleView,
    token: RunToken,
    shared: Arc<RunShared>,
}

impl ViewTask {
    async fn run(self) {
        let index = self.index;
        if self.token.apply(|state| state.mark_running(index)).is_none() {
            self.dropped("dispatch");
            return;
        }

        let metrics = &self.shared.metrics;
        metrics.views_in_flight.inc();
        let outcome = self.render().await;
        metrics.views_in_flight.dec();

        match outcome {
            Ok(rendered) => {
                if self.token.apply(|state| state.bind(index, &rendered)).is_some() {
                    metrics.views_completed_total.inc();
                } else {
                    self.dropped("image");
                }
            }
            Err(e) if e.is_cancelled() => self.dropped("poll"),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    epoch = self.token.epoch(),
                    index,
                    azimuth = self.view.azimuth,
                    error = %message,
                    "View render failed"
                );
                if self.token.apply(|state| state.fail(index, message)).is_some() {
                    metrics.views_failed_total.inc();
                } else {
                    self.dropped("error");
                }
            }
        }
    }

    async fn render(&self) -> Result<Rendered, RenderError> {
        let shared = &*self.shared;
        let prompt = view_prompt(&self.view, &shared.suffix);

        match submit_view(&*shared.api, &prompt, &shared.image, &shared.params).await? {
            Submission::Inline(rendered) => Ok(rendered),
            Submission::Job(job_id) => {
                tracing::debug!(
                    epoch = self.token.epoch(),
                    index = self.index,
                    job_id = %job_id,
                    "Render job queued"
                );
                poll_job(&*shared.api, &job_id, &self.token, &shared.poll, &shared.metrics).await
            }
        }
    }

    fn dropped(&self, stage: &'static str) {
        self.shared.metrics.stale_updates_dropped_total.inc();
        tracing::debug!(
            epoch = self.token.epoch(),
            index = self.index,
            stage,
            "Dropped stale view update"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SubmitRequest;
    use crate::board::{RunPhase, ViewStatus};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    type Reply = Result<Value, RenderError>;
    type SubmitFn = dyn Fn(usize, &SubmitRequest) -> (Duration, Reply) + Send + Sync;
    type StatusFn = dyn Fn(&str, u32) -> Reply + Send + Sync;

    /// Scripted render backend that records when and how it was called.
    struct Backend {
        on_submit: Box<SubmitFn>,
        on_status: Box<StatusFn>,
        origin: Instant,
        submit_starts: Mutex<Vec<Duration>>,
        polls: Mutex<HashMap<String, u32>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Backend {
        fn new(
            on_submit: impl Fn(usize, &SubmitRequest) -> (Duration, Reply) + Send + Sync + 'static,
            on_status: impl Fn(&str, u32) -> Reply + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                on_submit: Box::new(on_submit),
                on_status: Box::new(on_status),
                origin: Instant::now(),
                submit_starts: Mutex::new(Vec::new()),
                polls: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }

        fn inline(delay: Duration) -> Arc<Self> {
            Self::new(
                move |_, req| {
                    let image = format!("rendered:{}", req.input.image);
                    (delay, Ok(json!({ "images": [image] })))
                },
                |_, _| unreachable!("inline backend is never polled"),
            )
        }

        fn submits(&self) -> Vec<Duration> {
            self.submit_starts.lock().clone()
        }
    }

    #[async_trait]
    impl RenderApi for Backend {
        async fn submit(&self, request: &SubmitRequest) -> Result<Value, RenderError> {
            let n = {
                let mut starts = self.submit_starts.lock();
                starts.push(self.origin.elapsed());
                starts.len() - 1
            };
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let (delay, reply) = (self.on_submit)(n, request);
            sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            reply
        }

        async fn status(&self, job_id: &str) -> Result<Value, RenderError> {
            let attempt = {
                let mut polls = self.polls.lock();
                let count = polls.entry(job_id.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            (self.on_status)(job_id, attempt)
        }
    }

    fn renderer(backend: Arc<Backend>, concurrency: usize) -> AngleRenderer {
        let config = RenderConfig {
            concurrency,
            ..RenderConfig::default()
        };
        AngleRenderer::new(backend, config, RenderMetrics::detached().unwrap())
    }

    fn request(image: &str) -> RunRequest {
        RunRequest {
            image: image.into(),
            elevation: 0.0,
            distance: 1.0,
            prompt_suffix: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn eight_views_with_concurrency_three() {
        let backend = Backend::new(
            |n, req| {
                let delay = match n {
                    0 => 10,
                    1 => 20,
                    2 => 30,
                    _ => 5,
                };
                let image = format!("rendered:{}", req.input.image);
                (
                    Duration::from_secs(delay),
                    Ok(json!({ "output": { "images": [image] } })),
                )
            },
            |_, _| unreachable!(),
        );
        let renderer = renderer(backend.clone(), 3);

        let handle = renderer.start_run(request("src")).unwrap();
        let initial = renderer.snapshot();
        assert_eq!(initial.total, 8);
        assert!(initial.results.iter().all(|r| r.status == ViewStatus::Queued));

        handle.wait().await;

        let starts = backend.submits();
        assert_eq!(starts.len(), 8);
        assert!(starts[..3].iter().all(|t| t.is_zero()));
        assert!(starts[3] >= Duration::from_secs(10));
        assert_eq!(backend.peak.load(Ordering::SeqCst), 3);

        let snap = renderer.snapshot();
        assert_eq!(snap.phase, RunPhase::Completed);
        assert_eq!(snap.status_text, "Completed.");
        assert_eq!(snap.done, 8);
        assert!(snap
            .results
            .iter()
            .all(|r| r.status == ViewStatus::Done && r.image.as_deref() == Some("rendered:src")));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_job_is_polled_until_complete() {
        let backend = Backend::new(
            |n, _| (Duration::from_secs(1), Ok(json!({ "id": format!("job-{n}") }))),
            |job, attempt| {
                Ok(if attempt < 2 {
                    json!({ "status": "IN_PROGRESS" })
                } else {
                    json!({
                        "status": "COMPLETED",
                        "images": [format!("https://cdn/{job}.png")],
                        "seed": 99,
                    })
                })
            },
        );
        let renderer = renderer(backend.clone(), 1);

        let handle = renderer.start_run(request("src")).unwrap();
        let mut rx = renderer.subscribe();
        let mut seen = vec![rx.borrow_and_update().results[0].status];
        let recorder = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let status = rx.borrow_and_update().results[0].status;
                if seen.last() != Some(&status) {
                    seen.push(status);
                }
                if status == ViewStatus::Done {
                    break;
                }
            }
            seen
        });

        handle.wait().await;
        let seen = recorder.await.unwrap();
        assert_eq!(seen, vec![ViewStatus::Queued, ViewStatus::Running, ViewStatus::Done]);

        let snap = renderer.snapshot();
        assert_eq!(snap.results[0].image.as_deref(), Some("https://cdn/job-0.png"));
        assert_eq!(snap.results[0].seed, Some(99));
        assert_eq!(backend.polls.lock().get("job-0"), Some(&2));
        assert_eq!(snap.phase, RunPhase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn job_that_never_finishes_times_out() {
        let backend = Backend::new(
            |n, _| (Duration::ZERO, Ok(json!({ "job_id": format!("job-{n}") }))),
            |_, _| Ok(json!({ "status": "IN_PROGRESS" })),
        );
        let renderer = renderer(backend.clone(), 3);

        renderer.start_run(request("src")).unwrap().wait().await;

        let snap = renderer.snapshot();
        for result in &snap.results {
            assert_eq!(result.status, ViewStatus::Error);
            assert_eq!(result.error.as_deref(), Some("render timed out after 120 status checks"));
        }
        assert_eq!(snap.phase, RunPhase::Failed);
        assert_eq!(snap.status_text, "render timed out after 120 status checks");
        assert!(backend.polls.lock().values().all(|&n| n == 120));
    }

    #[tokio::test(start_paused = true)]
    async fn new_run_drops_every_update_from_the_old_one() {
        let backend = Backend::new(
            |_, req| {
                let delay = if req.input.image == "A" { 5 } else { 1 };
                (
                    Duration::from_secs(delay),
                    Ok(json!({ "images": [format!("rendered:{}", req.input.image)] })),
                )
            },
            |_, _| unreachable!(),
        );
        let renderer = renderer(backend, 3);

        let first = renderer.start_run(request("A")).unwrap();
        sleep(Duration::from_secs(1)).await;
        let second = renderer.start_run(request("B")).unwrap();
        assert!(second.epoch() > first.epoch());

        let second_epoch = second.epoch();
        first.wait().await;
        second.wait().await;

        let snap = renderer.snapshot();
        assert_eq!(snap.epoch, second_epoch);
        assert_eq!(snap.phase, RunPhase::Completed);
        assert!(snap
            .results
            .iter()
            .all(|r| r.image.as_deref() == Some("rendered:B")));
        assert_eq!(renderer.metrics.stale_updates_dropped_total.get(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failed_view_does_not_stop_its_siblings() {
        let backend = Backend::new(
            |_, req| {
                if req.input.prompt.contains("right side view") {
                    (
                        Duration::from_secs(1),
                        Err(RenderError::Upstream {
                            status: 422,
                            message: "content filter rejected the image".into(),
                        }),
                    )
                } else {
                    (Duration::from_secs(2), Ok(json!({ "image": "QUJD" })))
                }
            },
            |_, _| unreachable!(),
        );
        let renderer = renderer(backend, 3);

        renderer.start_run(request("src")).unwrap().wait().await;

        let snap = renderer.snapshot();
        assert_eq!(snap.phase, RunPhase::Completed);
        assert_eq!(snap.status_text, "Completed.");
        assert_eq!((snap.done, snap.failed), (7, 1));
        let failed = &snap.results[2];
        assert_eq!(failed.view.azimuth, 90.0);
        assert_eq!(failed.error.as_deref(), Some("content filter rejected the image"));
        assert_eq!(snap.results[0].image.as_deref(), Some("data:image/png;base64,QUJD"));
        assert_eq!(renderer.displayed(2), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_reports_last_error() {
        let backend = Backend::new(
            |n, _| (Duration::from_secs(n as u64 + 1), Ok(json!({ "status": "queued" }))),
            |_, _| unreachable!(),
        );
        let renderer = renderer(backend, 8);

        let handle = renderer.start_run(request("src")).unwrap();
        sleep(Duration::from_millis(2500)).await;
        let mid = renderer.snapshot();
        assert_eq!(mid.phase, RunPhase::Running);
        assert_eq!(mid.failed, 2);
        assert_eq!(mid.status_text, "missing job id");
        handle.wait().await;
        assert_eq!(renderer.snapshot().phase, RunPhase::Failed);
    }

    #[tokio::test]
    async fn empty_image_is_rejected_before_anything_starts() {
        let backend = Backend::inline(Duration::ZERO);
        let renderer = renderer(backend.clone(), 3);

        let err = renderer.start_run(request("")).err();
        assert_eq!(err, Some(RenderError::EmptyImage));
        assert_eq!(renderer.snapshot().phase, RunPhase::Idle);
        assert!(backend.submits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_in_flight_results() {
        let backend = Backend::inline(Duration::from_secs(3));
        let renderer = renderer(backend.clone(), 3);

        let handle = renderer.start_run(request("src")).unwrap();
        sleep(Duration::from_secs(1)).await;
        renderer.cancel();
        handle.wait().await;

        let snap = renderer.snapshot();
        assert_eq!(snap.phase, RunPhase::Cancelled);
        assert_eq!(snap.status_text, "Cancelled.");
        assert_eq!(snap.done, 0);
        assert_eq!(backend.submits().len(), 3);
        assert_eq!(renderer.displayed(0), None);
    }
}
