use crate::api::RenderApi;
use crate::board::RunToken;
use crate::config::PollConfig;
use crate::error::RenderError;
use crate::extract;
use crate::metrics::RenderMetrics;
use crate::submit::Rendered;
use tokio::time::sleep;

/// Polls a queued render job until it yields images, fails, or runs out of
/// attempts.
///
/// The delay between attempts grows linearly. The run token is checked before
/// every attempt; once the run is superseded this returns
/// [`RenderError::Cancelled`] without making another request.
pub async fn poll_job(
    api: &dyn RenderApi,
    job_id: &str,
    token: &RunToken,
    config: &PollConfig,
    metrics: &RenderMetrics,
) -> Result<Rendered, RenderError> {
    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            sleep(config.delay_after(attempt - 1)).await;
        }
        if !token.is_current() {
            tracing::debug!(
                job_id,
                attempt,
                epoch = token.epoch(),
                "Run superseded, abandoning job"
            );
            return Err(RenderError::Cancelled);
        }

        metrics.poll_attempts_total.inc();
        let body = api.status(job_id).await?;

        if let Some(rendered) = Rendered::from_body(&body) {
            tracing::debug!(job_id, attempt, "Render job completed");
            return Ok(rendered);
        }

        if let Some(status) = extract::status(&body) {
            if extract::is_failure_status(status) {
                let message = extract::error_message(&body)
                    .unwrap_or_else(|| format!("render job {}", status.to_ascii_lowercase()));
                return Err(RenderError::JobFailed(message));
            }
            tracing::trace!(job_id, attempt, status, "Render job pending");
        }
    }

    Err(RenderError::Timeout {
        attempts: config.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SubmitRequest;
    use crate::board::RunBoard;
    use crate::view::AngleView;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::VecDeque;

    /// Replays scripted status bodies, repeating the last one forever.
    struct Script {
        replies: Mutex<VecDeque<Value>>,
        calls: Mutex<u32>,
    }

    impl Script {
        fn new(replies: Vec<Value>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl RenderApi for Script {
        async fn submit(&self, _request: &SubmitRequest) -> Result<Value, RenderError> {
            unreachable!("poller never submits")
        }

        async fn status(&self, job_id: &str) -> Result<Value, RenderError> {
            assert_eq!(job_id, "job-1");
            *self.calls.lock() += 1;
            let mut replies = self.replies.lock();
            let reply = if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            };
            Ok(reply.unwrap_or(Value::Null))
        }
    }

    fn token() -> (RunBoard, RunToken) {
        let board = RunBoard::new();
        let token = board.begin(&AngleView::orbit(0.0, 1.0));
        (board, token)
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_after_in_progress() {
        let api = Script::new(vec![
            json!({ "status": "IN_PROGRESS" }),
            json!({ "status": "COMPLETED", "images": ["https://cdn/out.png"] }),
        ]);
        let (_board, token) = token();
        let metrics = RenderMetrics::detached().unwrap();

        let rendered = poll_job(&api, "job-1", &token, &PollConfig::default(), &metrics)
            .await
            .unwrap();
        assert_eq!(rendered.first(), "https://cdn/out.png");
        assert_eq!(api.calls(), 2);
        assert_eq!(metrics.poll_attempts_total.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_status_propagates_upstream_message() {
        let api = Script::new(vec![json!({ "state": "Failed", "error": "CUDA out of memory" })]);
        let (_board, token) = token();
        let metrics = RenderMetrics::detached().unwrap();

        let err = poll_job(&api, "job-1", &token, &PollConfig::default(), &metrics)
            .await
            .unwrap_err();
        assert_eq!(err, RenderError::JobFailed("CUDA out of memory".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_message_names_the_status() {
        let api = Script::new(vec![json!({ "status": "CANCELLED" })]);
        let (_board, token) = token();
        let metrics = RenderMetrics::detached().unwrap();

        let err = poll_job(&api, "job-1", &token, &PollConfig::default(), &metrics)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "render job cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn never_resolving_job_times_out_within_budget() {
        let api = Script::new(vec![json!({ "status": "IN_PROGRESS" })]);
        let (_board, token) = token();
        let metrics = RenderMetrics::detached().unwrap();

        let err = poll_job(&api, "job-1", &token, &PollConfig::default(), &metrics)
            .await
            .unwrap_err();
        assert_eq!(err, RenderError::Timeout { attempts: 120 });
        assert_eq!(api.calls(), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_token_stops_polling_without_a_request() {
        let api = Script::new(vec![json!({ "status": "IN_PROGRESS" })]);
        let (board, token) = token();
        board.cancel();
        let metrics = RenderMetrics::detached().unwrap();

        let err = poll_job(&api, "job-1", &token, &PollConfig::default(), &metrics)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn supersession_mid_poll_stops_further_requests() {
        let api = std::sync::Arc::new(Script::new(vec![json!({ "status": "IN_QUEUE" })]));
        let (board, token) = token();
        let metrics = RenderMetrics::detached().unwrap();

        let poller = {
            let api = api.clone();
            let token = token.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move {
                poll_job(&*api, "job-1", &token, &PollConfig::default(), &metrics).await
            })
        };

        // First attempt happens at t=0, the second after one second.
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        board.begin(&AngleView::orbit(0.0, 1.0));

        let err = poller.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(api.calls(), 2);
    }
}
