use futures::future::join_all;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Runs `tasks` with at most `ceiling` of them in flight.
///
/// Workers pull the next unclaimed index from a shared cursor and await that
/// task before claiming another, so every task runs exactly once and each
/// worker runs its tasks in index order. Returns when all workers have drained
/// the queue. A ceiling of zero is treated as one.
pub async fn run_bounded<F, Fut>(tasks: Vec<F>, ceiling: usize)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let len = tasks.len();
    let slots: Vec<Mutex<Option<F>>> = tasks.into_iter().map(|t| Mutex::new(Some(t))).collect();
    let cursor = AtomicUsize::new(0);
    let workers = ceiling.max(1).min(len.max(1));

    let slots = &slots;
    let cursor = &cursor;
    join_all((0..workers).map(|worker| async move {
        loop {
            let index = cursor.fetch_add(1, Ordering::Relaxed);
            if index >= len {
                break;
            }
            let task = slots[index].lock().take();
            if let Some(task) = task {
                tracing::trace!(worker, index, "Claimed render task");
                task().await;
            }
        }
    }))
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn leave(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_ceiling_and_runs_each_task_once() {
        let gauge = Arc::new(Gauge::default());
        let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..10).map(|_| AtomicUsize::new(0)).collect());

        let tasks: Vec<_> = (0..10u64)
            .map(|i| {
                let gauge = gauge.clone();
                let runs = runs.clone();
                move || async move {
                    gauge.enter();
                    tokio::time::sleep(Duration::from_millis(10 + (i * 37) % 50)).await;
                    runs[i as usize].fetch_add(1, Ordering::SeqCst);
                    gauge.leave();
                }
            })
            .collect();

        run_bounded(tasks, 3).await;

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
        assert_eq!(gauge.current.load(Ordering::SeqCst), 0);
        assert!(runs.iter().all(|n| n.load(Ordering::SeqCst) == 1));
    }

    #[tokio::test]
    async fn empty_queue_returns_immediately() {
        let tasks: Vec<fn() -> std::future::Ready<()>> = Vec::new();
        run_bounded(tasks, 3).await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ceiling_runs_sequentially() {
        let gauge = Arc::new(Gauge::default());
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let gauge = gauge.clone();
                move || async move {
                    gauge.enter();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    gauge.leave();
                }
            })
            .collect();

        run_bounded(tasks, 0).await;
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    }
}
