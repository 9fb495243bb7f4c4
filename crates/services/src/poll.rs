//! Repeating background tasks bound to a cancellation token.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// One loop that runs `tick` every `period` until cancelled.
///
/// The first tick fires immediately. A tick that returns
/// `ControlFlow::Break` ends the loop. Cancellation also interrupts a tick
/// that is still awaiting.
#[derive(Debug)]
pub struct PollTask {
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Spawn on the current runtime under a child of `parent`.
    pub fn spawn<F, Fut>(
        name: &'static str,
        period: Duration,
        parent: &CancellationToken,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let token = parent.child_token();
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = loop_token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let flow = tokio::select! {
                    () = loop_token.cancelled() => break,
                    flow = tick() => flow,
                };
                if flow.is_break() {
                    break;
                }
            }
            tracing::debug!(poll = name, "poll loop stopped");
        });
        Self {
            name,
            period,
            token,
            handle,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop and wait for the loop to exit.
    pub async fn join(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

/// A set of loops that stop together.
#[derive(Debug, Default)]
pub struct PollGroup {
    token: CancellationToken,
    tasks: Vec<PollTask>,
}

impl PollGroup {
    /// Loops spawned here also stop when `parent` is cancelled.
    #[must_use]
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            tasks: Vec::new(),
        }
    }

    pub fn spawn<F, Fut>(&mut self, name: &'static str, period: Duration, tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        self.tasks
            .push(PollTask::spawn(name, period, &self.token, tick));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True once every loop has exited.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.tasks.iter().all(PollTask::is_finished)
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        self.token.cancel();
        for task in std::mem::take(&mut self.tasks) {
            task.join().await;
        }
    }
}

impl Drop for PollGroup {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<ControlFlow<()>> + use<> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(ControlFlow::Continue(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_cadence_until_stopped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let root = CancellationToken::new();
        let task = PollTask::spawn("test", Duration::from_secs(10), &root, counting(&counter));

        time::sleep(Duration::from_secs(35)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        task.join().await;
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_the_whole_group() {
        let counter = Arc::new(AtomicUsize::new(0));
        let root = CancellationToken::new();
        let mut group = PollGroup::child_of(&root);
        group.spawn("a", Duration::from_secs(1), counting(&counter));
        group.spawn("b", Duration::from_secs(3), counting(&counter));

        time::sleep(Duration::from_millis(1500)).await;
        root.cancel();
        time::sleep(Duration::from_secs(1)).await;

        assert!(group.is_stopped());
        let seen = counter.load(Ordering::SeqCst);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn break_ends_the_loop() {
        let root = CancellationToken::new();
        let task = PollTask::spawn("once", Duration::from_secs(1), &root, || {
            std::future::ready(ControlFlow::Break(()))
        });
        time::sleep(Duration::from_secs(5)).await;
        assert!(task.is_finished());
    }
}
