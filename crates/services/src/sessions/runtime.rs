use std::ops::ControlFlow;

use crate::poll::PollGroup;

use super::controller::SessionController;

/// A session with its background loops running.
///
/// Loops poll the timer, answers and progress at the configured cadences
/// and republish the countdown. All of them stop when the session reaches a
/// terminal status, on [`shutdown`](Self::shutdown), or when this value is
/// dropped.
#[derive(Debug)]
pub struct SessionRuntime {
    controller: SessionController,
    polls: PollGroup,
}

impl SessionRuntime {
    /// Spawn the loops on the current Tokio runtime.
    #[must_use]
    pub fn start(controller: SessionController) -> Self {
        let config = controller.config().clone();
        let mut polls = PollGroup::child_of(controller.shutdown_token());

        let timer = controller.clone();
        polls.spawn("timer", config.timer_poll, move || {
            let controller = timer.clone();
            async move {
                let _ = controller.poll_timer().await;
                still_running(&controller)
            }
        });

        let answers = controller.clone();
        polls.spawn("answers", config.answers_poll, move || {
            let controller = answers.clone();
            async move {
                let _ = controller.refresh_answers().await;
                still_running(&controller)
            }
        });

        let progress = controller.clone();
        polls.spawn("progress", config.progress_poll, move || {
            let controller = progress.clone();
            async move {
                let _ = controller.refresh_progress().await;
                still_running(&controller)
            }
        });

        let display = controller.clone();
        polls.spawn("display", config.display_tick, move || {
            let controller = display.clone();
            async move {
                controller.tick();
                still_running(&controller)
            }
        });

        tracing::debug!(session_id = %controller.session_id(), loops = polls.len(), "session runtime started");
        Self { controller, polls }
    }

    #[must_use]
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// True while at least one loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.polls.is_stopped()
    }

    /// Stop every loop and wait for them to exit. The session itself is untouched.
    pub async fn shutdown(self) -> SessionController {
        let Self { controller, polls } = self;
        polls.join().await;
        controller
    }
}

fn still_running(controller: &SessionController) -> ControlFlow<()> {
    if controller.is_terminal() {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}
