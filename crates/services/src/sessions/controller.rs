use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use backend::{ApiError, ExamApi, SessionReport};
use exam_core::Clock;
use exam_core::answers::{AnswerCache, ReconcileOutcome, SyncState};
use exam_core::format::TimeUrgency;
use exam_core::keyboard::{ExamCommand, Key, Modifiers, command_for};
use exam_core::model::{
    Answer, ExamId, OptionId, ProgressSnapshot, QuestionError, QuestionId, QuestionSet, Session,
    SessionId, SessionQuestion, SessionStatus, SubmitTrigger, TimerSnapshot,
};
use exam_core::navigation::{Navigation, Navigator};
use exam_core::progress::{self, QuestionState, SubmitSummary};
use exam_core::submission::LatchState;

use super::progress::ProgressAggregator;
use super::submission::SubmissionCoordinator;
use super::timer_sync::TimerSynchronizer;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::{EventBus, SessionEvent};

// ─── Outcomes ──────────────────────────────────────────────────────────────────

/// Result of a pause, resume or abandon request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Applied {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// Not legal from the status at the time of the call; nothing was sent.
    Ignored(SessionStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Saved(Answer),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Marked,
    Cleared,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(SessionStatus),
    /// Illegal status, or another submission holds the latch.
    Ignored,
}

// ─── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SessionState {
    session: Session,
    navigator: Navigator,
    answers: AnswerCache,
    /// Pause, resume or abandon awaiting the server.
    pending_control: Option<&'static str>,
}

struct Inner {
    api: Arc<dyn ExamApi>,
    clock: Clock,
    config: SessionConfig,
    session_id: SessionId,
    questions: QuestionSet,
    state: Mutex<SessionState>,
    timer: TimerSynchronizer,
    progress: ProgressAggregator,
    submission: SubmissionCoordinator,
    events: EventBus,
    shutdown: CancellationToken,
}

/// Marks a pause, resume or abandon as awaiting the server.
///
/// Dropped unsettled (the request future was cancelled), it clears the mark.
struct PendingControl<'a> {
    controller: &'a SessionController,
    armed: bool,
}

impl PendingControl<'_> {
    fn settle(mut self, state: &mut SessionState) {
        state.pending_control = None;
        self.armed = false;
    }
}

impl Drop for PendingControl<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.state().pending_control = None;
        }
    }
}

/// Drives one exam session against the backend.
///
/// Cheap to clone; clones share the session. Status changes are applied only
/// after the backend confirms them. Every backend call is bounded by
/// [`SessionConfig::call_timeout`].
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.inner.session_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Start a new session for `exam` and load it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the backend refuses the start or the
    /// session cannot be loaded.
    pub async fn start(
        api: Arc<dyn ExamApi>,
        exam: ExamId,
        custom_duration_minutes: Option<u32>,
        clock: Clock,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let session = bounded(
            config.call_timeout,
            "start_session",
            api.start_session(exam, custom_duration_minutes),
        )
        .await?;
        info!(session_id = %session.id, exam_id = %exam, "exam session started");
        Self::open(api, session, clock, config).await
    }

    /// Load an existing session: its questions and any answers already saved.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptySession` when the session has no
    /// questions, or the backend error if loading fails.
    pub async fn open(
        api: Arc<dyn ExamApi>,
        session: Session,
        clock: Clock,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let timeout = config.call_timeout;
        let questions = bounded(timeout, "get_questions", api.get_questions(session.id)).await?;
        let answers = bounded(timeout, "get_answers", api.get_answers(session.id)).await?;

        let questions = QuestionSet::new(questions).map_err(|err| match err {
            QuestionError::Empty => SessionError::EmptySession,
            other => SessionError::Question(other),
        })?;
        let now = clock.now();
        let navigator = Navigator::new(&questions, session.current_question_index, now);
        let known: Vec<Answer> = answers
            .into_iter()
            .filter(|answer| questions.find(answer.question_id).is_some())
            .collect();
        let answer_cache = AnswerCache::from_server(&known);

        let timer = TimerSynchronizer::new();
        let submission = SubmissionCoordinator::new();
        if session.status == SessionStatus::Paused {
            timer.freeze(now);
        }
        let shutdown = CancellationToken::new();
        if session.status.is_terminal() {
            timer.stop(now);
            submission.seal();
            shutdown.cancel();
        }

        debug!(
            session_id = %session.id,
            questions = questions.len(),
            answered = answer_cache.answered_count(),
            status = %session.status,
            "exam session loaded"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                api,
                clock,
                config,
                session_id: session.id,
                questions,
                state: Mutex::new(SessionState {
                    navigator,
                    answers: answer_cache,
                    session,
                    pending_control: None,
                }),
                timer,
                progress: ProgressAggregator::new(),
                submission,
                events: EventBus::default(),
                shutdown,
            }),
        })
    }

    // ─── Plumbing ──────────────────────────────────────────────────────────────

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, SessionError> {
        bounded(self.inner.config.call_timeout, operation, request).await
    }

    fn publish(&self, event: SessionEvent) {
        self.inner.events.publish(event);
    }

    /// Input is live only while in progress and no submission holds the latch.
    fn input_open(&self, state: &SessionState) -> bool {
        state.session.status.accepts_input() && self.inner.submission.state() == LatchState::Idle
    }

    /// Apply a legal status change. Returns the previous status on success.
    fn transition(&self, state: &mut SessionState, to: SessionStatus) -> Option<SessionStatus> {
        let from = state.session.status;
        if !from.can_transition_to(to) {
            return None;
        }
        state.session.status = to;
        info!(session_id = %self.inner.session_id, %from, %to, "session status changed");
        self.publish(SessionEvent::StatusChanged { from, to });
        Some(from)
    }

    /// Enter a terminal status and stop everything that could still touch the session.
    fn finish(&self, state: &mut SessionState, to: SessionStatus, now: DateTime<Utc>) -> bool {
        if self.transition(state, to).is_none() {
            return false;
        }
        state.session.ended_at = Some(now);
        if matches!(to, SessionStatus::Completed | SessionStatus::AutoSubmitted) {
            state.session.submitted_at = Some(now);
        }
        state.navigator.reset_baseline(now);
        self.inner.timer.stop(now);
        self.inner.submission.seal();
        self.inner.shutdown.cancel();
        true
    }

    // ─── Accessors ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state().session.status
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Local copy of the session record.
    #[must_use]
    pub fn session(&self) -> Session {
        self.state().session.clone()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn questions(&self) -> &QuestionSet {
        &self.inner.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.state().navigator.current()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&SessionQuestion> {
        self.inner.questions.get(self.current_index())
    }

    #[must_use]
    pub fn can_go_previous(&self) -> bool {
        self.state().navigator.can_go_previous()
    }

    #[must_use]
    pub fn can_go_next(&self) -> bool {
        self.state().navigator.can_go_next()
    }

    #[must_use]
    pub fn visited_count(&self, index: usize) -> u32 {
        self.state().navigator.visited_count(index)
    }

    /// Seconds credited to question `index`, not counting the running stretch.
    #[must_use]
    pub fn time_spent(&self, index: usize) -> u64 {
        self.state().navigator.time_spent(index)
    }

    #[must_use]
    pub fn selected_option(&self, question: QuestionId) -> Option<OptionId> {
        self.state().answers.selected(question)
    }

    #[must_use]
    pub fn answer_sync(&self, question: QuestionId) -> Option<SyncState> {
        self.state().answers.entry(question).map(|entry| entry.sync())
    }

    /// Questions whose last answer write failed.
    #[must_use]
    pub fn unsynced_answers(&self) -> Vec<QuestionId> {
        self.state().answers.unsynced()
    }

    #[must_use]
    pub fn is_marked_for_review(&self, question: QuestionId) -> bool {
        self.state().answers.is_marked_for_review(question)
    }

    /// Countdown to display, or `None` before the first timer reading.
    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.inner.timer.remaining(self.now())
    }

    #[must_use]
    pub fn urgency(&self) -> Option<TimeUrgency> {
        self.remaining_seconds().map(TimeUrgency::for_remaining)
    }

    #[must_use]
    pub fn timer_frozen(&self) -> bool {
        self.inner.timer.is_frozen()
    }

    /// Progress recomputed from the local answer cache.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        let now = self.now();
        let state = self.state();
        let time_spent = state.navigator.total_time_spent(now);
        progress::tally(&self.inner.questions, &state.answers, time_spent)
    }

    /// Newest progress snapshot reported by the backend.
    #[must_use]
    pub fn server_progress(&self) -> Option<ProgressSnapshot> {
        self.inner.progress.server()
    }

    #[must_use]
    pub fn submit_summary(&self) -> SubmitSummary {
        progress::submit_summary(&self.inner.questions, &self.state().answers)
    }

    #[must_use]
    pub fn question_state(&self, index: usize) -> QuestionState {
        let state = self.state();
        progress::question_state(&self.inner.questions, &state.answers, &state.navigator, index)
    }

    /// Palette states of every question, in session order.
    #[must_use]
    pub fn palette(&self) -> Vec<QuestionState> {
        let state = self.state();
        (0..self.inner.questions.len())
            .map(|index| {
                progress::question_state(
                    &self.inner.questions,
                    &state.answers,
                    &state.navigator,
                    index,
                )
            })
            .collect()
    }

    #[must_use]
    pub fn submission_state(&self) -> LatchState {
        self.inner.submission.state()
    }

    /// Trigger of the submission in flight or completed, if any.
    #[must_use]
    pub fn submission_trigger(&self) -> Option<SubmitTrigger> {
        self.inner.submission.trigger()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Cancelled once the session reaches a terminal status.
    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    // ─── Navigation ────────────────────────────────────────────────────────────

    /// Move to question `index` (0-based).
    ///
    /// Out-of-range targets, the current question, and any call while input
    /// is closed are no-ops. The backend is told in the background.
    pub fn go_to(&self, index: usize) -> Option<Navigation> {
        let now = self.now();
        let navigation = {
            let mut state = self.state();
            if !self.input_open(&state) {
                return None;
            }
            let navigation = state.navigator.go_to(index, now)?;
            state.session.current_question_index = navigation.to;
            navigation
        };
        debug!(
            session_id = %self.inner.session_id,
            from = navigation.from,
            to = navigation.to,
            credited = navigation.time_on_previous,
            "navigated"
        );
        self.publish(SessionEvent::Navigated {
            index: navigation.to,
            question_number: navigation.question_number,
        });
        self.notify_navigation(navigation.question_number);
        Some(navigation)
    }

    pub fn next(&self) -> Option<Navigation> {
        self.go_to(self.current_index() + 1)
    }

    pub fn previous(&self) -> Option<Navigation> {
        self.current_index()
            .checked_sub(1)
            .and_then(|index| self.go_to(index))
    }

    fn notify_navigation(&self, question_number: u32) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(question_number, "no runtime; navigation not reported");
            return;
        };
        let this = self.clone();
        runtime.spawn(async move {
            let session_id = this.inner.session_id;
            let request = this.call(
                "navigate_to_question",
                this.inner
                    .api
                    .navigate_to_question(session_id, question_number),
            );
            tokio::select! {
                () = this.inner.shutdown.cancelled() => {}
                result = request => {
                    if let Err(err) = result {
                        warn!(%session_id, question_number, error = %err, "navigation notify failed");
                    }
                }
            }
        });
    }

    // ─── Answers ───────────────────────────────────────────────────────────────

    /// Select `option` for `question` and save it.
    ///
    /// The selection is kept locally even if the save fails; selecting again
    /// retries the write.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion` / `InvalidOption` for ids that
    /// are not part of this session, or the save failure.
    pub async fn select_option(
        &self,
        question: QuestionId,
        option: OptionId,
    ) -> Result<AnswerOutcome, SessionError> {
        let index = self
            .inner
            .questions
            .index_of(question)
            .ok_or(SessionError::UnknownQuestion(question))?;
        if !self.inner.questions.get(index).is_some_and(|q| q.has_option(option)) {
            return Err(SessionError::InvalidOption { question, option });
        }

        let now = self.now();
        let (revision, time_spent) = {
            let mut state = self.state();
            if !self.input_open(&state) {
                return Ok(AnswerOutcome::Ignored);
            }
            let time_spent = if state.navigator.current() == index {
                state.navigator.reset_baseline(now)
            } else {
                0
            };
            (state.answers.select(question, option, time_spent), time_spent)
        };

        let result = self
            .call(
                "submit_answer",
                self.inner.api.submit_answer(
                    self.inner.session_id,
                    question,
                    Some(option),
                    time_spent,
                ),
            )
            .await;

        match result {
            Ok(answer) => {
                self.state().answers.confirm(&answer, revision);
                debug!(session_id = %self.inner.session_id, question_id = %question, "answer saved");
                self.publish(SessionEvent::AnswerSaved {
                    question,
                    option: answer.selected_option,
                });
                Ok(AnswerOutcome::Saved(answer))
            }
            Err(err) => {
                self.state().answers.mark_failed(question, revision);
                error!(
                    session_id = %self.inner.session_id,
                    question_id = %question,
                    error = %err,
                    "answer save failed"
                );
                self.publish(SessionEvent::AnswerFailed {
                    question,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Select the option at display `position` (0-based) of the current question.
    ///
    /// # Errors
    ///
    /// Returns the save failure from [`select_option`](Self::select_option).
    pub async fn select_option_at(&self, position: usize) -> Result<AnswerOutcome, SessionError> {
        let Some(question) = self.current_question() else {
            return Ok(AnswerOutcome::Ignored);
        };
        let Some(option) = question.option_at(position) else {
            return Ok(AnswerOutcome::Ignored);
        };
        self.select_option(question.id(), option.id).await
    }

    /// Flip the review flag of `question`, based on the last confirmed value.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion` or the backend failure.
    pub async fn toggle_review(&self, question: QuestionId) -> Result<ReviewOutcome, SessionError> {
        if self.inner.questions.find(question).is_none() {
            return Err(SessionError::UnknownQuestion(question));
        }
        let marked = {
            let state = self.state();
            if !self.input_open(&state) {
                return Ok(ReviewOutcome::Ignored);
            }
            state.answers.is_marked_for_review(question)
        };

        let session_id = self.inner.session_id;
        let result = if marked {
            self.call("clear_review", self.inner.api.clear_review(session_id, question))
                .await
        } else {
            self.call(
                "mark_for_review",
                self.inner.api.mark_for_review(session_id, question),
            )
            .await
        };

        match result {
            Ok(()) => {
                self.state().answers.set_review(question, !marked);
                self.publish(SessionEvent::ReviewChanged {
                    question,
                    marked: !marked,
                });
                Ok(if marked {
                    ReviewOutcome::Cleared
                } else {
                    ReviewOutcome::Marked
                })
            }
            Err(err) => {
                warn!(%session_id, question_id = %question, error = %err, "review toggle failed");
                Err(err)
            }
        }
    }

    /// Toggle review on the current question.
    ///
    /// # Errors
    ///
    /// Returns the backend failure from [`toggle_review`](Self::toggle_review).
    pub async fn toggle_review_current(&self) -> Result<ReviewOutcome, SessionError> {
        match self.current_question() {
            Some(question) => self.toggle_review(question.id()).await,
            None => Ok(ReviewOutcome::Ignored),
        }
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────────

    fn begin_control(
        &self,
        operation: &'static str,
        legal: impl Fn(SessionStatus) -> bool,
    ) -> Result<PendingControl<'_>, ControlOutcome> {
        let mut state = self.state();
        let status = state.session.status;
        if !legal(status)
            || state.pending_control.is_some()
            || self.inner.submission.state() != LatchState::Idle
        {
            return Err(ControlOutcome::Ignored(status));
        }
        state.pending_control = Some(operation);
        Ok(PendingControl {
            controller: self,
            armed: true,
        })
    }

    fn control_failed(&self, operation: &'static str, err: &SessionError) {
        error!(session_id = %self.inner.session_id, operation, error = %err, "session control failed");
        self.publish(SessionEvent::ControlFailed {
            operation,
            message: err.to_string(),
        });
    }

    /// Pause the session. The countdown freezes at once and stays frozen
    /// unless the backend refuses.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; the session stays in progress.
    pub async fn pause(&self) -> Result<ControlOutcome, SessionError> {
        let pending =
            match self.begin_control("pause", |status| status == SessionStatus::InProgress) {
                Ok(pending) => pending,
                Err(ignored) => return Ok(ignored),
            };
        self.inner.timer.freeze(self.now());

        let result = self
            .call("pause", self.inner.api.pause_session(self.inner.session_id))
            .await;

        let now = self.now();
        let mut state = self.state();
        pending.settle(&mut state);
        match result {
            Ok(()) => match self.transition(&mut state, SessionStatus::Paused) {
                Some(from) => {
                    state.navigator.reset_baseline(now);
                    Ok(ControlOutcome::Applied {
                        from,
                        to: SessionStatus::Paused,
                    })
                }
                None => Ok(ControlOutcome::Ignored(state.session.status)),
            },
            Err(err) => {
                if state.session.status == SessionStatus::InProgress {
                    self.inner.timer.unfreeze(now);
                }
                drop(state);
                self.control_failed("pause", &err);
                Err(err)
            }
        }
    }

    /// Resume a paused session once the backend confirms.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; the session stays paused.
    pub async fn resume(&self) -> Result<ControlOutcome, SessionError> {
        let pending = match self.begin_control("resume", |status| status == SessionStatus::Paused)
        {
            Ok(pending) => pending,
            Err(ignored) => return Ok(ignored),
        };

        let result = self
            .call("resume", self.inner.api.resume_session(self.inner.session_id))
            .await;

        let now = self.now();
        let mut state = self.state();
        pending.settle(&mut state);
        match result {
            Ok(()) => match self.transition(&mut state, SessionStatus::InProgress) {
                Some(from) => {
                    self.inner.timer.unfreeze(now);
                    state.navigator.discard_elapsed(now);
                    Ok(ControlOutcome::Applied {
                        from,
                        to: SessionStatus::InProgress,
                    })
                }
                None => Ok(ControlOutcome::Ignored(state.session.status)),
            },
            Err(err) => {
                drop(state);
                self.control_failed("resume", &err);
                Err(err)
            }
        }
    }

    /// Abandon the session for good.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; the session is left as it was.
    pub async fn abandon(&self) -> Result<ControlOutcome, SessionError> {
        let pending = match self.begin_control("abandon", |status| {
            matches!(status, SessionStatus::InProgress | SessionStatus::Paused)
        }) {
            Ok(pending) => pending,
            Err(ignored) => return Ok(ignored),
        };

        let result = self
            .call(
                "abandon",
                self.inner.api.abandon_session(self.inner.session_id),
            )
            .await;

        let now = self.now();
        let mut state = self.state();
        pending.settle(&mut state);
        match result {
            Ok(()) => {
                let from = state.session.status;
                if self.finish(&mut state, SessionStatus::Abandoned, now) {
                    Ok(ControlOutcome::Applied {
                        from,
                        to: SessionStatus::Abandoned,
                    })
                } else {
                    Ok(ControlOutcome::Ignored(from))
                }
            }
            Err(err) => {
                drop(state);
                self.control_failed("abandon", &err);
                Err(err)
            }
        }
    }

    /// Submit the exam. At most one submission reaches the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; the latch reopens so the student can retry.
    pub async fn submit(&self, trigger: SubmitTrigger) -> Result<SubmitOutcome, SessionError> {
        let permit = {
            let state = self.state();
            if state.session.status != SessionStatus::InProgress {
                return Ok(SubmitOutcome::Ignored);
            }
            match self.inner.submission.try_begin(trigger) {
                Some(permit) => permit,
                None => {
                    debug!(session_id = %self.inner.session_id, %trigger, "submit dropped; latch busy");
                    return Ok(SubmitOutcome::Ignored);
                }
            }
        };
        info!(session_id = %self.inner.session_id, %trigger, "submitting exam");

        let result = self
            .call(
                "submit_exam",
                self.inner.api.submit_exam(self.inner.session_id),
            )
            .await;

        match result {
            Ok(()) => {
                permit.complete();
                let status = trigger.terminal_status();
                let now = self.now();
                {
                    let mut state = self.state();
                    if !self.finish(&mut state, status, now) {
                        // Already closed by a server status; keep the latch sealed.
                        self.inner.submission.seal();
                    }
                }
                info!(session_id = %self.inner.session_id, %trigger, %status, "exam submitted");
                self.publish(SessionEvent::Submitted { trigger, status });
                Ok(SubmitOutcome::Submitted(status))
            }
            Err(err) => {
                permit.fail();
                error!(session_id = %self.inner.session_id, %trigger, error = %err, "exam submit failed");
                self.publish(SessionEvent::SubmitFailed {
                    trigger,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    // ─── Polling ───────────────────────────────────────────────────────────────

    /// Fetch the server timer, re-anchor the countdown, adopt a changed
    /// server status and, on the first time-up signal, auto-submit.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure; the countdown holds its value until the
    /// next successful poll.
    pub async fn poll_timer(&self) -> Result<TimerSnapshot, SessionError> {
        let result = self
            .call("get_timer", self.inner.api.get_timer(self.inner.session_id))
            .await;
        let now = self.now();

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.inner.timer.mark_failed(now);
                warn!(session_id = %self.inner.session_id, error = %err, "timer poll failed");
                self.publish(SessionEvent::PollFailed {
                    poll: "timer",
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        let time_up = {
            let mut state = self.state();
            if state.session.status.is_terminal() {
                return Ok(snapshot);
            }
            self.inner.timer.apply(&snapshot, now);
            self.adopt_status(&mut state, snapshot.status, now);
            debug!(
                session_id = %self.inner.session_id,
                remaining = snapshot.time_remaining_seconds,
                status = %snapshot.status,
                "timer polled"
            );
            snapshot.signals_time_up()
                && state.session.status == SessionStatus::InProgress
                && self.inner.submission.state() == LatchState::Idle
                && self.inner.timer.claim_time_up()
        };

        if time_up {
            warn!(session_id = %self.inner.session_id, "time is up; auto-submitting");
            self.publish(SessionEvent::TimeUp);
            // Failures are logged and published by `submit`.
            let _ = self.submit(SubmitTrigger::Auto).await;
        }
        Ok(snapshot)
    }

    /// Follow a status the server reports, when the change is legal and
    /// nothing local is pending.
    fn adopt_status(&self, state: &mut SessionState, server: SessionStatus, now: DateTime<Utc>) {
        let local = state.session.status;
        if server == local
            || !local.can_transition_to(server)
            || state.pending_control.is_some()
            || self.inner.submission.state() != LatchState::Idle
        {
            return;
        }
        if server.is_terminal() {
            self.finish(state, server, now);
            return;
        }
        if self.transition(state, server).is_some() {
            match server {
                SessionStatus::Paused => {
                    self.inner.timer.freeze(now);
                    state.navigator.reset_baseline(now);
                }
                SessionStatus::InProgress => {
                    self.inner.timer.unfreeze(now);
                    state.navigator.discard_elapsed(now);
                }
                _ => {}
            }
        }
    }

    /// Fetch the answer list and reconcile it into the local cache.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure; the cache is left untouched.
    pub async fn refresh_answers(&self) -> Result<ReconcileOutcome, SessionError> {
        let ticket = self.state().answers.begin_fetch();
        let result = self
            .call(
                "get_answers",
                self.inner.api.get_answers(self.inner.session_id),
            )
            .await;
        match result {
            Ok(answers) => {
                let outcome = self.state().answers.reconcile(ticket, &answers);
                debug!(session_id = %self.inner.session_id, ?outcome, "answers polled");
                Ok(outcome)
            }
            Err(err) => {
                warn!(session_id = %self.inner.session_id, error = %err, "answers poll failed");
                self.publish(SessionEvent::PollFailed {
                    poll: "answers",
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Fetch the server's progress snapshot.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure.
    pub async fn refresh_progress(&self) -> Result<ProgressSnapshot, SessionError> {
        let ticket = self.inner.progress.begin();
        let result = self
            .call(
                "get_progress",
                self.inner.api.get_progress(self.inner.session_id),
            )
            .await;
        match result {
            Ok(snapshot) => {
                if self.inner.progress.apply(ticket, snapshot.clone()) {
                    debug!(
                        session_id = %self.inner.session_id,
                        answered = snapshot.answered,
                        "progress polled"
                    );
                    self.publish(SessionEvent::ProgressUpdated(snapshot.clone()));
                }
                Ok(snapshot)
            }
            Err(err) => {
                warn!(session_id = %self.inner.session_id, error = %err, "progress poll failed");
                self.publish(SessionEvent::PollFailed {
                    poll: "progress",
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Publish the current countdown value.
    pub fn tick(&self) {
        if let Some(remaining_seconds) = self.remaining_seconds() {
            self.publish(SessionEvent::Tick {
                remaining_seconds,
                urgency: TimeUrgency::for_remaining(remaining_seconds),
            });
        }
    }

    // ─── Keyboard / page ───────────────────────────────────────────────────────

    /// Run the command bound to a key press. Returns the command that ran,
    /// or `None` for unbound keys and while input is closed.
    ///
    /// # Errors
    ///
    /// Returns the failure of the command's backend call.
    pub async fn handle_key(
        &self,
        key: Key,
        modifiers: Modifiers,
    ) -> Result<Option<ExamCommand>, SessionError> {
        let Some(command) = command_for(key, modifiers) else {
            return Ok(None);
        };
        if !self.input_open(&self.state()) {
            return Ok(None);
        }
        let handled = match command {
            ExamCommand::Previous => self.previous().is_some(),
            ExamCommand::Next => self.next().is_some(),
            ExamCommand::SelectOption(position) => {
                self.select_option_at(position).await? != AnswerOutcome::Ignored
            }
            ExamCommand::ToggleReview => {
                self.toggle_review_current().await? != ReviewOutcome::Ignored
            }
            ExamCommand::Submit => {
                self.submit(SubmitTrigger::Manual).await? != SubmitOutcome::Ignored
            }
            ExamCommand::Pause => matches!(self.pause().await?, ControlOutcome::Applied { .. }),
        };
        Ok(handled.then_some(command))
    }

    /// Record a page visibility change. Returns the tab-switch count.
    pub fn record_visibility(&self, visible: bool) -> u32 {
        let mut state = self.state();
        if !visible && state.session.status == SessionStatus::InProgress {
            state.session.tab_switches += 1;
            let switches = state.session.tab_switches;
            info!(session_id = %self.inner.session_id, switches, "page hidden during exam");
            self.publish(SessionEvent::TabHidden { switches });
        }
        state.session.tab_switches
    }

    /// Leaving the page should be confirmed while the exam is running.
    #[must_use]
    pub fn should_guard_unload(&self) -> bool {
        self.status() == SessionStatus::InProgress
    }

    // ─── Report ────────────────────────────────────────────────────────────────

    /// Fetch the score report. `None` until the session is terminal.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn report(&self) -> Result<Option<SessionReport>, SessionError> {
        if !self.is_terminal() {
            return Ok(None);
        }
        let report = self
            .call(
                "generate_report",
                self.inner.api.generate_report(self.inner.session_id),
            )
            .await?;
        {
            let mut state = self.state();
            state.session.total_score = report.session.total_score;
            state.session.percentage_score = report.session.percentage_score;
            state.session.is_passed = report.session.is_passed;
        }
        Ok(Some(report))
    }
}

async fn bounded<T>(
    timeout: std::time::Duration,
    operation: &'static str,
    request: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, SessionError> {
    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result.map_err(SessionError::from),
        Err(_) => Err(SessionError::Timeout { operation }),
    }
}
