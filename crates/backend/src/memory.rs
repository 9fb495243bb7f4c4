use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::sync::watch;

use exam_core::Clock;
use exam_core::model::{
    Answer, Difficulty, ExamId, OptionId, ProgressSnapshot, QuestionDetail, QuestionId,
    QuestionOption, ResultSummary, Session, SessionId, SessionQuestion, SessionStatus,
    TimerSnapshot,
};
use exam_core::time::elapsed_secs;

use crate::api::{ApiError, ExamApi, SessionReport};

/// Default pass mark, in percent of total marks.
pub const DEFAULT_PASSING_PERCENTAGE: f64 = 40.0;

//
// ─── FIXTURES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
pub struct FixtureQuestion {
    pub detail: QuestionDetail,
    pub options: Vec<QuestionOption>,
    pub correct: OptionId,
}

/// An exam definition the in-memory backend can start sessions for.
#[derive(Debug, Clone)]
pub struct ExamFixture {
    pub exam_id: ExamId,
    pub duration_minutes: u32,
    pub passing_percentage: f64,
    pub questions: Vec<FixtureQuestion>,
}

impl ExamFixture {
    /// A synthetic exam of `question_count` questions with `option_count`
    /// options each, worth one mark apiece.
    #[must_use]
    pub fn generated(question_count: u32, option_count: u32, duration_minutes: u32) -> Self {
        let option_count = option_count.max(1);
        let questions = (1..=question_count)
            .map(|number| {
                let options = (0..option_count)
                    .map(|index| QuestionOption {
                        id: OptionId::generate(),
                        text: format!("Option {}", option_label(index)),
                        image: None,
                        order: index + 1,
                    })
                    .collect::<Vec<_>>();
                let correct = options[((number - 1) % option_count) as usize].id;
                FixtureQuestion {
                    detail: QuestionDetail {
                        id: QuestionId::generate(),
                        text: format!("Question {number}"),
                        image: None,
                        difficulty: match number % 3 {
                            1 => Difficulty::Easy,
                            2 => Difficulty::Medium,
                            _ => Difficulty::Hard,
                        },
                        marks: 1.0,
                        negative_marks: 0.0,
                    },
                    options,
                    correct,
                }
            })
            .collect();
        Self {
            exam_id: ExamId::generate(),
            duration_minutes,
            passing_percentage: DEFAULT_PASSING_PERCENTAGE,
            questions,
        }
    }

    #[must_use]
    pub fn with_negative_marks(mut self, negative_marks: f64) -> Self {
        for question in &mut self.questions {
            question.detail.negative_marks = negative_marks;
        }
        self
    }
}

fn option_label(index: u32) -> char {
    char::from_u32(u32::from(b'A') + index % 26).unwrap_or('?')
}

//
// ─── ENDPOINTS / GATES ─────────────────────────────────────────────────────────
//

/// One backend operation, for call counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    StartSession,
    Questions,
    Timer,
    Progress,
    Answers,
    SubmitAnswer,
    MarkForReview,
    ClearReview,
    Navigate,
    Pause,
    Resume,
    Abandon,
    SubmitExam,
    Report,
}

/// Holds calls to one endpoint until released or dropped.
#[derive(Debug)]
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    pub fn release(&self) {
        self.tx.send_replace(true);
    }
}

//
// ─── SERVER STATE ──────────────────────────────────────────────────────────────
//

#[derive(Debug)]
struct ServerQuestion {
    number: u32,
    detail: QuestionDetail,
    options: Vec<QuestionOption>,
    correct: OptionId,
    visited_count: u32,
    time_spent_seconds: u64,
}

#[derive(Debug)]
struct ServerSession {
    session: Session,
    questions: Vec<ServerQuestion>,
    answers: HashMap<QuestionId, Answer>,
    passing_percentage: f64,
    paused_seconds: u64,
    paused_at: Option<DateTime<Utc>>,
    result: Option<ResultSummary>,
}

impl ServerSession {
    fn elapsed(&self, now: DateTime<Utc>) -> u64 {
        let started = self.session.started_at.unwrap_or(now);
        let end = self.session.ended_at.unwrap_or(now);
        let running_pause = self.paused_at.map_or(0, |at| elapsed_secs(at, end));
        elapsed_secs(started, end).saturating_sub(self.paused_seconds + running_pause)
    }

    fn remaining(&self, now: DateTime<Utc>) -> u64 {
        self.session.duration_seconds().saturating_sub(self.elapsed(now))
    }

    fn is_time_up(&self, now: DateTime<Utc>) -> bool {
        self.elapsed(now) >= self.session.duration_seconds()
    }

    fn question(&self, id: QuestionId) -> Result<&ServerQuestion, ApiError> {
        self.questions
            .iter()
            .find(|question| question.detail.id == id)
            .ok_or(ApiError::NotFound)
    }

    fn require_in_progress(&self) -> Result<(), ApiError> {
        if self.session.status == SessionStatus::InProgress {
            Ok(())
        } else {
            Err(ApiError::Rejected(format!(
                "session is {}",
                self.session.status
            )))
        }
    }

    fn close_pause(&mut self, now: DateTime<Utc>) {
        if let Some(at) = self.paused_at.take() {
            self.paused_seconds += elapsed_secs(at, now);
        }
    }

    fn answers_in_order(&self) -> Vec<Answer> {
        self.questions
            .iter()
            .filter_map(|question| self.answers.get(&question.detail.id).cloned())
            .collect()
    }

    fn score(&self) -> ResultSummary {
        let mut result = ResultSummary {
            total_questions: u32::try_from(self.questions.len()).unwrap_or(u32::MAX),
            ..ResultSummary::default()
        };
        for question in &self.questions {
            result.total_marks += question.detail.marks;
            match self
                .answers
                .get(&question.detail.id)
                .and_then(|answer| answer.selected_option)
            {
                Some(option) if option == question.correct => {
                    result.attempted_questions += 1;
                    result.correct_answers += 1;
                    result.marks_obtained += question.detail.marks;
                }
                Some(_) => {
                    result.attempted_questions += 1;
                    result.wrong_answers += 1;
                    result.negative_marks += question.detail.negative_marks;
                }
                None => result.unanswered_questions += 1,
            }
        }
        if result.total_marks > 0.0 {
            let net = (result.marks_obtained - result.negative_marks).max(0.0);
            result.score_percentage = net / result.total_marks * 100.0;
        }
        result
    }

    fn finish(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.close_pause(now);
        self.session.status = status;
        self.session.ended_at = Some(now);
        if matches!(status, SessionStatus::Completed | SessionStatus::AutoSubmitted) {
            let result = self.score();
            self.session.submitted_at = Some(now);
            self.session.total_score = result.marks_obtained - result.negative_marks;
            self.session.percentage_score = result.score_percentage;
            self.session.is_passed = result.score_percentage >= self.passing_percentage;
            self.result = Some(result);
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    fixtures: HashMap<ExamId, ExamFixture>,
    sessions: HashMap<SessionId, ServerSession>,
    calls: HashMap<Endpoint, usize>,
    failures: HashMap<Endpoint, usize>,
    gates: HashMap<Endpoint, watch::Receiver<bool>>,
    shuffle_seed: Option<u64>,
}

impl Inner {
    fn session(&self, id: SessionId) -> Result<&ServerSession, ApiError> {
        self.sessions.get(&id).ok_or(ApiError::NotFound)
    }

    fn session_mut(&mut self, id: SessionId) -> Result<&mut ServerSession, ApiError> {
        self.sessions.get_mut(&id).ok_or(ApiError::NotFound)
    }
}

//
// ─── BACKEND ───────────────────────────────────────────────────────────────────
//

/// A self-contained exam backend for tests and offline demos.
///
/// Time is read from the injected [`Clock`], so a manual clock shared with
/// the runtime drives both sides. Every call is counted before it can be
/// held by a [`Gate`] or failed by [`fail_next`](Self::fail_next).
#[derive(Clone, Debug)]
pub struct InMemoryExamApi {
    inner: Arc<Mutex<Inner>>,
    clock: Clock,
    call_signal: Arc<watch::Sender<u64>>,
}

impl Default for InMemoryExamApi {
    fn default() -> Self {
        Self::new(Clock::system())
    }
}

impl InMemoryExamApi {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        let (call_signal, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
            call_signal: Arc::new(call_signal),
        }
    }

    /// Register an exam definition.
    #[must_use]
    pub fn with_fixture(self, fixture: ExamFixture) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fixtures.insert(fixture.exam_id, fixture);
        }
        self
    }

    /// Shuffle question and option order per session, reproducibly.
    #[must_use]
    pub fn with_shuffle_seed(self, seed: u64) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.shuffle_seed = Some(seed);
        }
        self
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, ApiError> {
        self.inner
            .lock()
            .map_err(|e| ApiError::Unavailable(e.to_string()))
    }

    /// Number of calls made to `endpoint` so far, including failed and held ones.
    #[must_use]
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.calls.get(&endpoint).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Resolve once `endpoint` has been called at least `count` times.
    pub async fn wait_for_calls(&self, endpoint: Endpoint, count: usize) {
        let mut rx = self.call_signal.subscribe();
        let _ = rx.wait_for(|_| self.calls(endpoint) >= count).await;
    }

    /// Fail the next `times` calls to `endpoint` with `ApiError::Unavailable`.
    pub fn fail_next(&self, endpoint: Endpoint, times: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failures.insert(endpoint, times);
        }
    }

    /// Hold every call to `endpoint` until the returned gate is released or dropped.
    #[must_use]
    pub fn hold(&self, endpoint: Endpoint) -> Gate {
        let (tx, rx) = watch::channel(false);
        if let Ok(mut inner) = self.inner.lock() {
            inner.gates.insert(endpoint, rx);
        }
        Gate { tx }
    }

    /// Force a session into `status`, as another client or an admin could.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown session.
    pub fn set_status(&self, session: SessionId, status: SessionStatus) -> Result<(), ApiError> {
        let now = self.clock.now();
        let mut inner = self.lock()?;
        let record = inner.session_mut(session)?;
        if status.is_terminal() {
            record.finish(status, now);
        } else {
            if status == SessionStatus::Paused {
                record.paused_at.get_or_insert(now);
            } else {
                record.close_pause(now);
            }
            record.session.status = status;
        }
        Ok(())
    }

    /// The server's copy of a session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown session.
    pub fn session(&self, session: SessionId) -> Result<Session, ApiError> {
        Ok(self.lock()?.session(session)?.session.clone())
    }

    /// The scoring key for one question.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown session or question.
    pub fn correct_option(
        &self,
        session: SessionId,
        question: QuestionId,
    ) -> Result<OptionId, ApiError> {
        Ok(self.lock()?.session(session)?.question(question)?.correct)
    }

    async fn enter(&self, endpoint: Endpoint) -> Result<(), ApiError> {
        let gate = {
            let mut inner = self.lock()?;
            *inner.calls.entry(endpoint).or_default() += 1;
            inner.gates.get(&endpoint).cloned()
        };
        self.call_signal.send_modify(|count| *count += 1);

        if let Some(mut gate) = gate {
            // A dropped gate lets the call through as well.
            let _ = gate.wait_for(|open| *open).await;
        }

        let mut inner = self.lock()?;
        if let Some(remaining) = inner.failures.get_mut(&endpoint)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(ApiError::Unavailable(format!("{endpoint:?} failed")));
        }
        Ok(())
    }

    fn build_session(
        fixture: &ExamFixture,
        custom_duration: Option<u32>,
        seed: Option<u64>,
        now: DateTime<Utc>,
    ) -> ServerSession {
        let mut questions = fixture.questions.clone();
        if let Some(seed) = seed {
            let mut rng = StdRng::seed_from_u64(seed);
            questions.shuffle(&mut rng);
            for question in &mut questions {
                question.options.shuffle(&mut rng);
                for (order, option) in (1..).zip(question.options.iter_mut()) {
                    option.order = order;
                }
            }
        }
        let questions = (1..)
            .zip(questions)
            .map(|(number, question)| ServerQuestion {
                number,
                detail: question.detail,
                options: question.options,
                correct: question.correct,
                visited_count: 0,
                time_spent_seconds: 0,
            })
            .collect();

        ServerSession {
            session: Session::started(
                SessionId::generate(),
                fixture.exam_id,
                custom_duration.unwrap_or(fixture.duration_minutes),
                now,
            ),
            questions,
            answers: HashMap::new(),
            passing_percentage: fixture.passing_percentage,
            paused_seconds: 0,
            paused_at: None,
            result: None,
        }
    }
}

#[async_trait]
impl ExamApi for InMemoryExamApi {
    async fn start_session(
        &self,
        exam: ExamId,
        custom_duration_minutes: Option<u32>,
    ) -> Result<Session, ApiError> {
        self.enter(Endpoint::StartSession).await?;
        let now = self.clock.now();
        let mut inner = self.lock()?;
        let fixture = inner.fixtures.get(&exam).ok_or(ApiError::NotFound)?;
        if fixture.questions.is_empty() {
            return Err(ApiError::Rejected("exam has no questions".into()));
        }
        let record = Self::build_session(fixture, custom_duration_minutes, inner.shuffle_seed, now);
        let session = record.session.clone();
        inner.sessions.insert(session.id, record);
        tracing::debug!(session = %session.id, "in-memory session started");
        Ok(session)
    }

    async fn get_questions(&self, session: SessionId) -> Result<Vec<SessionQuestion>, ApiError> {
        self.enter(Endpoint::Questions).await?;
        let inner = self.lock()?;
        inner
            .session(session)?
            .questions
            .iter()
            .map(|question| {
                SessionQuestion::new(
                    question.number,
                    question.detail.clone(),
                    question.options.clone(),
                    question.visited_count,
                    question.time_spent_seconds,
                )
                .map_err(|err| ApiError::Decode(err.to_string()))
            })
            .collect()
    }

    async fn get_timer(&self, session: SessionId) -> Result<TimerSnapshot, ApiError> {
        self.enter(Endpoint::Timer).await?;
        let now = self.clock.now();
        let inner = self.lock()?;
        let record = inner.session(session)?;
        Ok(TimerSnapshot {
            started_at: record.session.started_at,
            duration_minutes: record.session.duration_minutes,
            time_remaining_seconds: record.remaining(now),
            is_time_up: record.is_time_up(now),
            status: record.session.status,
        })
    }

    async fn get_progress(&self, session: SessionId) -> Result<ProgressSnapshot, ApiError> {
        self.enter(Endpoint::Progress).await?;
        let inner = self.lock()?;
        let record = inner.session(session)?;
        let answered = record.answers.values().filter(|a| a.is_answered()).count();
        let marked = record
            .answers
            .values()
            .filter(|a| a.is_marked_for_review)
            .count();
        let time_spent = record.questions.iter().map(|q| q.time_spent_seconds).sum();
        Ok(ProgressSnapshot::from_counts(
            record.questions.len(),
            answered,
            marked,
            time_spent,
        ))
    }

    async fn get_answers(&self, session: SessionId) -> Result<Vec<Answer>, ApiError> {
        self.enter(Endpoint::Answers).await?;
        let inner = self.lock()?;
        Ok(inner.session(session)?.answers_in_order())
    }

    async fn submit_answer(
        &self,
        session: SessionId,
        question: QuestionId,
        option: Option<OptionId>,
        time_spent_seconds: u64,
    ) -> Result<Answer, ApiError> {
        self.enter(Endpoint::SubmitAnswer).await?;
        let now = self.clock.now();
        let mut inner = self.lock()?;
        let record = inner.session_mut(session)?;
        record.require_in_progress()?;
        if record.is_time_up(now) {
            return Err(ApiError::Rejected("time is up".into()));
        }

        let target = record
            .questions
            .iter_mut()
            .find(|candidate| candidate.detail.id == question)
            .ok_or(ApiError::NotFound)?;
        if let Some(option) = option
            && !target.options.iter().any(|candidate| candidate.id == option)
        {
            return Err(ApiError::Rejected(format!(
                "option {option} does not belong to question {question}"
            )));
        }
        target.time_spent_seconds += time_spent_seconds;
        let (is_correct, marks_awarded) = match option {
            Some(option) if option == target.correct => (Some(true), Some(target.detail.marks)),
            Some(_) => (Some(false), Some(-target.detail.negative_marks)),
            None => (None, Some(0.0)),
        };

        let marked = record
            .answers
            .get(&question)
            .is_some_and(|answer| answer.is_marked_for_review);
        let answer = Answer {
            question_id: question,
            selected_option: option,
            is_marked_for_review: marked,
            time_spent_seconds,
            is_correct,
            marks_awarded,
            answered_at: Some(now),
        };
        record.answers.insert(question, answer.clone());
        Ok(answer)
    }

    async fn mark_for_review(
        &self,
        session: SessionId,
        question: QuestionId,
    ) -> Result<(), ApiError> {
        self.enter(Endpoint::MarkForReview).await?;
        let mut inner = self.lock()?;
        let record = inner.session_mut(session)?;
        record.require_in_progress()?;
        record.question(question)?;
        record
            .answers
            .entry(question)
            .or_insert_with(|| Answer::unscored(question, None, 0))
            .is_marked_for_review = true;
        Ok(())
    }

    async fn clear_review(&self, session: SessionId, question: QuestionId) -> Result<(), ApiError> {
        self.enter(Endpoint::ClearReview).await?;
        let mut inner = self.lock()?;
        let record = inner.session_mut(session)?;
        record.require_in_progress()?;
        record.question(question)?;
        if let Some(answer) = record.answers.get_mut(&question) {
            answer.is_marked_for_review = false;
        }
        Ok(())
    }

    async fn navigate_to_question(
        &self,
        session: SessionId,
        question_number: u32,
    ) -> Result<(), ApiError> {
        self.enter(Endpoint::Navigate).await?;
        let mut inner = self.lock()?;
        let record = inner.session_mut(session)?;
        record.require_in_progress()?;
        let index = record
            .questions
            .iter()
            .position(|question| question.number == question_number)
            .ok_or_else(|| ApiError::Rejected(format!("no question {question_number}")))?;
        record.questions[index].visited_count += 1;
        record.session.current_question_index = index;
        Ok(())
    }

    async fn pause_session(&self, session: SessionId) -> Result<(), ApiError> {
        self.enter(Endpoint::Pause).await?;
        let now = self.clock.now();
        let mut inner = self.lock()?;
        let record = inner.session_mut(session)?;
        record.require_in_progress()?;
        record.session.status = SessionStatus::Paused;
        record.paused_at = Some(now);
        Ok(())
    }

    async fn resume_session(&self, session: SessionId) -> Result<(), ApiError> {
        self.enter(Endpoint::Resume).await?;
        let now = self.clock.now();
        let mut inner = self.lock()?;
        let record = inner.session_mut(session)?;
        if record.session.status != SessionStatus::Paused {
            return Err(ApiError::Rejected(format!(
                "session is {}",
                record.session.status
            )));
        }
        record.close_pause(now);
        record.session.status = SessionStatus::InProgress;
        Ok(())
    }

    async fn abandon_session(&self, session: SessionId) -> Result<(), ApiError> {
        self.enter(Endpoint::Abandon).await?;
        let now = self.clock.now();
        let mut inner = self.lock()?;
        let record = inner.session_mut(session)?;
        if record.session.status.is_terminal() {
            return Err(ApiError::Rejected(format!(
                "session is {}",
                record.session.status
            )));
        }
        record.finish(SessionStatus::Abandoned, now);
        Ok(())
    }

    async fn submit_exam(&self, session: SessionId) -> Result<(), ApiError> {
        self.enter(Endpoint::SubmitExam).await?;
        let now = self.clock.now();
        let mut inner = self.lock()?;
        let record = inner.session_mut(session)?;
        if !matches!(
            record.session.status,
            SessionStatus::InProgress | SessionStatus::Paused
        ) {
            return Err(ApiError::Rejected(format!(
                "session is {}",
                record.session.status
            )));
        }
        let status = if record.is_time_up(now) {
            SessionStatus::AutoSubmitted
        } else {
            SessionStatus::Completed
        };
        record.finish(status, now);
        Ok(())
    }

    async fn generate_report(&self, session: SessionId) -> Result<SessionReport, ApiError> {
        self.enter(Endpoint::Report).await?;
        let inner = self.lock()?;
        let record = inner.session(session)?;
        if !record.session.status.is_terminal() {
            return Err(ApiError::Rejected("session has not finished".into()));
        }
        Ok(SessionReport {
            session: record.session.clone(),
            result: record.result.clone().unwrap_or_else(|| record.score()),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use exam_core::time::fixed_now;

    fn backend(clock: &Clock) -> (InMemoryExamApi, ExamId) {
        let fixture = ExamFixture::generated(4, 4, 10);
        let exam = fixture.exam_id;
        (InMemoryExamApi::new(clock.clone()).with_fixture(fixture), exam)
    }

    #[test]
    fn zero_options_still_yields_one_keyed_option() {
        let fixture = ExamFixture::generated(3, 0, 5);
        for question in &fixture.questions {
            assert_eq!(question.options.len(), 1);
            assert_eq!(question.correct, question.options[0].id);
        }
    }

    #[tokio::test]
    async fn paused_time_does_not_count() {
        let mut clock = Clock::manual(fixed_now());
        let (api, exam) = backend(&clock);
        let session = api.start_session(exam, None).await.unwrap();

        clock.advance(Duration::seconds(60));
        api.pause_session(session.id).await.unwrap();
        clock.advance(Duration::seconds(300));
        api.resume_session(session.id).await.unwrap();
        clock.advance(Duration::seconds(30));

        let timer = api.get_timer(session.id).await.unwrap();
        assert_eq!(timer.time_remaining_seconds, 600 - 90);
        assert!(!timer.is_time_up);
    }

    #[tokio::test]
    async fn injected_failures_are_counted_and_consumed() {
        let clock = Clock::manual(fixed_now());
        let (api, exam) = backend(&clock);
        let session = api.start_session(exam, None).await.unwrap();

        api.fail_next(Endpoint::Timer, 1);
        assert!(matches!(
            api.get_timer(session.id).await,
            Err(ApiError::Unavailable(_))
        ));
        assert!(api.get_timer(session.id).await.is_ok());
        assert_eq!(api.calls(Endpoint::Timer), 2);
    }

    #[tokio::test]
    async fn seeded_shuffle_is_reproducible() {
        let fixture = ExamFixture::generated(8, 4, 10);
        let exam = fixture.exam_id;
        let order = |seed| {
            let api = InMemoryExamApi::new(Clock::fixed(fixed_now()))
                .with_fixture(fixture.clone())
                .with_shuffle_seed(seed);
            async move {
                let session = api.start_session(exam, None).await.unwrap();
                api.get_questions(session.id)
                    .await
                    .unwrap()
                    .iter()
                    .map(SessionQuestion::id)
                    .collect::<Vec<_>>()
            }
        };
        assert_eq!(order(7).await, order(7).await);
    }

    #[tokio::test]
    async fn submit_after_deadline_is_auto_submitted_and_scored() {
        let mut clock = Clock::manual(fixed_now());
        let (api, exam) = backend(&clock);
        let session = api.start_session(exam, None).await.unwrap();
        let questions = api.get_questions(session.id).await.unwrap();
        let first = questions[0].id();
        let key = api.correct_option(session.id, first).unwrap();
        api.submit_answer(session.id, first, Some(key), 5).await.unwrap();

        clock.advance(Duration::minutes(11));
        api.submit_exam(session.id).await.unwrap();

        let report = api.generate_report(session.id).await.unwrap();
        assert_eq!(report.session.status, SessionStatus::AutoSubmitted);
        assert_eq!(report.result.correct_answers, 1);
        assert_eq!(report.result.unanswered_questions, 3);
        assert!((report.result.score_percentage - 25.0).abs() < f64::EPSILON);
        assert!(!report.session.is_passed);
    }

    #[tokio::test]
    async fn writes_are_refused_once_terminal() {
        let clock = Clock::manual(fixed_now());
        let (api, exam) = backend(&clock);
        let session = api.start_session(exam, None).await.unwrap();
        api.submit_exam(session.id).await.unwrap();

        assert!(matches!(
            api.submit_exam(session.id).await,
            Err(ApiError::Rejected(_))
        ));
        assert!(matches!(
            api.pause_session(session.id).await,
            Err(ApiError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn held_call_waits_for_release() {
        let clock = Clock::manual(fixed_now());
        let (api, exam) = backend(&clock);
        let session = api.start_session(exam, None).await.unwrap();

        let gate = api.hold(Endpoint::Pause);
        let task = tokio::spawn({
            let api = api.clone();
            async move { api.pause_session(session.id).await }
        });
        api.wait_for_calls(Endpoint::Pause, 1).await;
        assert_eq!(api.session(session.id).unwrap().status, SessionStatus::InProgress);

        gate.release();
        task.await.unwrap().unwrap();
        assert_eq!(api.session(session.id).unwrap().status, SessionStatus::Paused);
    }
}
