use backend::{ApiError, Endpoint, ExamApi, ExamFixture, InMemoryExamApi};
use chrono::Duration;
use exam_core::Clock;
use exam_core::model::{OptionId, SessionStatus};
use exam_core::time::fixed_now;

fn setup(questions: u32) -> (InMemoryExamApi, exam_core::model::ExamId, Clock) {
    let clock = Clock::manual(fixed_now());
    let fixture = ExamFixture::generated(questions, 4, 30).with_negative_marks(0.25);
    let exam = fixture.exam_id;
    (
        InMemoryExamApi::new(clock.clone()).with_fixture(fixture),
        exam,
        clock,
    )
}

#[tokio::test]
async fn unknown_exam_is_not_found() {
    let (api, _, _) = setup(2);
    let missing = exam_core::model::ExamId::generate();
    assert!(matches!(
        api.start_session(missing, None).await,
        Err(ApiError::NotFound)
    ));
}

#[tokio::test]
async fn custom_duration_overrides_the_exam_default() {
    let (api, exam, _) = setup(2);
    let session = api.start_session(exam, Some(5)).await.unwrap();
    let timer = api.get_timer(session.id).await.unwrap();
    assert_eq!(timer.duration_minutes, 5);
    assert_eq!(timer.time_remaining_seconds, 300);
    assert_eq!(timer.status, SessionStatus::InProgress);
}

#[tokio::test]
async fn review_flag_survives_answer_replacement() {
    let (api, exam, _) = setup(3);
    let session = api.start_session(exam, None).await.unwrap();
    let question = api.get_questions(session.id).await.unwrap()[1].clone();

    api.mark_for_review(session.id, question.id()).await.unwrap();
    let first = question.option_at(0).unwrap().id;
    let second = question.option_at(1).unwrap().id;
    api.submit_answer(session.id, question.id(), Some(first), 3)
        .await
        .unwrap();
    let saved = api
        .submit_answer(session.id, question.id(), Some(second), 4)
        .await
        .unwrap();

    assert!(saved.is_marked_for_review);
    assert_eq!(saved.selected_option, Some(second));

    let progress = api.get_progress(session.id).await.unwrap();
    assert_eq!(progress.answered, 1);
    assert_eq!(progress.marked_for_review, 1);
    assert_eq!(progress.unanswered, 2);
}

#[tokio::test]
async fn foreign_option_is_rejected() {
    let (api, exam, _) = setup(2);
    let session = api.start_session(exam, None).await.unwrap();
    let question = api.get_questions(session.id).await.unwrap()[0].id();

    let result = api
        .submit_answer(session.id, question, Some(OptionId::generate()), 1)
        .await;
    assert!(matches!(result, Err(ApiError::Rejected(_))));
    assert!(api.get_answers(session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn answers_are_refused_while_paused() {
    let (api, exam, _) = setup(2);
    let session = api.start_session(exam, None).await.unwrap();
    let question = api.get_questions(session.id).await.unwrap()[0].clone();
    api.pause_session(session.id).await.unwrap();

    let result = api
        .submit_answer(
            session.id,
            question.id(),
            Some(question.option_at(0).unwrap().id),
            1,
        )
        .await;
    assert!(matches!(result, Err(ApiError::Rejected(_))));
}

#[tokio::test]
async fn wrong_answers_cost_negative_marks() {
    let (api, exam, _) = setup(2);
    let session = api.start_session(exam, None).await.unwrap();
    let questions = api.get_questions(session.id).await.unwrap();

    for question in &questions {
        let key = api.correct_option(session.id, question.id()).unwrap();
        let wrong = question
            .options()
            .iter()
            .find(|option| option.id != key)
            .unwrap()
            .id;
        let answer = api
            .submit_answer(session.id, question.id(), Some(wrong), 2)
            .await
            .unwrap();
        assert_eq!(answer.is_correct, Some(false));
        assert_eq!(answer.marks_awarded, Some(-0.25));
    }
    api.submit_exam(session.id).await.unwrap();

    let report = api.generate_report(session.id).await.unwrap();
    assert_eq!(report.session.status, SessionStatus::Completed);
    assert_eq!(report.result.wrong_answers, 2);
    assert!((report.result.negative_marks - 0.5).abs() < f64::EPSILON);
    assert!(report.result.score_percentage.abs() < f64::EPSILON);
}

#[tokio::test]
async fn report_is_unavailable_before_the_end() {
    let (api, exam, _) = setup(1);
    let session = api.start_session(exam, None).await.unwrap();
    assert!(matches!(
        api.generate_report(session.id).await,
        Err(ApiError::Rejected(_))
    ));
}

#[tokio::test]
async fn navigation_moves_the_server_cursor_and_counts_visits() {
    let (api, exam, _) = setup(3);
    let session = api.start_session(exam, None).await.unwrap();
    api.navigate_to_question(session.id, 3).await.unwrap();

    assert_eq!(api.session(session.id).unwrap().current_question_index, 2);
    let questions = api.get_questions(session.id).await.unwrap();
    assert_eq!(questions[2].visited_count(), 1);
    assert!(matches!(
        api.navigate_to_question(session.id, 9).await,
        Err(ApiError::Rejected(_))
    ));
}

#[tokio::test]
async fn timer_reports_time_up_after_the_deadline() {
    let (api, exam, mut clock) = setup(1);
    let session = api.start_session(exam, Some(1)).await.unwrap();
    clock.advance(Duration::seconds(61));

    let timer = api.get_timer(session.id).await.unwrap();
    assert!(timer.signals_time_up());
    assert_eq!(timer.time_remaining_seconds, 0);
    assert_eq!(api.calls(Endpoint::Timer), 1);
}
