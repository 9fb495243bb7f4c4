use std::sync::Arc;
use std::time::Duration;

use backend::{Endpoint, ExamApi, ExamFixture, InMemoryExamApi};
use exam_core::model::SessionStatus;
use exam_core::time::fixed_now;
use services::{Clock, SessionConfig, SessionController, SessionEvent, SessionRuntime};

async fn start(clock: &Clock, minutes: u32) -> (InMemoryExamApi, SessionController) {
    let fixture = ExamFixture::generated(3, 4, minutes);
    let exam = fixture.exam_id;
    let api = InMemoryExamApi::new(clock.clone()).with_fixture(fixture);
    let shared: Arc<dyn ExamApi> = Arc::new(api.clone());
    let controller = SessionController::start(
        shared,
        exam,
        None,
        clock.clone(),
        SessionConfig::default(),
    )
    .await
    .unwrap();
    (api, controller)
}

#[tokio::test(start_paused = true)]
async fn loops_poll_at_their_cadence() {
    let clock = Clock::manual(fixed_now());
    let (api, controller) = start(&clock, 10).await;
    let mut events = controller.subscribe();
    let runtime = SessionRuntime::start(controller);

    tokio::time::sleep(Duration::from_millis(10_500)).await;

    assert!(api.calls(Endpoint::Timer) >= 10);
    assert!(api.calls(Endpoint::Answers) >= 2);
    assert!((1..=2).contains(&api.calls(Endpoint::Progress)));
    assert!(runtime.is_running());

    let ticks = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|event| matches!(event, SessionEvent::Tick { .. }))
        .count();
    assert!(ticks >= 10);

    let controller = runtime.shutdown().await;
    let polled = api.calls(Endpoint::Timer);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.calls(Endpoint::Timer), polled);
    assert_eq!(controller.status(), SessionStatus::InProgress);
}

#[tokio::test(start_paused = true)]
async fn time_up_on_the_timer_loop_submits_and_stops_every_loop() {
    let mut clock = Clock::manual(fixed_now());
    let (api, controller) = start(&clock, 1).await;
    let runtime = SessionRuntime::start(controller.clone());

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(api.calls(Endpoint::SubmitExam), 0);

    clock.advance(chrono::Duration::seconds(61));
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(controller.status(), SessionStatus::AutoSubmitted);
    assert_eq!(api.calls(Endpoint::SubmitExam), 1);
    assert!(!runtime.is_running());

    let polled = api.calls(Endpoint::Timer);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.calls(Endpoint::Timer), polled);
    assert_eq!(api.calls(Endpoint::SubmitExam), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_runtime_stops_polling() {
    let clock = Clock::manual(fixed_now());
    let (api, controller) = start(&clock, 10).await;
    let runtime = SessionRuntime::start(controller.clone());

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    drop(runtime);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let polled = api.calls(Endpoint::Timer);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.calls(Endpoint::Timer), polled);
    assert!(!controller.is_terminal());
}
