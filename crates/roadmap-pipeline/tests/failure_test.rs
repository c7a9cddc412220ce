mod common;

use common::*;
use roadmap_pipeline::orchestrator::{PipelineConfig, PipelineOrchestrator, PipelineStage, TraceStatus};
use roadmap_pipeline::{AgentRole, ProgressEvent, RetryPolicy, ServiceError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn error_message(events: &[ProgressEvent]) -> &str {
    match events.last() {
        Some(ProgressEvent::Error { message }) => message,
        other => panic!("expected a final error event, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_architect_failure_ends_with_one_error_event() {
    let generation = MockGeneration::new(|request| match request.role {
        AgentRole::Architect => Err(ServiceError::Fatal("400 INVALID_ARGUMENT: bad request".into())),
        _ => Ok(default_response(request)),
    });
    let harness = Harness::new(generation, MockVideoSearch::happy(), PipelineConfig::default());

    let state = harness.orchestrator.initialize(TOPIC, "user-1");
    let (events, outcome) = harness.orchestrator.run_pipeline(state).collect().await.unwrap();

    assert_eq!(
        stage_updates(&events),
        vec![PipelineStage::Interviewing, PipelineStage::Architecting]
    );
    assert_eq!(terminal_events(&events).len(), 1);
    let message = error_message(&events);
    assert!(message.starts_with("architecting failed:"), "{message}");

    // Fatal errors are not retried.
    assert_eq!(harness.generation.calls(AgentRole::Architect), 1);
    assert_eq!(harness.generation.calls(AgentRole::Researcher), 0);

    assert_eq!(outcome.state.stage, PipelineStage::Error);
    assert_eq!(outcome.state.error_message.as_deref(), Some(message));
    assert!(outcome.roadmap_id().is_none());
    assert_eq!(outcome.trace.final_status, TraceStatus::Error);
    assert!(harness.store.saved().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_one_failed_research_session_fails_the_stage() {
    let generation = MockGeneration::new(|request| match request.role {
        AgentRole::Researcher if research_index(request) == Some(5) => {
            Err(ServiceError::Fatal("content blocked".into()))
        }
        _ => Ok(default_response(request)),
    });
    let harness = Harness::new(generation, MockVideoSearch::happy(), PipelineConfig::default());

    let state = harness.orchestrator.initialize(TOPIC, "user-1");
    let (events, outcome) = harness.orchestrator.run_pipeline(state).collect().await.unwrap();

    let message = error_message(&events);
    assert!(message.starts_with("researching failed:"), "{message}");
    assert!(message.contains("content blocked"));
    assert!(!events.iter().any(|e| matches!(e, ProgressEvent::Complete { .. })));

    // Every sibling call still ran to completion before the stage failed.
    assert_eq!(harness.generation.calls(AgentRole::Researcher), 8);
    assert_eq!(harness.search.calls(), 0);
    assert_eq!(harness.generation.calls(AgentRole::Validator), 0);
    assert!(outcome.state.researched_sessions.is_empty());
    assert!(harness.store.saved().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_all_video_lookups_failing_fails_the_run() {
    let search = MockVideoSearch::new(|_| Err(ServiceError::Fatal("API key not valid".into())));
    let harness = Harness::new(MockGeneration::happy(), search, PipelineConfig::default());

    let state = harness.orchestrator.initialize(TOPIC, "user-1");
    let (events, outcome) = harness.orchestrator.run_pipeline(state).collect().await.unwrap();

    let message = error_message(&events);
    assert!(
        message.starts_with("finding_videos failed for all 8 sessions:"),
        "{message}"
    );
    assert_eq!(outcome.state.stage, PipelineStage::Error);
    assert_eq!(harness.generation.calls(AgentRole::Validator), 0);
}

#[tokio::test(start_paused = true)]
async fn test_blank_roadmap_id_is_an_error() {
    let generation = Arc::new(MockGeneration::happy());
    let orchestrator = PipelineOrchestrator::new(
        generation,
        Arc::new(MockVideoSearch::happy()),
        Arc::new(MockVerifier::default()),
        Arc::new(BlankIdStore),
        PipelineConfig::default(),
    );

    let state = orchestrator.initialize(TOPIC, "user-1");
    let (events, outcome) = orchestrator.run_pipeline(state).collect().await.unwrap();

    assert_eq!(stage_updates(&events).last(), Some(&PipelineStage::Saving));
    assert_eq!(error_message(&events), "Roadmap store returned an empty id");
    assert_eq!(terminal_events(&events).len(), 1);
    assert!(!outcome.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_back_off_exponentially() {
    let failures = Arc::new(AtomicUsize::new(0));
    let generation = {
        let failures = failures.clone();
        MockGeneration::new(move |request| match request.role {
            AgentRole::Validator if failures.fetch_add(1, Ordering::SeqCst) < 3 => {
                Err(ServiceError::Network("503 UNAVAILABLE: overloaded".into()))
            }
            _ => Ok(default_response(request)),
        })
    };
    let config = PipelineConfig::default().with_retry_policy(
        RetryPolicy::new()
            .with_max_retries(3)
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(30)),
    );
    let harness = Harness::new(generation, MockVideoSearch::happy(), config);

    let state = harness.orchestrator.initialize(TOPIC, "user-1");
    let (_, outcome) = harness.orchestrator.run_pipeline(state).collect().await.unwrap();

    assert!(outcome.is_complete());
    let times = harness.generation.call_times(AgentRole::Validator);
    assert_eq!(times.len(), 4);
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_reports_last_error() {
    let generation = MockGeneration::new(|request| match request.role {
        AgentRole::Validator => Err(ServiceError::Network("connection reset".into())),
        _ => Ok(default_response(request)),
    });
    let config = PipelineConfig::default().with_retry_policy(RetryPolicy::new().with_max_retries(2));
    let harness = Harness::new(generation, MockVideoSearch::happy(), config);

    let state = harness.orchestrator.initialize(TOPIC, "user-1");
    let (events, _) = harness.orchestrator.run_pipeline(state).collect().await.unwrap();

    assert_eq!(harness.generation.calls(AgentRole::Validator), 3);
    assert_eq!(
        error_message(&events),
        "validating failed: Network error: connection reset"
    );
}
