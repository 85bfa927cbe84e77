mod common;

use attack_runner::error::FailureKind;
use attack_runner::{AttackError, AttackPipeline, HaltReason, QueueOptions};
use common::*;
use core_logic::HttpMethod;
use std::sync::Arc;
use std::time::Duration;

fn pipeline(backend: &Arc<ScriptedBackend>) -> AttackPipeline {
    AttackPipeline::from_config(&runner_config(), backend.clone()).unwrap()
}

fn options() -> QueueOptions {
    runner_config().queue.options()
}

#[tokio::test]
async fn test_rejected_entry_is_recorded_and_dropped() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, PLACE, vec![ok(PLACE_PAGE)]);
    backend.on_form(HttpMethod::Post, PREPARE, "x", "501", vec![ok(REJECTED_PAGE)]);
    backend.on(HttpMethod::Post, PREPARE, vec![ok(CONFIRM_PAGE)]);
    backend.on(HttpMethod::Post, CONFIRM, vec![ok(SUCCESS_PAGE)]);
    let pipeline = pipeline(&backend);
    let queue = &pipeline.queue;

    let first = queue.add_to_queue(attack_at(500, 500));
    let second = queue.add_to_queue(attack_at(501, 501));
    let third = queue.add_to_queue(attack_at(502, 502));
    assert!(first < second && second < third);

    let summary = queue.process_queue(&options()).await.unwrap();
    assert_eq!(summary.halted, HaltReason::Drained);
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.requeued, 0);
    assert_eq!(summary.remaining, 0);

    let results = queue.results();
    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(results[1].error_kind, Some(FailureKind::ServerRejected));
    assert!(results[2].success);

    let status = queue.status();
    assert_eq!(status.pending, 0);
    assert!(!status.processing);
    assert_eq!(status.completed, 2);
    assert_eq!(status.failed, 1);
    assert_eq!(pipeline.metrics.attacks_total(), 3);
    assert_eq!(pipeline.metrics.attacks_failed(), 1);
}

#[tokio::test]
async fn test_transport_failures_are_requeued_until_attempts_run_out() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, PLACE, vec![ok(PLACE_PAGE)]);
    backend.on(HttpMethod::Post, PREPARE, vec![status(503)]);
    let pipeline = pipeline(&backend);
    pipeline.queue.add_to_queue(reference_attack());

    let summary = pipeline.queue.process_queue(&options()).await.unwrap();
    assert_eq!(summary.attempts, 3);
    assert_eq!(summary.requeued, 2);
    assert_eq!(summary.remaining, 0);

    let attempts: Vec<u32> = pipeline.queue.results().iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(pipeline
        .queue
        .results()
        .iter()
        .all(|r| r.error_kind == Some(FailureKind::HttpStatus)));
}

#[tokio::test]
async fn test_requeued_entry_goes_to_the_back() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, PLACE, vec![ok(PLACE_PAGE)]);
    backend.on_form(HttpMethod::Post, PREPARE, "x", "500", vec![timeout(), timeout(), timeout(), ok(CONFIRM_PAGE)]);
    backend.on(HttpMethod::Post, PREPARE, vec![ok(CONFIRM_PAGE)]);
    backend.on(HttpMethod::Post, CONFIRM, vec![ok(SUCCESS_PAGE)]);
    let pipeline = pipeline(&backend);

    pipeline.queue.add_to_queue(attack_at(500, 500));
    pipeline.queue.add_to_queue(attack_at(510, 510));

    let summary = pipeline.queue.process_queue(&options()).await.unwrap();
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.requeued, 1);

    let targets: Vec<String> = pipeline
        .queue
        .results()
        .iter()
        .map(|r| format!("{}:{}", r.target, r.success))
        .collect();
    assert_eq!(targets, vec!["500|500:false", "510|510:true", "500|500:true"]);
}

#[tokio::test]
async fn test_challenge_aborts_batch_and_keeps_remaining_entries() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, PLACE, vec![ok(PLACE_PAGE)]);
    backend.on_form(HttpMethod::Post, PREPARE, "x", "501", vec![ok(CHALLENGE_PAGE)]);
    backend.on(HttpMethod::Post, PREPARE, vec![ok(CONFIRM_PAGE)]);
    backend.on(HttpMethod::Post, CONFIRM, vec![ok(SUCCESS_PAGE)]);
    let pipeline = pipeline(&backend);

    pipeline.queue.add_to_queue(attack_at(500, 500));
    let challenged = pipeline.queue.add_to_queue(attack_at(501, 501));
    let untouched = pipeline.queue.add_to_queue(attack_at(502, 502));

    let summary = pipeline.queue.process_queue(&options()).await.unwrap();
    assert_eq!(summary.halted, HaltReason::Challenge);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.remaining, 2);

    let results = pipeline.queue.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].error_kind, Some(FailureKind::ChallengeDetected));

    let pending: Vec<u64> = pipeline.queue.pending().iter().map(|e| e.id).collect();
    assert_eq!(pending, vec![challenged, untouched]);
    // The challenged prepare was sent exactly once
    assert_eq!(backend.posts(PREPARE).len(), 2);
}

#[tokio::test]
async fn test_stop_on_error_halts_after_first_failure() {
    let backend = ScriptedBackend::new();
    backend.on(HttpMethod::Get, PLACE, vec![ok(PLACE_PAGE)]);
    backend.on(HttpMethod::Post, PREPARE, vec![ok(REJECTED_PAGE)]);
    let pipeline = pipeline(&backend);

    for x in 500..503 {
        pipeline.queue.add_to_queue(attack_at(x, 500));
    }

    let options = QueueOptions {
        stop_on_error: true,
        ..options()
    };
    let summary = pipeline.queue.process_queue(&options).await.unwrap();
    assert_eq!(summary.halted, HaltReason::StopOnError);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.remaining, 2);
}

#[tokio::test]
async fn test_stop_while_idle_does_not_latch() {
    let backend = ScriptedBackend::new();
    script_happy_path(&backend);
    let pipeline = pipeline(&backend);

    for x in 500..503 {
        pipeline.queue.add_to_queue(attack_at(x, 500));
    }

    pipeline.queue.stop();
    let summary = pipeline.queue.process_queue(&options()).await.unwrap();
    assert_eq!(summary.halted, HaltReason::Drained);
    assert_eq!(summary.sent, 3);
    assert_eq!(summary.remaining, 0);
}

#[tokio::test]
async fn test_stop_during_pacing_delay_halts_before_next_entry() {
    let backend = ScriptedBackend::new();
    script_happy_path(&backend);
    let pipeline = pipeline(&backend);

    for x in 500..503 {
        pipeline.queue.add_to_queue(attack_at(x, 500));
    }
    let options = QueueOptions {
        base_delay: Duration::from_millis(200),
        jitter: Duration::ZERO,
        ..options()
    };

    let queue = pipeline.queue.clone();
    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        queue.stop();
    });

    let summary = pipeline.queue.process_queue(&options).await.unwrap();
    stopper.await.unwrap();

    assert_eq!(summary.halted, HaltReason::Stopped);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.remaining, 2);
}

#[tokio::test]
async fn test_concurrent_processing_is_rejected() {
    let backend = ScriptedBackend::new();
    script_happy_path(&backend);
    let pipeline = pipeline(&backend);

    pipeline.queue.add_to_queue(attack_at(500, 500));
    pipeline.queue.add_to_queue(attack_at(501, 500));
    let options = QueueOptions {
        base_delay: Duration::from_millis(100),
        jitter: Duration::ZERO,
        ..options()
    };

    let (first, second) = tokio::join!(pipeline.queue.process_queue(&options), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        pipeline.queue.process_queue(&options).await
    });

    assert_eq!(first.unwrap().sent, 2);
    assert!(matches!(second, Err(AttackError::QueueBusy)));
    assert!(!pipeline.queue.is_processing());
}

#[tokio::test]
async fn test_clear_queue() {
    let backend = ScriptedBackend::new();
    let pipeline = pipeline(&backend);

    pipeline.queue.add_to_queue(reference_attack());
    pipeline.queue.add_to_queue(reference_attack());
    assert_eq!(pipeline.queue.clear_queue(), 2);
    assert_eq!(pipeline.queue.status().pending, 0);

    let summary = pipeline.queue.process_queue(&options()).await.unwrap();
    assert_eq!(summary.attempts, 0);
    assert!(pipeline.queue.results().is_empty());
}
