//! # Queue Processor
//!
//! Sequential batch execution. Entries run one at a time with a jittered
//! pause between them; transport failures go back to the end of the queue
//! until their attempt budget is spent.

use crate::error::AttackError;
use crate::model::{AttackRequest, AttackResult, QueueEntry};
use crate::submission::SubmissionEngine;
use core_logic::{MetricsCollector, RESULT_TARGET};
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    pub base_delay: Duration,
    /// Delay varies uniformly within `base_delay ± jitter`
    pub jitter: Duration,
    pub max_attempts: u32,
    pub stop_on_error: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            jitter: Duration::from_millis(500),
            max_attempts: 3,
            stop_on_error: false,
        }
    }
}

impl QueueOptions {
    pub fn pacing_delay(&self) -> Duration {
        let base = self.base_delay.as_millis() as i64;
        let jitter = self.jitter.as_millis() as i64;
        let offset = if jitter > 0 {
            rand::thread_rng().gen_range(-jitter..=jitter)
        } else {
            0
        };
        Duration::from_millis((base + offset).max(0) as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: bool,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    Drained,
    Stopped,
    StopOnError,
    Challenge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Attempts made, including re-runs
    pub attempts: usize,
    pub sent: usize,
    pub failed: usize,
    pub requeued: usize,
    pub remaining: usize,
    pub halted: HaltReason,
}

/// Clears the processing flag however the batch ends.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct QueueProcessor {
    engine: Arc<SubmissionEngine>,
    metrics: Arc<MetricsCollector>,
    queue: Mutex<VecDeque<QueueEntry>>,
    results: Mutex<Vec<AttackResult>>,
    next_id: AtomicU64,
    processing: AtomicBool,
    stop_requested: AtomicBool,
}

impl QueueProcessor {
    pub fn new(engine: Arc<SubmissionEngine>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            engine,
            metrics,
            queue: Mutex::new(VecDeque::new()),
            results: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            processing: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn add_to_queue(&self, request: AttackRequest) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock_queue().push_back(QueueEntry::new(id, request));
        id
    }

    /// Asks a running batch to halt before its next entry. Ignored when idle.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Drops all pending entries and returns how many there were.
    pub fn clear_queue(&self) -> usize {
        let mut queue = self.lock_queue();
        let removed = queue.len();
        queue.clear();
        removed
    }

    pub fn pending(&self) -> Vec<QueueEntry> {
        self.lock_queue().iter().cloned().collect()
    }

    pub fn results(&self) -> Vec<AttackResult> {
        self.lock_results().clone()
    }

    pub fn status(&self) -> QueueStatus {
        let (completed, failed) = self
            .lock_results()
            .iter()
            .fold((0, 0), |(ok, err), r| if r.success { (ok + 1, err) } else { (ok, err + 1) });
        QueueStatus {
            pending: self.lock_queue().len(),
            processing: self.is_processing(),
            completed,
            failed,
        }
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<QueueEntry>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_results(&self) -> std::sync::MutexGuard<'_, Vec<AttackResult>> {
        self.results.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, result: AttackResult) {
        self.metrics.record_attack(result.success);
        self.lock_results().push(result);
    }

    pub async fn process_queue(&self, options: &QueueOptions) -> Result<BatchSummary, AttackError> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AttackError::QueueBusy);
        }
        let _guard = ProcessingGuard(&self.processing);
        // A stop requested while idle belongs to no batch
        self.stop_requested.store(false, Ordering::SeqCst);

        let mut summary = BatchSummary {
            attempts: 0,
            sent: 0,
            failed: 0,
            requeued: 0,
            remaining: 0,
            halted: HaltReason::Drained,
        };

        info!("Processing queue ({} entries)", self.lock_queue().len());

        loop {
            if self.stop_requested.swap(false, Ordering::SeqCst) {
                info!("Stop requested, halting batch");
                summary.halted = HaltReason::Stopped;
                break;
            }

            let next = self.lock_queue().pop_front();
            let Some(mut entry) = next else {
                break;
            };
            entry.attempts += 1;
            summary.attempts += 1;

            debug!(
                "Entry #{} attempt {}/{}: {} -> {}",
                entry.id, entry.attempts, options.max_attempts, entry.request.origin, entry.request.target
            );

            match self.engine.submit(entry.request.clone()).await {
                Ok(result) => {
                    summary.sent += 1;
                    self.record(result.with_attempt(entry.attempts));
                }
                Err(e) => {
                    summary.failed += 1;
                    self.record(AttackResult::failure(&entry.request, &e).with_attempt(entry.attempts));

                    if e.is_challenge() {
                        warn!(
                            target: RESULT_TARGET,
                            "{} {} -> {} CHALLENGE: {}",
                            entry.request.command,
                            entry.request.origin,
                            entry.request.target,
                            e
                        );
                        self.lock_queue().push_front(entry);
                        summary.halted = HaltReason::Challenge;
                        break;
                    }

                    info!(
                        target: RESULT_TARGET,
                        "{} {} -> {} FAILED (attempt {}): {}",
                        entry.request.command,
                        entry.request.origin,
                        entry.request.target,
                        entry.attempts,
                        e
                    );

                    if e.is_transport() && entry.attempts < options.max_attempts {
                        debug!("Re-queueing entry #{}", entry.id);
                        summary.requeued += 1;
                        self.lock_queue().push_back(entry);
                    }

                    if options.stop_on_error {
                        summary.halted = HaltReason::StopOnError;
                        break;
                    }
                }
            }

            if self.lock_queue().is_empty() {
                break;
            }
            tokio::time::sleep(options.pacing_delay()).await;
        }

        summary.remaining = self.lock_queue().len();
        info!(
            "Batch finished ({:?}): {} sent, {} failed, {} remaining",
            summary.halted, summary.sent, summary.failed, summary.remaining
        );
        Ok(summary)
    }
}
