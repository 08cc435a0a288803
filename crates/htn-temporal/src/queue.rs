// =============================================================================
//  HTN Temporal Scheduler - Queue
//  File: queue.rs
//
//  Description:
//  The external job-queue interface the scheduler dispatches timed actions
//  through. Defined as an `async_trait` so a caller can swap in a
//  distributed queue without the scheduler knowing the difference.
//
//  `TokioQueue` is the reference implementation: one worker task per
//  scheduled action, using `tokio::time::sleep_until` to wait out the start
//  delay and posting completion back to the tick loop over an mpsc channel
//  rather than mutating any shared state directly, so writes to the live
//  state stay serialized by the loop.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use crate::error::{TemporalError, TemporalResult};
use crate::timed_action::{TimedAction, TimedActionId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

/// Posted by a queue worker once its action's wall-clock window elapses.
/// The tick loop is the only consumer, so this is the sole path by which a
/// worker's completion is folded into the live state.
#[derive(Debug, Clone)]
pub struct JobCompleted {
    pub job_id: JobId,
    pub timed_action_id: TimedActionId,
}

#[async_trait]
pub trait Queue: Send + Sync {
    async fn schedule(&self, action: TimedAction, at: f64) -> TemporalResult<JobId>;
    async fn cancel(&self, job: JobId) -> TemporalResult<()>;
}

struct Job {
    handle: JoinHandle<()>,
    timed_action_id: TimedActionId,
}

/// Reference `Queue` backed by `tokio::spawn` workers. `epoch` anchors the
/// scheduler's abstract seconds-since-start clock to a real `Instant`, so
/// `at` (an abstract time, as used throughout `htn-temporal`) converts to a
/// real sleep duration.
pub struct TokioQueue {
    epoch: Instant,
    jobs: Mutex<HashMap<JobId, Job>>,
    next_id: std::sync::atomic::AtomicU64,
    completions: mpsc::UnboundedSender<JobCompleted>,
}

impl TokioQueue {
    pub fn new(epoch: Instant) -> (Arc<Self>, mpsc::UnboundedReceiver<JobCompleted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                epoch,
                jobs: Mutex::new(HashMap::new()),
                next_id: std::sync::atomic::AtomicU64::new(1),
                completions: tx,
            }),
            rx,
        )
    }

    fn real_instant_for(&self, abstract_seconds: f64) -> Instant {
        self.epoch + Duration::from_secs_f64(abstract_seconds.max(0.0))
    }
}

#[async_trait]
impl Queue for TokioQueue {
    async fn schedule(&self, action: TimedAction, at: f64) -> TemporalResult<JobId> {
        let job_id = JobId(self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst));
        let timed_action_id = action.id;
        let deadline = self.real_instant_for(at);
        let completions = self.completions.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            let _ = completions.send(JobCompleted { job_id, timed_action_id });
        });

        self.jobs.lock().await.insert(job_id, Job { handle, timed_action_id });
        Ok(job_id)
    }

    async fn cancel(&self, job: JobId) -> TemporalResult<()> {
        let mut jobs = self.jobs.lock().await;
        match jobs.remove(&job) {
            Some(j) => {
                j.handle.abort();
                Ok(())
            }
            None => Err(TemporalError::JobNotFound(format!("{job:?}"))),
        }
    }
}
