// =============================================================================
//  HTN Temporal Scheduler - Tick Loop
//  File: tick_loop.rs
//
//  Description:
//  The cooperative, non-blocking loop that owns all writes to the live
//  state. Intents arrive over one mpsc channel, job completions over
//  another; the loop drains both without ever blocking on I/O, and falls
//  back to a fixed-period tick when neither channel has anything waiting.
//  Dispatch itself runs on whatever worker the `Queue` implementation
//  chooses — the loop never waits on a dispatched job directly.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use crate::config::TemporalConfig;
use crate::error::TemporalResult;
use crate::intent::IntentEnvelope;
use crate::queue::JobCompleted;
use crate::scheduler::{CompletionOutcome, TemporalScheduler};
use htn_core::{Domain, PlannerOpts, SolutionTree, State};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;

/// Design target tick period: 1 ms.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1);

pub struct TickLoop {
    pub scheduler: TemporalScheduler,
    pub domain: Domain,
    pub tree: SolutionTree,
    pub state: State,
    pub opts: PlannerOpts,
    intents: mpsc::UnboundedReceiver<IntentEnvelope>,
    completions: mpsc::UnboundedReceiver<JobCompleted>,
    tick_period: Duration,
    now: f64,
}

impl TickLoop {
    pub fn new(
        scheduler: TemporalScheduler,
        domain: Domain,
        tree: SolutionTree,
        state: State,
        opts: PlannerOpts,
        intents: mpsc::UnboundedReceiver<IntentEnvelope>,
        completions: mpsc::UnboundedReceiver<JobCompleted>,
    ) -> Self {
        Self {
            scheduler,
            domain,
            tree,
            state,
            opts,
            intents,
            completions,
            tick_period: DEFAULT_TICK_PERIOD,
            now: 0.0,
        }
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// As `with_tick_period`, but taking the tick period out of a shared
    /// `TemporalConfig` so a caller only has one knob struct to thread
    /// through both the scheduler and the loop.
    pub fn with_config(self, config: TemporalConfig) -> Self {
        self.with_tick_period(config.tick_period())
    }

    /// Advances until both channels are closed (all senders dropped), or
    /// `max_ticks` heartbeats elapse with nothing left to do — whichever
    /// comes first. Returns the final live state for inspection.
    ///
    /// Real deployments run this unbounded inside a dedicated task; the
    /// `max_ticks` bound exists so tests and short-lived demos can drive
    /// the loop to quiescence without hanging. A closed channel's branch is
    /// disabled via a `select!` guard rather than left enabled — `recv()`
    /// on a closed channel resolves immediately, so an unguarded branch
    /// would win every `biased` poll and starve the other arms instead of
    /// ever letting the wildcard `else` fire.
    pub async fn run(mut self, max_ticks: u64) -> TemporalResult<State> {
        let mut intents_open = true;
        let mut completions_open = true;

        for _ in 0..max_ticks {
            if !intents_open && !completions_open {
                break;
            }

            tokio::select! {
                biased;

                maybe_envelope = self.intents.recv(), if intents_open => {
                    match maybe_envelope {
                        Some(envelope) => {
                            self.now = self.now.max(envelope.arrived_at);
                            debug!("intent arrived at t={}", self.now);
                            let tree = std::mem::replace(&mut self.tree, SolutionTree::new(vec![], State::new()));
                            self.tree = self
                                .scheduler
                                .handle_intent(&envelope.intent, self.now, &self.domain, tree, &mut self.state, self.opts)
                                .await?;
                        }
                        None => intents_open = false,
                    }
                }

                maybe_event = self.completions.recv(), if completions_open => {
                    match maybe_event {
                        Some(event) => {
                            debug!("job {:?} for timed action {} completed", event.job_id, event.timed_action_id);
                            match self.scheduler.on_completed(&self.domain, event.timed_action_id, &mut self.state) {
                                Ok(CompletionOutcome::Completed) => {}
                                Ok(CompletionOutcome::RetryScheduled) => {
                                    if let Err(e) = self.scheduler.dispatch(event.timed_action_id).await {
                                        warn!("failed to redispatch timed action {}: {e}", event.timed_action_id);
                                    }
                                }
                                Ok(CompletionOutcome::Rejected(reason)) | Ok(CompletionOutcome::Escalate(reason)) => {
                                    info!("timed action {} failed permanently: {reason}; replanning", event.timed_action_id);
                                    if let Some(node_id) = self.scheduler.get(event.timed_action_id).map(|a| a.node_id) {
                                        let tree = self.tree.clone();
                                        match htn_core::replan(&self.domain, self.state.clone(), tree, node_id, self.opts) {
                                            Ok(replanned) => self.tree = replanned,
                                            Err(e) => warn!("replan after timed action failure also failed: {e}"),
                                        }
                                    }
                                }
                                Err(e) => info!("timed action {} completion error: {e}", event.timed_action_id),
                            }
                        }
                        None => completions_open = false,
                    }
                }

                _ = tokio::time::sleep(self.tick_period) => {
                    self.now += self.tick_period.as_secs_f64();
                }
            }
        }
        Ok(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Intent;
    use crate::queue::TokioQueue;
    use htn_core::{ActionResult, Domain, NodeId, Todo, Value};
    use std::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn completion_event_applies_its_action_to_live_state() {
        let mut domain = Domain::new();
        domain.register_action("move", |state, args| {
            let mut s = state.clone();
            if let Some(to) = args.get(1) {
                s.set("location", "alex", to.clone());
            }
            ActionResult::Ok(s)
        });

        let (queue, completions) = TokioQueue::new(Instant::now());
        let mut scheduler = TemporalScheduler::new(queue);

        let state = State::new().with("location", "alex", Value::Pair(0.0, 0.0));
        let action = scheduler.assign(&state, NodeId(1), "alex", "move", vec![Value::Pair(0.0, 0.0), Value::Pair(1.0, 0.0)], vec![], 0.0);
        scheduler.dispatch(action.id).await.unwrap();

        let (_intent_tx, intent_rx) = mpsc::unbounded_channel::<IntentEnvelope>();
        let tree = SolutionTree::new(vec![Todo::action("move", vec![Value::Pair(0.0, 0.0), Value::Pair(1.0, 0.0)])], state.clone());

        let tick_loop = TickLoop::new(scheduler, domain, tree, state, PlannerOpts::default(), intent_rx, completions)
            .with_tick_period(Duration::from_millis(1));

        let final_state = tick_loop.run(50).await.unwrap();
        assert_eq!(final_state.get("location", "alex"), Some(&Value::Pair(1.0, 0.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_intent_cancels_and_captures_progress() {
        let domain = Domain::new();
        let (queue, completions) = TokioQueue::new(Instant::now());
        let mut scheduler = TemporalScheduler::new(queue);
        scheduler.register_duration("move", std::sync::Arc::new(|_s, _a| 2.0));

        let state = State::new().with("location", "alex", Value::Pair(2.0, 3.0));
        let action = scheduler.assign(&state, NodeId(1), "alex", "move", vec![Value::Pair(2.0, 3.0), Value::Pair(8.0, 3.0)], vec![], 10.0);
        scheduler.dispatch(action.id).await.unwrap();

        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        intent_tx
            .send(IntentEnvelope {
                intent: Intent::Interrupt { agent_id: "alex".to_string() },
                arrived_at: 11.0,
            })
            .unwrap();
        drop(intent_tx);

        let tree = SolutionTree::new(vec![], state.clone());
        let tick_loop = TickLoop::new(scheduler, domain, tree, state, PlannerOpts::default(), intent_rx, completions);

        let final_state = tick_loop.run(5).await.unwrap();
        assert_eq!(final_state.get("location", "alex"), Some(&Value::Pair(5.0, 3.0)));
    }
}
