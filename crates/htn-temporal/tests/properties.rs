// =============================================================================
//  HTN Temporal Scheduler - Property Tests
//  File: tests/properties.rs
//
//  Description:
//  Property-based coverage of the queue adapter's cancellation semantics
//  (spec §4.6 "Idempotency requirement", Design Notes "Cancellation
//  semantics"): repeated `cancel` calls are a no-op past the first, and the
//  interpolated position captured on cancellation always lies on the
//  segment between a move's endpoints.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use htn_core::{NodeId, State, Value};
use htn_temporal::{TemporalScheduler, TimedActionStatus, TokioQueue};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Instant;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(fut)
}

proptest! {
    /// Cancelling the same timed action any number of times beyond the
    /// first leaves its status and the live state unchanged.
    #[test]
    fn repeated_cancel_is_idempotent(extra_cancels in 0usize..8, cancel_at in 0.0f64..5.0) {
        block_on(async {
            let (queue, _rx) = TokioQueue::new(Instant::now());
            let mut scheduler = TemporalScheduler::new(queue);
            scheduler.register_duration("move", Arc::new(|_s, _a| 4.0));

            let mut state = State::new().with("location", "alex", Value::Pair(0.0, 0.0));
            let action = scheduler.assign(&state, NodeId(1), "alex", "move", vec![Value::Pair(0.0, 0.0), Value::Pair(4.0, 0.0)], vec![], 0.0);
            scheduler.dispatch(action.id).await.unwrap();

            scheduler.cancel(action.id, cancel_at, &mut state).await.unwrap();
            let state_after_first = state.clone();

            for _ in 0..extra_cancels {
                scheduler.cancel(action.id, cancel_at, &mut state).await.unwrap();
            }

            prop_assert_eq!(state.get("location", "alex"), state_after_first.get("location", "alex"));
            prop_assert_eq!(scheduler.get(action.id).unwrap().status, TimedActionStatus::Cancelled);
            Ok(())
        })?;
    }

    /// Cancelling a move at any progress fraction always captures a
    /// position between its start and end, inclusive.
    #[test]
    fn cancellation_interpolates_within_segment_bounds(cancel_at in 0.0f64..8.0) {
        block_on(async {
            let (queue, _rx) = TokioQueue::new(Instant::now());
            let mut scheduler = TemporalScheduler::new(queue);
            scheduler.register_duration("move", Arc::new(|_s, _a| 4.0));

            let mut state = State::new().with("location", "alex", Value::Pair(0.0, 0.0));
            let action = scheduler.assign(&state, NodeId(1), "alex", "move", vec![Value::Pair(0.0, 0.0), Value::Pair(4.0, 0.0)], vec![], 0.0);
            scheduler.dispatch(action.id).await.unwrap();
            scheduler.cancel(action.id, cancel_at, &mut state).await.unwrap();

            if let Some(Value::Pair(x, y)) = state.get("location", "alex") {
                prop_assert!(*x >= 0.0 && *x <= 4.0);
                prop_assert_eq!(*y, 0.0);
            }
            Ok(())
        })?;
    }
}
