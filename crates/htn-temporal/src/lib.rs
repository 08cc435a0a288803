// =============================================================================
//  HTN Temporal Scheduler
//  File: lib.rs
//
//  Description:
//  Wall-clock scheduling layer over `htn-core`: timed actions with
//  durations, prerequisites and cooldowns, dispatch through an external
//  job-queue interface, intents as instantaneous plan-mutating messages,
//  goal prioritization, and a non-blocking tick loop that owns every write
//  to the live state.
//
//  Author:      Alex Roussinov
//  Created:     2025-12-23
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

pub mod config;
pub mod error;
pub mod goal_priority;
pub mod intent;
pub mod queue;
pub mod scheduler;
pub mod tick_loop;
pub mod timed_action;

pub use config::TemporalConfig;
pub use error::{TemporalError, TemporalResult};
pub use goal_priority::{CustomComparator, GoalId, GoalQueue, PriorityStrategy, ScheduledGoal};
pub use intent::{Intent, IntentEnvelope};
pub use queue::{JobCompleted, JobId, Queue, TokioQueue};
pub use scheduler::{CompletionOutcome, TemporalScheduler};
pub use tick_loop::{TickLoop, DEFAULT_TICK_PERIOD};
pub use timed_action::{
    lerp_pair, ConstraintKind, DurationFn, TemporalConstraint, TemporalEffect, TimedAction, TimedActionId,
    TimedActionStatus,
};
