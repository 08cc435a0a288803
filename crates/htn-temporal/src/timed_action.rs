// =============================================================================
//  HTN Temporal Scheduler - Timed Action
//  File: timed_action.rs
//
//  Description:
//  A durational, schedulable unit wrapping one of the planner's primitive
//  actions: start/end time, prerequisites, effects, and lifecycle status
//  (spec §3 "Timed Action"). Also carries the generic temporal-constraint
//  vocabulary (`before`/`after`/.../`cooldown`) though the scheduler only
//  ever emits sugared `before` constraints for prerequisites in this
//  implementation (spec §9: "implementations may represent prerequisites
//  as a sugared before constraint to reduce duplication").
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use htn_core::{NodeId, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type TimedActionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimedActionStatus {
    Scheduled,
    Executing,
    Completed,
    Cancelled,
    Rejected,
}

/// A single temporal effect: the fact this action's completion (or partial
/// progress, for cancellation capture) writes into the live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalEffect {
    pub predicate: String,
    pub subject: String,
    pub object: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    Before,
    After,
    During,
    Meets,
    Overlaps,
    Starts,
    Finishes,
    Equals,
    Deadline,
    Cooldown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalConstraint {
    pub kind: ConstraintKind,
    pub source_id: TimedActionId,
    pub target_id: Option<TimedActionId>,
    pub offset: Option<f64>,
    pub duration: Option<f64>,
    pub violation_penalty: Option<f64>,
}

impl TemporalConstraint {
    /// A prerequisite sugars to `before(source, target)` with no offset.
    pub fn before(source_id: TimedActionId, target_id: TimedActionId) -> Self {
        Self {
            kind: ConstraintKind::Before,
            source_id,
            target_id: Some(target_id),
            offset: None,
            duration: None,
            violation_penalty: None,
        }
    }

    pub fn cooldown(source_id: TimedActionId, duration: f64) -> Self {
        Self {
            kind: ConstraintKind::Cooldown,
            source_id,
            target_id: None,
            offset: None,
            duration: Some(duration),
            violation_penalty: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedAction {
    pub id: TimedActionId,
    pub agent_id: String,
    pub action_name: String,
    pub args: Vec<Value>,
    pub start_time: f64,
    pub duration: f64,
    pub end_time: f64,
    pub prerequisites: Vec<TimedActionId>,
    pub effects: Vec<TemporalEffect>,
    pub status: TimedActionStatus,
    /// The solution-tree node this timed action realizes, so a cancellation
    /// or rejection can hand the right node id to `htn_core::replan`.
    pub node_id: NodeId,
}

impl TimedAction {
    pub fn new(
        id: TimedActionId,
        agent_id: impl Into<String>,
        action_name: impl Into<String>,
        args: Vec<Value>,
        start_time: f64,
        duration: f64,
        prerequisites: Vec<TimedActionId>,
        node_id: NodeId,
    ) -> Self {
        Self {
            id,
            agent_id: agent_id.into(),
            action_name: action_name.into(),
            args,
            start_time,
            duration,
            end_time: start_time + duration,
            prerequisites,
            effects: Vec::new(),
            status: TimedActionStatus::Scheduled,
            node_id,
        }
    }

    /// Fraction of the action's duration elapsed at `now`, clamped to
    /// [0, 1]. Used both to decide whether an action has completed and to
    /// interpolate its in-progress effects on cancellation (spec §4.6
    /// "Cancellation / intent arrival").
    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0)
    }

    pub fn has_completed(&self, now: f64) -> bool {
        now >= self.end_time
    }
}

/// A duration function: seconds to complete `action_name` from `state` with
/// `args` (spec §4.6 "duration(state, args)").
pub type DurationFn = Arc<dyn Fn(&htn_core::State, &[Value]) -> f64 + Send + Sync>;

/// Linear interpolation between two 2D points, used for movement effects
/// whose progress must be captured exactly at a cancellation instant.
pub fn lerp_pair(from: (f64, f64), to: (f64, f64), progress: f64) -> (f64, f64) {
    (
        from.0 + (to.0 - from.0) * progress,
        from.1 + (to.1 - from.1) * progress,
    )
}
