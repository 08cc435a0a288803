// =============================================================================
//  HTN Temporal Scheduler - Intent
//  File: intent.rs
//
//  Description:
//  Instantaneous, zero-duration commands that mutate the plan rather than
//  the world. Delivered into the tick loop as messages, not scheduled
//  through the job queue the way durational actions are.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use crate::timed_action::TimedActionId;
use htn_core::Todo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Intent {
    /// Cancel every in-flight action for an agent and force a replan from
    /// wherever execution currently stands.
    Interrupt { agent_id: String },
    /// Replace the agent's current goal with a new todo list, cancelling
    /// whatever is in flight for it first.
    ChangeGoal { agent_id: String, todos: Vec<Todo> },
    /// Cancel one specific timed action by id.
    CancelAction { id: TimedActionId },
    /// Cancel everything, for every agent, immediately.
    EmergencyStop,
    /// Force a replan without cancelling anything in flight.
    Replan { agent_id: String },
}

impl Intent {
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Intent::Interrupt { agent_id } | Intent::ChangeGoal { agent_id, .. } | Intent::Replan { agent_id } => {
                Some(agent_id.as_str())
            }
            Intent::CancelAction { .. } | Intent::EmergencyStop => None,
        }
    }
}

/// An intent tagged with its arrival time, as delivered into the tick loop.
#[derive(Debug, Clone)]
pub struct IntentEnvelope {
    pub intent: Intent,
    pub arrived_at: f64,
}
