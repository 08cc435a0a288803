// =============================================================================
//  HTN Planner Core - Todo
//  File: todo.rs
//
//  Description:
//  The tagged union of things a solution-tree node can stand for: a
//  decomposable Task, an atomic Goal, a primitive Action, or a Multigoal.
//  Expansion dispatches on this in a single switch.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use crate::multigoal::Multigoal;
use crate::state::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Todo {
    /// A compound, decomposable task: (task-name, arguments).
    Task { name: String, args: Vec<Value> },
    /// An atomic state assertion: (predicate, subject, object).
    Goal {
        predicate: String,
        subject: String,
        object: Value,
    },
    /// A primitive, directly executable action: (action-name, arguments).
    Action { name: String, args: Vec<Value> },
    /// A conjunction of goals.
    Multigoal(Multigoal),
}

impl Todo {
    pub fn task(name: impl Into<String>, args: Vec<Value>) -> Self {
        Todo::Task { name: name.into(), args }
    }

    pub fn goal(predicate: impl Into<String>, subject: impl Into<String>, object: Value) -> Self {
        Todo::Goal {
            predicate: predicate.into(),
            subject: subject.into(),
            object,
        }
    }

    pub fn action(name: impl Into<String>, args: Vec<Value>) -> Self {
        Todo::Action { name: name.into(), args }
    }

    pub fn is_action(&self) -> bool {
        matches!(self, Todo::Action { .. })
    }

    /// A short, stable label for logging and for the blacklisted-commands
    /// set keyed on (action-name, args).
    pub fn label(&self) -> String {
        match self {
            Todo::Task { name, args } => format!("task:{name}{args:?}"),
            Todo::Goal {
                predicate,
                subject,
                object,
            } => format!("goal:({predicate} {subject} {object})"),
            Todo::Action { name, args } => format!("action:{name}{args:?}"),
            Todo::Multigoal(mg) => format!("multigoal:{}", mg.name),
        }
    }
}
