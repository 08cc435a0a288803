// =============================================================================
//  HTN Planner Core - Error
//  File: error.rs
//
//  Description:
//  Tagged result type for every fallible core operation (spec §7). Domain
//  action/method functions stay on a plain `Result<_, String>` surface so a
//  third-party domain never has to depend on this enum directly; the
//  planner converts domain failures into the appropriate variant at the
//  boundary.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use thiserror::Error;

/// Error kinds enumerated by spec §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("no applicable method for task/goal `{0}`")]
    NoMethod(String),

    #[error("every method for `{0}` was tried and failed or is blacklisted")]
    AllMethodsExhausted(String),

    #[error("action `{action}` refused execution: {reason}")]
    ActionPreconditionFailed { action: String, reason: String },

    #[error("max-depth ({0}) reached before a complete solution tree was found")]
    DepthExceeded(u32),

    #[error("planning loop terminated without a complete solution tree")]
    IncompleteSolution,

    #[error("replan could not find an alternative at node `{0}`")]
    ReplanFailed(String),

    #[error("todo did not match any recognized shape: {0}")]
    InvalidTodo(String),
}

pub type PlanResult<T> = Result<T, PlanError>;
