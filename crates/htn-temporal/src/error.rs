// =============================================================================
//  HTN Temporal Scheduler - Error
//  File: error.rs
//
//  Description:
//  Tagged result type for the scheduling layer, separate from
//  `htn_core::PlanError` since most temporal failures (rejected dispatch,
//  unknown job, unknown target action) have nothing to do with planning.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemporalError {
    #[error("no scheduled job with id `{0}`")]
    JobNotFound(String),

    #[error("action `{action}` rejected at dispatch: {reason}")]
    Rejected { action: String, reason: String },

    #[error("no scheduled action matches target `{0}` for this intent")]
    NoSuchAction(String),

    #[error("planning failed during temporal replan: {0}")]
    Plan(#[from] htn_core::PlanError),
}

pub type TemporalResult<T> = Result<T, TemporalError>;
