// =============================================================================
//  HTN Planner Core
//  File: lib.rs
//
//  Description:
//  Re-entrant hierarchical task network planner: flat triple-store state,
//  a composable domain of actions/methods, a solution tree addressed by
//  opaque node ids, an IPyHOP-style plan/replan loop, and a Run-Lazy-
//  Refineahead executor. See each module for the piece of the design it
//  owns.
//
//  Author:      Alex Roussinov
//  Created:     2025-12-23
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

pub mod domain;
pub mod error;
pub mod executor;
pub mod multigoal;
pub mod opts;
pub mod planner;
pub mod state;
pub mod todo;
pub mod tree;

pub use domain::{ActionResult, Domain, MethodResult};
pub use error::{PlanError, PlanResult};
pub use executor::{execute, ExecutionOutcome};
pub use multigoal::{GoalTriple, Multigoal};
pub use opts::{LogLevel, PlannerOpts};
pub use planner::{plan, plan_cost, replan, tree_stats, validate_plan, TreeStats};
pub use state::{Fact, FactKey, State, TemporalState, Value};
pub use todo::Todo;
pub use tree::{command_key, NodeId, NodeTodo, SolutionNode, SolutionTree};
