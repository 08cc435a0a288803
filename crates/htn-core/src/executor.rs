// =============================================================================
//  HTN Planner Core - Executor
//  File: executor.rs
//
//  Description:
//  Run-Lazy-Refineahead execution: walk the solution tree's primitive
//  actions in depth-first order, running each against the live (possibly
//  exogenously-changed) state. A runtime failure blacklists the offending
//  command and replans from the point of failure rather than discarding
//  the whole tree, so execution proceeds step at a time rather than as a
//  single batch "run the plan" call.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use crate::domain::{ActionResult, Domain};
use crate::error::{PlanError, PlanResult};
use crate::opts::PlannerOpts;
use crate::planner::replan_in_place;
use crate::state::State;
use crate::tree::{command_key, NodeId, SolutionTree};
use log::{info, warn};
use std::collections::HashSet;

/// The result of driving a solution tree to completion (or as far as it
/// could go before planning itself gave up). Both variants carry the tree
/// back to the caller for inspection — only a genuinely unexpected
/// condition (an action id the domain no longer recognizes) is a hard
/// `Err`.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Completed {
        tree: SolutionTree,
        final_state: State,
        actions_executed: usize,
    },
    Failed {
        tree: SolutionTree,
        final_state: State,
        reason: PlanError,
    },
}

/// Drives `tree`'s primitive actions to completion against `initial_state`,
/// replanning in place on runtime failure.
///
/// Progress is tracked by the *set* of node ids already applied to `state`,
/// not by a raw index into `tree.extract_actions()`. Replan resets the
/// responsible task/goal node exactly as backtracking does, which drops
/// that node's entire subtree — including any sibling actions that had
/// already executed successfully under the same method. An index-based
/// cursor would then misread the shrunken, re-expanded action list and
/// silently skip the next action to run; searching by node id instead finds
/// the correct one regardless of how replan reshaped the tree, while still
/// guaranteeing that already-completed actions are never re-run.
pub fn execute(domain: &Domain, mut tree: SolutionTree, initial_state: State, opts: PlannerOpts) -> PlanResult<ExecutionOutcome> {
    let mut state = initial_state;
    let mut executed_ids: HashSet<NodeId> = HashSet::new();

    loop {
        let actions = tree.extract_actions();
        let Some((node_id, name, args)) = actions.iter().find(|(id, _, _)| !executed_ids.contains(id)).cloned() else {
            return Ok(ExecutionOutcome::Completed {
                tree,
                final_state: state,
                actions_executed: executed_ids.len(),
            });
        };

        match domain.execute_action(&state, &name, &args) {
            Ok(ActionResult::Ok(new_state)) => {
                info!("executed `{name}` ({}/{})", executed_ids.len() + 1, actions.len());
                state = new_state;
                executed_ids.insert(node_id);
            }
            Ok(ActionResult::Failure(reason)) => {
                warn!("action `{name}` failed at runtime: {reason}; replanning");
                tree.blacklisted_commands.insert(command_key(&name, &args));
                match replan_in_place(domain, &mut tree, state.clone(), node_id, opts) {
                    Ok(()) => continue,
                    Err(e) => {
                        return Ok(ExecutionOutcome::Failed {
                            tree,
                            final_state: state,
                            reason: e,
                        })
                    }
                }
            }
            Err(_missing) => {
                return Err(PlanError::ActionPreconditionFailed {
                    action: name,
                    reason: "action no longer registered in this domain".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::planner::plan;
    use crate::state::Value;
    use crate::todo::Todo;

    #[test]
    fn completes_a_plan_with_no_runtime_surprises() {
        let mut domain = Domain::new();
        domain.register_action("move", |state, args| {
            let mut s = state.clone();
            if let Some(Value::Text(to)) = args.get(1) {
                s.set("location", "robot", Value::Text(to.clone()));
            }
            ActionResult::Ok(s)
        });

        let state = State::new().with("location", "robot", Value::Text("A".into()));
        let todos = vec![Todo::action("move", vec![Value::Text("A".into()), Value::Text("B".into())])];

        let tree = plan(&domain, state.clone(), todos, PlannerOpts::default()).unwrap();
        let outcome = execute(&domain, tree, state, PlannerOpts::default()).unwrap();

        match outcome {
            ExecutionOutcome::Completed { final_state, actions_executed, .. } => {
                assert_eq!(actions_executed, 1);
                assert_eq!(final_state.get("location", "robot"), Some(&Value::Text("B".into())));
            }
            ExecutionOutcome::Failed { reason, .. } => panic!("unexpected failure: {reason}"),
        }
    }

    #[test]
    fn executes_through_a_plan_that_already_backtracked_past_a_bad_method() {
        // "go_direct" always fails, so the planner itself backtracks past
        // the "direct" method before `plan` ever returns (since a primitive
        // child of a task method is probed immediately during expansion).
        // This exercises the executor's happy path against a tree that
        // already reflects a method choice, not a runtime-triggered replan
        // (see tests/scenarios.rs for the runtime-failure case).
        let mut domain = Domain::new();
        domain.register_action("go_direct", |_s, _a| ActionResult::Failure("door jammed".into()));
        domain.register_action("go_around", |state, _a| {
            let mut s = state.clone();
            s.set("location", "robot", Value::Text("B".into()));
            ActionResult::Ok(s)
        });
        domain.register_task_method("travel", "direct", |_s, _a| {
            crate::domain::MethodResult::ok(vec![Todo::action("go_direct", vec![])])
        });
        domain.register_task_method("travel", "around", |_s, _a| {
            crate::domain::MethodResult::ok(vec![Todo::action("go_around", vec![])])
        });

        let state = State::new().with("location", "robot", Value::Text("A".into()));
        let todos = vec![Todo::task("travel", vec![])];

        let tree = plan(&domain, state.clone(), todos, PlannerOpts::default()).unwrap();
        let outcome = execute(&domain, tree, state, PlannerOpts::default()).unwrap();

        match outcome {
            ExecutionOutcome::Completed { final_state, .. } => {
                assert_eq!(final_state.get("location", "robot"), Some(&Value::Text("B".into())));
            }
            ExecutionOutcome::Failed { reason, .. } => panic!("unexpected failure: {reason}"),
        }
    }
}
