// =============================================================================
//  HTN Planner Core - Planner (IPyHOP-style plan/replan)
//  File: planner.rs
//
//  Description:
//  Builds and refines a solution tree: the IPyHOP expansion loop, per-kind
//  expansion rules for Task/Goal/Multigoal/Action todos, backtracking to
//  the nearest ancestor with an untried method, and re-entrant Replan from
//  an interior failure point.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use crate::domain::{Domain, MethodResult};
use crate::error::{PlanError, PlanResult};
use crate::multigoal::Multigoal;
use crate::opts::PlannerOpts;
use crate::state::State;
use crate::todo::Todo;
use crate::tree::{NodeId, NodeTodo, SolutionTree};
use log::{debug, warn};

/// Stable pseudo-method id for the multigoal fallback path, which emits
/// each unsatisfied goal as an individual child node. Treating the
/// fallback as just another blacklistable "method" keeps backtracking
/// uniform and prevents an infinite loop when even the fallback's children
/// keep failing.
const MULTIGOAL_FALLBACK_ID: &str = "__multigoal_fallback__";

/// Why a single expansion attempt failed. Distinct from `PlanError`: this
/// is the *local* reason at one node, consumed by `backtrack`/`replan`;
/// `PlanError` is what finally surfaces to the caller once backtracking is
/// exhausted.
#[derive(Debug, Clone)]
enum ExpandError {
    NoMethod(String),
    AllExhausted(String),
    Failed(String),
}

impl std::fmt::Display for ExpandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpandError::NoMethod(n) => write!(f, "no method for `{n}`"),
            ExpandError::AllExhausted(n) => write!(f, "methods exhausted for `{n}`"),
            ExpandError::Failed(r) => write!(f, "{r}"),
        }
    }
}

/// Entry point: builds a root node from `todos` and runs the IPyHOP loop
/// to completion or failure.
pub fn plan(domain: &Domain, state: State, todos: Vec<Todo>, opts: PlannerOpts) -> PlanResult<SolutionTree> {
    let mut tree = SolutionTree::new(todos, state);
    run_ipyhop_loop(domain, &mut tree, opts)?;
    Ok(tree)
}

/// Re-entrant replan from an interior failure point.
pub fn replan(
    domain: &Domain,
    current_state: State,
    mut tree: SolutionTree,
    failed_node: NodeId,
    opts: PlannerOpts,
) -> PlanResult<SolutionTree> {
    replan_in_place(domain, &mut tree, current_state, failed_node, opts)?;
    Ok(tree)
}

pub(crate) fn replan_in_place(
    domain: &Domain,
    tree: &mut SolutionTree,
    current_state: State,
    failed_node: NodeId,
    opts: PlannerOpts,
) -> PlanResult<()> {
    let responsible = find_responsible_node(tree, failed_node)
        .ok_or_else(|| PlanError::ReplanFailed(format!("no responsible task/goal ancestor of {failed_node:?}")))?;

    warn!("replanning from responsible node {responsible:?}");

    // Step 2: refresh the cached state on the node we're about to re-expand
    // with the live state observed at failure time. A richer implementation
    // could re-propagate through unaffected siblings; this minimal update
    // is sufficient since the node is about to be fully re-expanded anyway.
    if let Some(node) = tree.get_mut(responsible) {
        node.cached_state = current_state;
    }

    // Step 3: reset the responsible node, blacklisting its current method.
    tree.reset_node(responsible, None);

    // Step 4: re-run the loop. Everything else in the tree is already
    // expanded or primitive, so the loop picks up exactly at `responsible`.
    run_ipyhop_loop(domain, tree, opts).map_err(|e| match e {
        PlanError::IncompleteSolution | PlanError::AllMethodsExhausted(_) | PlanError::NoMethod(_) => {
            PlanError::ReplanFailed(format!("{e}"))
        }
        other => other,
    })
}

/// Nearest ancestor of `start` (walking from its parent upward) whose todo
/// is a compound task or a goal — skipping actions, multigoals, and the
/// synthetic root.
fn find_responsible_node(tree: &SolutionTree, start: NodeId) -> Option<NodeId> {
    let mut current = tree.parent_of(start);
    while let Some(id) = current {
        if id == tree.root {
            return None;
        }
        if let Some(node) = tree.get(id) {
            if matches!(node.todo, NodeTodo::Single(Todo::Task { .. }) | NodeTodo::Single(Todo::Goal { .. })) {
                return Some(id);
            }
        }
        current = tree.parent_of(id);
    }
    None
}

fn run_ipyhop_loop(domain: &Domain, tree: &mut SolutionTree, opts: PlannerOpts) -> PlanResult<()> {
    let mut iterations: u32 = 0;
    loop {
        let Some(id) = tree.next_unexpanded() else {
            return if tree.is_complete() {
                Ok(())
            } else {
                Err(PlanError::IncompleteSolution)
            };
        };

        iterations += 1;
        if iterations > opts.max_depth {
            return Err(PlanError::DepthExceeded(opts.max_depth));
        }

        if opts.verbose > 0 {
            debug!("expanding {id:?}");
        }

        match expand_node(domain, tree, id) {
            Ok(()) => continue,
            Err(reason) => {
                warn!("expansion of {id:?} failed: {reason}; backtracking");
                backtrack(domain, tree, id)?;
            }
        }
    }
}

/// Walk up from `failed`, resetting every task/goal/multigoal node along
/// the way, until one is found that still has an untried method after the
/// reset — at which point the loop resumes there. If the walk reaches the
/// root without finding one, planning has genuinely failed.
fn backtrack(domain: &Domain, tree: &mut SolutionTree, failed: NodeId) -> PlanResult<()> {
    let mut current = Some(failed);
    while let Some(id) = current {
        let is_candidate = tree.get(id).map(|n| n.is_task_or_goal()).unwrap_or(false);
        if is_candidate {
            tree.reset_node(id, None);
            if alternatives_remaining(domain, tree, id) {
                return Ok(());
            }
        }
        current = tree.parent_of(id);
    }
    Err(PlanError::AllMethodsExhausted("no backtrack target had an untried method".to_string()))
}

fn alternatives_remaining(domain: &Domain, tree: &SolutionTree, id: NodeId) -> bool {
    let Some(node) = tree.get(id) else { return false };
    match &node.todo {
        NodeTodo::Single(Todo::Task { name, .. }) => domain
            .get_task_methods(name)
            .iter()
            .any(|m| !node.blacklisted_methods.contains(&m.id)),
        NodeTodo::Single(Todo::Goal { predicate, .. }) => domain
            .get_unigoal_methods(predicate)
            .iter()
            .any(|m| !node.blacklisted_methods.contains(&m.id)),
        NodeTodo::Single(Todo::Multigoal(_)) => {
            domain.get_multigoal_methods().iter().any(|m| !node.blacklisted_methods.contains(&m.id))
                || !node.blacklisted_methods.contains(MULTIGOAL_FALLBACK_ID)
        }
        _ => false,
    }
}

fn expand_node(domain: &Domain, tree: &mut SolutionTree, id: NodeId) -> Result<(), ExpandError> {
    let todo = tree
        .get(id)
        .map(|n| n.todo.clone())
        .ok_or_else(|| ExpandError::Failed(format!("node {id:?} vanished before expansion")))?;

    match todo {
        NodeTodo::Root(todos) => {
            expand_root(tree, id, todos);
            Ok(())
        }
        NodeTodo::Single(Todo::Task { name, args }) => expand_task(domain, tree, id, &name, &args),
        NodeTodo::Single(Todo::Goal { predicate, subject, object }) => {
            expand_goal(domain, tree, id, &predicate, &subject, &object)
        }
        NodeTodo::Single(Todo::Multigoal(mg)) => expand_multigoal(domain, tree, id, mg),
        NodeTodo::Single(Todo::Action { .. }) => {
            unreachable!("primitive nodes are filtered out of next_unexpanded and never reach expand_node")
        }
    }
}

fn expand_root(tree: &mut SolutionTree, id: NodeId, todos: Vec<Todo>) {
    let state = tree.get(id).map(|n| n.cached_state.clone()).unwrap_or_default();
    for todo in todos {
        let is_action = todo.is_action();
        let child_id = tree.add_child(id, todo, state.clone());
        // expand_root never executes actions, so an action child must be
        // marked expanded here or it would never be marked at all.
        if is_action {
            if let Some(n) = tree.get_mut(child_id) {
                n.expanded = true;
            }
        }
    }
    if let Some(n) = tree.get_mut(id) {
        n.expanded = true;
    }
}

fn expand_task(domain: &Domain, tree: &mut SolutionTree, id: NodeId, name: &str, args: &[crate::state::Value]) -> Result<(), ExpandError> {
    let node = tree.get(id).expect("node must exist");
    let blacklist = node.blacklisted_methods.clone();
    let state = node.cached_state.clone();

    let methods = domain.get_task_methods(name);
    if methods.is_empty() {
        return Err(ExpandError::NoMethod(name.to_string()));
    }
    let Some(method) = methods.iter().find(|m| !blacklist.contains(&m.id)) else {
        return Err(ExpandError::AllExhausted(name.to_string()));
    };
    let method_id = method.id.clone();
    tree.get_mut(id).unwrap().method_tried = Some(method_id.clone());

    match (method.func)(&state, args) {
        MethodResult::Inapplicable(reason) => Err(ExpandError::Failed(format!("method `{method_id}`: {reason}"))),
        MethodResult::Applicable(todos) => {
            expand_children(domain, tree, id, todos, state)?;
            tree.get_mut(id).unwrap().expanded = true;
            Ok(())
        }
    }
}

fn expand_goal(
    domain: &Domain,
    tree: &mut SolutionTree,
    id: NodeId,
    predicate: &str,
    subject: &str,
    object: &crate::state::Value,
) -> Result<(), ExpandError> {
    let node = tree.get(id).expect("node must exist");
    let state = node.cached_state.clone();

    if state.get(predicate, subject) == Some(object) {
        let n = tree.get_mut(id).unwrap();
        n.is_primitive = true;
        n.expanded = true;
        return Ok(());
    }

    let blacklist = node.blacklisted_methods.clone();
    let methods = domain.get_unigoal_methods(predicate);
    if methods.is_empty() {
        return Err(ExpandError::NoMethod(predicate.to_string()));
    }
    let Some(method) = methods.iter().find(|m| !blacklist.contains(&m.id)) else {
        return Err(ExpandError::AllExhausted(predicate.to_string()));
    };
    let method_id = method.id.clone();
    tree.get_mut(id).unwrap().method_tried = Some(method_id.clone());

    match (method.func)(&state, subject, object) {
        MethodResult::Inapplicable(reason) => Err(ExpandError::Failed(format!("method `{method_id}`: {reason}"))),
        MethodResult::Applicable(todos) => {
            if todos.len() == 1 && matches!(todos[0], Todo::Multigoal(_)) {
                // Promotion: the method decided this goal is better handled
                // as a multigoal. Replace this node's todo in place and let
                // the next loop iteration expand it as a multigoal (spec
                // §4.3 Goal: "A method may alternatively return a multigoal,
                // promoting the node to multigoal expansion").
                if let Some(Todo::Multigoal(mg)) = todos.into_iter().next() {
                    let n = tree.get_mut(id).unwrap();
                    n.todo = NodeTodo::Single(Todo::Multigoal(mg));
                    n.method_tried = None;
                    n.expanded = false;
                }
                Ok(())
            } else {
                expand_children(domain, tree, id, todos, state)?;
                tree.get_mut(id).unwrap().expanded = true;
                Ok(())
            }
        }
    }
}

fn expand_multigoal(domain: &Domain, tree: &mut SolutionTree, id: NodeId, mg: Multigoal) -> Result<(), ExpandError> {
    let node = tree.get(id).expect("node must exist");
    let state = node.cached_state.clone();

    if mg.is_satisfied(&state) {
        let n = tree.get_mut(id).unwrap();
        n.is_primitive = true;
        n.expanded = true;
        return Ok(());
    }

    let blacklist = node.blacklisted_methods.clone();
    for method in domain.get_multigoal_methods() {
        if blacklist.contains(&method.id) {
            continue;
        }
        if let MethodResult::Applicable(todos) = (method.func)(&state, &mg) {
            tree.get_mut(id).unwrap().method_tried = Some(method.id.clone());
            expand_children(domain, tree, id, todos, state)?;
            tree.get_mut(id).unwrap().expanded = true;
            return Ok(());
        }
    }

    if blacklist.contains(MULTIGOAL_FALLBACK_ID) {
        return Err(ExpandError::AllExhausted(mg.name.clone()));
    }
    tree.get_mut(id).unwrap().method_tried = Some(MULTIGOAL_FALLBACK_ID.to_string());
    let todos: Vec<Todo> = mg
        .unsatisfied(&state)
        .into_iter()
        .map(|g| Todo::goal(g.predicate.clone(), g.subject.clone(), g.object.clone()))
        .collect();
    expand_children(domain, tree, id, todos, state)?;
    tree.get_mut(id).unwrap().expanded = true;
    Ok(())
}

/// Creates one child per `todo`, executing each primitive child's action
/// immediately against `running_state` so later non-primitive siblings in
/// this same expansion see post-action state.
fn expand_children(domain: &Domain, tree: &mut SolutionTree, parent: NodeId, todos: Vec<Todo>, mut running_state: State) -> Result<(), ExpandError> {
    for todo in todos {
        let child_state = running_state.clone();
        let is_action = todo.is_action();
        let (action_name, action_args) = match &todo {
            Todo::Action { name, args } => (Some(name.clone()), args.clone()),
            _ => (None, Vec::new()),
        };
        let child_id = tree.add_child(parent, todo, child_state);

        if is_action {
            let name = action_name.expect("action todo carries a name");
            if tree.blacklisted_commands.contains(&crate::tree::command_key(&name, &action_args)) {
                // The executor already watched this exact (action, args) pair
                // fail at runtime once. Refuse it here too, so replanning is
                // forced to pick a different method instead of proposing the
                // same doomed command again.
                return Err(ExpandError::Failed(format!("action `{name}` is blacklisted after a prior execution failure")));
            }
            match domain.execute_action(&running_state, &name, &action_args) {
                Err(missing) => return Err(ExpandError::NoMethod(missing)),
                Ok(crate::domain::ActionResult::Failure(reason)) => {
                    return Err(ExpandError::Failed(format!("action `{name}` refused: {reason}")));
                }
                Ok(crate::domain::ActionResult::Ok(new_state)) => {
                    running_state = new_state.clone();
                    if let Some(n) = tree.get_mut(child_id) {
                        n.cached_state = new_state;
                        n.expanded = true;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Dry-run: re-applies every primitive action in the completed tree against
/// `initial_state`, without mutating the tree, and returns the resulting
/// state.
pub fn validate_plan(domain: &Domain, initial_state: &State, tree: &SolutionTree) -> PlanResult<State> {
    let mut state = initial_state.clone();
    for (_, name, args) in tree.extract_actions() {
        match domain.execute_action(&state, &name, &args) {
            Err(_) => {
                return Err(PlanError::ActionPreconditionFailed {
                    action: name,
                    reason: "action not found in domain".to_string(),
                })
            }
            Ok(crate::domain::ActionResult::Failure(reason)) => {
                return Err(PlanError::ActionPreconditionFailed { action: name, reason })
            }
            Ok(crate::domain::ActionResult::Ok(new_state)) => state = new_state,
        }
    }
    Ok(state)
}

/// Aggregate counts over a solution tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub expanded_nodes: usize,
    pub primitive_actions: usize,
    pub max_depth: usize,
}

pub fn tree_stats(tree: &SolutionTree) -> TreeStats {
    TreeStats {
        total_nodes: tree.total_nodes(),
        expanded_nodes: tree.expanded_nodes(),
        primitive_actions: tree.primitive_actions(),
        max_depth: tree.max_depth(),
    }
}

pub fn plan_cost(tree: &SolutionTree) -> usize {
    tree.primitive_actions()
}
