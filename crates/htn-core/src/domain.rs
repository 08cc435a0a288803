// =============================================================================
//  HTN Planner Core - Domain
//  File: domain.rs
//
//  Description:
//  Capability registry: primitive actions, task-decomposition methods,
//  unigoal methods, multigoal methods. A Domain is immutable once handed
//  to the planner for a plan/execute cycle; registration is append-only
//  while it is being built.
//
//  Methods are registered as named, boxed functions rather than bare
//  closures so that a method's blacklist membership can be checked by a
//  stable string identifier instead of by closure identity.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use crate::multigoal::Multigoal;
use crate::state::{State, Value};
use crate::todo::Todo;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of invoking a method. `Inapplicable` is an explicit failure
/// carrying a reason — never conflated with `Applicable(vec![])`, which is
/// a valid trivial decomposition.
#[derive(Debug, Clone)]
pub enum MethodResult {
    Applicable(Vec<Todo>),
    Inapplicable(String),
}

impl MethodResult {
    pub fn ok(todos: Vec<Todo>) -> Self {
        MethodResult::Applicable(todos)
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        MethodResult::Inapplicable(reason.into())
    }
}

/// Outcome of invoking an action.
#[derive(Debug, Clone)]
pub enum ActionResult {
    Ok(State),
    Failure(String),
}

pub type ActionFn = Arc<dyn Fn(&State, &[Value]) -> ActionResult + Send + Sync>;
pub type TaskMethodFn = Arc<dyn Fn(&State, &[Value]) -> MethodResult + Send + Sync>;
pub type UnigoalMethodFn = Arc<dyn Fn(&State, &str, &Value) -> MethodResult + Send + Sync>;
pub type MultigoalMethodFn = Arc<dyn Fn(&State, &Multigoal) -> MethodResult + Send + Sync>;

/// A registered method, identified by a stable, serializable name. The
/// identifier — not the closure — is what a solution-tree node's blacklist
/// stores, so blacklist membership survives tree serialization.
#[derive(Clone)]
pub struct TaskMethod {
    pub id: String,
    pub func: TaskMethodFn,
}

#[derive(Clone)]
pub struct UnigoalMethod {
    pub id: String,
    pub func: UnigoalMethodFn,
}

#[derive(Clone)]
pub struct MultigoalMethod {
    pub id: String,
    pub func: MultigoalMethodFn,
}

/// Capability registry. Cloning a `Domain` is cheap (everything is behind
/// an `Arc`), which is what lets `compose` build a new immutable domain
/// out of two existing ones without re-registering callbacks.
#[derive(Clone, Default)]
pub struct Domain {
    actions: HashMap<String, ActionFn>,
    task_methods: HashMap<String, Vec<TaskMethod>>,
    unigoal_methods: HashMap<String, Vec<UnigoalMethod>>,
    multigoal_methods: Vec<MultigoalMethod>,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&State, &[Value]) -> ActionResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.actions.insert(name.into(), Arc::new(func));
        self
    }

    pub fn register_task_method(
        &mut self,
        task_name: impl Into<String>,
        method_id: impl Into<String>,
        func: impl Fn(&State, &[Value]) -> MethodResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.task_methods
            .entry(task_name.into())
            .or_default()
            .push(TaskMethod {
                id: method_id.into(),
                func: Arc::new(func),
            });
        self
    }

    pub fn register_unigoal_method(
        &mut self,
        predicate: impl Into<String>,
        method_id: impl Into<String>,
        func: impl Fn(&State, &str, &Value) -> MethodResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.unigoal_methods
            .entry(predicate.into())
            .or_default()
            .push(UnigoalMethod {
                id: method_id.into(),
                func: Arc::new(func),
            });
        self
    }

    pub fn register_multigoal_method(
        &mut self,
        method_id: impl Into<String>,
        func: impl Fn(&State, &Multigoal) -> MethodResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.multigoal_methods.push(MultigoalMethod {
            id: method_id.into(),
            func: Arc::new(func),
        });
        self
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Executes a named action. `Err` is reserved for "the action doesn't
    /// exist in this domain" — a distinct condition from the action
    /// refusing to run, which is `ActionResult::Failure`.
    pub fn execute_action(&self, state: &State, name: &str, args: &[Value]) -> Result<ActionResult, String> {
        match self.actions.get(name) {
            Some(f) => Ok(f(state, args)),
            None => Err(format!("no such action `{name}` in domain")),
        }
    }

    pub fn get_task_methods(&self, name: &str) -> &[TaskMethod] {
        self.task_methods.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn get_unigoal_methods(&self, predicate: &str) -> &[UnigoalMethod] {
        self.unigoal_methods.get(predicate).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn get_multigoal_methods(&self) -> &[MultigoalMethod] {
        &self.multigoal_methods
    }

    /// Merges `other` into `self`, consuming both and returning a new
    /// immutable domain. Actions: last-wins (the `other` domain's action
    /// replaces `self`'s on a name collision). Method lists: concatenated
    /// in declared order, `self`'s methods first.
    pub fn compose(mut self, other: Domain) -> Domain {
        for (name, action) in other.actions {
            self.actions.insert(name, action);
        }
        for (name, methods) in other.task_methods {
            self.task_methods.entry(name).or_default().extend(methods);
        }
        for (pred, methods) in other.unigoal_methods {
            self.unigoal_methods.entry(pred).or_default().extend(methods);
        }
        self.multigoal_methods.extend(other.multigoal_methods);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_action_runs_registered_function() {
        let mut domain = Domain::new();
        domain.register_action("move", |state, args| {
            let mut s = state.clone();
            if let Some(Value::Text(to)) = args.get(1) {
                s.set("location", "robot", Value::Text(to.clone()));
            }
            ActionResult::Ok(s)
        });

        let state = State::new().with("location", "robot", Value::Text("A".into()));
        let result = domain
            .execute_action(&state, "move", &[Value::Text("A".into()), Value::Text("B".into())])
            .unwrap();
        match result {
            ActionResult::Ok(new_state) => {
                assert_eq!(new_state.get("location", "robot"), Some(&Value::Text("B".into())));
            }
            ActionResult::Failure(r) => panic!("unexpected failure: {r}"),
        }
    }

    #[test]
    fn execute_action_missing_is_an_error() {
        let domain = Domain::new();
        let state = State::new();
        assert!(domain.execute_action(&state, "nope", &[]).is_err());
    }

    #[test]
    fn compose_concatenates_method_lists_in_order() {
        let mut a = Domain::new();
        a.register_task_method("t", "m1", |_s, _a| MethodResult::ok(vec![]));

        let mut b = Domain::new();
        b.register_task_method("t", "m2", |_s, _a| MethodResult::ok(vec![]));

        let merged = a.compose(b);
        let ids: Vec<_> = merged.get_task_methods("t").iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["m1".to_string(), "m2".to_string()]);
    }

    #[test]
    fn compose_actions_last_wins() {
        let mut a = Domain::new();
        a.register_action("x", |s, _| ActionResult::Ok(s.clone().with("tag", "who", Value::Text("a".into()))));
        let mut b = Domain::new();
        b.register_action("x", |s, _| ActionResult::Ok(s.clone().with("tag", "who", Value::Text("b".into()))));

        let merged = a.compose(b);
        let state = State::new();
        let ActionResult::Ok(result) = merged.execute_action(&state, "x", &[]).unwrap() else {
            panic!("expected Ok");
        };
        assert_eq!(result.get("tag", "who"), Some(&Value::Text("b".into())));
    }
}
