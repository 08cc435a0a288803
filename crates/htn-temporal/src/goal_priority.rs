// =============================================================================
//  HTN Temporal Scheduler - Goal Priority Queue
//  File: goal_priority.rs
//
//  Description:
//  Orders pending goals for dispatch into the planner. The
//  wrapper-plus-BinaryHeap shape, and the priority-then-deadline-then-
//  arrival tie-break, follow the max-heap-via-negation pattern for a
//  `BinaryHeap`-backed scheduler; named `GoalWrapper` rather than `Intent`
//  to avoid colliding with this crate's own zero-duration `Intent` command,
//  a different concept from a prioritized goal.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use htn_core::Todo;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

pub type GoalId = u64;

/// A caller-supplied comparator for `PriorityStrategy::Custom`. Returns
/// `Less` when `a` should be served before `b`, matching `BinaryHeap`'s
/// max-heap convention (the wrapper negates it the same way the built-in
/// strategies do).
pub type CustomComparator = Arc<dyn Fn(&ScheduledGoal, &ScheduledGoal) -> Ordering + Send + Sync>;

#[derive(Clone)]
pub enum PriorityStrategy {
    /// Highest `priority` first, deadline as tie-break.
    Priority,
    /// Earliest `deadline` first, regardless of priority (missing deadline
    /// sorts last).
    Deadline,
    /// `priority` is actually a caller-computed utility score; orders the
    /// same as `Priority` but documents the distinct intended use.
    Utility,
    /// A caller-provided comparator, named for logging.
    Custom(String, CustomComparator),
}

impl std::fmt::Debug for PriorityStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityStrategy::Priority => write!(f, "Priority"),
            PriorityStrategy::Deadline => write!(f, "Deadline"),
            PriorityStrategy::Utility => write!(f, "Utility"),
            PriorityStrategy::Custom(name, _) => write!(f, "Custom({name})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledGoal {
    pub id: GoalId,
    pub agent_id: String,
    pub todos: Vec<Todo>,
    pub priority: u32,
    pub deadline: Option<f64>,
    pub created_at: f64,
}

impl ScheduledGoal {
    /// True once `now` has passed this goal's deadline.
    pub fn is_overdue(&self, now: f64) -> bool {
        self.deadline.is_some_and(|d| now > d)
    }
}

struct GoalWrapper {
    goal: ScheduledGoal,
    strategy: PriorityStrategy,
}

impl PartialEq for GoalWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.goal.id == other.goal.id
    }
}
impl Eq for GoalWrapper {}

impl PartialOrd for GoalWrapper {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GoalWrapper {
    fn cmp(&self, other: &Self) -> Ordering {
        match &self.strategy {
            PriorityStrategy::Priority | PriorityStrategy::Utility => other
                .goal
                .priority
                .cmp(&self.goal.priority)
                .then_with(|| deadline_cmp(self.goal.deadline, other.goal.deadline))
                .then_with(|| self.goal.created_at.partial_cmp(&other.goal.created_at).unwrap_or(Ordering::Equal)),
            PriorityStrategy::Deadline => deadline_cmp(self.goal.deadline, other.goal.deadline)
                .then_with(|| other.goal.priority.cmp(&self.goal.priority)),
            PriorityStrategy::Custom(_, cmp) => (cmp)(&self.goal, &other.goal).reverse(),
        }
    }
}

fn deadline_cmp(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A priority queue of goals awaiting planner attention, one per active
/// agent or shared across agents depending on how the caller partitions
/// `agent_id`.
pub struct GoalQueue {
    strategy: PriorityStrategy,
    heap: BinaryHeap<GoalWrapper>,
    all: HashMap<GoalId, ScheduledGoal>,
    next_id: GoalId,
}

impl GoalQueue {
    pub fn new(strategy: PriorityStrategy) -> Self {
        Self {
            strategy,
            heap: BinaryHeap::new(),
            all: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn push(&mut self, agent_id: impl Into<String>, todos: Vec<Todo>, priority: u32, deadline: Option<f64>, now: f64) -> GoalId {
        let id = self.next_id;
        self.next_id += 1;
        let goal = ScheduledGoal {
            id,
            agent_id: agent_id.into(),
            todos,
            priority,
            deadline,
            created_at: now,
        };
        self.all.insert(id, goal.clone());
        self.heap.push(GoalWrapper { goal, strategy: self.strategy.clone() });
        id
    }

    /// Pops the highest-priority goal under this queue's strategy.
    pub fn pop(&mut self) -> Option<ScheduledGoal> {
        let wrapper = self.heap.pop()?;
        self.all.remove(&wrapper.goal.id);
        Some(wrapper.goal)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Removes and returns every goal whose deadline has passed `now`. The
    /// queue itself does not replan — it only surfaces the expired goals
    /// for the caller to act on, since only the caller knows which
    /// in-flight solution tree, if any, the goal corresponds to.
    pub fn expire_overdue(&mut self, now: f64) -> Vec<ScheduledGoal> {
        let expired_ids: Vec<GoalId> = self.all.values().filter(|g| g.is_overdue(now)).map(|g| g.id).collect();
        if expired_ids.is_empty() {
            return Vec::new();
        }
        let rebuilt: BinaryHeap<GoalWrapper> = std::mem::take(&mut self.heap)
            .into_iter()
            .filter(|w| !expired_ids.contains(&w.goal.id))
            .collect();
        self.heap = rebuilt;
        expired_ids.into_iter().filter_map(|id| self.all.remove(&id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_pops_first() {
        let mut q = GoalQueue::new(PriorityStrategy::Priority);
        q.push("alex", vec![], 1, None, 0.0);
        let urgent = q.push("alex", vec![], 10, None, 0.0);
        let popped = q.pop().unwrap();
        assert_eq!(popped.id, urgent);
    }

    #[test]
    fn equal_priority_breaks_tie_by_earlier_deadline() {
        let mut q = GoalQueue::new(PriorityStrategy::Priority);
        q.push("alex", vec![], 5, Some(100.0), 0.0);
        let sooner = q.push("alex", vec![], 5, Some(10.0), 0.0);
        assert_eq!(q.pop().unwrap().id, sooner);
    }

    #[test]
    fn deadline_strategy_ignores_priority_ordering() {
        let mut q = GoalQueue::new(PriorityStrategy::Deadline);
        q.push("alex", vec![], 100, Some(50.0), 0.0);
        let sooner = q.push("alex", vec![], 1, Some(5.0), 0.0);
        assert_eq!(q.pop().unwrap().id, sooner);
    }

    #[test]
    fn custom_strategy_uses_caller_comparator() {
        // Prefer the lexicographically smallest agent id, ignoring priority.
        let cmp: CustomComparator = Arc::new(|a, b| a.agent_id.cmp(&b.agent_id));
        let mut q = GoalQueue::new(PriorityStrategy::Custom("alphabetical".to_string(), cmp));
        q.push("zed", vec![], 100, None, 0.0);
        let first = q.push("alex", vec![], 1, None, 0.0);
        assert_eq!(q.pop().unwrap().id, first);
    }

    #[test]
    fn expire_overdue_removes_only_passed_deadlines() {
        let mut q = GoalQueue::new(PriorityStrategy::Priority);
        let overdue = q.push("alex", vec![], 5, Some(10.0), 0.0);
        q.push("alex", vec![], 5, Some(100.0), 0.0);
        q.push("alex", vec![], 5, None, 0.0);

        let expired = q.expire_overdue(50.0);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, overdue);
        assert_eq!(q.len(), 2);
    }
}
