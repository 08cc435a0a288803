// =============================================================================
//  HTN Planner Core - State
//  File: state.rs
//
//  Description:
//  Time-indexed fact store: a mapping from (predicate, subject) to an opaque
//  value. Plain reads/writes only — no domain interpretation lives here.
//
//  Author:      Alex Roussinov
//  Created:     2025-12-23
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An opaque fact value. Domains are free to encode whatever they need into
/// these variants; the core never inspects them beyond equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Pair(f64, f64),
    List(Vec<Value>),
}

impl Value {
    pub fn float(v: f64) -> Self {
        Value::Float(v)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(f64, f64)> {
        match self {
            Value::Pair(a, b) => Some((*a, *b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Pair(a, b) => write!(f, "({a}, {b})"),
            Value::List(items) => write!(f, "{items:?}"),
        }
    }
}

/// Identity of a fact: (predicate, subject). The object is the mutable part.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactKey {
    pub predicate: String,
    pub subject: String,
}

impl FactKey {
    pub fn new(predicate: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            subject: subject.into(),
        }
    }
}

/// A single (predicate, subject, object) triple, fully materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub predicate: String,
    pub subject: String,
    pub object: Value,
}

/// Flat triple store: at most one object per (predicate, subject).
///
/// Cheap to clone — a new `State` is produced on every write so that a
/// solution-tree node can cache the state it saw on entry without aliasing
/// a parent's cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    facts: BTreeMap<FactKey, Value>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, predicate: &str, subject: &str) -> Option<&Value> {
        self.facts.get(&FactKey::new(predicate, subject))
    }

    /// Sets a fact, returning the new state. Implemented in-place on the
    /// owned value (the tree, not this method, is responsible for cloning
    /// before mutation when a shared copy must be preserved).
    pub fn set(&mut self, predicate: impl Into<String>, subject: impl Into<String>, object: Value) {
        self.facts.insert(FactKey::new(predicate, subject), object);
    }

    pub fn with(mut self, predicate: impl Into<String>, subject: impl Into<String>, object: Value) -> Self {
        self.set(predicate, subject, object);
        self
    }

    pub fn remove(&mut self, predicate: &str, subject: &str) -> Option<Value> {
        self.facts.remove(&FactKey::new(predicate, subject))
    }

    /// Right-biased union: facts in `other` win on key collision.
    pub fn merge(&mut self, other: &State) {
        for (k, v) in &other.facts {
            self.facts.insert(k.clone(), v.clone());
        }
    }

    /// All subjects that have at least one fact for the given predicate.
    pub fn subjects_with(&self, predicate: &str) -> Vec<&str> {
        self.facts
            .keys()
            .filter(|k| k.predicate == predicate)
            .map(|k| k.subject.as_str())
            .collect()
    }

    pub fn to_triples(&self) -> Vec<Fact> {
        self.facts
            .iter()
            .map(|(k, v)| Fact {
                predicate: k.predicate.clone(),
                subject: k.subject.clone(),
                object: v.clone(),
            })
            .collect()
    }

    pub fn from_triples(triples: impl IntoIterator<Item = Fact>) -> Self {
        let mut state = State::new();
        for t in triples {
            state.set(t.predicate, t.subject, t.object);
        }
        state
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Temporal state: a `State` plus a current time and the set of currently
/// scheduled timed-action ids, as used by the temporal layer (`htn-temporal`)
/// when it needs to ask the core "what did this fact read as of time T".
///
/// Facts themselves do not carry per-fact start times in the core state —
/// that annotation belongs to whatever effect produced them, which is why
/// `crate::timed_effect` metadata lives in `htn-temporal` rather than here;
/// per-fact start-time annotation is a temporal-layer concept layered on
/// top of this flat store, not a core requirement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalState {
    pub state: State,
    pub now: f64,
    pub scheduled: Vec<String>,
}

impl TemporalState {
    pub fn new(state: State, now: f64) -> Self {
        Self {
            state,
            now,
            scheduled: Vec::new(),
        }
    }
}
