// =============================================================================
//  HTN Planner Core - Opts
//  File: opts.rs
//
//  Description:
//  The opts vocabulary recognized by plan/replan/execute. A plain
//  Default-derived struct passed by value into the planning/execution
//  calls rather than reaching for a file-based config crate — the core
//  takes configuration as call arguments, not from disk.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_log_level(self) -> log::Level {
        match self {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerOpts {
    pub max_depth: u32,
    pub verbose: u32,
    pub log_level: LogLevel,
}

impl Default for PlannerOpts {
    fn default() -> Self {
        Self {
            max_depth: 100,
            verbose: 0,
            log_level: LogLevel::Info,
        }
    }
}

impl PlannerOpts {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_verbose(mut self, verbose: u32) -> Self {
        self.verbose = verbose;
        self
    }
}
