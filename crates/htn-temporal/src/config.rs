// =============================================================================
//  HTN Temporal Scheduler - Config
//  File: config.rs
//
//  Description:
//  The small set of knobs the temporal layer takes by value rather than
//  from disk. Follows the same convention as `htn_core::PlannerOpts`: a
//  plain `Default`-derived struct passed into the constructors that need
//  it, not a `config`-crate-backed layer.
//
//  Author:      Alex Roussinov
//  Updated:     2026-01-11
//
//  This file is dual licensed under the MIT and Apache 2.0 licenses.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tick period, expressed in milliseconds so the struct stays `Serialize`/
/// `Deserialize` without a custom `Duration` shim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalConfig {
    pub tick_period_ms: u64,
    /// Duration (seconds) used for any action name with no
    /// `TemporalScheduler::register_duration` entry of its own.
    pub default_duration: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1,
            default_duration: 0.0,
        }
    }
}

impl TemporalConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period_ms = period.as_millis() as u64;
        self
    }

    pub fn with_default_duration(mut self, seconds: f64) -> Self {
        self.default_duration = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tick_period_matches_the_design_target() {
        assert_eq!(TemporalConfig::default().tick_period(), Duration::from_millis(1));
    }
}
