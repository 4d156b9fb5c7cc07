//! Loop counters shared by the coupler, its observers and the summary file.

use serde::Serialize;

use crate::config::Config;

/// Iteration bookkeeping for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopCounters {
    /// Index of the newest history row.
    pub total: u64,
    pub total_min: u64,
    pub total_max: u64,
    /// Init-phase iterations completed after the bootstrap iteration.
    pub init: u32,
    pub init_max: u32,
    /// `Some(k)` while a steady candidate has been held for `k` extra
    /// iterations.
    pub steady: Option<u32>,
    pub steady_max: u32,
    pub steady_check_window: u32,
}

impl LoopCounters {
    pub fn new(config: &Config) -> Self {
        let stop = &config.params.stop;
        Self {
            total: 0,
            total_min: stop.iters.minimum,
            total_max: stop.iters.maximum,
            init: 0,
            init_max: config.params.loops.init,
            steady: None,
            steady_max: stop.steady.loops,
            steady_check_window: stop.steady.window,
        }
    }

    /// Records that the row with index `iteration` has been appended.
    pub fn advance(&mut self, iteration: u64) {
        self.total = iteration;
        self.init = iteration.min(u64::from(self.init_max)) as u32;
    }

    /// Whether iteration `iteration` still belongs to the init phase.
    pub fn in_init_phase(&self, iteration: u64) -> bool {
        iteration <= u64::from(self.init_max)
    }
}
