//! Steady-state detection over the trailing history window.

use tracing::debug;

use crate::config::SteadyStop;
use crate::record::Row;

/// Where the monitor stands after the latest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceState {
    Running,
    /// The steady condition holds and has been held for `held` further
    /// iterations after it first appeared.
    Candidate { held: u32 },
    Confirmed,
}

/// Tracks whether the coupled system has reached a steady state.
///
/// A window of rows is steady when `|F_atm|` stays below `F_crit` in every
/// row and the melt fraction changes more slowly than `dprel` per year
/// across it. The state is confirmed once the condition has persisted for
/// `loops` further consecutive iterations; losing it at any point resets to
/// [`ConvergenceState::Running`].
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    f_crit: f64,
    dprel: f64,
    window: usize,
    loops: u32,
    state: ConvergenceState,
}

impl ConvergenceMonitor {
    pub fn new(config: &SteadyStop) -> Self {
        Self {
            f_crit: config.f_crit,
            dprel: config.dprel,
            window: config.window.max(2) as usize,
            loops: config.loops,
            state: ConvergenceState::Running,
        }
    }

    pub fn state(&self) -> ConvergenceState {
        self.state
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == ConvergenceState::Confirmed
    }

    /// Number of extra iterations the current candidate has been held, if any.
    pub fn held(&self) -> Option<u32> {
        match self.state {
            ConvergenceState::Running => None,
            ConvergenceState::Candidate { held } => Some(held),
            ConvergenceState::Confirmed => Some(self.loops),
        }
    }

    /// Whether the trailing `window` rows of `rows` satisfy the steady condition.
    pub fn is_steady(&self, rows: &[Row]) -> bool {
        if rows.len() < self.window {
            return false;
        }
        let window = &rows[rows.len() - self.window..];

        if window.iter().any(|row| !(row["F_atm"].abs() < self.f_crit)) {
            return false;
        }

        let (first, last) = (&window[0], &window[window.len() - 1]);
        let d_phi = (last["Phi_global"] - first["Phi_global"]).abs();
        let d_time = last.time() - first.time();
        if d_time > 0.0 {
            d_phi / d_time < self.dprel
        } else {
            d_phi == 0.0
        }
    }

    /// Advances the state machine with the history up to and including the
    /// newest row.
    pub fn update(&mut self, rows: &[Row]) -> ConvergenceState {
        let steady = self.is_steady(rows);
        self.state = match (steady, self.state) {
            (false, _) => ConvergenceState::Running,
            (true, ConvergenceState::Confirmed) => ConvergenceState::Confirmed,
            (true, ConvergenceState::Running) => {
                if self.loops == 0 {
                    ConvergenceState::Confirmed
                } else {
                    ConvergenceState::Candidate { held: 0 }
                }
            }
            (true, ConvergenceState::Candidate { held }) => {
                if held + 1 >= self.loops {
                    ConvergenceState::Confirmed
                } else {
                    ConvergenceState::Candidate { held: held + 1 }
                }
            }
        };
        debug!(state = ?self.state, "convergence updated");
        self.state
    }
}
