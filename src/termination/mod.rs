//! Termination criteria, evaluated in a fixed priority order.

mod status;

pub use status::{read_status, write_status, Status};

use tracing::debug;

use crate::config::StopParams;
use crate::record::Row;

/// A reason to stop, listed from highest to lowest priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Solidified,
    RadiativeEquilibrium,
    Steady,
    Escaped,
    Disintegrated,
    MaxTime,
    MaxIterations,
    ExternalStop,
}

impl Criterion {
    pub const PRIORITY: [Criterion; 8] = [
        Criterion::Solidified,
        Criterion::RadiativeEquilibrium,
        Criterion::Steady,
        Criterion::Escaped,
        Criterion::Disintegrated,
        Criterion::MaxTime,
        Criterion::MaxIterations,
        Criterion::ExternalStop,
    ];

    pub fn status(&self) -> Status {
        match self {
            Criterion::Solidified => Status::Solidified,
            Criterion::RadiativeEquilibrium => Status::RadiativeEquilibrium,
            Criterion::Steady => Status::Steady,
            Criterion::Escaped => Status::Escaped,
            Criterion::Disintegrated => Status::Disintegrated,
            Criterion::MaxTime => Status::MaxTime,
            Criterion::MaxIterations => Status::MaxIterations,
            Criterion::ExternalStop => Status::ExternalStop,
        }
    }

    fn index(&self) -> usize {
        Criterion::PRIORITY
            .iter()
            .position(|c| c == self)
            .unwrap_or_default()
    }
}

/// Everything the evaluator looks at for one iteration.
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    /// The newest history row.
    pub row: &'a Row,
    /// Index of that row.
    pub iteration: u64,
    /// `M_atm` of row 0.
    pub initial_atm_mass: f64,
    /// Whether the convergence monitor has confirmed a steady state.
    pub steady: bool,
    /// Whether the keepalive file still exists.
    pub lock_present: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    /// A criterion was met but the run has not reached its minimum
    /// iterations or time yet.
    Vetoed(Criterion),
    Stop(Criterion),
}

impl Decision {
    /// Status to persist for this decision.
    pub fn status(&self) -> Status {
        match self {
            Decision::Continue | Decision::Vetoed(_) => Status::Running,
            Decision::Stop(criterion) => criterion.status(),
        }
    }
}

/// Applies the stopping rules to each new row.
///
/// In strict mode a criterion must hold on two consecutive evaluations
/// before it can stop the run; every evaluation where it does not hold
/// resets its count. The minimum iteration and time floor vetoes every
/// criterion, removal of the keepalive file included.
#[derive(Debug, Clone)]
pub struct TerminationEvaluator {
    stop: StopParams,
    init_loops: u32,
    counts: [u32; 8],
}

impl TerminationEvaluator {
    pub fn new(stop: StopParams, init_loops: u32) -> Self {
        Self {
            stop,
            init_loops,
            counts: [0; 8],
        }
    }

    /// Consecutive evaluations `criterion` has held for.
    pub fn count(&self, criterion: Criterion) -> u32 {
        self.counts[criterion.index()]
    }

    fn holds(&self, criterion: Criterion, inputs: &Inputs<'_>) -> bool {
        let stop = &self.stop;
        let row = inputs.row;
        match criterion {
            Criterion::Solidified => stop.solid.enabled && row["Phi_global"] <= stop.solid.phi_crit,
            Criterion::RadiativeEquilibrium => {
                stop.radeqm.enabled
                    && inputs.iteration > u64::from(self.init_loops)
                    && row["F_atm"].abs() <= stop.radeqm.f_crit
            }
            Criterion::Steady => stop.steady.enabled && inputs.steady,
            Criterion::Escaped => {
                stop.escape.enabled
                    && inputs.initial_atm_mass > 0.0
                    && row["M_atm"] <= stop.escape.mass_frac * inputs.initial_atm_mass
            }
            Criterion::Disintegrated => {
                let disint = &stop.disint;
                let (separation, roche) = (row["separation"], row["roche_limit"]);
                let (period, breakup) = (row["axial_period"], row["breakup_period"]);
                disint.enabled
                    && ((disint.roche_enabled
                        && roche > 0.0
                        && separation > 0.0
                        && separation <= roche)
                        || (disint.spin_enabled
                            && breakup > 0.0
                            && period > 0.0
                            && period <= breakup))
            }
            Criterion::MaxTime => stop.time.enabled && row.time() >= stop.time.maximum,
            Criterion::MaxIterations => {
                stop.iters.enabled && inputs.iteration >= stop.iters.maximum
            }
            Criterion::ExternalStop => !inputs.lock_present,
        }
    }

    fn required(&self, criterion: Criterion) -> u32 {
        if self.stop.strict {
            2
        } else {
            1
        }
    }

    /// Evaluates every criterion for the newest row.
    pub fn evaluate(&mut self, inputs: &Inputs<'_>) -> Decision {
        for criterion in Criterion::PRIORITY {
            let held = self.holds(criterion, inputs);
            let count = &mut self.counts[criterion.index()];
            *count = if held { *count + 1 } else { 0 };
        }

        let Some(criterion) = Criterion::PRIORITY
            .into_iter()
            .find(|c| self.count(*c) >= self.required(*c))
        else {
            return Decision::Continue;
        };

        let below_iters = inputs.iteration < self.stop.iters.minimum;
        let below_time = inputs.row.time() < self.stop.time.minimum;
        if below_iters || below_time {
            debug!(?criterion, iteration = inputs.iteration, "termination vetoed by minimums");
            return Decision::Vetoed(criterion);
        }

        Decision::Stop(criterion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop() -> StopParams {
        let mut stop = StopParams::default();
        stop.iters.minimum = 0;
        stop.time.minimum = 0.0;
        stop.time.maximum = 1e6;
        stop
    }

    fn inputs(row: &Row, iteration: u64) -> Inputs<'_> {
        Inputs {
            row,
            iteration,
            initial_atm_mass: 0.0,
            steady: false,
            lock_present: true,
        }
    }

    #[test]
    fn solidified_outranks_max_time() {
        let mut evaluator = TerminationEvaluator::new(stop(), 0);
        let mut row = Row::zero();
        row["Time"] = 2e6;
        row["Phi_global"] = 0.0;
        row["F_atm"] = 100.0;

        assert_eq!(
            evaluator.evaluate(&inputs(&row, 10)),
            Decision::Stop(Criterion::Solidified)
        );
        assert_eq!(evaluator.count(Criterion::MaxTime), 1);
    }

    #[test]
    fn iteration_floor_vetoes_and_reports_running() {
        let mut params = stop();
        params.iters.minimum = 5;
        let mut evaluator = TerminationEvaluator::new(params, 0);
        let mut row = Row::zero();
        row["Time"] = 10.0;
        row["Phi_global"] = 0.0;

        let decision = evaluator.evaluate(&inputs(&row, 3));
        assert_eq!(decision, Decision::Vetoed(Criterion::Solidified));
        assert_eq!(decision.status(), Status::Running);

        assert_eq!(
            evaluator.evaluate(&inputs(&row, 5)),
            Decision::Stop(Criterion::Solidified)
        );
    }

    #[test]
    fn time_floor_vetoes() {
        let mut params = stop();
        params.time.minimum = 1e3;
        let mut evaluator = TerminationEvaluator::new(params, 0);
        let mut row = Row::zero();
        row["Time"] = 10.0;
        row["Phi_global"] = 0.0;
        assert!(matches!(evaluator.evaluate(&inputs(&row, 50)), Decision::Vetoed(_)));
    }

    #[test]
    fn strict_mode_needs_two_consecutive_hits() {
        let mut params = stop();
        params.strict = true;
        let mut evaluator = TerminationEvaluator::new(params, 0);

        let mut cold = Row::zero();
        cold["Phi_global"] = 0.0;
        cold["F_atm"] = 100.0;
        let mut hot = cold.clone();
        hot["Phi_global"] = 0.5;

        assert_eq!(evaluator.evaluate(&inputs(&cold, 1)), Decision::Continue);
        assert_eq!(evaluator.evaluate(&inputs(&hot, 2)), Decision::Continue);
        assert_eq!(evaluator.count(Criterion::Solidified), 0);
        assert_eq!(evaluator.evaluate(&inputs(&cold, 3)), Decision::Continue);
        assert_eq!(
            evaluator.evaluate(&inputs(&cold, 4)),
            Decision::Stop(Criterion::Solidified)
        );
    }

    #[test]
    fn radiative_equilibrium_waits_for_init_phase() {
        let mut evaluator = TerminationEvaluator::new(stop(), 3);
        let mut row = Row::zero();
        row["Phi_global"] = 0.5;
        row["F_atm"] = 0.01;

        assert_eq!(evaluator.evaluate(&inputs(&row, 3)), Decision::Continue);
        assert_eq!(
            evaluator.evaluate(&inputs(&row, 4)),
            Decision::Stop(Criterion::RadiativeEquilibrium)
        );
    }

    #[test]
    fn escape_requires_an_initial_atmosphere() {
        let mut evaluator = TerminationEvaluator::new(stop(), 0);
        let mut row = Row::zero();
        row["Phi_global"] = 0.5;
        row["F_atm"] = 100.0;

        assert_eq!(evaluator.evaluate(&inputs(&row, 1)), Decision::Continue);

        let mut with_atm = inputs(&row, 2);
        with_atm.initial_atm_mass = 1e20;
        assert_eq!(
            evaluator.evaluate(&with_atm),
            Decision::Stop(Criterion::Escaped)
        );
    }

    #[test]
    fn lock_removal_is_vetoed_by_minimums() {
        let mut params = stop();
        params.iters.minimum = 10;
        let mut evaluator = TerminationEvaluator::new(params, 0);
        let mut row = Row::zero();
        row["Phi_global"] = 0.5;
        row["F_atm"] = 100.0;

        let mut gone = inputs(&row, 1);
        gone.lock_present = false;
        assert_eq!(evaluator.evaluate(&gone), Decision::Vetoed(Criterion::ExternalStop));

        gone.iteration = 10;
        assert_eq!(evaluator.evaluate(&gone), Decision::Stop(Criterion::ExternalStop));
    }

    #[test]
    fn strict_mode_applies_to_lock_removal() {
        let mut params = stop();
        params.strict = true;
        let mut evaluator = TerminationEvaluator::new(params, 0);
        let mut row = Row::zero();
        row["Phi_global"] = 0.5;
        row["F_atm"] = 100.0;

        let mut gone = inputs(&row, 1);
        gone.lock_present = false;
        assert_eq!(evaluator.evaluate(&gone), Decision::Continue);

        gone.iteration = 2;
        assert_eq!(evaluator.evaluate(&gone), Decision::Stop(Criterion::ExternalStop));
    }

    #[test]
    fn disintegration_inside_roche_limit() {
        let mut params = stop();
        params.disint.enabled = true;
        let mut evaluator = TerminationEvaluator::new(params, 0);
        let mut row = Row::zero();
        row["Phi_global"] = 0.5;
        row["F_atm"] = 100.0;
        row["separation"] = 1e9;
        row["roche_limit"] = 2e9;

        assert_eq!(
            evaluator.evaluate(&inputs(&row, 1)),
            Decision::Stop(Criterion::Disintegrated)
        );
    }

    #[test]
    fn disabled_criteria_never_fire() {
        let mut params = stop();
        params.solid.enabled = false;
        params.iters.enabled = false;
        let mut evaluator = TerminationEvaluator::new(params, 0);
        let mut row = Row::zero();
        row["F_atm"] = 100.0;
        assert_eq!(evaluator.evaluate(&inputs(&row, 1_000_000)), Decision::Continue);
    }
}
