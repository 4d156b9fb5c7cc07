//! The coupling loop.
//!
//! A [`Coupler`] owns the history, the adapters and the output directory of
//! one run and advances the coupled system one iteration at a time. Each
//! iteration runs the adapters in a fixed phase order on a copy of the last
//! history row:
//!
//! 1. orbit and tides
//! 2. interior (decides the time step)
//! 3. star (instellation and spectrum, when due)
//! 4. escape (after the init phase, while volatiles remain)
//! 5. desiccation check
//! 6. outgassing (while volatiles remain)
//! 7. atmosphere
//!
//! The ledger then recomputes derived quantities, the row is appended and
//! persisted, and the convergence monitor and termination evaluator decide
//! whether to continue.

mod counters;
mod dirs;
mod lock;
mod observer;
mod schedule;
mod timestep;

pub use counters::LoopCounters;
pub use dirs::{file_key, RunDirs};
pub use lock::KeepAlive;
pub use observer::{Observer, SummaryObserver};
pub use schedule::StarSchedule;
pub use timestep::dt_hint;

use std::fs;
use std::io;

use tracing::{debug, error, info, warn};

use crate::adapter::{
    apply_updates, Adapter, AdapterError, AdapterOutput, AdapterSet, RefreshFlags, StepContext,
};
use crate::config::Config;
use crate::constants::AU;
use crate::convergence::ConvergenceMonitor;
use crate::error::{CouplerError, Result};
use crate::ledger::{volatile_inventory, Ledger};
use crate::record::{escape_field, Element, History, Reservoir, Row};
use crate::termination::{write_status, Decision, Inputs, Status, TerminationEvaluator};

/// Lifecycle of a coupler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouplerState {
    Initializing,
    Resuming,
    Running,
    Finalizing,
    Done,
}

/// Runs `adapter` and merges its updates into `row`.
fn run_phase(
    adapter: &mut dyn Adapter,
    ctx: &StepContext<'_>,
    row: &mut Row,
    dt_hint: f64,
) -> std::result::Result<AdapterOutput, AdapterError> {
    let out = adapter.run(ctx, row, dt_hint)?;
    apply_updates(row, adapter.name(), &out.updates)?;
    debug!(
        domain = adapter.domain().name(),
        module = adapter.name(),
        fields = out.updates.len(),
        "phase complete"
    );
    Ok(out)
}

pub struct Coupler {
    config: Config,
    dirs: RunDirs,
    adapters: AdapterSet,
    ledger: Ledger,
    history: History,
    counters: LoopCounters,
    monitor: ConvergenceMonitor,
    evaluator: TerminationEvaluator,
    schedule: StarSchedule,
    desiccated: bool,
    lock: Option<KeepAlive>,
    status: Option<Status>,
    state: CouplerState,
    observers: Vec<Box<dyn Observer>>,
}

impl Coupler {
    pub fn new(config: Config, adapters: AdapterSet) -> Self {
        let tolerance = &config.params.tolerance;
        let ledger = Ledger {
            mass_tolerance: tolerance.mass_rel,
            desiccation_threshold: tolerance.desiccation_kg,
            reservoir: config.escape.reservoir,
            offset_roche: config.params.stop.disint.offset_roche,
            offset_spin: config.params.stop.disint.offset_spin,
        };

        Self {
            dirs: RunDirs::new(&config.params.out.path),
            history: History::new(tolerance.mass_rel),
            counters: LoopCounters::new(&config),
            monitor: ConvergenceMonitor::new(&config.params.stop.steady),
            evaluator: TerminationEvaluator::new(
                config.params.stop.clone(),
                config.params.loops.init,
            ),
            schedule: StarSchedule::new(&config.params.dt),
            ledger,
            adapters,
            desiccated: false,
            lock: None,
            status: None,
            state: CouplerState::Initializing,
            observers: Vec::new(),
            config,
        }
    }

    /// Adds an observer; observers are called in insertion order.
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn state(&self) -> CouplerState {
        self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn counters(&self) -> &LoopCounters {
        &self.counters
    }

    pub fn dirs(&self) -> &RunDirs {
        &self.dirs
    }

    /// Last status written to the status file.
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn is_desiccated(&self) -> bool {
        self.desiccated
    }

    pub fn schedule(&self) -> &StarSchedule {
        &self.schedule
    }

    pub fn monitor(&self) -> &ConvergenceMonitor {
        &self.monitor
    }

    /// Prepares a fresh run in the output directory.
    ///
    /// Takes the keepalive lock, clears previous output when
    /// `params.out.overwrite` is set, and copies the configuration into the
    /// output directory. No iteration runs until [`Coupler::run`] or
    /// [`Coupler::step`] is called.
    pub fn start(&mut self, force: bool) -> Result<()> {
        self.dirs.create()?;
        let lock = KeepAlive::acquire(&self.dirs.keepalive(), force)?;

        let helpfile = self.dirs.helpfile();
        if helpfile.exists() {
            if !self.config.params.out.overwrite {
                return Err(CouplerError::Resume(format!(
                    "{} already exists; resume the run or set params.out.overwrite",
                    helpfile.display()
                )));
            }
            info!(path = %self.dirs.output().display(), "overwriting previous output");
            fs::remove_file(&helpfile)?;
            fs::remove_dir_all(self.dirs.data())?;
            self.dirs.create()?;
        }

        fs::write(self.dirs.config_copy(), self.config.to_toml_string()?)?;
        self.lock = Some(lock);
        self.set_status(Status::Started)?;
        self.state = CouplerState::Running;

        info!(path = %self.dirs.output().display(), "run started");
        Ok(())
    }

    /// Continues a previous run from its persisted history.
    ///
    /// Counters, convergence state, strict-mode counts, stellar refresh
    /// times and the desiccation flag are rebuilt by replaying the history,
    /// so the continuation behaves as if the run had never stopped.
    pub fn resume(&mut self, force: bool) -> Result<()> {
        self.state = CouplerState::Resuming;
        let lock = KeepAlive::acquire(&self.dirs.keepalive(), force)?;

        let helpfile = self.dirs.helpfile();
        if !helpfile.exists() {
            return Err(CouplerError::Resume(format!(
                "{} does not exist",
                helpfile.display()
            )));
        }
        let history = History::load(&helpfile, self.config.params.tolerance.mass_rel)?;

        let needed = self.config.params.loops.init as usize + 1;
        if history.len() < needed {
            return Err(CouplerError::Resume(format!(
                "history has {} rows, at least {} are required",
                history.len(),
                needed
            )));
        }

        let last_time = history.last().map_or(0.0, Row::time);
        for adapter in self.adapters.iter() {
            for path in adapter.required_files(&self.dirs, last_time) {
                if !path.exists() {
                    return Err(CouplerError::Resume(format!(
                        "{} adapter '{}' requires missing file {}",
                        adapter.domain().name(),
                        adapter.name(),
                        path.display()
                    )));
                }
            }
        }

        self.history = history;
        self.replay();

        fs::write(self.dirs.config_copy(), self.config.to_toml_string()?)?;
        self.lock = Some(lock);
        self.set_status(Status::Running)?;
        self.state = CouplerState::Running;

        info!(
            rows = self.history.len(),
            time = last_time,
            desiccated = self.desiccated,
            "run resumed"
        );
        Ok(())
    }

    fn replay(&mut self) {
        self.counters = LoopCounters::new(&self.config);
        self.monitor = ConvergenceMonitor::new(&self.config.params.stop.steady);
        self.evaluator =
            TerminationEvaluator::new(self.config.params.stop.clone(), self.config.params.loops.init);
        self.schedule = StarSchedule::new(&self.config.params.dt);
        self.desiccated = false;

        for i in 0..self.history.len() {
            let row = &self.history.rows()[i];
            self.schedule.advance(row.time());
            if volatile_inventory(row) < self.ledger.desiccation_threshold {
                self.desiccated = true;
            }
            self.observe(i, true);
        }
    }

    /// Runs iterations until a termination criterion stops the run.
    pub fn run(&mut self) -> Result<Status> {
        loop {
            if let Some(status) = self.step()? {
                return Ok(status);
            }
        }
    }

    /// Runs one iteration. Returns the final status once the run is over.
    pub fn step(&mut self) -> Result<Option<Status>> {
        if self.state == CouplerState::Done {
            return Ok(self.status);
        }
        if self.state != CouplerState::Running {
            return Err(CouplerError::NotRunning(self.state));
        }

        let decision = match self.iterate() {
            Ok(decision) => decision,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };

        let status = decision.status();
        if let Err(err) = self.set_status(status) {
            let err = CouplerError::from(err);
            self.fail(&err);
            return Err(err);
        }

        let plot_mod = self.config.params.out.plot_mod;
        if plot_mod > 0 && self.counters.total % plot_mod == 0 {
            for observer in &mut self.observers {
                observer.on_iteration(&self.history, &self.counters);
            }
        }

        match decision {
            Decision::Stop(criterion) => {
                info!(?criterion, status = %status, "termination criterion met");
                self.finalize(status)?;
                Ok(Some(status))
            }
            Decision::Vetoed(criterion) => {
                debug!(?criterion, "termination deferred until minimums are reached");
                Ok(None)
            }
            Decision::Continue => Ok(None),
        }
    }

    /// Initial row: zero everywhere except the delivered volatile inventory,
    /// the initial orbit and the stellar age.
    fn bootstrap_row(&self) -> Row {
        let mut row = Row::zero();

        let delivery = &self.config.delivery;
        for (element, mass) in [
            (Element::H, delivery.h_kg),
            (Element::C, delivery.c_kg),
            (Element::N, delivery.n_kg),
            (Element::S, delivery.s_kg),
            (Element::He, delivery.he_kg),
        ] {
            row[element.field(Reservoir::Total).as_str()] = mass;
        }

        let orbit = &self.config.orbit;
        let a = orbit.semimajoraxis * AU;
        let e = orbit.eccentricity;
        row["semimajorax"] = a;
        row["eccentricity"] = e;
        row["separation"] = a * (1.0 + 0.5 * e * e);
        row["age_star"] = self.config.star.age_ini;
        row
    }

    fn iterate(&mut self) -> Result<Decision> {
        let iteration = self.history.len() as u64;
        let bootstrap = iteration == 0;

        let mut row = match self.history.last() {
            Some(last) => last.clone(),
            None => self.bootstrap_row(),
        };
        let prev_time = row.time();
        let prev_phi = row["Phi_global"];
        let prevent_warming = self.config.interior.prevent_warming && !bootstrap;

        let hint = dt_hint(
            &self.config.params.dt,
            iteration,
            self.config.params.loops.init,
            self.history.tail(2),
        );
        debug!(iteration, time = prev_time, dt_hint = hint, "iteration started");

        let ctx = StepContext {
            dirs: &self.dirs,
            iteration,
            bootstrap,
            time: prev_time,
            refresh: RefreshFlags::default(),
        };

        if let Some(orbit) = self.adapters.orbit.as_deref_mut() {
            run_phase(orbit, &ctx, &mut row, hint)?;
        }

        let interior = self.adapters.interior.as_mut();
        let out = run_phase(interior, &ctx, &mut row, hint)?;
        let dt = if bootstrap { 0.0 } else { out.dt_taken };
        if !dt.is_finite() || dt < 0.0 {
            return Err(AdapterError::divergence(
                interior.name(),
                format!("invalid time step {dt} yr"),
            )
            .into());
        }
        let time = prev_time + dt;
        row["Time"] = time;
        row["age_star"] = self.config.star.age_ini + time;
        if prevent_warming {
            row["Phi_global"] = row["Phi_global"].min(prev_phi);
        }
        if !bootstrap && file_key(time) == file_key(prev_time) {
            warn!(iteration, time, dt, "time step shorter than file key resolution; auxiliary files overwritten");
        }

        let refresh = self.schedule.advance(time);
        let ctx = StepContext {
            time,
            refresh,
            ..ctx
        };
        run_phase(self.adapters.star.as_mut(), &ctx, &mut row, hint)?;

        let escaping = !bootstrap && !self.counters.in_init_phase(iteration) && !self.desiccated;
        match self.adapters.escape.as_deref_mut() {
            Some(escape) if escaping => {
                run_phase(escape, &ctx, &mut row, hint)?;
                let rate = row["esc_rate_total"];
                self.ledger.escape(&mut row, rate, dt);
            }
            _ => {
                row["esc_rate_total"] = 0.0;
                for element in Element::ALL {
                    row[escape_field(element).as_str()] = 0.0;
                }
            }
        }

        if !self.desiccated {
            self.desiccated = self.ledger.desiccate(&mut row);
        }

        let reported_m_atm = if self.desiccated {
            None
        } else {
            run_phase(self.adapters.outgas.as_mut(), &ctx, &mut row, hint)?
                .updates
                .get("M_atm")
        };

        run_phase(self.adapters.atmos.as_mut(), &ctx, &mut row, hint)?;
        if prevent_warming {
            row["F_atm"] = row["F_atm"].max(0.0);
        }

        self.ledger.aggregate(&mut row, reported_m_atm)?;

        info!(
            iteration,
            time,
            dt,
            t_magma = row["T_magma"],
            phi = row["Phi_global"],
            f_atm = row["F_atm"],
            m_atm = row["M_atm"],
            "iteration complete"
        );

        self.history.append(row)?;
        self.history.persist(&self.dirs.helpfile())?;

        Ok(self.observe(iteration as usize, false))
    }

    /// Post-append bookkeeping shared by live iterations and replay.
    fn observe(&mut self, index: usize, replaying: bool) -> Decision {
        let rows = &self.history.rows()[..=index];
        let row = &rows[index];

        self.counters.advance(index as u64);
        self.monitor.update(rows);
        self.counters.steady = self.monitor.held();

        let lock_present = replaying || self.lock.as_ref().map_or(true, KeepAlive::is_present);
        self.evaluator.evaluate(&Inputs {
            row,
            iteration: index as u64,
            initial_atm_mass: rows[0]["M_atm"],
            steady: self.monitor.is_confirmed(),
            lock_present,
        })
    }

    fn set_status(&mut self, status: Status) -> io::Result<()> {
        if self.status != Some(status) {
            write_status(&self.dirs.status(), status)?;
            debug!(status = %status, "status updated");
            self.status = Some(status);
        }
        Ok(())
    }

    fn release_lock(&mut self) {
        if let Some(mut lock) = self.lock.take() {
            if let Err(e) = lock.release() {
                warn!(path = %lock.path().display(), error = %e, "failed to remove keepalive file");
            }
        }
    }

    fn notify_finish(&mut self, status: Status) {
        for observer in &mut self.observers {
            observer.on_finish(&self.history, status, &self.dirs);
        }
    }

    fn finalize(&mut self, status: Status) -> Result<()> {
        self.state = CouplerState::Finalizing;
        self.history.persist(&self.dirs.helpfile())?;
        self.set_status(status)?;
        self.release_lock();
        self.notify_finish(status);
        self.state = CouplerState::Done;
        info!(
            status = %status,
            iterations = self.counters.total,
            time = self.history.last().map_or(0.0, Row::time),
            "run finished"
        );
        Ok(())
    }

    /// Flushes what is known after a fatal error.
    fn fail(&mut self, err: &CouplerError) {
        let status = err.status();
        error!(error = %err, status = %status, "run aborted");

        if !self.history.is_empty() {
            if let Err(e) = self.history.persist(&self.dirs.helpfile()) {
                warn!(error = %e, "failed to flush history");
            }
        }
        if let Err(e) = self.set_status(status) {
            warn!(error = %e, "failed to write status file");
        }
        self.release_lock();
        self.notify_finish(status);
        self.state = CouplerState::Done;
    }
}

impl Drop for Coupler {
    fn drop(&mut self) {
        self.release_lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::termination::read_status;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.params.out.path = dir.to_path_buf();
        config.params.out.plot_mod = 1;
        config.params.dt.initial = 100.0;
        config.params.dt.maximum = 1e5;
        config.params.stop.iters.minimum = 2;
        config.params.stop.iters.maximum = 40;
        config.params.stop.time.minimum = 0.0;
        config
    }

    fn coupler(config: Config) -> Coupler {
        let adapters = AdapterSet::from_config(&config).unwrap();
        Coupler::new(config, adapters)
    }

    #[test]
    fn bootstrap_row_carries_delivery_and_orbit() {
        let dir = tempdir().unwrap();
        let c = coupler(config(dir.path()));
        let row = c.bootstrap_row();
        assert_eq!(row["H_kg_total"], c.config.delivery.h_kg);
        assert_eq!(row["semimajorax"], AU);
        assert_eq!(row["separation"], AU);
        assert_eq!(row["Time"], 0.0);
    }

    #[test]
    fn bootstrap_iteration_builds_initial_state() {
        let dir = tempdir().unwrap();
        let mut c = coupler(config(dir.path()));
        c.start(false).unwrap();

        assert_eq!(c.step().unwrap(), None);
        let first = c.history().last().unwrap();
        assert_eq!(first.time(), 0.0);
        assert_eq!(first["T_magma"], 3000.0);
        assert!(first["M_atm"] > 0.0);
        assert!(first["F_ins"] > 0.0);
        assert_eq!(first["esc_rate_total"], 0.0);
        assert_eq!(read_status(&c.dirs().status()).unwrap(), Status::Running);
        assert!(c.dirs().helpfile().exists());
        assert!(c.dirs().config_copy().exists());
        assert!(c.dirs().spectrum_file(0.0).exists());
    }

    #[test]
    fn step_before_start_is_refused() {
        let dir = tempdir().unwrap();
        let mut c = coupler(config(dir.path()));
        assert!(matches!(c.step(), Err(CouplerError::NotRunning(_))));
    }

    #[test]
    fn removing_keepalive_stops_the_run() {
        let dir = tempdir().unwrap();
        let mut c = coupler(config(dir.path()));
        c.start(false).unwrap();
        c.step().unwrap();
        c.step().unwrap();

        fs::remove_file(c.dirs().keepalive()).unwrap();
        assert_eq!(c.step().unwrap(), Some(Status::ExternalStop));
        assert_eq!(c.state(), CouplerState::Done);
        assert_eq!(read_status(&c.dirs().status()).unwrap(), Status::ExternalStop);
    }

    #[test]
    fn keepalive_removal_waits_for_minimum_iterations() {
        let dir = tempdir().unwrap();
        let mut config = config(dir.path());
        config.params.stop.iters.minimum = 10;
        let mut c = coupler(config);
        c.start(false).unwrap();
        c.step().unwrap();

        fs::remove_file(c.dirs().keepalive()).unwrap();
        for _ in 1..10 {
            assert_eq!(c.step().unwrap(), None);
            assert_eq!(c.state(), CouplerState::Running);
        }
        assert_eq!(read_status(&c.dirs().status()).unwrap(), Status::Running);

        assert!(c.step().unwrap().is_some());
        assert_eq!(c.state(), CouplerState::Done);
        assert_eq!(c.history().len(), 11);
    }

    #[test]
    fn existing_history_requires_overwrite() {
        let dir = tempdir().unwrap();
        {
            let mut c = coupler(config(dir.path()));
            c.start(false).unwrap();
            c.step().unwrap();
        }

        let mut c = coupler(config(dir.path()));
        assert!(matches!(c.start(false), Err(CouplerError::Resume(_))));
        assert!(!c.dirs().keepalive().exists());

        let mut overwrite = config(dir.path());
        overwrite.params.out.overwrite = true;
        let mut c = coupler(overwrite);
        c.start(false).unwrap();
        assert!(!c.dirs().helpfile().exists());
    }

    #[test]
    fn adapter_failure_flushes_status_and_releases_lock() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.interior.dummy.tmagma_max = 2000.0;
        let mut c = coupler(cfg);
        c.start(false).unwrap();

        let err = c.step().unwrap_err();
        assert_eq!(err.status(), Status::PhysicsDivergence);
        assert_eq!(read_status(&c.dirs().status()).unwrap(), Status::PhysicsDivergence);
        assert!(!c.dirs().keepalive().exists());
        assert_eq!(c.state(), CouplerState::Done);
    }

    #[test]
    fn escape_waits_for_init_phase() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.params.loops.init = 2;
        let mut c = coupler(cfg);
        c.start(false).unwrap();

        for _ in 0..3 {
            c.step().unwrap();
        }
        assert_eq!(c.history().last().unwrap()["esc_rate_total"], 0.0);

        c.step().unwrap();
        let row = c.history().last().unwrap();
        assert!(row["esc_rate_total"] > 0.0);
        assert!(row["esc_rate_H"] > 0.0);
        assert!(row["H_kg_total"] < c.config.delivery.h_kg);
    }
}
