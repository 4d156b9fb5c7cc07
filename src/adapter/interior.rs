//! Lumped-parameter magma ocean.
//!
//! The whole mantle is one heat reservoir at `T_magma` that loses the net
//! flux the atmosphere lets through and gains tidal and radiogenic heat. The
//! melt fraction follows linearly between solidus and liquidus.

use std::f64::consts::PI;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use super::{Adapter, AdapterError, AdapterOutput, Domain, StepContext};
use crate::config::DummyInteriorConfig;
use crate::constants::SECONDS_PER_YEAR;
use crate::coupler::RunDirs;
use crate::record::{Row, Updates};

#[derive(Serialize)]
struct InteriorSnapshot {
    time: f64,
    dt: f64,
    #[serde(rename = "T_magma")]
    t_magma: f64,
    #[serde(rename = "Phi_global")]
    phi_global: f64,
    #[serde(rename = "F_int")]
    f_int: f64,
}

pub struct DummyInterior {
    config: DummyInteriorConfig,
}

impl DummyInterior {
    pub fn new(config: DummyInteriorConfig) -> Self {
        Self { config }
    }

    fn melt_fraction(&self, t_magma: f64) -> f64 {
        let c = &self.config;
        ((t_magma - c.t_solidus) / (c.t_liquidus - c.t_solidus)).clamp(0.0, 1.0)
    }

    fn surface_area(&self) -> f64 {
        4.0 * PI * self.config.radius * self.config.radius
    }

    fn write_snapshot(&self, path: PathBuf, snapshot: &InteriorSnapshot) -> Result<(), AdapterError> {
        let file = File::create(&path).map_err(|e| AdapterError::io(self.name(), e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), snapshot)
            .map_err(|e| AdapterError::io(self.name(), e.into()))
    }
}

impl Adapter for DummyInterior {
    fn domain(&self) -> Domain {
        Domain::Interior
    }

    fn name(&self) -> &str {
        "dummy"
    }

    fn run(
        &mut self,
        ctx: &StepContext<'_>,
        row: &Row,
        dt_hint: f64,
    ) -> Result<AdapterOutput, AdapterError> {
        let c = &self.config;

        let (t_magma, dt, f_int) = if ctx.bootstrap {
            (c.tmagma_ini, 0.0, 0.0)
        } else {
            let dt = dt_hint.max(0.0);
            let f_int = row["F_atm"];
            let heating = row["F_tidal"] + c.radio_flux;
            let energy = (f_int - heating) * self.surface_area() * dt * SECONDS_PER_YEAR;
            let t_new = row["T_magma"] - energy / (c.mantle_mass * c.heat_capacity);
            (t_new, dt, f_int)
        };

        if !t_magma.is_finite() || t_magma <= 0.0 || t_magma > c.tmagma_max {
            return Err(AdapterError::divergence(
                self.name(),
                format!("T_magma = {t_magma} K outside (0, {}] after dt = {dt} yr", c.tmagma_max),
            ));
        }

        let phi = self.melt_fraction(t_magma);
        debug!(t_magma, phi, dt, "interior advanced");

        let mut updates = Updates::new();
        updates
            .set("T_magma", t_magma)
            .set("Phi_global", phi)
            .set("M_mantle", c.mantle_mass)
            .set("M_mantle_liquid", phi * c.mantle_mass)
            .set("M_mantle_solid", (1.0 - phi) * c.mantle_mass)
            .set("M_core", c.core_mass)
            .set("R_int", c.radius)
            .set("F_int", f_int)
            .set("F_radio", c.radio_flux);

        let time = ctx.time + dt;
        self.write_snapshot(
            ctx.dirs.interior_file(time),
            &InteriorSnapshot {
                time,
                dt,
                t_magma,
                phi_global: phi,
                f_int,
            },
        )?;

        Ok(AdapterOutput::with_dt(updates, dt))
    }

    fn required_files(&self, dirs: &RunDirs, time: f64) -> Vec<PathBuf> {
        vec![dirs.interior_file(time)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RefreshFlags;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn context(dirs: &RunDirs, bootstrap: bool, time: f64) -> StepContext<'_> {
        StepContext {
            dirs,
            iteration: if bootstrap { 0 } else { 1 },
            bootstrap,
            time,
            refresh: RefreshFlags::default(),
        }
    }

    #[test]
    fn bootstrap_sets_initial_state_without_advancing_time() {
        let dir = tempdir().unwrap();
        let dirs = RunDirs::new(dir.path());
        dirs.create().unwrap();
        let mut interior = DummyInterior::new(DummyInteriorConfig::default());

        let out = interior
            .run(&context(&dirs, true, 0.0), &Row::zero(), 0.0)
            .unwrap();

        assert_eq!(out.dt_taken, 0.0);
        assert_eq!(out.updates.get("T_magma"), Some(3000.0));
        assert_eq!(out.updates.get("Phi_global"), Some(1.0));
        assert!(dirs.interior_file(0.0).exists());
    }

    #[test]
    fn positive_net_flux_cools_the_mantle() {
        let dir = tempdir().unwrap();
        let dirs = RunDirs::new(dir.path());
        dirs.create().unwrap();
        let config = DummyInteriorConfig::default();
        let mut interior = DummyInterior::new(config.clone());

        let mut row = Row::zero();
        row["T_magma"] = 1700.0;
        row["F_atm"] = 1000.0;

        let out = interior.run(&context(&dirs, false, 100.0), &row, 1000.0).unwrap();

        let area = 4.0 * PI * config.radius * config.radius;
        let expected = 1700.0 - 1000.0 * area * 1000.0 * SECONDS_PER_YEAR
            / (config.mantle_mass * config.heat_capacity);
        assert_eq!(out.dt_taken, 1000.0);
        assert_relative_eq!(out.updates.get("T_magma").unwrap(), expected, max_relative = 1e-12);
        let phi = out.updates.get("Phi_global").unwrap();
        assert!(phi > 0.0 && phi < 0.5);
        assert!(dirs.interior_file(1100.0).exists());
    }

    #[test]
    fn runaway_cooling_is_a_divergence() {
        let dir = tempdir().unwrap();
        let dirs = RunDirs::new(dir.path());
        dirs.create().unwrap();
        let mut interior = DummyInterior::new(DummyInteriorConfig::default());

        let mut row = Row::zero();
        row["T_magma"] = 2000.0;
        row["F_atm"] = 1e9;

        let err = interior.run(&context(&dirs, false, 0.0), &row, 1e7).unwrap_err();
        assert!(matches!(err, AdapterError::Divergence { .. }));
    }
}
