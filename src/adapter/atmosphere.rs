//! Grey atmosphere over a magma surface.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use serde::Serialize;

use super::{Adapter, AdapterError, AdapterOutput, Domain, StepContext};
use crate::config::DummyAtmosConfig;
use crate::constants::{G, PA_PER_BAR, STEFAN_BOLTZMANN};
use crate::coupler::RunDirs;
use crate::record::{Row, Updates};

#[derive(Serialize)]
struct AtmosphereSnapshot {
    time: f64,
    #[serde(rename = "T_surf")]
    t_surf: f64,
    #[serde(rename = "P_surf")]
    p_surf: f64,
    tau: f64,
    #[serde(rename = "F_olr")]
    f_olr: f64,
    #[serde(rename = "F_atm")]
    f_atm: f64,
}

/// Surface temperature tracks the magma; outgoing longwave radiation is
/// attenuated by a grey optical depth `tau = kappa P / g`.
pub struct DummyAtmosphere {
    config: DummyAtmosConfig,
    albedo: f64,
}

impl DummyAtmosphere {
    pub fn new(config: DummyAtmosConfig, albedo: f64) -> Self {
        Self { config, albedo }
    }
}

impl Adapter for DummyAtmosphere {
    fn domain(&self) -> Domain {
        Domain::Atmosphere
    }

    fn name(&self) -> &str {
        "dummy"
    }

    fn run(
        &mut self,
        ctx: &StepContext<'_>,
        row: &Row,
        _dt_hint: f64,
    ) -> Result<AdapterOutput, AdapterError> {
        let r_int = row["R_int"];
        let gravity = if r_int > 0.0 {
            G * (row["M_mantle"] + row["M_core"]) / (r_int * r_int)
        } else {
            0.0
        };

        let p_surf = row["P_surf"];
        let tau = if gravity > 0.0 {
            self.config.kappa * p_surf * PA_PER_BAR / gravity
        } else {
            0.0
        };

        let t_surf = row["T_magma"];
        let f_olr = STEFAN_BOLTZMANN * t_surf.powi(4) / (1.0 + 0.75 * tau);
        let f_ins = row["F_ins"];
        let absorbed = f_ins * (1.0 - self.albedo) / 4.0;
        let f_atm = f_olr - absorbed;

        let mut updates = Updates::new();
        updates
            .set("T_surf", t_surf)
            .set("F_olr", f_olr)
            .set("F_sct", f_ins * self.albedo / 4.0)
            .set("F_atm", f_atm);

        let path = ctx.dirs.atmosphere_file(ctx.time);
        let file = File::create(&path).map_err(|e| AdapterError::io(self.name(), e))?;
        serde_json::to_writer_pretty(
            BufWriter::new(file),
            &AtmosphereSnapshot {
                time: ctx.time,
                t_surf,
                p_surf,
                tau,
                f_olr,
                f_atm,
            },
        )
        .map_err(|e| AdapterError::io(self.name(), e.into()))?;

        Ok(AdapterOutput::new(updates))
    }

    fn required_files(&self, dirs: &RunDirs, time: f64) -> Vec<PathBuf> {
        vec![dirs.atmosphere_file(time)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RefreshFlags;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn thicker_atmosphere_traps_more_heat() {
        let dir = tempdir().unwrap();
        let dirs = RunDirs::new(dir.path());
        dirs.create().unwrap();
        let ctx = StepContext {
            dirs: &dirs,
            iteration: 3,
            bootstrap: false,
            time: 42.0,
            refresh: RefreshFlags::default(),
        };
        let mut atmos = DummyAtmosphere::new(DummyAtmosConfig::default(), 0.3);

        let mut row = Row::zero();
        row["T_magma"] = 2000.0;
        row["M_mantle"] = 4e24;
        row["M_core"] = 2e24;
        row["R_int"] = 6.371e6;
        row["F_ins"] = 1361.0;

        let bare = atmos.run(&ctx, &row, 0.0).unwrap();
        row["P_surf"] = 100.0;
        let thick = atmos.run(&ctx, &row, 0.0).unwrap();

        let bare_olr = bare.updates.get("F_olr").unwrap();
        assert_relative_eq!(bare_olr, STEFAN_BOLTZMANN * 2000f64.powi(4), max_relative = 1e-12);
        assert!(thick.updates.get("F_olr").unwrap() < bare_olr);
        assert_relative_eq!(
            bare.updates.get("F_atm").unwrap(),
            bare_olr - 1361.0 * 0.7 / 4.0,
            max_relative = 1e-12
        );
        assert!(dirs.atmosphere_file(42.0).exists());
    }
}
