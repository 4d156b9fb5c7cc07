//! Blackbody star with a faint-young-star luminosity history.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::debug;

use super::{Adapter, AdapterError, AdapterOutput, Domain, StepContext};
use crate::config::DummyStarConfig;
use crate::constants::{AU, BOLTZMANN, PLANCK, SPEED_OF_LIGHT, STEFAN_BOLTZMANN};
use crate::record::{Row, Updates};

const SPECTRUM_BINS: usize = 200;
const SPECTRUM_MIN_NM: f64 = 10.0;
const SPECTRUM_MAX_NM: f64 = 1.0e5;

/// Spectral flux density (W m-2 nm-1) of a blackbody of temperature `teff`
/// and radius `radius`, seen from 1 AU, at wavelength `wl_nm`.
fn planck_at_1au(wl_nm: f64, teff: f64, radius: f64) -> f64 {
    let wl = wl_nm * 1e-9;
    let exponent = PLANCK * SPEED_OF_LIGHT / (wl * BOLTZMANN * teff);
    let radiance = 2.0 * PLANCK * SPEED_OF_LIGHT * SPEED_OF_LIGHT / wl.powi(5) / exponent.exp_m1();
    PI * radiance * (radius / AU).powi(2) * 1e-9
}

pub struct DummyStar {
    config: DummyStarConfig,
    albedo: f64,
    /// (wavelength nm, flux at 1 AU W m-2 nm-1)
    spectrum: Option<Vec<(f64, f64)>>,
}

impl DummyStar {
    pub fn new(config: DummyStarConfig, albedo: f64) -> Self {
        Self {
            config,
            albedo,
            spectrum: None,
        }
    }

    /// Bolometric luminosity (W) at stellar age `age` (years).
    pub fn luminosity(&self, age: f64) -> f64 {
        let c = &self.config;
        let present = 4.0 * PI * c.radius * c.radius * STEFAN_BOLTZMANN * c.teff.powi(4);
        let dimming = (1.0 + 0.4 * (1.0 - age / c.age_now)).max(0.1);
        present / dimming
    }

    fn spectrum(&mut self) -> &[(f64, f64)] {
        let (teff, radius) = (self.config.teff, self.config.radius);
        self.spectrum.get_or_insert_with(|| {
            let step = (SPECTRUM_MAX_NM / SPECTRUM_MIN_NM).ln() / (SPECTRUM_BINS - 1) as f64;
            (0..SPECTRUM_BINS)
                .map(|i| {
                    let wl = SPECTRUM_MIN_NM * (step * i as f64).exp();
                    (wl, planck_at_1au(wl, teff, radius))
                })
                .collect()
        })
    }
}

impl Adapter for DummyStar {
    fn domain(&self) -> Domain {
        Domain::Star
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
        let mut updates = Updates::new();

        if ctx.refresh.spectrum {
            self.spectrum = None;
            let path = ctx.dirs.spectrum_file(ctx.time);
            let file = File::create(&path).map_err(|e| AdapterError::io("dummy", e))?;
            let mut writer = BufWriter::new(file);
            let write = |writer: &mut BufWriter<File>, spectrum: &[(f64, f64)]| -> std::io::Result<()> {
                writeln!(writer, "# wavelength_nm\tflux_W_m2_nm")?;
                for (wl, flux) in spectrum {
                    writeln!(writer, "{:e}\t{:e}", wl, flux)?;
                }
                writer.flush()
            };
            write(&mut writer, self.spectrum()).map_err(|e| AdapterError::io("dummy", e))?;
            debug!(path = %path.display(), "stellar spectrum written");
        }

        if ctx.refresh.instellation || ctx.refresh.spectrum {
            let c = &self.config;
            let luminosity = self.luminosity(row["age_star"]);
            let separation = row["separation"];
            if !(separation > 0.0) {
                return Err(AdapterError::divergence(
                    self.name(),
                    format!("orbital separation {separation} m is not positive"),
                ));
            }
            let f_ins = luminosity / (4.0 * PI * separation * separation);
            let t_eqm = (f_ins * (1.0 - self.albedo) / (4.0 * STEFAN_BOLTZMANN)).powf(0.25);

            updates
                .set("M_star", c.mass)
                .set("R_star", c.radius)
                .set("T_star", c.teff)
                .set("L_star", luminosity)
                .set("F_ins", f_ins)
                .set("T_eqm", t_eqm)
                .set("T_skin", t_eqm * 0.5f64.powf(0.25));
        }

        Ok(AdapterOutput::new(updates))
    }
}
