//! Dummy orbit module: fixed spin period and tidal heating.

use super::{Adapter, AdapterError, AdapterOutput, Domain, StepContext};
use crate::config::DummyOrbitConfig;
use crate::constants::SECONDS_PER_DAY;
use crate::record::{Row, Updates};

/// Fixed rotation and constant tidal heating on the configured orbit.
pub struct DummyOrbit {
    config: DummyOrbitConfig,
}

impl DummyOrbit {
    pub fn new(config: DummyOrbitConfig) -> Self {
        Self { config }
    }
}

impl Adapter for DummyOrbit {
    fn domain(&self) -> Domain {
        Domain::Orbit
    }

    fn name(&self) -> &str {
        "dummy"
    }

    fn run(
        &mut self,
        _ctx: &StepContext<'_>,
        _row: &Row,
        _dt_hint: f64,
    ) -> Result<AdapterOutput, AdapterError> {
        let mut updates = Updates::new();
        updates
            .set("axial_period", self.config.axial_period * SECONDS_PER_DAY / 24.0)
            .set("F_tidal", self.config.tidal_flux);
        Ok(AdapterOutput::new(updates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RefreshFlags;
    use crate::coupler::RunDirs;

    #[test]
    fn rotation_period_is_reported_in_seconds() {
        let dirs = RunDirs::new("unused");
        let ctx = StepContext {
            dirs: &dirs,
            iteration: 1,
            bootstrap: false,
            time: 0.0,
            refresh: RefreshFlags::default(),
        };
        let mut orbit = DummyOrbit::new(DummyOrbitConfig {
            axial_period: 12.0,
            tidal_flux: 0.5,
        });

        let out = orbit.run(&ctx, &Row::zero(), 10.0).unwrap();
        assert_eq!(out.updates.get("axial_period"), Some(43_200.0));
        assert_eq!(out.updates.get("F_tidal"), Some(0.5));
        assert_eq!(out.dt_taken, 0.0);
    }
}
