//! Dummy escape module.

use super::{Adapter, AdapterError, AdapterOutput, Domain, StepContext};
use crate::config::DummyEscapeConfig;
use crate::record::{Row, Updates};

/// Constant bulk escape rate. The elemental split is left to the ledger.
pub struct DummyEscape {
    config: DummyEscapeConfig,
}

impl DummyEscape {
    pub fn new(config: DummyEscapeConfig) -> Self {
        Self { config }
    }
}

impl Adapter for DummyEscape {
    fn domain(&self) -> Domain {
        Domain::Escape
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
        updates.set("esc_rate_total", self.config.rate);
        Ok(AdapterOutput::new(updates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RefreshFlags;
    use crate::coupler::RunDirs;

    #[test]
    fn reports_only_the_bulk_rate() {
        let dirs = RunDirs::new("unused");
        let ctx = StepContext {
            dirs: &dirs,
            iteration: 4,
            bootstrap: false,
            time: 100.0,
            refresh: RefreshFlags::default(),
        };
        let mut escape = DummyEscape::new(DummyEscapeConfig { rate: 3.5e5 });

        let out = escape.run(&ctx, &Row::zero(), 10.0).unwrap();
        assert_eq!(out.updates.get("esc_rate_total"), Some(3.5e5));
        assert_eq!(out.updates.get("esc_rate_H"), None);
        assert_eq!(out.dt_taken, 0.0);
    }
}
