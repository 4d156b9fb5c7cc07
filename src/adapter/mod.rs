//! Adapter contract between the coupling loop and the physics modules.
//!
//! Every physical domain (interior, atmosphere, outgassing, escape, star,
//! orbit) is driven through the [`Adapter`] trait: the loop hands an adapter
//! the current working row and a time-step hint, and the adapter returns the
//! fields it updated plus the time step it actually took. Which
//! implementation backs each domain is chosen once from configuration.

mod atmosphere;
mod escape;
mod external;
mod interior;
mod orbit;
mod outgas;
mod star;

pub use atmosphere::DummyAtmosphere;
pub use escape::DummyEscape;
pub use external::ExternalAdapter;
pub use interior::DummyInterior;
pub use orbit::DummyOrbit;
pub use outgas::DummyOutgas;
pub use star::DummyStar;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::{
    AtmosModule, Config, ConfigError, EscapeModule, ExternalConfig, InteriorModule, OrbitModule,
    OutgasModule, StarModule,
};
use crate::coupler::RunDirs;
use crate::record::{Row, UnknownField, Updates};

/// Physical domain an adapter is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Orbit,
    Interior,
    Star,
    Escape,
    Outgassing,
    Atmosphere,
}

impl Domain {
    /// Returns the domain name used in logs and subprocess requests.
    pub fn name(&self) -> &'static str {
        match self {
            Domain::Orbit => "orbit",
            Domain::Interior => "interior",
            Domain::Star => "star",
            Domain::Escape => "escape",
            Domain::Outgassing => "outgas",
            Domain::Atmosphere => "atmos",
        }
    }
}

/// Which stellar quantities must be recomputed this iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshFlags {
    pub instellation: bool,
    pub spectrum: bool,
}

/// Per-call information an adapter may need besides the row.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub dirs: &'a RunDirs,
    /// Index of the row being produced.
    pub iteration: u64,
    /// True for iteration 0, which builds the initial state from the zero row.
    pub bootstrap: bool,
    /// Simulated time (years) the adapter should treat as "now".
    pub time: f64,
    pub refresh: RefreshFlags,
}

/// What an adapter hands back to the loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterOutput {
    pub updates: Updates,
    /// Time step actually taken (years). Only the interior's value advances
    /// simulated time.
    pub dt_taken: f64,
}

impl AdapterOutput {
    pub fn new(updates: Updates) -> Self {
        Self {
            updates,
            dt_taken: 0.0,
        }
    }

    pub fn with_dt(updates: Updates, dt_taken: f64) -> Self {
        Self { updates, dt_taken }
    }
}

/// Errors an adapter can raise. None of them are retried.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("{adapter}: physics diverged: {message}")]
    Divergence { adapter: String, message: String },
    #[error("{adapter}: solver did not converge: {message}")]
    NonConvergence { adapter: String, message: String },
    #[error("{adapter}: {source}")]
    Io {
        adapter: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{adapter}: external process failed: {message}")]
    External { adapter: String, message: String },
    #[error("{adapter}: {source}")]
    Contract {
        adapter: String,
        #[source]
        source: UnknownField,
    },
}

impl AdapterError {
    pub(crate) fn io(adapter: &str, source: std::io::Error) -> Self {
        AdapterError::Io {
            adapter: adapter.to_string(),
            source,
        }
    }

    pub(crate) fn divergence(adapter: &str, message: impl Into<String>) -> Self {
        AdapterError::Divergence {
            adapter: adapter.to_string(),
            message: message.into(),
        }
    }
}

/// A physics module driven by the coupling loop.
pub trait Adapter {
    /// Returns the domain this adapter serves.
    fn domain(&self) -> Domain;

    /// Returns the implementation name.
    fn name(&self) -> &str;

    /// Advances this domain given the working row.
    ///
    /// Must not mutate anything but its own caches and files under
    /// `ctx.dirs`; every change to the shared state is expressed through the
    /// returned updates.
    fn run(
        &mut self,
        ctx: &StepContext<'_>,
        row: &Row,
        dt_hint: f64,
    ) -> Result<AdapterOutput, AdapterError>;

    /// Files that must exist for a run to resume from the row at `time`.
    fn required_files(&self, _dirs: &RunDirs, _time: f64) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Merges adapter updates into `row`.
///
/// Non-finite values are a divergence; unknown field names break the
/// contract. Either way the row is left untouched.
pub fn apply_updates(row: &mut Row, adapter: &str, updates: &Updates) -> Result<(), AdapterError> {
    if let Some((field, value)) = updates.first_non_finite() {
        return Err(AdapterError::divergence(
            adapter,
            format!("non-finite value {value} for '{field}'"),
        ));
    }
    row.apply(updates).map_err(|source| AdapterError::Contract {
        adapter: adapter.to_string(),
        source,
    })
}

/// The adapters selected for a run, one per domain.
pub struct AdapterSet {
    pub orbit: Option<Box<dyn Adapter>>,
    pub interior: Box<dyn Adapter>,
    pub star: Box<dyn Adapter>,
    pub escape: Option<Box<dyn Adapter>>,
    pub outgas: Box<dyn Adapter>,
    pub atmos: Box<dyn Adapter>,
}

fn external(
    domain: Domain,
    module: &'static str,
    section: &Option<ExternalConfig>,
) -> Result<Box<dyn Adapter>, ConfigError> {
    let config = section.clone().ok_or_else(|| ConfigError::Invalid {
        field: format!("{}.{}", domain.name(), module),
        message: "external module selected without its configuration section".to_string(),
    })?;
    Ok(Box::new(ExternalAdapter::new(domain, module, config)))
}

impl AdapterSet {
    /// Builds the adapters named by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let orbit: Option<Box<dyn Adapter>> = match config.orbit.module {
            OrbitModule::None => None,
            OrbitModule::Dummy => Some(Box::new(DummyOrbit::new(config.orbit.dummy.clone()))),
            OrbitModule::Lovepy => Some(external(Domain::Orbit, "lovepy", &config.orbit.lovepy)?),
        };

        let interior: Box<dyn Adapter> = match config.interior.module {
            InteriorModule::Dummy => Box::new(DummyInterior::new(config.interior.dummy.clone())),
            InteriorModule::Spider => external(Domain::Interior, "spider", &config.interior.spider)?,
            InteriorModule::Aragog => external(Domain::Interior, "aragog", &config.interior.aragog)?,
        };

        let star: Box<dyn Adapter> = match config.star.module {
            StarModule::Dummy => Box::new(DummyStar::new(
                config.star.dummy.clone(),
                config.atmos.albedo_pl,
            )),
            StarModule::Mors => external(Domain::Star, "mors", &config.star.mors)?,
        };

        let escape: Option<Box<dyn Adapter>> = match config.escape.module {
            EscapeModule::None => None,
            EscapeModule::Dummy => Some(Box::new(DummyEscape::new(config.escape.dummy.clone()))),
            EscapeModule::Zephyrus => {
                Some(external(Domain::Escape, "zephyrus", &config.escape.zephyrus)?)
            }
        };

        let outgas: Box<dyn Adapter> = match config.outgas.module {
            OutgasModule::Dummy => Box::new(DummyOutgas::new(config.outgas.dummy.clone())),
            OutgasModule::Calliope => {
                external(Domain::Outgassing, "calliope", &config.outgas.calliope)?
            }
            OutgasModule::Atmodeller => {
                external(Domain::Outgassing, "atmodeller", &config.outgas.atmodeller)?
            }
        };

        let atmos: Box<dyn Adapter> = match config.atmos.module {
            AtmosModule::Dummy => Box::new(DummyAtmosphere::new(
                config.atmos.dummy.clone(),
                config.atmos.albedo_pl,
            )),
            AtmosModule::Janus => external(Domain::Atmosphere, "janus", &config.atmos.janus)?,
            AtmosModule::Agni => external(Domain::Atmosphere, "agni", &config.atmos.agni)?,
        };

        Ok(Self {
            orbit,
            interior,
            star,
            escape,
            outgas,
            atmos,
        })
    }

    /// Every configured adapter in phase order.
    pub fn iter(&self) -> impl Iterator<Item = &(dyn Adapter + 'static)> + '_ {
        self.orbit
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.interior.as_ref()))
            .chain(std::iter::once(self.star.as_ref()))
            .chain(self.escape.as_deref())
            .chain(std::iter::once(self.outgas.as_ref()))
            .chain(std::iter::once(self.atmos.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_update_is_a_divergence() {
        let mut row = Row::zero();
        let mut updates = Updates::new();
        updates.set("T_surf", f64::INFINITY);

        let err = apply_updates(&mut row, "dummy", &updates).unwrap_err();
        assert!(matches!(err, AdapterError::Divergence { .. }));
        assert_eq!(row["T_surf"], 0.0);
    }

    #[test]
    fn unknown_field_breaks_the_contract() {
        let mut row = Row::zero();
        let mut updates = Updates::new();
        updates.set("T_surface", 300.0);

        let err = apply_updates(&mut row, "dummy", &updates).unwrap_err();
        assert!(matches!(err, AdapterError::Contract { .. }));
    }

    #[test]
    fn default_configuration_selects_dummies() {
        let adapters = AdapterSet::from_config(&Config::default()).unwrap();
        assert!(adapters.orbit.is_none());
        assert!(adapters.escape.is_some());
        let names: Vec<_> = adapters.iter().map(|a| a.domain()).collect();
        assert_eq!(
            names,
            vec![
                Domain::Interior,
                Domain::Star,
                Domain::Escape,
                Domain::Outgassing,
                Domain::Atmosphere
            ]
        );
        assert!(adapters.iter().all(|a| a.name() == "dummy"));
    }

    #[test]
    fn external_selection_without_section_is_rejected() {
        let mut config = Config::default();
        config.star.module = StarModule::Mors;
        assert!(AdapterSet::from_config(&config).is_err());
    }
}
