//! Run configuration.
//!
//! Loaded once from a TOML file, validated, and treated as immutable for the
//! lifetime of a run. Every table is optional and falls back to its
//! [`Default`], so a minimal file only needs the fields that differ.

mod modules;
mod params;

pub use modules::{
    AtmosConfig, AtmosModule, DeliveryConfig, DummyAtmosConfig, DummyEscapeConfig,
    DummyInteriorConfig, DummyOrbitConfig, DummyOutgasConfig, DummyStarConfig, EscapeConfig,
    EscapeModule, ExternalConfig, InteriorConfig, InteriorModule, OrbitConfig, OrbitModule,
    OutgasConfig, OutgasModule, StarConfig, StarModule,
};
pub use params::{
    DisintStop, DtMethod, DtParams, EscapeStop, IterStop, LoopParams, OutParams, Params,
    RadeqmStop, SolidStop, SteadyStop, StopParams, TimeStop, ToleranceParams,
};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadConfigFile { path: String, message: String },
    #[error("failed to parse config file {path}: {message}")]
    ParseConfigFile { path: String, message: String },
    #[error("invalid configuration: {field}: {message}")]
    Invalid { field: String, message: String },
    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub params: Params,
    pub star: StarConfig,
    pub orbit: OrbitConfig,
    pub interior: InteriorConfig,
    pub escape: EscapeConfig,
    pub outgas: OutgasConfig,
    pub atmos: AtmosConfig,
    pub delivery: DeliveryConfig,
}

impl Config {
    /// Reads, parses and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| ConfigError::ReadConfigFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let config: Config = toml::from_str(&content).map_err(|err| ConfigError::ParseConfigFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|err| ConfigError::ParseConfigFile {
            path: "<string>".to_string(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Serialize(err.to_string()))
    }

    /// Checks every cross-field constraint; the first violation is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_modules()?;
        self.validate_dt()?;
        self.validate_stop()?;
        self.validate_physics()?;
        Ok(())
    }

    fn validate_modules(&self) -> Result<(), ConfigError> {
        let selected: [(&str, Option<&ExternalConfig>, bool); 6] = [
            (
                "interior",
                match self.interior.module {
                    InteriorModule::Spider => self.interior.spider.as_ref(),
                    InteriorModule::Aragog => self.interior.aragog.as_ref(),
                    InteriorModule::Dummy => None,
                },
                self.interior.module != InteriorModule::Dummy,
            ),
            (
                "atmos",
                match self.atmos.module {
                    AtmosModule::Janus => self.atmos.janus.as_ref(),
                    AtmosModule::Agni => self.atmos.agni.as_ref(),
                    AtmosModule::Dummy => None,
                },
                self.atmos.module != AtmosModule::Dummy,
            ),
            (
                "outgas",
                match self.outgas.module {
                    OutgasModule::Calliope => self.outgas.calliope.as_ref(),
                    OutgasModule::Atmodeller => self.outgas.atmodeller.as_ref(),
                    OutgasModule::Dummy => None,
                },
                self.outgas.module != OutgasModule::Dummy,
            ),
            (
                "escape",
                self.escape.zephyrus.as_ref(),
                self.escape.module == EscapeModule::Zephyrus,
            ),
            ("star", self.star.mors.as_ref(), self.star.module == StarModule::Mors),
            (
                "orbit",
                self.orbit.lovepy.as_ref(),
                self.orbit.module == OrbitModule::Lovepy,
            ),
        ];

        for (domain, section, external) in selected {
            if !external {
                continue;
            }
            match section {
                None => {
                    return Err(invalid(
                        &format!("{domain}.module"),
                        "external module selected without its configuration section",
                    ))
                }
                Some(ext) if ext.command.trim().is_empty() => {
                    return Err(invalid(&format!("{domain}.command"), "must not be empty"))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn validate_dt(&self) -> Result<(), ConfigError> {
        let dt = &self.params.dt;
        if !(dt.minimum >= 1.0) {
            return Err(invalid("params.dt.minimum", "must be at least 1 year"));
        }
        if !(dt.minimum <= dt.initial && dt.initial <= dt.maximum) {
            return Err(invalid(
                "params.dt.initial",
                format!(
                    "must satisfy minimum ({}) <= initial ({}) <= maximum ({})",
                    dt.minimum, dt.initial, dt.maximum
                ),
            ));
        }
        if !(dt.propconst > 0.0) {
            return Err(invalid("params.dt.propconst", "must be positive"));
        }
        if !(dt.sfinc > 1.0) {
            return Err(invalid("params.dt.sfinc", "must be greater than 1"));
        }
        if !(dt.sfdec > 0.0 && dt.sfdec < 1.0) {
            return Err(invalid("params.dt.sfdec", "must lie in (0, 1)"));
        }
        if !(dt.rtol > 0.0) {
            return Err(invalid("params.dt.rtol", "must be positive"));
        }
        if !(dt.starspec > 0.0) {
            return Err(invalid("params.dt.starspec", "must be positive"));
        }
        if !(dt.starinst > 0.0) {
            return Err(invalid("params.dt.starinst", "must be positive"));
        }
        Ok(())
    }

    fn validate_stop(&self) -> Result<(), ConfigError> {
        let stop = &self.params.stop;
        if stop.iters.minimum >= stop.iters.maximum {
            return Err(invalid(
                "params.stop.iters",
                format!(
                    "minimum ({}) must be less than maximum ({})",
                    stop.iters.minimum, stop.iters.maximum
                ),
            ));
        }
        if !(stop.time.minimum < stop.time.maximum) {
            return Err(invalid(
                "params.stop.time",
                format!(
                    "minimum ({}) must be less than maximum ({})",
                    stop.time.minimum, stop.time.maximum
                ),
            ));
        }
        if u64::from(self.params.loops.init) >= stop.iters.maximum {
            return Err(invalid(
                "params.loops.init",
                "must be less than params.stop.iters.maximum",
            ));
        }
        if !(0.0..=1.0).contains(&stop.solid.phi_crit) {
            return Err(invalid("params.stop.solid.phi_crit", "must lie in [0, 1]"));
        }
        if !(stop.radeqm.f_crit > 0.0) {
            return Err(invalid("params.stop.radeqm.F_crit", "must be positive"));
        }
        if !(stop.steady.f_crit > 0.0) {
            return Err(invalid("params.stop.steady.F_crit", "must be positive"));
        }
        if !(stop.steady.dprel > 0.0) {
            return Err(invalid("params.stop.steady.dprel", "must be positive"));
        }
        if stop.steady.window < 2 {
            return Err(invalid("params.stop.steady.window", "must be at least 2"));
        }
        if !(stop.escape.mass_frac >= 0.0 && stop.escape.mass_frac < 1.0) {
            return Err(invalid("params.stop.escape.mass_frac", "must lie in [0, 1)"));
        }
        Ok(())
    }

    fn validate_physics(&self) -> Result<(), ConfigError> {
        let tol = &self.params.tolerance;
        if !(tol.mass_rel > 0.0) {
            return Err(invalid("params.tolerance.mass_rel", "must be positive"));
        }
        if !(tol.desiccation_kg > 0.0) {
            return Err(invalid("params.tolerance.desiccation_kg", "must be positive"));
        }

        let interior = &self.interior.dummy;
        if !(interior.t_solidus < interior.t_liquidus) {
            return Err(invalid(
                "interior.dummy.t_solidus",
                "must be below interior.dummy.t_liquidus",
            ));
        }
        if !(interior.mantle_mass > 0.0 && interior.radius > 0.0 && interior.heat_capacity > 0.0) {
            return Err(invalid(
                "interior.dummy",
                "mantle_mass, radius and heat_capacity must be positive",
            ));
        }
        if !(interior.core_mass >= 0.0) {
            return Err(invalid("interior.dummy.core_mass", "must not be negative"));
        }

        if !(0.0..1.0).contains(&self.atmos.albedo_pl) {
            return Err(invalid("atmos.albedo_pl", "must lie in [0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.outgas.dummy.dissolved_frac) {
            return Err(invalid("outgas.dummy.dissolved_frac", "must lie in [0, 1]"));
        }
        if !(self.escape.dummy.rate >= 0.0) {
            return Err(invalid("escape.dummy.rate", "must not be negative"));
        }
        if !(self.star.age_ini >= 0.0) {
            return Err(invalid("star.age_ini", "must not be negative"));
        }
        if !(self.orbit.semimajoraxis > 0.0) {
            return Err(invalid("orbit.semimajoraxis", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.orbit.eccentricity) {
            return Err(invalid("orbit.eccentricity", "must lie in [0, 1)"));
        }

        let d = &self.delivery;
        for (field, value) in [
            ("delivery.H_kg", d.h_kg),
            ("delivery.C_kg", d.c_kg),
            ("delivery.N_kg", d.n_kg),
            ("delivery.S_kg", d.s_kg),
            ("delivery.He_kg", d.he_kg),
        ] {
            if !(value >= 0.0) {
                return Err(invalid(field, "must not be negative"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.params.dt.method, DtMethod::Adaptive);
        assert_eq!(config.interior.module, InteriorModule::Dummy);
        assert_eq!(config.orbit.module, OrbitModule::None);
    }

    #[test]
    fn parses_nested_tables() {
        let text = r#"
            [params.out]
            path = "runs/earth"
            plot_mod = 2

            [params.dt]
            method = "proportional"
            propconst = 30.0

            [params.stop.radeqm]
            F_crit = 0.5

            [interior]
            module = "dummy"
            prevent_warming = true

            [interior.dummy]
            tmagma_ini = 3500.0

            [escape]
            module = "none"
            reservoir = "outgas"

            [delivery]
            H_kg = 3.1e20
        "#;
        let config = Config::from_toml_str(text).unwrap();

        assert_eq!(config.params.out.path, std::path::PathBuf::from("runs/earth"));
        assert_eq!(config.params.out.plot_mod, 2);
        assert_eq!(config.params.dt.method, DtMethod::Proportional);
        assert_eq!(config.params.stop.radeqm.f_crit, 0.5);
        assert!(config.interior.prevent_warming);
        assert_eq!(config.interior.dummy.tmagma_ini, 3500.0);
        assert_eq!(config.escape.module, EscapeModule::None);
        assert_eq!(config.escape.reservoir, crate::ledger::EscapeReservoir::Outgas);
        assert_eq!(config.delivery.h_kg, 3.1e20);
        assert_eq!(config.delivery.c_kg, DeliveryConfig::default().c_kg);
    }

    #[test]
    fn external_module_requires_its_section() {
        let err = Config::from_toml_str("[atmos]\nmodule = \"agni\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "atmos.module"));

        let text = "[atmos]\nmodule = \"agni\"\n[atmos.agni]\ncommand = \"agni-run\"\n";
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.atmos.agni.unwrap().command, "agni-run");
    }

    #[test]
    fn sub_year_minimum_step_is_rejected() {
        let mut config = Config::default();
        config.params.dt.minimum = 0.5;
        config.params.dt.initial = 0.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "params.dt.minimum"));
    }

    #[test]
    fn initial_step_outside_bounds_is_rejected() {
        let mut config = Config::default();
        config.params.dt.initial = config.params.dt.maximum * 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn iteration_floor_must_be_below_ceiling() {
        let mut config = Config::default();
        config.params.stop.iters.minimum = 10;
        config.params.stop.iters.maximum = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn steady_window_must_span_two_rows() {
        let mut config = Config::default();
        config.params.stop.steady.window = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_module_name_fails_to_parse() {
        let err = Config::from_toml_str("[star]\nmodule = \"baraffe\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseConfigFile { .. }));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadConfigFile { .. }));
    }

    #[test]
    fn from_file_validates_the_parsed_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, "[params.dt]\nminimum = 0.5\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "params.dt.minimum"));
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = Config::default();
        config.params.stop.strict = true;
        config.escape.module = EscapeModule::None;
        let text = config.to_toml_string().unwrap();
        let parsed = Config::from_toml_str(&text).unwrap();
        assert!(parsed.params.stop.strict);
        assert_eq!(parsed.escape.module, EscapeModule::None);
    }
}
