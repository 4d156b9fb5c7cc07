//! Run-control parameters: output, time-stepping, loop counts, tolerances
//! and stopping criteria.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The `[params]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub out: OutParams,
    pub dt: DtParams,
    pub loops: LoopParams,
    pub tolerance: ToleranceParams,
    pub stop: StopParams,
}

/// Output location and observer cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutParams {
    /// Output directory for the helpfile, status, lock and data files.
    pub path: PathBuf,
    /// Observer stride in iterations (0 disables per-iteration callbacks).
    pub plot_mod: u64,
    /// Remove an existing helpfile and data directory on a fresh start.
    pub overwrite: bool,
}

impl Default for OutParams {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output"),
            plot_mod: 10,
            overwrite: false,
        }
    }
}

/// How the time-step hint is chosen once the init phase is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtMethod {
    /// Always `dt.maximum`.
    Maximum,
    /// `Time / propconst`.
    Proportional,
    /// Grow or shrink from the last step by the relative change of state.
    #[default]
    Adaptive,
}

/// Time-stepping policy (years).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DtParams {
    pub minimum: f64,
    pub maximum: f64,
    pub initial: f64,
    pub method: DtMethod,
    pub propconst: f64,
    /// Growth factor for the adaptive method.
    pub sfinc: f64,
    /// Shrink factor for the adaptive method.
    pub sfdec: f64,
    /// Relative-change tolerance for the adaptive method.
    pub rtol: f64,
    /// Stellar spectrum refresh interval.
    pub starspec: f64,
    /// Instellation refresh interval.
    pub starinst: f64,
}

impl Default for DtParams {
    fn default() -> Self {
        Self {
            minimum: 1.0,
            maximum: 1e7,
            initial: 30.0,
            method: DtMethod::Adaptive,
            propconst: 52.0,
            sfinc: 1.6,
            sfdec: 0.8,
            rtol: 0.05,
            starspec: 1e9,
            starinst: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopParams {
    /// Number of init-phase iterations after the bootstrap iteration.
    pub init: u32,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self { init: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceParams {
    /// Relative tolerance between `M_atm` and the species sum.
    pub mass_rel: f64,
    /// Volatile inventory (kg, oxygen excluded) below which the planet is desiccated.
    pub desiccation_kg: f64,
}

impl Default for ToleranceParams {
    fn default() -> Self {
        Self {
            mass_rel: 1e-6,
            desiccation_kg: 1e3,
        }
    }
}

/// The `[params.stop]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StopParams {
    /// Require each criterion to hold on two consecutive evaluations.
    pub strict: bool,
    pub iters: IterStop,
    pub time: TimeStop,
    pub solid: SolidStop,
    pub radeqm: RadeqmStop,
    pub steady: SteadyStop,
    pub escape: EscapeStop,
    pub disint: DisintStop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IterStop {
    pub enabled: bool,
    pub minimum: u64,
    pub maximum: u64,
}

impl Default for IterStop {
    fn default() -> Self {
        Self {
            enabled: true,
            minimum: 5,
            maximum: 9000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeStop {
    pub enabled: bool,
    /// Years.
    pub minimum: f64,
    /// Years.
    pub maximum: f64,
}

impl Default for TimeStop {
    fn default() -> Self {
        Self {
            enabled: true,
            minimum: 1e3,
            maximum: 6e9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolidStop {
    pub enabled: bool,
    pub phi_crit: f64,
}

impl Default for SolidStop {
    fn default() -> Self {
        Self {
            enabled: true,
            phi_crit: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadeqmStop {
    pub enabled: bool,
    /// W m-2.
    #[serde(rename = "F_crit")]
    pub f_crit: f64,
}

impl Default for RadeqmStop {
    fn default() -> Self {
        Self {
            enabled: true,
            f_crit: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteadyStop {
    pub enabled: bool,
    /// W m-2.
    #[serde(rename = "F_crit")]
    pub f_crit: f64,
    /// Maximum |dPhi/dt| (per year).
    pub dprel: f64,
    /// Number of trailing rows inspected.
    pub window: u32,
    /// Further consecutive steady iterations required to confirm.
    pub loops: u32,
}

impl Default for SteadyStop {
    fn default() -> Self {
        Self {
            enabled: false,
            f_crit: 0.8,
            dprel: 1e-9,
            window: 5,
            loops: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscapeStop {
    pub enabled: bool,
    /// Fraction of the initial atmosphere mass.
    pub mass_frac: f64,
}

impl Default for EscapeStop {
    fn default() -> Self {
        Self {
            enabled: true,
            mass_frac: 3e-4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisintStop {
    pub enabled: bool,
    pub roche_enabled: bool,
    /// Metres added to the Roche limit.
    pub offset_roche: f64,
    pub spin_enabled: bool,
    /// Seconds added to the breakup period.
    pub offset_spin: f64,
}

impl Default for DisintStop {
    fn default() -> Self {
        Self {
            enabled: false,
            roche_enabled: true,
            offset_roche: 0.0,
            spin_enabled: true,
            offset_spin: 0.0,
        }
    }
}
