//! Per-domain module selection and module parameters.
//!
//! Each domain table names the implementation to use in `module` and may
//! carry one sub-table per implementation, e.g.
//!
//! ```toml
//! [interior]
//! module = "dummy"
//!
//! [interior.dummy]
//! tmagma_ini = 3200.0
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{EARTH_RADIUS, SOLAR_MASS, SOLAR_RADIUS};
use crate::ledger::EscapeReservoir;

/// Settings for an implementation that runs as a subprocess.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalConfig {
    /// Program to execute.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Paths relative to the output directory that must exist before a run
    /// can be resumed from a row. `{key}` expands to the row's file key.
    #[serde(default)]
    pub required_files: Vec<String>,
}

macro_rules! module_kind {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Module name as written in configuration.
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }
    };
}

module_kind!(
    /// Interior evolution implementation.
    InteriorModule { Spider => "spider", Aragog => "aragog", Dummy => "dummy" } default Dummy
);
module_kind!(
    /// Atmosphere implementation.
    AtmosModule { Janus => "janus", Agni => "agni", Dummy => "dummy" } default Dummy
);
module_kind!(
    /// Volatile outgassing implementation.
    OutgasModule { Calliope => "calliope", Atmodeller => "atmodeller", Dummy => "dummy" } default Dummy
);
module_kind!(
    /// Atmospheric escape implementation.
    EscapeModule { Zephyrus => "zephyrus", Dummy => "dummy", None => "none" } default Dummy
);
module_kind!(
    /// Stellar evolution implementation.
    StarModule { Mors => "mors", Dummy => "dummy" } default Dummy
);
module_kind!(
    /// Orbital and tidal implementation.
    OrbitModule { Lovepy => "lovepy", Dummy => "dummy", None => "none" } default None
);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InteriorConfig {
    pub module: InteriorModule,
    /// Forbid the melt fraction from rising and the net flux from going negative.
    pub prevent_warming: bool,
    pub dummy: DummyInteriorConfig,
    pub spider: Option<ExternalConfig>,
    pub aragog: Option<ExternalConfig>,
}

/// Lumped-parameter magma ocean.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyInteriorConfig {
    /// Initial magma temperature (K).
    pub tmagma_ini: f64,
    /// Temperature above which the evolution is treated as diverged (K).
    pub tmagma_max: f64,
    pub t_solidus: f64,
    pub t_liquidus: f64,
    /// Mantle mass (kg).
    pub mantle_mass: f64,
    /// Core mass (kg).
    pub core_mass: f64,
    /// Interior radius (m).
    pub radius: f64,
    /// Specific heat of the mantle (J kg-1 K-1).
    pub heat_capacity: f64,
    /// Radiogenic heat flux at the surface (W m-2).
    pub radio_flux: f64,
}

impl Default for DummyInteriorConfig {
    fn default() -> Self {
        Self {
            tmagma_ini: 3000.0,
            tmagma_max: 1e4,
            t_solidus: 1420.0,
            t_liquidus: 2020.0,
            mantle_mass: 4.03e24,
            core_mass: 1.94e24,
            radius: EARTH_RADIUS,
            heat_capacity: 1200.0,
            radio_flux: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosConfig {
    pub module: AtmosModule,
    /// Bond albedo of the planet.
    pub albedo_pl: f64,
    pub dummy: DummyAtmosConfig,
    pub janus: Option<ExternalConfig>,
    pub agni: Option<ExternalConfig>,
}

impl Default for AtmosConfig {
    fn default() -> Self {
        Self {
            module: AtmosModule::Dummy,
            albedo_pl: 0.0,
            dummy: DummyAtmosConfig::default(),
            janus: None,
            agni: None,
        }
    }
}

/// Grey two-stream atmosphere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyAtmosConfig {
    /// Grey longwave opacity (m2 kg-1).
    pub kappa: f64,
}

impl Default for DummyAtmosConfig {
    fn default() -> Self {
        Self { kappa: 1e-3 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgasConfig {
    pub module: OutgasModule,
    pub dummy: DummyOutgasConfig,
    pub calliope: Option<ExternalConfig>,
    pub atmodeller: Option<ExternalConfig>,
}

/// Fixed speciation with melt-fraction-scaled dissolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyOutgasConfig {
    /// Fraction of each species held in the melt when fully molten.
    pub dissolved_frac: f64,
}

impl Default for DummyOutgasConfig {
    fn default() -> Self {
        Self { dissolved_frac: 0.3 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EscapeConfig {
    pub module: EscapeModule,
    pub reservoir: EscapeReservoir,
    pub dummy: DummyEscapeConfig,
    pub zephyrus: Option<ExternalConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyEscapeConfig {
    /// Bulk escape rate (kg s-1).
    pub rate: f64,
}

impl Default for DummyEscapeConfig {
    fn default() -> Self {
        Self { rate: 2e4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StarConfig {
    pub module: StarModule,
    /// Stellar age when the simulation starts (years).
    pub age_ini: f64,
    pub dummy: DummyStarConfig,
    pub mors: Option<ExternalConfig>,
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            module: StarModule::Dummy,
            age_ini: 5e7,
            dummy: DummyStarConfig::default(),
            mors: None,
        }
    }
}

/// Blackbody star with a faint-young-star luminosity history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyStarConfig {
    /// Stellar mass (kg).
    pub mass: f64,
    /// Stellar radius (m).
    pub radius: f64,
    /// Effective temperature (K).
    pub teff: f64,
    /// Age at which the star has its present luminosity (years).
    pub age_now: f64,
}

impl Default for DummyStarConfig {
    fn default() -> Self {
        Self {
            mass: SOLAR_MASS,
            radius: SOLAR_RADIUS,
            teff: 5772.0,
            age_now: 4.567e9,
        }
    }
}

/// Initial orbit, used as-is when `module = "none"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub module: OrbitModule,
    /// Semi-major axis (AU).
    pub semimajoraxis: f64,
    pub eccentricity: f64,
    pub dummy: DummyOrbitConfig,
    pub lovepy: Option<ExternalConfig>,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            module: OrbitModule::None,
            semimajoraxis: 1.0,
            eccentricity: 0.0,
            dummy: DummyOrbitConfig::default(),
            lovepy: None,
        }
    }
}

/// Fixed rotation with constant tidal heating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyOrbitConfig {
    /// Rotation period (hours).
    pub axial_period: f64,
    /// Tidal heat flux at the surface (W m-2).
    pub tidal_flux: f64,
}

impl Default for DummyOrbitConfig {
    fn default() -> Self {
        Self {
            axial_period: 24.0,
            tidal_flux: 0.0,
        }
    }
}

/// Bulk volatile inventory delivered to the planet before iteration 0 (kg).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    #[serde(rename = "H_kg")]
    pub h_kg: f64,
    #[serde(rename = "C_kg")]
    pub c_kg: f64,
    #[serde(rename = "N_kg")]
    pub n_kg: f64,
    #[serde(rename = "S_kg")]
    pub s_kg: f64,
    #[serde(rename = "He_kg")]
    pub he_kg: f64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            h_kg: 1.55e20,
            c_kg: 1.0e20,
            n_kg: 2.0e18,
            s_kg: 1.0e19,
            he_kg: 0.0,
        }
    }
}
