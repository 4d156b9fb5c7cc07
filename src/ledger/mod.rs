//! Flux and mass bookkeeping.
//!
//! Derived aggregates are recomputed purely from the current row plus fixed
//! physical constants after the adapters of an iteration have run. The
//! functions here never invent mass: escape removes inventory proportionally
//! and floors it at zero, and any disagreement between an adapter's reported
//! atmosphere mass and the species sum is an error.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::G;
use crate::record::{escape_field, ratio_field, Element, Gas, Reservoir, Row};

/// Raised when mass bookkeeping disagrees beyond tolerance.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("M_atm = {reported} kg reported by outgassing disagrees with species sum {summed} kg (relative tolerance {tolerance})")]
pub struct ConservationError {
    pub reported: f64,
    pub summed: f64,
    pub tolerance: f64,
}

/// Which inventory sets the elemental split of the bulk escape rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeReservoir {
    /// Whole-planet inventories (`<el>_kg_total`).
    #[default]
    Bulk,
    /// Outgassed inventories only (`<el>_kg_atm`).
    Outgas,
}

impl EscapeReservoir {
    fn reservoir(&self) -> Reservoir {
        match self {
            EscapeReservoir::Bulk => Reservoir::Total,
            EscapeReservoir::Outgas => Reservoir::Atmosphere,
        }
    }
}

/// True when `value` matches `reference` within relative tolerance `rel_tol`.
pub fn within_tolerance(value: f64, reference: f64, rel_tol: f64) -> bool {
    let diff = (value - reference).abs();
    diff == 0.0 || diff <= rel_tol * reference.abs()
}

/// Sum of per-species atmospheric masses (kg).
pub fn aggregate_atmosphere_mass(row: &Row) -> f64 {
    Gas::ALL
        .iter()
        .map(|gas| row[gas.field(Reservoir::Atmosphere).as_str()])
        .sum()
}

/// Interior plus atmosphere mass (kg).
pub fn aggregate_planet_mass(row: &Row) -> f64 {
    interior_mass(row) + row["M_atm"]
}

fn interior_mass(row: &Row) -> f64 {
    row["M_mantle"] + row["M_core"]
}

/// Sets `M_int` and surface gravity `g = G M_int / R_int²`.
pub fn update_gravity(row: &mut Row) {
    let m_int = interior_mass(row);
    let r_int = row["R_int"];
    row["M_int"] = m_int;
    row["gravity"] = if r_int > 0.0 { G * m_int / (r_int * r_int) } else { 0.0 };
}

/// Elemental mass ratios relative to hydrogen (`<el>H_ratio`).
pub fn update_ratios(row: &mut Row) {
    let h = row[Element::H.field(Reservoir::Total).as_str()];
    for element in Element::ALL.iter().filter(|el| **el != Element::H) {
        let mass = row[element.field(Reservoir::Total).as_str()];
        row[ratio_field(*element).as_str()] = if h > 0.0 { mass / h } else { 0.0 };
    }
}

/// Roche limit and rotational breakup period for the current planet.
///
/// `roche_limit = 2.44 R_int (M_star / M_int)^(1/3) + offset_roche` (m) and
/// `breakup_period = 2π sqrt(R_int³ / (G M_int)) + offset_spin` (s). Both stay
/// zero until the interior and star have populated radius and masses.
pub fn update_disruption_limits(row: &mut Row, offset_roche: f64, offset_spin: f64) {
    let m_int = interior_mass(row);
    let r_int = row["R_int"];
    let m_star = row["M_star"];

    row["roche_limit"] = if m_int > 0.0 && r_int > 0.0 && m_star > 0.0 {
        2.44 * r_int * (m_star / m_int).cbrt() + offset_roche
    } else {
        0.0
    };

    row["breakup_period"] = if m_int > 0.0 && r_int > 0.0 {
        2.0 * PI * (r_int.powi(3) / (G * m_int)).sqrt() + offset_spin
    } else {
        0.0
    };
}

/// Unfractionated escape.
///
/// Splits a bulk mass-loss `rate` across elements in proportion to each
/// element's mass fraction within `reservoir`, then subtracts `rate * dt`
/// times that fraction from each element's total inventory, floored at zero.
/// Oxygen is excluded from the split; its inventory is set by the redox
/// state, not by escape. `rate` and `dt` may use any consistent units; the
/// per-element `esc_rate_<el>` fields are written in the units of `rate`.
///
/// Returns the new total inventory of every element that took part.
pub fn apply_escape_split(
    row: &mut Row,
    rate: f64,
    dt: f64,
    reservoir: EscapeReservoir,
) -> Vec<(Element, f64)> {
    let escaping: Vec<Element> = Element::ALL
        .iter()
        .copied()
        .filter(|el| *el != Element::O)
        .collect();

    let source = reservoir.reservoir();
    let reservoir_mass: f64 = escaping
        .iter()
        .map(|el| row[el.field(source).as_str()].max(0.0))
        .sum();

    let mut out = Vec::with_capacity(escaping.len());
    for element in escaping {
        let fraction = if reservoir_mass > 0.0 {
            row[element.field(source).as_str()].max(0.0) / reservoir_mass
        } else {
            0.0
        };

        let total_field = element.field(Reservoir::Total);
        let current = row[total_field.as_str()];
        let updated = (current - rate * dt * fraction).max(0.0);

        row[total_field.as_str()] = updated;
        row[escape_field(element).as_str()] = rate * fraction;
        out.push((element, updated));
    }

    row["esc_rate_total"] = rate;
    out
}

/// Total tracked volatile inventory excluding oxygen (kg).
pub fn volatile_inventory(row: &Row) -> f64 {
    Element::ALL
        .iter()
        .filter(|el| **el != Element::O)
        .map(|el| row[el.field(Reservoir::Total).as_str()])
        .sum()
}

/// Checks for desiccation and, if so, zeroes every outgassing field.
///
/// Returns true when the volatile inventory (oxygen excluded) is below
/// `threshold`. Mean molecular weight and mixing ratios are preserved so
/// downstream consumers never divide by zero. Applying it to an already
/// desiccated row changes nothing.
pub fn check_desiccation(row: &mut Row, threshold: f64) -> bool {
    if volatile_inventory(row) >= threshold {
        return false;
    }

    for gas in Gas::ALL {
        row[gas.bar_field().as_str()] = 0.0;
        for reservoir in Reservoir::ALL {
            row[gas.field(reservoir).as_str()] = 0.0;
        }
    }
    for element in Element::ALL {
        for reservoir in Reservoir::ALL {
            row[element.field(reservoir).as_str()] = 0.0;
        }
    }
    for element in Element::ALL.iter().filter(|el| **el != Element::H) {
        row[ratio_field(*element).as_str()] = 0.0;
    }
    row["M_atm"] = 0.0;
    row["P_surf"] = 0.0;

    true
}

/// Post-phase bookkeeping configured once per run.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub mass_tolerance: f64,
    pub desiccation_threshold: f64,
    pub reservoir: EscapeReservoir,
    pub offset_roche: f64,
    pub offset_spin: f64,
}

impl Ledger {
    /// Recomputes every derived aggregate on `row`.
    ///
    /// `reported_m_atm` is the atmosphere mass the outgassing adapter set
    /// directly this iteration, if any; it must agree with the species sum.
    pub fn aggregate(&self, row: &mut Row, reported_m_atm: Option<f64>) -> Result<(), ConservationError> {
        let summed = aggregate_atmosphere_mass(row);
        if let Some(reported) = reported_m_atm {
            if !within_tolerance(reported, summed, self.mass_tolerance) {
                return Err(ConservationError {
                    reported,
                    summed,
                    tolerance: self.mass_tolerance,
                });
            }
        }
        row["M_atm"] = summed;

        update_gravity(row);
        row["M_planet"] = aggregate_planet_mass(row);
        update_ratios(row);
        update_disruption_limits(row, self.offset_roche, self.offset_spin);

        debug!(m_atm = summed, m_planet = row["M_planet"], "ledger aggregated");
        Ok(())
    }

    /// Applies unfractionated escape of `rate_kg_s` over `dt_years`.
    pub fn escape(&self, row: &mut Row, rate_kg_s: f64, dt_years: f64) {
        let dt_s = dt_years * crate::constants::SECONDS_PER_YEAR;
        let before = volatile_inventory(row);
        apply_escape_split(row, rate_kg_s, dt_s, self.reservoir);
        debug!(
            rate_kg_s,
            dt_years,
            removed = before - volatile_inventory(row),
            "escape applied"
        );
    }

    /// Desiccation check with the configured threshold.
    pub fn desiccate(&self, row: &mut Row) -> bool {
        let dry = check_desiccation(row, self.desiccation_threshold);
        if dry {
            info!(threshold = self.desiccation_threshold, "volatile inventory exhausted; planet desiccated");
        }
        dry
    }
}
