//! Fixed-speciation outgassing.
//!
//! Each volatile element is carried by a single species and oxygen follows
//! from stoichiometry. A fraction of every species proportional to the melt
//! fraction stays dissolved in the magma ocean; the rest forms the
//! atmosphere.

use std::f64::consts::PI;

use super::{Adapter, AdapterError, AdapterOutput, Domain, StepContext};
use crate::config::DummyOutgasConfig;
use crate::constants::{G, PA_PER_BAR};
use crate::record::{Element, Gas, Reservoir, Row, Updates};

const SPECIATION: [(Element, Gas); 5] = [
    (Element::H, Gas::H2O),
    (Element::C, Gas::CO2),
    (Element::N, Gas::N2),
    (Element::S, Gas::SO2),
    (Element::He, Gas::He),
];

pub struct DummyOutgas {
    config: DummyOutgasConfig,
}

impl DummyOutgas {
    pub fn new(config: DummyOutgasConfig) -> Self {
        Self { config }
    }
}

impl Adapter for DummyOutgas {
    fn domain(&self) -> Domain {
        Domain::Outgassing
    }

    fn name(&self) -> &str {
        "dummy"
    }

    fn run(
        &mut self,
        _ctx: &StepContext<'_>,
        row: &Row,
        _dt_hint: f64,
    ) -> Result<AdapterOutput, AdapterError> {
        let dissolved = self.config.dissolved_frac * row["Phi_global"].clamp(0.0, 1.0);

        // (gas, atmosphere kg, melt kg)
        let species: Vec<(Gas, f64, f64)> = Gas::ALL
            .iter()
            .map(|gas| {
                let total = SPECIATION
                    .iter()
                    .find(|(_, g)| g == gas)
                    .map(|(el, g)| {
                        let carried = row[el.field(Reservoir::Total).as_str()].max(0.0);
                        carried / g.mass_fraction(*el)
                    })
                    .unwrap_or(0.0);
                (*gas, total * (1.0 - dissolved), total * dissolved)
            })
            .collect();

        let mut updates = Updates::new();
        for (gas, atm, liquid) in &species {
            updates
                .set(gas.field(Reservoir::Atmosphere), *atm)
                .set(gas.field(Reservoir::Liquid), *liquid)
                .set(gas.field(Reservoir::Solid), 0.0)
                .set(gas.field(Reservoir::Total), atm + liquid);
        }

        for element in Element::ALL {
            let (atm, liquid) = species.iter().fold((0.0, 0.0), |(a, l), (gas, atm, liquid)| {
                let frac = gas.mass_fraction(element);
                (a + atm * frac, l + liquid * frac)
            });
            updates
                .set(element.field(Reservoir::Atmosphere), atm)
                .set(element.field(Reservoir::Liquid), liquid)
                .set(element.field(Reservoir::Solid), 0.0)
                .set(element.field(Reservoir::Total), atm + liquid);
        }

        let m_atm: f64 = species.iter().map(|(_, atm, _)| atm).sum();
        let moles: f64 = species
            .iter()
            .map(|(gas, atm, _)| atm / gas.molar_mass())
            .sum();

        let r_int = row["R_int"];
        let gravity = if r_int > 0.0 {
            G * (row["M_mantle"] + row["M_core"]) / (r_int * r_int)
        } else {
            0.0
        };
        let p_surf = if r_int > 0.0 {
            m_atm * gravity / (4.0 * PI * r_int * r_int) / PA_PER_BAR
        } else {
            0.0
        };

        updates.set("M_atm", m_atm).set("P_surf", p_surf);
        if moles > 0.0 {
            updates.set("atm_kg_per_mol", m_atm / moles);
            for (gas, atm, _) in &species {
                let vmr = atm / gas.molar_mass() / moles;
                updates.set(gas.vmr_field(), vmr).set(gas.bar_field(), vmr * p_surf);
            }
        }

        Ok(AdapterOutput::new(updates))
    }
}
