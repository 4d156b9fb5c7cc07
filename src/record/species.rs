//! Tracked volatile gases and elements.

/// Elements whose inventories are tracked across the coupled reservoirs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    H,
    O,
    C,
    N,
    S,
    He,
}

impl Element {
    /// Every tracked element, in helpfile column order.
    pub const ALL: [Element; 6] = [
        Element::H,
        Element::O,
        Element::C,
        Element::N,
        Element::S,
        Element::He,
    ];

    /// Chemical symbol used in field names.
    pub fn symbol(&self) -> &'static str {
        match self {
            Element::H => "H",
            Element::O => "O",
            Element::C => "C",
            Element::N => "N",
            Element::S => "S",
            Element::He => "He",
        }
    }

    /// Molar mass in kg/mol.
    pub fn molar_mass(&self) -> f64 {
        match self {
            Element::H => 1.008e-3,
            Element::O => 15.999e-3,
            Element::C => 12.011e-3,
            Element::N => 14.007e-3,
            Element::S => 32.06e-3,
            Element::He => 4.0026e-3,
        }
    }

    /// Field holding this element's inventory in `reservoir`.
    pub fn field(&self, reservoir: Reservoir) -> String {
        format!("{}_kg_{}", self.symbol(), reservoir.suffix())
    }
}

/// Volatile gases tracked in the atmosphere and melt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gas {
    H2O,
    CO2,
    O2,
    H2,
    CH4,
    CO,
    N2,
    NH3,
    S2,
    SO2,
    H2S,
    He,
}

impl Gas {
    /// Every tracked gas, in helpfile column order.
    pub const ALL: [Gas; 12] = [
        Gas::H2O,
        Gas::CO2,
        Gas::O2,
        Gas::H2,
        Gas::CH4,
        Gas::CO,
        Gas::N2,
        Gas::NH3,
        Gas::S2,
        Gas::SO2,
        Gas::H2S,
        Gas::He,
    ];

    /// Formula used in field names.
    pub fn formula(&self) -> &'static str {
        match self {
            Gas::H2O => "H2O",
            Gas::CO2 => "CO2",
            Gas::O2 => "O2",
            Gas::H2 => "H2",
            Gas::CH4 => "CH4",
            Gas::CO => "CO",
            Gas::N2 => "N2",
            Gas::NH3 => "NH3",
            Gas::S2 => "S2",
            Gas::SO2 => "SO2",
            Gas::H2S => "H2S",
            Gas::He => "He",
        }
    }

    /// Atom counts per molecule.
    pub fn atoms(&self) -> &'static [(Element, u32)] {
        match self {
            Gas::H2O => &[(Element::H, 2), (Element::O, 1)],
            Gas::CO2 => &[(Element::C, 1), (Element::O, 2)],
            Gas::O2 => &[(Element::O, 2)],
            Gas::H2 => &[(Element::H, 2)],
            Gas::CH4 => &[(Element::C, 1), (Element::H, 4)],
            Gas::CO => &[(Element::C, 1), (Element::O, 1)],
            Gas::N2 => &[(Element::N, 2)],
            Gas::NH3 => &[(Element::N, 1), (Element::H, 3)],
            Gas::S2 => &[(Element::S, 2)],
            Gas::SO2 => &[(Element::S, 1), (Element::O, 2)],
            Gas::H2S => &[(Element::H, 2), (Element::S, 1)],
            Gas::He => &[(Element::He, 1)],
        }
    }

    /// Molar mass in kg/mol.
    pub fn molar_mass(&self) -> f64 {
        self.atoms()
            .iter()
            .map(|(el, n)| el.molar_mass() * f64::from(*n))
            .sum()
    }

    /// Mass fraction of `element` within one molecule of this gas.
    pub fn mass_fraction(&self, element: Element) -> f64 {
        self.atoms()
            .iter()
            .find(|(el, _)| *el == element)
            .map(|(el, n)| el.molar_mass() * f64::from(*n) / self.molar_mass())
            .unwrap_or(0.0)
    }

    /// Field holding this gas's mass in `reservoir`.
    pub fn field(&self, reservoir: Reservoir) -> String {
        format!("{}_kg_{}", self.formula(), reservoir.suffix())
    }

    /// Volume mixing ratio field.
    pub fn vmr_field(&self) -> String {
        format!("{}_vmr", self.formula())
    }

    /// Partial surface pressure field (bar).
    pub fn bar_field(&self) -> String {
        format!("{}_bar", self.formula())
    }
}

/// Where a volatile mass resides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reservoir {
    Atmosphere,
    Liquid,
    Solid,
    Total,
}

impl Reservoir {
    pub const ALL: [Reservoir; 4] = [
        Reservoir::Atmosphere,
        Reservoir::Liquid,
        Reservoir::Solid,
        Reservoir::Total,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            Reservoir::Atmosphere => "atm",
            Reservoir::Liquid => "liquid",
            Reservoir::Solid => "solid",
            Reservoir::Total => "total",
        }
    }
}
