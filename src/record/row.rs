//! Helpfile rows: one timestamped snapshot of every coupled quantity.

use std::collections::{BTreeMap, HashMap};
use std::ops::{Index, IndexMut};
use std::sync::OnceLock;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use super::species::{Element, Gas, Reservoir};

/// Scalar fields preceding the per-species and per-element blocks.
const SCALAR_FIELDS: &[&str] = &[
    // Time
    "Time",
    "age_star",
    // Interior
    "T_magma",
    "Phi_global",
    "M_mantle",
    "M_mantle_liquid",
    "M_mantle_solid",
    "M_core",
    "M_int",
    "R_int",
    "gravity",
    "F_int",
    "F_tidal",
    "F_radio",
    // Atmosphere
    "T_surf",
    "P_surf",
    "F_atm",
    "F_olr",
    "F_sct",
    "M_atm",
    "M_planet",
    "atm_kg_per_mol",
    // Orbit and star
    "semimajorax",
    "separation",
    "eccentricity",
    "axial_period",
    "semimajorax_sat",
    "M_star",
    "R_star",
    "T_star",
    "L_star",
    "F_ins",
    "T_eqm",
    "T_skin",
    "roche_limit",
    "breakup_period",
    // Escape
    "esc_rate_total",
];

/// Raised when a field name is not part of the helpfile schema.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown helpfile field '{0}'")]
pub struct UnknownField(pub String);

/// Ordered set of helpfile columns, shared by every row of a run.
#[derive(Debug)]
pub struct Schema {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    fn build() -> Self {
        let mut names: Vec<String> = SCALAR_FIELDS.iter().map(|s| s.to_string()).collect();

        for gas in Gas::ALL {
            names.push(gas.vmr_field());
            names.push(gas.bar_field());
            for reservoir in Reservoir::ALL {
                names.push(gas.field(reservoir));
            }
        }

        // Monatomic gases share their element's reservoir columns.
        for element in Element::ALL {
            for reservoir in Reservoir::ALL {
                let field = element.field(reservoir);
                if !names.contains(&field) {
                    names.push(field);
                }
            }
        }

        for element in Element::ALL.iter().filter(|el| **el != Element::H) {
            names.push(ratio_field(*element));
        }

        for element in Element::ALL {
            names.push(escape_field(element));
        }

        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Self { names, index }
    }

    /// The process-wide schema.
    pub fn global() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(Schema::build)
    }

    /// Column names in persisted order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column index of `field`, if it exists.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.index.get(field).copied()
    }

    /// Whether `field` holds a mass and must therefore be non-negative.
    pub fn is_mass(field: &str) -> bool {
        field.starts_with("M_") || field.contains("_kg_")
    }
}

/// Elemental mass ratio field (`<el>H_ratio`).
pub fn ratio_field(element: Element) -> String {
    format!("{}H_ratio", element.symbol())
}

/// Per-element escape rate field (`esc_rate_<el>`).
pub fn escape_field(element: Element) -> String {
    format!("esc_rate_{}", element.symbol())
}

/// One helpfile row.
///
/// Values are stored densely in [`Schema::global`] order. Indexing with an
/// unknown field name panics, like indexing a slice out of bounds; use
/// [`Row::get`] or [`Row::set`] for names that come from outside the crate.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<f64>,
}

impl Row {
    /// All-zero placeholder used before any adapter has run.
    pub fn zero() -> Self {
        Self {
            values: vec![0.0; Schema::global().len()],
        }
    }

    /// Builds a row from values in schema order.
    pub(crate) fn from_values(values: Vec<f64>) -> Option<Self> {
        (values.len() == Schema::global().len()).then_some(Self { values })
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        Schema::global().position(field).map(|i| self.values[i])
    }

    pub fn set(&mut self, field: &str, value: f64) -> Result<(), UnknownField> {
        let i = Schema::global()
            .position(field)
            .ok_or_else(|| UnknownField(field.to_string()))?;
        self.values[i] = value;
        Ok(())
    }

    /// Merges adapter updates into the row.
    ///
    /// Every field is checked before any value is written, so a rejected
    /// update leaves the row untouched.
    pub fn apply(&mut self, updates: &Updates) -> Result<(), UnknownField> {
        let schema = Schema::global();
        let positions = updates
            .iter()
            .map(|(field, value)| {
                schema
                    .position(field)
                    .map(|i| (i, value))
                    .ok_or_else(|| UnknownField(field.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (i, value) in positions {
            self.values[i] = value;
        }
        Ok(())
    }

    /// Iterates `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        Schema::global()
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn time(&self) -> f64 {
        self["Time"]
    }
}

impl Index<&str> for Row {
    type Output = f64;

    fn index(&self, field: &str) -> &f64 {
        match Schema::global().position(field) {
            Some(i) => &self.values[i],
            None => panic!("unknown helpfile field '{field}'"),
        }
    }
}

impl IndexMut<&str> for Row {
    fn index_mut(&mut self, field: &str) -> &mut f64 {
        match Schema::global().position(field) {
            Some(i) => &mut self.values[i],
            None => panic!("unknown helpfile field '{field}'"),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field, &value)?;
        }
        map.end()
    }
}

/// Partial row returned by an adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Updates(BTreeMap<String, f64>);

impl Updates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: f64) -> &mut Self {
        self.0.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.0.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First field whose value is NaN or infinite.
    pub fn first_non_finite(&self) -> Option<(&str, f64)> {
        self.iter().find(|(_, v)| !v.is_finite())
    }
}

impl FromIterator<(String, f64)> for Updates {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_row_has_every_field() {
        let row = Row::zero();
        assert_eq!(row.values().len(), Schema::global().len());
        assert!(row.iter().all(|(_, v)| v == 0.0));
        assert_eq!(row.get("H2O_kg_atm"), Some(0.0));
        assert_eq!(row.get("esc_rate_C"), Some(0.0));
        assert_eq!(row.get("CH_ratio"), Some(0.0));
        assert_eq!(row.get("HH_ratio"), None);
    }

    #[test]
    fn schema_names_are_unique() {
        let schema = Schema::global();
        let unique: std::collections::HashSet<_> = schema.names().iter().collect();
        assert_eq!(unique.len(), schema.len());
    }

    #[test]
    fn helium_gas_and_element_share_columns() {
        let schema = Schema::global();
        let gas = Gas::He.field(Reservoir::Atmosphere);
        assert_eq!(gas, Element::He.field(Reservoir::Atmosphere));
        assert_eq!(schema.names().iter().filter(|n| **n == gas).count(), 1);
    }

    #[test]
    fn apply_rejects_unknown_field_without_partial_write() {
        let mut row = Row::zero();
        let mut updates = Updates::new();
        updates.set("T_magma", 3000.0).set("not_a_field", 1.0);

        let err = row.apply(&updates).unwrap_err();
        assert_eq!(err, UnknownField("not_a_field".to_string()));
        assert_eq!(row["T_magma"], 0.0);
    }

    #[test]
    fn apply_writes_known_fields() {
        let mut row = Row::zero();
        let mut updates = Updates::new();
        updates.set("T_magma", 3000.0).set("Phi_global", 1.0);
        row.apply(&updates).unwrap();
        assert_eq!(row["T_magma"], 3000.0);
        assert_eq!(row["Phi_global"], 1.0);
    }

    #[test]
    fn mass_field_classification() {
        assert!(Schema::is_mass("M_atm"));
        assert!(Schema::is_mass("H2O_kg_liquid"));
        assert!(!Schema::is_mass("H2O_vmr"));
        assert!(!Schema::is_mass("T_magma"));
    }

    #[test]
    fn non_finite_updates_are_reported() {
        let mut updates = Updates::new();
        updates.set("F_atm", 10.0).set("T_surf", f64::NAN);
        let (field, _) = updates.first_non_finite().unwrap();
        assert_eq!(field, "T_surf");
    }
}
