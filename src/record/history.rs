//! Append-only, time-ordered row history.

use super::row::{Row, Schema};
use super::RecordError;
use crate::ledger::{aggregate_atmosphere_mass, within_tolerance};

/// Ordered sequence of helpfile rows, one per completed iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    rows: Vec<Row>,
    mass_tolerance: f64,
}

impl History {
    /// Creates an empty history that checks `M_atm` against the species sum
    /// with the given relative tolerance.
    pub fn new(mass_tolerance: f64) -> Self {
        Self {
            rows: Vec::new(),
            mass_tolerance,
        }
    }

    /// Checks every append-time invariant without modifying the history.
    pub fn validate(&self, row: &Row) -> Result<(), RecordError> {
        let index = self.rows.len();

        if let Some(last) = self.rows.last() {
            if row.time() < last.time() {
                return Err(RecordError::TimeReversal {
                    index,
                    previous: last.time(),
                    time: row.time(),
                });
            }
        }

        if let Some((field, value)) = row
            .iter()
            .find(|(field, value)| Schema::is_mass(field) && *value < 0.0)
        {
            return Err(RecordError::NegativeMass {
                index,
                field: field.to_string(),
                value,
            });
        }

        let phi = row["Phi_global"];
        if !(0.0..=1.0).contains(&phi) {
            return Err(RecordError::MeltFraction { index, value: phi });
        }

        let summed = aggregate_atmosphere_mass(row);
        let reported = row["M_atm"];
        if !within_tolerance(reported, summed, self.mass_tolerance) {
            return Err(RecordError::Conservation {
                index,
                reported,
                summed,
                tolerance: self.mass_tolerance,
            });
        }

        Ok(())
    }

    /// Appends `row` after validating it. A rejected row is not stored.
    pub fn append(&mut self, row: Row) -> Result<(), RecordError> {
        self.validate(&row)?;
        self.rows.push(row);
        Ok(())
    }

    pub fn last(&self) -> Option<&Row> {
        self.rows.last()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Latest row with `Time <= time`.
    ///
    /// Binary search on the sorted `Time` column; when several rows share a
    /// time, the last of them is returned.
    pub fn at_or_before(&self, time: f64) -> Option<&Row> {
        let idx = self.rows.partition_point(|row| row.time() <= time);
        idx.checked_sub(1).map(|i| &self.rows[i])
    }

    /// The trailing `n` rows (fewer if the history is shorter).
    pub fn tail(&self, n: usize) -> &[Row] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn mass_tolerance(&self) -> f64 {
        self.mass_tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_at(time: f64) -> Row {
        let mut row = Row::zero();
        row["Time"] = time;
        row
    }

    #[test]
    fn equal_times_are_accepted() {
        let mut history = History::new(1e-6);
        for t in [0.0, 100.0, 100.0] {
            history.append(row_at(t)).unwrap();
        }
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn decreasing_time_is_rejected() {
        let mut history = History::new(1e-6);
        history.append(row_at(0.0)).unwrap();
        history.append(row_at(100.0)).unwrap();

        let err = history.append(row_at(50.0)).unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(err, RecordError::TimeReversal { index: 2, .. }));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn negative_mass_is_rejected() {
        let mut history = History::new(1e-6);
        let mut row = row_at(0.0);
        row["C_kg_total"] = -1.0;
        let err = history.append(row).unwrap_err();
        match err {
            RecordError::NegativeMass { field, .. } => assert_eq!(field, "C_kg_total"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn melt_fraction_out_of_range_is_rejected() {
        let mut history = History::new(1e-6);
        let mut row = row_at(0.0);
        row["Phi_global"] = 1.2;
        assert!(matches!(
            history.append(row),
            Err(RecordError::MeltFraction { .. })
        ));
    }

    #[test]
    fn atmosphere_mass_mismatch_is_a_conservation_error() {
        let mut history = History::new(1e-6);
        let mut row = row_at(0.0);
        row["H2O_kg_atm"] = 1e19;
        row["CO2_kg_atm"] = 1e15;
        row["M_atm"] = 1e19;

        let err = history.append(row).unwrap_err();
        assert!(err.is_conservation());
        assert!(history.is_empty());
    }

    #[test]
    fn consistent_atmosphere_mass_is_accepted() {
        let mut history = History::new(1e-6);
        let mut row = row_at(0.0);
        row["H2O_kg_atm"] = 1e19;
        row["CO2_kg_atm"] = 1e15;
        row["M_atm"] = 1.0001e19;
        history.append(row).unwrap();
    }

    #[test]
    fn at_or_before_uses_latest_matching_row() {
        let mut history = History::new(1e-6);
        for (i, t) in [0.0, 10.0, 10.0, 25.0].into_iter().enumerate() {
            let mut row = row_at(t);
            row["T_magma"] = i as f64;
            history.append(row).unwrap();
        }

        assert!(history.at_or_before(-1.0).is_none());
        assert_eq!(history.at_or_before(0.0).unwrap()["T_magma"], 0.0);
        assert_eq!(history.at_or_before(10.0).unwrap()["T_magma"], 2.0);
        assert_eq!(history.at_or_before(24.9).unwrap()["T_magma"], 2.0);
        assert_eq!(history.at_or_before(1e9).unwrap()["T_magma"], 3.0);
    }

    #[test]
    fn tail_is_clamped_to_history_length() {
        let mut history = History::new(1e-6);
        history.append(row_at(0.0)).unwrap();
        history.append(row_at(1.0)).unwrap();
        assert_eq!(history.tail(5).len(), 2);
        assert_eq!(history.tail(1)[0].time(), 1.0);
    }
}
