//! The shared state record ("helpfile").
//!
//! A [`History`] is the single source of truth passed between the coupled
//! adapters: an append-only, time-ordered sequence of [`Row`]s that is
//! persisted to a delimited text table after every iteration.

mod history;
mod row;
pub mod species;
mod table;

pub use history::History;
pub use row::{escape_field, ratio_field, Row, Schema, UnknownField, Updates};
pub use species::{Element, Gas, Reservoir};
pub use table::{read_table, write_table, HELPFILE_NAME};

use thiserror::Error;

/// Errors raised while appending, persisting or loading rows.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("row {index}: Time {time} precedes previous Time {previous}")]
    TimeReversal { index: usize, previous: f64, time: f64 },
    #[error("row {index}: mass field '{field}' is negative ({value})")]
    NegativeMass { index: usize, field: String, value: f64 },
    #[error("row {index}: Phi_global = {value} is outside [0, 1]")]
    MeltFraction { index: usize, value: f64 },
    #[error("row {index}: M_atm = {reported} kg disagrees with species sum {summed} kg (relative tolerance {tolerance})")]
    Conservation {
        index: usize,
        reported: f64,
        summed: f64,
        tolerance: f64,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl RecordError {
    /// True for mass-bookkeeping mismatches, as opposed to other validation failures.
    pub fn is_conservation(&self) -> bool {
        matches!(self, RecordError::Conservation { .. })
    }

    /// True for invariant violations detected on append.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RecordError::TimeReversal { .. }
                | RecordError::NegativeMass { .. }
                | RecordError::MeltFraction { .. }
        )
    }
}
