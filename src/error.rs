//! Crate-level error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::adapter::AdapterError;
use crate::config::ConfigError;
use crate::coupler::CouplerState;
use crate::ledger::ConservationError;
use crate::record::RecordError;
use crate::termination::Status;

/// Everything that can stop a run abnormally. All variants are fatal.
#[derive(Error, Debug)]
pub enum CouplerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("state record error: {0}")]
    Record(#[from] RecordError),

    #[error("mass conservation error: {0}")]
    Conservation(#[from] ConservationError),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("cannot resume: {0}")]
    Resume(String),

    #[error("output directory is in use: {} exists (use --force to override)", .0.display())]
    Locked(PathBuf),

    #[error("coupler is not running (state: {0:?})")]
    NotRunning(CouplerState),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CouplerError {
    /// Status code persisted when this error ends a run.
    pub fn status(&self) -> Status {
        match self {
            CouplerError::Record(err) if err.is_conservation() => Status::ConservationError,
            CouplerError::Record(err) if err.is_validation() => Status::ValidationError,
            CouplerError::Conservation(_) => Status::ConservationError,
            CouplerError::Adapter(AdapterError::Divergence { .. }) => Status::PhysicsDivergence,
            CouplerError::Adapter(AdapterError::NonConvergence { .. }) => Status::NonConvergence,
            CouplerError::Adapter(AdapterError::Contract { .. }) => Status::ValidationError,
            _ => Status::GenericError,
        }
    }
}

/// Result type for coupler operations.
pub type Result<T> = std::result::Result<T, CouplerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::UnknownField;

    #[test]
    fn errors_map_to_status_codes() {
        let err = CouplerError::from(RecordError::MeltFraction { index: 3, value: 1.5 });
        assert_eq!(err.status().code(), 21);

        let err = CouplerError::from(ConservationError {
            reported: 1.0,
            summed: 2.0,
            tolerance: 1e-6,
        });
        assert_eq!(err.status().code(), 22);

        let err = CouplerError::from(AdapterError::Divergence {
            adapter: "dummy".into(),
            message: "nan".into(),
        });
        assert_eq!(err.status().code(), 23);

        let err = CouplerError::from(AdapterError::NonConvergence {
            adapter: "agni".into(),
            message: "stalled".into(),
        });
        assert_eq!(err.status().code(), 24);

        let err = CouplerError::from(AdapterError::Contract {
            adapter: "agni".into(),
            source: UnknownField("T_sruf".into()),
        });
        assert_eq!(err.status(), Status::ValidationError);

        let err = CouplerError::Resume("history too short".into());
        assert_eq!(err.status(), Status::GenericError);
    }
}
