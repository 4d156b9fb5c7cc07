//! The run status file: an integer code on the first line and a comment on
//! the second.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Run status as persisted for external tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Started,
    Running,
    Solidified,
    Steady,
    MaxIterations,
    MaxTime,
    RadiativeEquilibrium,
    Escaped,
    Disintegrated,
    ExternalStop,
    GenericError,
    ValidationError,
    ConservationError,
    PhysicsDivergence,
    NonConvergence,
}

impl Status {
    pub const ALL: [Status; 15] = [
        Status::Started,
        Status::Running,
        Status::Solidified,
        Status::Steady,
        Status::MaxIterations,
        Status::MaxTime,
        Status::RadiativeEquilibrium,
        Status::Escaped,
        Status::Disintegrated,
        Status::ExternalStop,
        Status::GenericError,
        Status::ValidationError,
        Status::ConservationError,
        Status::PhysicsDivergence,
        Status::NonConvergence,
    ];

    pub fn code(&self) -> u8 {
        match self {
            Status::Started => 0,
            Status::Running => 1,
            Status::Solidified => 10,
            Status::Steady => 11,
            Status::MaxIterations => 12,
            Status::MaxTime => 13,
            Status::RadiativeEquilibrium => 14,
            Status::Escaped => 15,
            Status::Disintegrated => 16,
            Status::ExternalStop => 17,
            Status::GenericError => 20,
            Status::ValidationError => 21,
            Status::ConservationError => 22,
            Status::PhysicsDivergence => 23,
            Status::NonConvergence => 24,
        }
    }

    pub fn from_code(code: u8) -> Option<Status> {
        Status::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Status::Started => "Started",
            Status::Running => "Running",
            Status::Solidified => "Completed (solidified)",
            Status::Steady => "Completed (steady-state)",
            Status::MaxIterations => "Completed (maximum iterations)",
            Status::MaxTime => "Completed (target time)",
            Status::RadiativeEquilibrium => "Completed (net flux is small)",
            Status::Escaped => "Completed (atmosphere escaped)",
            Status::Disintegrated => "Completed (planet disintegrated)",
            Status::ExternalStop => "Completed (stopped by user)",
            Status::GenericError => "Error (generic case, or during configuration)",
            Status::ValidationError => "Error (state record validation)",
            Status::ConservationError => "Error (mass conservation)",
            Status::PhysicsDivergence => "Error (physics diverged)",
            Status::NonConvergence => "Error (solver did not converge)",
        }
    }

    pub fn is_completed(&self) -> bool {
        (10..20).contains(&self.code())
    }

    pub fn is_error(&self) -> bool {
        self.code() >= 20
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// Overwrites the status file at `path`.
pub fn write_status(path: &Path, status: Status) -> io::Result<()> {
    fs::write(path, format!("{}\n{}\n", status.code(), status.description()))
}

/// Reads the status code from the file at `path`.
pub fn read_status(path: &Path) -> io::Result<Status> {
    let text = fs::read_to_string(path)?;
    let first = text.lines().next().unwrap_or("").trim();
    first
        .parse::<u8>()
        .ok()
        .and_then(Status::from_code)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unrecognised status code '{first}' in {}", path.display()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn codes_are_unique_and_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(99), None);
    }

    #[test]
    fn status_file_has_code_then_comment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status");
        write_status(&path, Status::Solidified).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("10"));
        assert_eq!(lines.next(), Some("Completed (solidified)"));
        assert_eq!(read_status(&path).unwrap(), Status::Solidified);
    }

    #[test]
    fn classification() {
        assert!(Status::ExternalStop.is_completed());
        assert!(!Status::Running.is_completed());
        assert!(Status::PhysicsDivergence.is_error());
        assert!(!Status::Steady.is_error());
    }
}
