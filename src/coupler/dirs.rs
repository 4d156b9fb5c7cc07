//! Output directory layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::record::HELPFILE_NAME;

/// Integer-year key used to name per-iteration auxiliary files.
pub fn file_key(time: f64) -> u64 {
    if time.is_finite() && time > 0.0 {
        time.floor() as u64
    } else {
        0
    }
}

/// Paths of every file a run reads or writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDirs {
    output: PathBuf,
    data: PathBuf,
}

impl RunDirs {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        let data = output.join("data");
        Self { output, data }
    }

    /// Creates the output and data directories if missing.
    pub fn create(&self) -> io::Result<()> {
        fs::create_dir_all(&self.data)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn data(&self) -> &Path {
        &self.data
    }

    pub fn helpfile(&self) -> PathBuf {
        self.output.join(HELPFILE_NAME)
    }

    pub fn status(&self) -> PathBuf {
        self.output.join("status")
    }

    pub fn keepalive(&self) -> PathBuf {
        self.output.join("keepalive")
    }

    /// Copy of the configuration the run was started with.
    pub fn config_copy(&self) -> PathBuf {
        self.output.join("init_coupler.toml")
    }

    pub fn summary(&self) -> PathBuf {
        self.output.join("summary.txt")
    }

    /// Interior snapshot for the row at `time`.
    pub fn interior_file(&self, time: f64) -> PathBuf {
        self.data.join(format!("{}.json", file_key(time)))
    }

    /// Atmosphere snapshot for the row at `time`.
    pub fn atmosphere_file(&self, time: f64) -> PathBuf {
        self.data.join(format!("{}_atm.json", file_key(time)))
    }

    /// Stellar spectrum written at `time`.
    pub fn spectrum_file(&self, time: f64) -> PathBuf {
        self.data.join(format!("{}.sflux", file_key(time)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_key_truncates_to_whole_years() {
        assert_eq!(file_key(0.0), 0);
        assert_eq!(file_key(1999.9), 1999);
        assert_eq!(file_key(2000.0), 2000);
        assert_eq!(file_key(-3.0), 0);
        assert_eq!(file_key(f64::NAN), 0);
    }

    #[test]
    fn auxiliary_files_live_under_data() {
        let dirs = RunDirs::new("/tmp/run");
        assert_eq!(dirs.interior_file(12.7), PathBuf::from("/tmp/run/data/12.json"));
        assert_eq!(dirs.atmosphere_file(12.7), PathBuf::from("/tmp/run/data/12_atm.json"));
        assert_eq!(dirs.spectrum_file(0.0), PathBuf::from("/tmp/run/data/0.sflux"));
        assert_eq!(dirs.helpfile(), PathBuf::from("/tmp/run/runtime_helpfile.csv"));
    }
}
