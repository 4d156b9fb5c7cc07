//! Hooks invoked as the run progresses.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use tracing::{info, warn};

use super::{LoopCounters, RunDirs};
use crate::constants::EARTH_MASS;
use crate::record::History;
use crate::termination::Status;

/// Receives the history every `plot_mod` iterations and once when the run
/// ends, whatever the stride.
pub trait Observer {
    fn on_iteration(&mut self, _history: &History, _counters: &LoopCounters) {}

    fn on_finish(&mut self, _history: &History, _status: Status, _dirs: &RunDirs) {}
}

/// Logs a one-line summary per callback and writes `summary.txt` at the end.
#[derive(Debug, Default)]
pub struct SummaryObserver;

impl SummaryObserver {
    fn write_summary(history: &History, status: Status, dirs: &RunDirs) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(dirs.summary())?);
        writeln!(writer, "status      {}", status)?;
        writeln!(writer, "iterations  {}", history.len().saturating_sub(1))?;
        if let Some(last) = history.last() {
            writeln!(writer, "time        {:.6e} yr", last.time())?;
            writeln!(writer, "T_magma     {:.2} K", last["T_magma"])?;
            writeln!(writer, "Phi_global  {:.4}", last["Phi_global"])?;
            writeln!(writer, "F_atm       {:.4e} W m-2", last["F_atm"])?;
            writeln!(writer, "P_surf      {:.4e} bar", last["P_surf"])?;
            writeln!(writer, "M_atm       {:.4e} kg", last["M_atm"])?;
            writeln!(writer, "M_planet    {:.4} M_earth", last["M_planet"] / EARTH_MASS)?;
        }
        writer.flush()
    }
}

impl Observer for SummaryObserver {
    fn on_iteration(&mut self, history: &History, counters: &LoopCounters) {
        if let Some(row) = history.last() {
            info!(
                iteration = counters.total,
                time = row.time(),
                t_magma = row["T_magma"],
                phi = row["Phi_global"],
                f_atm = row["F_atm"],
                p_surf = row["P_surf"],
                "progress"
            );
        }
    }

    fn on_finish(&mut self, history: &History, status: Status, dirs: &RunDirs) {
        match Self::write_summary(history, status, dirs) {
            Ok(()) => info!(path = %dirs.summary().display(), "summary written"),
            Err(e) => warn!(error = %e, "failed to write summary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Row;
    use tempfile::tempdir;

    #[test]
    fn summary_names_status_and_final_state() {
        let dir = tempdir().unwrap();
        let dirs = RunDirs::new(dir.path());
        let mut history = History::new(1e-6);
        let mut row = Row::zero();
        row["T_magma"] = 1500.0;
        history.append(row).unwrap();

        SummaryObserver.on_finish(&history, Status::Solidified, &dirs);

        let text = std::fs::read_to_string(dirs.summary()).unwrap();
        assert!(text.contains("Completed (solidified) (10)"));
        assert!(text.contains("1500.00 K"));
    }
}
