//! Refresh schedule for stellar instellation and spectrum.

use crate::adapter::RefreshFlags;
use crate::config::DtParams;

/// Tracks when stellar quantities were last recomputed.
///
/// Instellation and spectrum have independent refresh intervals. A spectrum
/// refresh always implies an instellation refresh, and the bootstrap
/// iteration refreshes both.
#[derive(Debug, Clone, PartialEq)]
pub struct StarSchedule {
    instellation_interval: f64,
    spectrum_interval: f64,
    last_instellation: Option<f64>,
    last_spectrum: Option<f64>,
}

impl StarSchedule {
    pub fn new(params: &DtParams) -> Self {
        Self {
            instellation_interval: params.starinst,
            spectrum_interval: params.starspec,
            last_instellation: None,
            last_spectrum: None,
        }
    }

    /// Which refreshes are due at simulated time `time`.
    pub fn due(&self, time: f64) -> RefreshFlags {
        let elapsed = |last: Option<f64>, interval: f64| match last {
            None => true,
            Some(last) => time - last >= interval,
        };
        let spectrum = elapsed(self.last_spectrum, self.spectrum_interval);
        let instellation = spectrum || elapsed(self.last_instellation, self.instellation_interval);
        RefreshFlags {
            instellation,
            spectrum,
        }
    }

    /// Records the refreshes performed at `time`.
    pub fn mark(&mut self, time: f64, flags: RefreshFlags) {
        if flags.instellation {
            self.last_instellation = Some(time);
        }
        if flags.spectrum {
            self.last_spectrum = Some(time);
        }
    }

    /// Computes and records the refreshes due at `time`.
    pub fn advance(&mut self, time: f64) -> RefreshFlags {
        let flags = self.due(time);
        self.mark(time, flags);
        flags
    }

    pub fn last_instellation(&self) -> Option<f64> {
        self.last_instellation
    }

    pub fn last_spectrum(&self) -> Option<f64> {
        self.last_spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> StarSchedule {
        StarSchedule::new(&DtParams {
            starinst: 100.0,
            starspec: 1000.0,
            ..DtParams::default()
        })
    }

    #[test]
    fn first_call_refreshes_everything() {
        let mut s = schedule();
        assert_eq!(
            s.advance(0.0),
            RefreshFlags {
                instellation: true,
                spectrum: true
            }
        );
    }

    #[test]
    fn intervals_are_tracked_independently() {
        let mut s = schedule();
        s.advance(0.0);

        assert_eq!(s.advance(50.0), RefreshFlags::default());
        let flags = s.advance(120.0);
        assert!(flags.instellation && !flags.spectrum);
        assert_eq!(s.last_instellation(), Some(120.0));

        let flags = s.advance(1000.0);
        assert!(flags.instellation && flags.spectrum);
        assert_eq!(s.last_spectrum(), Some(1000.0));
    }

    #[test]
    fn spectrum_refresh_implies_instellation() {
        let mut s = StarSchedule::new(&DtParams {
            starinst: 1e9,
            starspec: 10.0,
            ..DtParams::default()
        });
        s.advance(0.0);
        let flags = s.advance(10.0);
        assert!(flags.spectrum && flags.instellation);
    }
}
