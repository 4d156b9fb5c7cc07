//! Time-step hint for the interior.

use crate::config::{DtMethod, DtParams};
use crate::record::Row;

/// Relative change between two values, bounded to [0, 2].
fn relative_change(old: f64, new: f64) -> f64 {
    if old == new {
        return 0.0;
    }
    (new - old).abs() / old.abs().max(new.abs())
}

/// Chooses the step (years) to offer the interior for iteration `iteration`.
///
/// `recent` holds the trailing history rows, newest last. Iteration 0 gets a
/// zero step, the init phase gets `initial`, and afterwards the configured
/// method applies. The result is always clamped to `[minimum, maximum]`.
pub fn dt_hint(params: &DtParams, iteration: u64, init_loops: u32, recent: &[Row]) -> f64 {
    if iteration == 0 {
        return 0.0;
    }
    if iteration <= u64::from(init_loops) {
        return params.initial.clamp(params.minimum, params.maximum);
    }

    let last = recent.last();
    let dt = match params.method {
        DtMethod::Maximum => params.maximum,
        DtMethod::Proportional => last.map_or(params.initial, |row| row.time() / params.propconst),
        DtMethod::Adaptive => match recent {
            [.., prev, last] if last.time() > prev.time() => {
                let dt_prev = last.time() - prev.time();
                let change = relative_change(prev["Phi_global"], last["Phi_global"])
                    .max(relative_change(prev["T_magma"], last["T_magma"]));
                if change < 0.1 * params.rtol {
                    dt_prev * params.sfinc
                } else if change > params.rtol {
                    dt_prev * params.sfdec
                } else {
                    dt_prev
                }
            }
            _ => params.initial,
        },
    };

    dt.clamp(params.minimum, params.maximum)
}
