//! Coupled evolution engine for rocky planets.
//!
//! This crate advances a young planet through time by coupling independent
//! physics modules (interior, atmosphere, outgassing, escape, star and
//! orbit) around a shared, append-only state history. Each iteration runs the
//! modules in a fixed order, enforces mass conservation, and evaluates a set
//! of stopping criteria.

pub mod adapter;
pub mod config;
pub mod constants;
pub mod convergence;
pub mod coupler;
pub mod error;
pub mod ledger;
pub mod record;
pub mod termination;

pub use adapter::{Adapter, AdapterError, AdapterOutput, AdapterSet, Domain, StepContext};
pub use config::{Config, ConfigError};
pub use convergence::{ConvergenceMonitor, ConvergenceState};
pub use coupler::{Coupler, CouplerState, Observer, RunDirs, SummaryObserver};
pub use error::{CouplerError, Result};
pub use ledger::{ConservationError, Ledger};
pub use record::{History, Row, Updates};
pub use termination::{Criterion, Decision, Status, TerminationEvaluator};
