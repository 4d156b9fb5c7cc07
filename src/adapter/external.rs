//! Physics modules that run as a separate program.
//!
//! The request is written to the child's stdin as one JSON document and the
//! response is read from its stdout:
//!
//! ```json
//! {"updates": {"T_magma": 2950.0, "Phi_global": 0.98}, "dt_taken": 120.0}
//! ```
//!
//! A solver failure is reported with an error object instead:
//!
//! ```json
//! {"error": {"kind": "nonconvergence", "message": "Newton iteration stalled"}}
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Adapter, AdapterError, AdapterOutput, Domain, RefreshFlags, StepContext};
use crate::config::ExternalConfig;
use crate::coupler::{file_key, RunDirs};
use crate::record::{Row, Updates};

#[derive(Serialize)]
struct Request<'a> {
    domain: &'static str,
    module: &'static str,
    iteration: u64,
    bootstrap: bool,
    time: f64,
    dt_hint: f64,
    refresh: RefreshFlags,
    output_dir: &'a Path,
    data_dir: &'a Path,
    row: &'a Row,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    updates: Updates,
    #[serde(default)]
    dt_taken: Option<f64>,
    #[serde(default)]
    error: Option<Failure>,
}

#[derive(Deserialize)]
struct Failure {
    kind: FailureKind,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum FailureKind {
    Divergence,
    Nonconvergence,
    #[serde(other)]
    Other,
}

/// An adapter backed by a subprocess speaking JSON on stdin/stdout.
pub struct ExternalAdapter {
    domain: Domain,
    module: &'static str,
    config: ExternalConfig,
}

impl ExternalAdapter {
    pub fn new(domain: Domain, module: &'static str, config: ExternalConfig) -> Self {
        Self {
            domain,
            module,
            config,
        }
    }

    fn failure(&self, message: impl Into<String>) -> AdapterError {
        AdapterError::External {
            adapter: self.module.to_string(),
            message: message.into(),
        }
    }

    fn exchange(&self, body: &[u8], workdir: &Path) -> Result<Vec<u8>, AdapterError> {
        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AdapterError::io(self.module, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(body) {
                // The child may legitimately exit without reading its input.
                warn!(module = self.module, error = %e, "failed to write request");
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| AdapterError::io(self.module, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!("{}: {}", output.status, stderr.trim())));
        }
        Ok(output.stdout)
    }
}

impl Adapter for ExternalAdapter {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn name(&self) -> &str {
        self.module
    }

    fn run(
        &mut self,
        ctx: &StepContext<'_>,
        row: &Row,
        dt_hint: f64,
    ) -> Result<AdapterOutput, AdapterError> {
        let request = Request {
            domain: self.domain.name(),
            module: self.module,
            iteration: ctx.iteration,
            bootstrap: ctx.bootstrap,
            time: ctx.time,
            dt_hint,
            refresh: ctx.refresh,
            output_dir: ctx.dirs.output(),
            data_dir: ctx.dirs.data(),
            row,
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| self.failure(format!("failed to encode request: {e}")))?;

        debug!(module = self.module, iteration = ctx.iteration, "running external module");
        let stdout = self.exchange(&body, ctx.dirs.output())?;

        let response: Response = serde_json::from_slice(&stdout)
            .map_err(|e| self.failure(format!("malformed response: {e}")))?;

        if let Some(failure) = response.error {
            let adapter = self.module.to_string();
            let message = failure.message;
            return Err(match failure.kind {
                FailureKind::Divergence => AdapterError::Divergence { adapter, message },
                FailureKind::Nonconvergence => AdapterError::NonConvergence { adapter, message },
                FailureKind::Other => AdapterError::External { adapter, message },
            });
        }

        let dt_taken = response.dt_taken.unwrap_or(dt_hint);
        Ok(AdapterOutput::with_dt(response.updates, dt_taken))
    }

    fn required_files(&self, dirs: &RunDirs, time: f64) -> Vec<PathBuf> {
        let key = file_key(time).to_string();
        self.config
            .required_files
            .iter()
            .map(|template| dirs.output().join(template.replace("{key}", &key)))
            .collect()
    }
}
