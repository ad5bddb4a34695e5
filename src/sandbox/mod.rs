//! Sandbox module - isolated execution environments
//!
//! The [`SandboxEngine`] trait is the narrow interface to the container
//! runtime; [`DockerEngine`] is the production backend. A [`Sandbox`] owns
//! one live environment for the duration of one grading run and is
//! terminated on every exit path.

mod docker;
mod engine;

pub use docker::DockerEngine;
pub use engine::{ExecOutcome, ProcessInfo, SandboxEngine, SandboxHandle};

use std::sync::Arc;
use tracing::{debug, warn};

use crate::bundle::Bundle;
use crate::error::{Error, Result};

/// Shell loop that keeps an environment alive until it is killed
const KEEP_ALIVE_CMD: [&str; 3] = ["/bin/bash", "-c", "while true; do sleep 30; done"];

/// A live isolated environment, exclusively owned by one grading run
pub struct Sandbox {
    engine: Arc<dyn SandboxEngine>,
    handle: SandboxHandle,
}

impl Sandbox {
    /// Create an environment from `image`, started idle so it survives until
    /// explicitly torn down.
    ///
    /// The returned sandbox holds an external resource; callers must ensure
    /// [`terminate`](Sandbox::terminate) runs on every exit path.
    pub async fn provision(engine: Arc<dyn SandboxEngine>, image: &str) -> Result<Sandbox> {
        let keep_alive: Vec<String> = KEEP_ALIVE_CMD.iter().map(|s| s.to_string()).collect();
        let handle = engine
            .create_environment(image, &keep_alive)
            .await
            .map_err(|e| match e {
                Error::Provisioning(_) => e,
                other => Error::Provisioning(other.to_string()),
            })?;

        debug!("Provisioned sandbox {}", handle.id);

        Ok(Sandbox { engine, handle })
    }

    /// Create `dir` inside the environment and unpack the bundle into it
    pub async fn inject(&self, dir: &str, bundle: &Bundle) -> Result<()> {
        self.engine
            .make_directory(&self.handle, dir)
            .await
            .map_err(|e| Error::Injection(e.to_string()))?;

        self.engine
            .load_archive(&self.handle, dir, bundle.as_bytes().to_vec())
            .await
            .map_err(|e| Error::Injection(e.to_string()))?;

        debug!("Injected bundle into {}:{}", self.handle.id, dir);
        Ok(())
    }

    /// Run `command` inside `work_dir`, blocking until it finishes.
    ///
    /// If the environment is killed out-of-band mid-call, the engine surfaces
    /// a transport error; that is folded into an abnormal exit outcome here so
    /// the caller can still classify the run.
    pub async fn run(&self, command: &str, work_dir: &str) -> ExecOutcome {
        match self
            .engine
            .execute_command(&self.handle, command, work_dir)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Command ended abnormally in {}: {}", self.handle.id, e);
                ExecOutcome::abnormal()
            }
        }
    }

    /// Live processes inside the environment; empty if the environment is
    /// unreachable.
    pub async fn processes(&self) -> Vec<ProcessInfo> {
        match self.engine.list_processes(&self.handle).await {
            Ok(procs) => procs,
            Err(e) => {
                debug!("Process listing failed for {}: {}", self.handle.id, e);
                Vec::new()
            }
        }
    }

    /// Kill the environment.
    ///
    /// Idempotent, and its own failure never fails the grading run: a cleanup
    /// error must not mask the primary verdict.
    pub async fn terminate(&self) {
        if let Err(e) = self.engine.kill(&self.handle).await {
            warn!("Failed to terminate sandbox {}: {}", self.handle.id, e);
        } else {
            debug!("Terminated sandbox {}", self.handle.id);
        }
    }

    /// Retrieve a single file's contents from the environment.
    ///
    /// Fetches the archive rooted at `path` and unpacks the entry named
    /// `file_name`. Fails with [`Error::OutputMissing`] if the file was never
    /// produced.
    pub async fn extract_file(&self, path: &str, file_name: &str) -> Result<Vec<u8>> {
        let archive = self
            .engine
            .fetch_archive(&self.handle, path)
            .await
            .map_err(|e| match e {
                Error::OutputMissing(_) => e,
                other => Error::OutputMissing(format!("{}: {}", path, other)),
            })?;

        crate::bundle::extract_entry(&archive, file_name)?
            .ok_or_else(|| Error::OutputMissing(path.to_string()))
    }

    /// The environment's opaque handle
    pub fn handle(&self) -> &SandboxHandle {
        &self.handle
    }
}
