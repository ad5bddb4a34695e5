//! The narrow interface to the isolated-execution engine
//!
//! Everything the grading engine needs from the container runtime is behind
//! this trait, so the real Docker backend and test fakes are interchangeable.

use crate::Result;
use async_trait::async_trait;

/// Opaque reference to a live isolated environment.
///
/// Owned by exactly one [`Sandbox`](crate::sandbox::Sandbox) for the duration
/// of one grading run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxHandle {
    /// Engine-side environment identifier
    pub id: String,
}

/// Outcome of one command executed inside an environment
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// Exit code; negative when the command ended abnormally (for example
    /// because the environment was killed out from under it)
    pub exit_code: i64,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExecOutcome {
    /// Outcome for a command that did not finish normally
    pub fn abnormal() -> Self {
        ExecOutcome {
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// One live process inside an environment
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    /// Process id as reported by the engine
    pub pid: String,
    /// Full command line
    pub command: String,
}

/// Isolated-execution engine primitives.
///
/// Implementations must be safe to share across tasks; a grading run calls
/// these concurrently from the main path and the watchdog.
#[async_trait]
pub trait SandboxEngine: Send + Sync {
    /// Create a long-lived environment from `image`, started with
    /// `keep_alive_cmd` so it idles until explicitly killed.
    async fn create_environment(
        &self,
        image: &str,
        keep_alive_cmd: &[String],
    ) -> Result<SandboxHandle>;

    /// Create a directory inside the environment
    async fn make_directory(&self, handle: &SandboxHandle, path: &str) -> Result<()>;

    /// Unpack a tar archive into `path` inside the environment
    async fn load_archive(
        &self,
        handle: &SandboxHandle,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<()>;

    /// Run `command` synchronously inside `work_dir` and report its outcome
    async fn execute_command(
        &self,
        handle: &SandboxHandle,
        command: &str,
        work_dir: &str,
    ) -> Result<ExecOutcome>;

    /// List the environment's live processes
    async fn list_processes(&self, handle: &SandboxHandle) -> Result<Vec<ProcessInfo>>;

    /// Fetch a tar archive rooted at `path` from the environment
    async fn fetch_archive(&self, handle: &SandboxHandle, path: &str) -> Result<Vec<u8>>;

    /// Kill the environment. Idempotent: killing an already-dead environment
    /// succeeds.
    async fn kill(&self, handle: &SandboxHandle) -> Result<()>;
}
