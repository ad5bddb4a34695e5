//! Deadline watchdog
//!
//! A background task racing against the blocking run call. It polls the
//! shared status and the clock; when the deadline elapses first it re-checks
//! the environment's process list before killing, so a run that finished just
//! past the deadline check is not killed spuriously. The kill and the state
//! transition happen under the status lock.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::judge::status::SharedStatus;
use crate::sandbox::Sandbox;

pub struct Watchdog {
    status: SharedStatus,
    sandbox: Arc<Sandbox>,
    /// Command line the main path launched, matched against live processes
    command: String,
    start: Instant,
    timeout: Duration,
    poll_interval: Duration,
}

impl Watchdog {
    pub fn new(
        status: SharedStatus,
        sandbox: Arc<Sandbox>,
        command: String,
        start: Instant,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Watchdog {
            status,
            sandbox,
            command,
            start,
            timeout,
            poll_interval,
        }
    }

    /// Start watching on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.watch())
    }

    async fn watch(self) {
        loop {
            if !self.status.lock().await.is_waiting() {
                // Main path finished cleanly, nothing to do
                return;
            }
            if self.start.elapsed() >= self.timeout {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        // Deadline elapsed. The run may still have finished at nearly the
        // same instant, so confirm the command is actually alive before
        // killing anything.
        let alive = self
            .sandbox
            .processes()
            .await
            .iter()
            .any(|p| p.command.contains(&self.command));
        if !alive {
            debug!("Deadline elapsed but command already gone, watchdog standing down");
            return;
        }

        let mut status = self.status.lock().await;
        if !status.try_kill() {
            // Lost the race to the main path after the liveness check
            return;
        }
        warn!(
            "Deadline of {:?} exceeded, terminating sandbox {}",
            self.timeout,
            self.sandbox.handle().id
        );
        self.sandbox.terminate().await;
    }
}
