//! Judge module - grading orchestration
//!
//! One grading run: build the file bundle, provision a sandbox, inject the
//! bundle, race the blocking run against the deadline watchdog, then classify
//! the outcome into a verdict. The sandbox is terminated on every exit path,
//! exactly once, via the shared run-state machine.

pub mod status;
mod verdict;
mod watchdog;

pub use verdict::{outputs_match, Verdict, TIME_NOT_MEASURED};
pub use watchdog::Watchdog;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::bundle::Bundle;
use crate::config::{GraderConfig, Language};
use crate::error::Result;
use crate::judge::status::RunState;
use crate::sandbox::{Sandbox, SandboxEngine};

/// One user-submitted program plus the problem data to grade it against.
///
/// Immutable for the lifetime of one grading run.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Problem name, used to namespace file names inside the sandbox
    pub problem: String,
    /// Submission language
    pub language: Language,
    /// Host path of the input fed to the program
    pub input_path: PathBuf,
    /// Host path of the expected (correct) output
    pub expected_path: PathBuf,
    /// Host path of the submitted code
    pub code_path: PathBuf,
    /// Wall-clock deadline for the run
    pub timeout: Duration,
}

/// Grading engine: runs submissions in sandboxes and produces verdicts.
///
/// Each call to [`grade`](Judge::grade) is a fully self-contained session
/// against its own sandbox; no state persists between runs.
pub struct Judge {
    engine: Arc<dyn SandboxEngine>,
    config: GraderConfig,
}

impl Judge {
    pub fn new(engine: Arc<dyn SandboxEngine>, config: GraderConfig) -> Self {
        Judge { engine, config }
    }

    /// Grade one submission.
    ///
    /// Infrastructure failures (unsupported language, provisioning,
    /// injection) surface as errors; program-behavior outcomes (timeout,
    /// non-zero exit, missing or mismatched output) are verdicts, never
    /// errors.
    pub async fn grade(&self, submission: &Submission) -> Result<Verdict> {
        // Everything that can fail without an external resource fails first
        let image = self.config.image_for(submission.language)?.to_string();
        let expected = std::fs::read(&submission.expected_path)?;
        let bundle = Bundle::build(
            &submission.problem,
            submission.language,
            &submission.input_path,
            &submission.code_path,
        )?;

        info!(
            "Grading {} ({}) with timeout {:?}",
            submission.problem, submission.language, submission.timeout
        );

        let sandbox = Arc::new(Sandbox::provision(self.engine.clone(), &image).await?);

        // From here on the sandbox must be torn down on every exit path. The
        // run path terminates it through the state machine; a fatal error
        // before the run starts is cleaned up here (terminate is idempotent).
        match self
            .run_and_evaluate(&sandbox, submission, &bundle, &expected)
            .await
        {
            Ok(verdict) => {
                info!(
                    "Verdict for {}: {} ({}s)",
                    submission.problem, verdict.message, verdict.time_secs
                );
                Ok(verdict)
            }
            Err(e) => {
                sandbox.terminate().await;
                Err(e)
            }
        }
    }

    async fn run_and_evaluate(
        &self,
        sandbox: &Arc<Sandbox>,
        submission: &Submission,
        bundle: &Bundle,
        expected: &[u8],
    ) -> Result<Verdict> {
        sandbox.inject(&self.config.exec_dir, bundle).await?;

        let command = self
            .config
            .run_command(submission.language, &bundle.code_name());
        let status = status::shared();
        let start = Instant::now();

        let watchdog = Watchdog::new(
            status.clone(),
            sandbox.clone(),
            command.clone(),
            start,
            submission.timeout,
            self.config.poll_interval,
        )
        .spawn();

        let outcome = sandbox.run(&command, &self.config.exec_dir).await;
        let elapsed = start.elapsed();

        {
            let mut status = status.lock().await;
            if status.try_complete() {
                // Won the race against the watchdog: this path owns teardown
                sandbox.terminate().await;
            }
        }

        if let Err(e) = watchdog.await {
            warn!("Watchdog task failed: {}", e);
        }

        let state = status.lock().await.state();
        debug!(
            "Run finished: state {:?}, exit code {}, elapsed {:?}",
            state, outcome.exit_code, elapsed
        );

        // Short-circuit classification: timeout, then exit code, then output
        if state == RunState::Killed || elapsed > submission.timeout {
            return Ok(Verdict::time_limit_exceeded());
        }

        let elapsed_secs = elapsed.as_secs_f64();

        if outcome.exit_code != 0 {
            debug!("Non-zero exit, stderr: {}", outcome.stderr);
            return Ok(Verdict::runtime_error(elapsed_secs));
        }

        let output_name = bundle.output_name();
        let output_path = format!("{}/{}", self.config.exec_dir, output_name);
        let produced = match sandbox.extract_file(&output_path, &output_name).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // The program exited cleanly but never wrote its artifact
                info!("Output extraction failed: {}", e);
                return Ok(Verdict::runtime_error(elapsed_secs));
            }
        };

        if outputs_match(&produced, expected) {
            Ok(Verdict::correct(elapsed_secs))
        } else {
            Ok(Verdict::incorrect(elapsed_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sandbox::{ExecOutcome, ProcessInfo, SandboxHandle};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Scripted in-process engine: one environment, one command, observable
    /// create/kill counts.
    struct FakeEngine {
        run_duration: Duration,
        exit_code: i64,
        /// Contents of the output file the "program" writes, if any
        output: Option<Vec<u8>>,
        fail_injection: bool,
        creates: AtomicUsize,
        kills: AtomicUsize,
        killed: Notify,
        running_cmd: Mutex<Option<String>>,
    }

    impl FakeEngine {
        fn new(run_duration: Duration, exit_code: i64, output: Option<Vec<u8>>) -> Self {
            FakeEngine {
                run_duration,
                exit_code,
                output,
                fail_injection: false,
                creates: AtomicUsize::new(0),
                kills: AtomicUsize::new(0),
                killed: Notify::new(),
                running_cmd: Mutex::new(None),
            }
        }

        fn tar_with(name: &str, data: &[u8]) -> Vec<u8> {
            let mut buf = Vec::new();
            {
                let mut builder = tar::Builder::new(&mut buf);
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder
                    .append_data(&mut header, name, std::io::Cursor::new(data))
                    .unwrap();
                builder.finish().unwrap();
            }
            buf
        }
    }

    #[async_trait]
    impl SandboxEngine for FakeEngine {
        async fn create_environment(
            &self,
            _image: &str,
            _keep_alive_cmd: &[String],
        ) -> Result<SandboxHandle> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(SandboxHandle {
                id: "fake-env".to_string(),
            })
        }

        async fn make_directory(&self, _handle: &SandboxHandle, path: &str) -> Result<()> {
            if self.fail_injection {
                return Err(Error::Container(format!("unreachable: {}", path)));
            }
            Ok(())
        }

        async fn load_archive(
            &self,
            _handle: &SandboxHandle,
            _path: &str,
            _archive: Vec<u8>,
        ) -> Result<()> {
            Ok(())
        }

        async fn execute_command(
            &self,
            _handle: &SandboxHandle,
            command: &str,
            _work_dir: &str,
        ) -> Result<ExecOutcome> {
            *self.running_cmd.lock().unwrap() = Some(command.to_string());
            let outcome = tokio::select! {
                _ = tokio::time::sleep(self.run_duration) => ExecOutcome {
                    exit_code: self.exit_code,
                    stdout: String::new(),
                    stderr: String::new(),
                },
                _ = self.killed.notified() => ExecOutcome::abnormal(),
            };
            *self.running_cmd.lock().unwrap() = None;
            Ok(outcome)
        }

        async fn list_processes(&self, _handle: &SandboxHandle) -> Result<Vec<ProcessInfo>> {
            let mut procs = vec![ProcessInfo {
                pid: "1".to_string(),
                command: "while true; do sleep 30; done".to_string(),
            }];
            if let Some(cmd) = self.running_cmd.lock().unwrap().clone() {
                procs.push(ProcessInfo {
                    pid: "7".to_string(),
                    command: cmd,
                });
            }
            Ok(procs)
        }

        async fn fetch_archive(&self, _handle: &SandboxHandle, path: &str) -> Result<Vec<u8>> {
            match &self.output {
                Some(data) => {
                    let name = path.rsplit('/').next().unwrap_or(path);
                    Ok(Self::tar_with(name, data))
                }
                None => Err(Error::OutputMissing(path.to_string())),
            }
        }

        async fn kill(&self, _handle: &SandboxHandle) -> Result<()> {
            self.kills.fetch_add(1, Ordering::SeqCst);
            self.killed.notify_waiters();
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        submission: Submission,
        config: GraderConfig,
    }

    fn fixture(timeout: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, contents: &[u8]| {
            let path = dir.path().join(name);
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(contents).unwrap();
            path
        };

        let submission = Submission {
            problem: "double-it".to_string(),
            language: Language::Python,
            input_path: write("in.txt", b"21\n"),
            expected_path: write("expected.txt", b"42"),
            code_path: write("sol.py", b"print(int(input()) * 2)\n"),
            timeout,
        };

        let mut config = GraderConfig::default();
        config.poll_interval = Duration::from_millis(10);

        Fixture {
            _dir: dir,
            submission,
            config,
        }
    }

    fn judge_with(engine: &Arc<FakeEngine>, config: GraderConfig) -> Judge {
        let engine: Arc<dyn SandboxEngine> = engine.clone();
        Judge::new(engine, config)
    }

    #[tokio::test]
    async fn test_correct_run() {
        let fx = fixture(Duration::from_secs(2));
        let engine = Arc::new(FakeEngine::new(
            Duration::from_millis(10),
            0,
            Some(b"42\n".to_vec()),
        ));
        let judge = judge_with(&engine, fx.config.clone());

        let verdict = judge.grade(&fx.submission).await.unwrap();
        assert!(verdict.correct);
        assert_eq!(verdict.message, "Correct");
        assert!(verdict.time_secs >= 0.0);
        assert!(verdict.time_secs < fx.submission.timeout.as_secs_f64());
        assert_eq!(engine.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_incorrect_output() {
        let fx = fixture(Duration::from_secs(2));
        let engine = Arc::new(FakeEngine::new(
            Duration::from_millis(10),
            0,
            Some(b"43\n".to_vec()),
        ));
        let judge = judge_with(&engine, fx.config.clone());

        let verdict = judge.grade(&fx.submission).await.unwrap();
        assert!(!verdict.correct);
        assert_eq!(verdict.message, "Incorrect");
        assert_eq!(engine.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_time_limit_exceeded() {
        let fx = fixture(Duration::from_millis(150));
        // Run would take far longer than the deadline
        let engine = Arc::new(FakeEngine::new(
            Duration::from_secs(30),
            0,
            Some(b"42\n".to_vec()),
        ));
        let judge = judge_with(&engine, fx.config.clone());

        let verdict = judge.grade(&fx.submission).await.unwrap();
        assert!(!verdict.correct);
        assert_eq!(verdict.message, "Time limit exceeded");
        assert_eq!(verdict.time_secs, TIME_NOT_MEASURED);
        // The environment was terminated, not orphaned
        assert_eq!(engine.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_runtime_error_never_tle() {
        let fx = fixture(Duration::from_secs(2));
        let engine = Arc::new(FakeEngine::new(Duration::from_millis(10), 1, None));
        let judge = judge_with(&engine, fx.config.clone());

        let verdict = judge.grade(&fx.submission).await.unwrap();
        assert!(!verdict.correct);
        assert_eq!(verdict.message, "Runtime error");
        assert!(verdict.time_secs >= 0.0);
        assert_eq!(engine.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_output_is_runtime_error() {
        let fx = fixture(Duration::from_secs(2));
        // Clean exit but the program never wrote its output file
        let engine = Arc::new(FakeEngine::new(Duration::from_millis(10), 0, None));
        let judge = judge_with(&engine, fx.config.clone());

        let verdict = judge.grade(&fx.submission).await.unwrap();
        assert!(!verdict.correct);
        assert_eq!(verdict.message, "Runtime error");
        assert_eq!(engine.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_language_allocates_nothing() {
        let fx = fixture(Duration::from_secs(2));
        let engine = Arc::new(FakeEngine::new(Duration::from_millis(10), 0, None));
        let mut config = fx.config.clone();
        config.images.clear();
        let judge = judge_with(&engine, config);

        let err = judge.grade(&fx.submission).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedLanguage(_)));
        assert_eq!(engine.creates.load(Ordering::SeqCst), 0);
        assert_eq!(engine.kills.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_injection_failure_still_terminates() {
        let fx = fixture(Duration::from_secs(2));
        let mut engine = FakeEngine::new(Duration::from_millis(10), 0, None);
        engine.fail_injection = true;
        let engine = Arc::new(engine);
        let judge = judge_with(&engine, fx.config.clone());

        let err = judge.grade(&fx.submission).await.unwrap_err();
        assert!(matches!(err, Error::Injection(_)));
        assert_eq!(engine.creates.load(Ordering::SeqCst), 1);
        assert_eq!(engine.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exactly_one_kill_under_deadline_jitter() {
        // Run durations straddling the deadline: whichever side wins the
        // race, the sandbox is terminated exactly once.
        for millis in [40u64, 80, 100, 120, 160] {
            let fx = fixture(Duration::from_millis(100));
            let engine = Arc::new(FakeEngine::new(
                Duration::from_millis(millis),
                0,
                Some(b"42\n".to_vec()),
            ));
            let judge = judge_with(&engine, fx.config.clone());

            let verdict = judge.grade(&fx.submission).await.unwrap();
            assert_eq!(
                engine.kills.load(Ordering::SeqCst),
                1,
                "run of {}ms against a 100ms deadline must kill exactly once",
                millis
            );
            // A kill implies the TLE verdict; a clean finish may still be
            // classified TLE if measured time crossed the deadline
            if verdict.message == "Time limit exceeded" {
                assert_eq!(verdict.time_secs, TIME_NOT_MEASURED);
            } else {
                assert!(verdict.time_secs >= 0.0);
            }
        }
    }
}
