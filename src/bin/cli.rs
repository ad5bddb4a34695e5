//! Gradebox CLI
//!
//! Runs one submission inside an isolated Docker environment and prints the
//! verdict as JSON. Exits 0 iff the verdict is Correct; an incorrect verdict
//! exits non-zero with the verdict on stdout, so callers can tell "wrong
//! answer" apart from "infrastructure broken" (which surfaces as an error).

use clap::Parser;
use gradebox::judge::{Judge, Submission};
use gradebox::sandbox::DockerEngine;
use gradebox::{Error, GraderConfig, Language, Result, VERSION};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "gradebox",
    author = "Gradebox Contributors",
    version = VERSION,
    about = "Run a submission inside an isolated Docker environment and grade its output",
    long_about = None
)]
struct Cli {
    /// Problem name, used to namespace files inside the sandbox
    problem: String,

    /// Language of the submission (py)
    language: Language,

    /// Path of the input fed to the submission
    infile: PathBuf,

    /// Path of the correct (expected) output
    outfile: PathBuf,

    /// Path to the submitted code file
    codefile: PathBuf,

    /// Wall-clock time limit in seconds (default: 2)
    #[arg(short, long)]
    timeout: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gradebox=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = GraderConfig::from_env();

    let timeout = match cli.timeout {
        Some(secs) if secs > 0.0 => Duration::from_secs_f64(secs),
        Some(secs) => {
            return Err(Error::Config(format!(
                "Timeout must be positive, got {}",
                secs
            )))
        }
        None => config.default_timeout,
    };

    let submission = Submission {
        problem: cli.problem,
        language: cli.language,
        input_path: cli.infile,
        expected_path: cli.outfile,
        code_path: cli.codefile,
        timeout,
    };

    let engine = Arc::new(DockerEngine::connect().await?);
    let judge = Judge::new(engine, config);

    let verdict = judge.grade(&submission).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&verdict).expect("verdict serializes to JSON")
    );

    if verdict.correct {
        Ok(())
    } else {
        info!("Submission rejected: {}", verdict.message);
        std::process::exit(1);
    }
}
