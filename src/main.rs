//! Command-line entry point: voice2text.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Check the input argument and that the file exists.
//! 3. Create the [`tokio`] runtime.
//! 4. Load [`AppConfig`] and the job configuration beside the input.
//! 5. Build the [`MediaServicesClient`] and fetch the first token.
//! 6. Run the [`TranscriptionPipeline`]; Esc stops watching the job.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use voice2text::{
    ams::MediaServicesClient,
    config::{AppConfig, JobFiles},
    pipeline::{ConsoleReporter, Reporter, RunEvent, RunReport, TranscriptionPipeline},
    Voice2TextError,
};

const DEFAULT_LOG_FILTER: &str = "warn,voice2text=info,reqwest=warn,hyper=warn";

const USAGE: &str = "Usage: voice2text <filename>\n  filename = Path to file.";

/// Transcribe a media file with the Azure Media Indexer.
#[derive(Debug, Parser)]
#[command(name = "voice2text", version, about)]
struct Args {
    /// Path to the audio or video file. `config.json` must sit beside it.
    #[arg(value_name = "FILENAME")]
    input: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .init();

    let input = match checked_input(Args::parse().input) {
        Ok(input) => input,
        Err(code) => return code,
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    exit_code(rt.block_on(run(input)))
}

/// The input file to transcribe; prints usage or the missing-file message
/// and yields the exit code otherwise.
fn checked_input(input: Option<PathBuf>) -> Result<PathBuf, ExitCode> {
    let Some(input) = input else {
        println!("{USAGE}");
        return Err(ExitCode::FAILURE);
    };
    if !input.is_file() {
        println!("File {} does not exist.", input.display());
        return Err(ExitCode::FAILURE);
    }
    Ok(input)
}

/// A job that failed or was left running still exits 0; only local and
/// service errors fail the process.
fn exit_code(result: anyhow::Result<RunReport>) -> ExitCode {
    match result {
        Ok(report) => {
            match report {
                RunReport::Transcribed { downloaded, transcript } => log::info!(
                    "{} file(s) downloaded, transcript: {}",
                    downloaded.len(),
                    transcript
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "none".into())
                ),
                RunReport::JobFailed(error) => log::info!("job failed remotely: {error}"),
                RunReport::Stopped(state) => log::info!("stopped with job {state}"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(input: PathBuf) -> anyhow::Result<RunReport> {
    let config = AppConfig::load()?;
    log::debug!("settings: {:?}", config.service);

    let files = JobFiles::new(&input)?;
    let reporter = Arc::new(ConsoleReporter::new());
    reporter.report(&RunEvent::ReadingConfiguration {
        path: files.job_config_file.clone(),
    });
    let job_configuration = files.load_job_configuration()?;

    let client = MediaServicesClient::from_config(&config)
        .map_err(|e| Voice2TextError::AuthenticationFailed(e.to_string()))?;
    client
        .authenticate()
        .await
        .map_err(|e| Voice2TextError::AuthenticationFailed(e.to_string()))?;
    log::info!("authenticated against {}", client.endpoint());

    let pipeline = TranscriptionPipeline::new(Arc::new(client), reporter, config)
        .with_escape_key(std::io::stdin().is_terminal());
    let report = pipeline
        .run(&files, &job_configuration, CancellationToken::new())
        .await
        .with_context(|| format!("transcribing {}", files.input_file.display()))?;
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
