//! Main Entrypoint for the Debate CLI
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and command line.
//! 2. Initializing logging.
//! 3. Building the participants, judge and transcript sink.
//! 4. Running one debate while printing each argument as it is made.
//! 5. Cancelling cleanly on Ctrl+C, still saving the partial transcript.

use anyhow::Context;
use clap::Parser;
use debate_core::sink::JsonFileSink;
use debate_core::topic::sanitize_topic;
use debate_core::{DebateError, DebateOutcome};
use debate_service::{
    app::{build_orchestrator, load_personas},
    config::{Config, Provider},
    render,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Two personas argue a topic over eight rounds while a judge scores each round.
#[derive(Parser, Debug)]
#[command(name = "debate", author, version, about)]
struct Args {
    /// Debate topic (10 to 500 characters); prompted for when omitted
    #[arg(short, long)]
    topic: Option<String>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Where to write the JSON transcript (a .txt rendering is written beside it)
    #[arg(long, value_name = "PATH")]
    log_path: Option<PathBuf>,

    /// Overrides DEBATE_PROVIDER
    #[arg(long, value_enum)]
    provider: Option<Provider>,

    /// Strip control characters and collapse whitespace in the topic
    #[arg(long)]
    sanitize: bool,

    /// Only print the final summary
    #[arg(short, long)]
    quiet: bool,
}

/// Reads the topic from stdin when it was not given on the command line.
async fn prompt_topic() -> anyhow::Result<String> {
    print!("Enter topic for debate: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read topic from stdin")?;
    Ok(line)
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(provider) = args.provider {
        config = config
            .with_provider(provider)
            .context("Failed to apply --provider")?;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.to_string()))
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded. Initializing debate services...");

    // --- 3. Initialize Services ---
    let sink = match &args.log_path {
        Some(path) => JsonFileSink::new(path),
        None => JsonFileSink::timestamped(&config.transcript_dir),
    };
    let transcript_path = sink.path().to_path_buf();
    let (tx, mut rx) = mpsc::channel(256);
    let cancel = CancellationToken::new();
    let orchestrator = build_orchestrator(&config, Arc::new(sink))?
        .with_events(tx)
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt. Cancelling the debate...");
            cancel.cancel();
        }
    });

    // --- 4. Run the Debate ---
    let raw_topic = match args.topic {
        Some(topic) => topic,
        None => prompt_topic().await?,
    };
    let raw_topic = if args.sanitize {
        sanitize_topic(&raw_topic)
    } else {
        raw_topic
    };

    if !args.quiet {
        let personas = load_personas(config.personas_path.as_deref())?;
        println!(
            "{}",
            render::banner(raw_topic.trim(), (personas.a.name.as_str(), personas.b.name.as_str()))
        );
    }

    let quiet = args.quiet;
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if quiet {
                continue;
            }
            if let Some(line) = render::format_event(&event) {
                println!("{line}");
            }
        }
    });

    let result = orchestrator.run(&raw_topic, args.seed).await;
    // Closes the event channel so the printer drains and exits.
    drop(orchestrator);
    printer.await.context("Event printer panicked")?;

    // --- 5. Report ---
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(error @ DebateError::InvalidTopic { .. }) => {
            eprintln!("{error}");
            return Ok(ExitCode::from(2));
        }
        Err(error) => return Err(error.into()),
    };

    print!("{}", render::format_summary(outcome.transcript()));
    print!("{}", render::format_outcome(&outcome));
    if outcome.sink_error().is_none() {
        println!("Transcript saved to {}", transcript_path.display());
    }

    Ok(match outcome {
        DebateOutcome::Completed { .. } => ExitCode::SUCCESS,
        DebateOutcome::Aborted { .. } => ExitCode::from(1),
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
