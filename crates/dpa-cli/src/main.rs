//! DPA command-line client.
//!
//! Builds a request engine from a YAML configuration, sends the requested
//! frames one after another and prints each outcome.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use dpa_engine::{
    ConfigError, EngineConfig, ProcessingOutcome, RequestEngine, TransportError, TransportRegistry,
};
use dpa_protocol::{
    CodecError, Request, CMD_COORDINATOR_BONDED_DEVICES, CMD_LED_PULSE, COORDINATOR_ADDRESS,
    PNUM_COORDINATOR, PNUM_LEDR,
};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

/// Errors that end the program.
#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid hex frame: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid request frame: {0}")]
    Frame(#[from] CodecError),

    #[error("{failed} of {total} requests failed")]
    Failed { failed: usize, total: usize },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "dpa_cli={level},dpa_engine={level},dpa_timing={level}",
            level = cli.log_level
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    debug!("Engine config: {:?}", config);

    let requests = match &cli.command {
        Commands::Request { frame } => vec![Request::decode(&hex::decode(frame.trim())?)?],
        Commands::Pulse { nodes } => nodes
            .iter()
            .map(|&node| Request::new(node, PNUM_LEDR, CMD_LED_PULSE))
            .collect(),
        Commands::Bonded => vec![Request::new(
            COORDINATOR_ADDRESS,
            PNUM_COORDINATOR,
            CMD_COORDINATOR_BONDED_DEVICES,
        )],
    };

    dpa_metrics::describe_metrics();

    let mut engine = RequestEngine::from_config(&config, &TransportRegistry::with_defaults())?;
    if let Some(timeout_ms) = cli.timeout_ms {
        engine.set_default_timeout(Some(Duration::from_millis(timeout_ms)));
    }
    engine.start()?;
    info!("Sending {} request(s) over {} transport", requests.len(), config.transport.kind());

    let mut failed = 0;
    for request in &requests {
        let outcome = engine.send(request);
        print_outcome(request, &outcome);
        if !outcome.is_success() {
            failed += 1;
        }
    }

    if matches!(cli.command, Commands::Bonded) {
        if let Some(bonded) = engine.timing().bonded_nodes() {
            println!("bonded nodes: {}", bonded);
        }
    }

    engine.shutdown();

    if failed > 0 {
        return Err(CliError::Failed {
            failed,
            total: requests.len(),
        });
    }
    Ok(())
}

fn print_outcome(request: &Request, outcome: &ProcessingOutcome) {
    match outcome {
        ProcessingOutcome::Success(response) => println!(
            "[0x{:04x}] {} dpa_value=0x{:02x} data={}",
            request.address,
            response.response_code,
            response.dpa_value,
            hex::encode(&response.payload)
        ),
        ProcessingOutcome::Failure(failure) => {
            println!("[0x{:04x}] {}", request.address, failure)
        }
    }
}
