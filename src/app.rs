//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - initializes logging and loads settings
//! - parses CLI arguments
//! - dispatches to the server, a one-off calculation, or date parsing

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{CalcArgs, Command, ParseDateArgs, ServeArgs};
use crate::config::Settings;
use crate::domain::CalculationResponse;
use crate::error::AppError;
use crate::server::AppState;

pub mod pipeline;

/// Entry point for the `centile` binary.
pub fn run() -> Result<(), AppError> {
    init_tracing();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Serve(args) => handle_serve(args),
        Command::Calc(args) => handle_calc(args),
        Command::ParseDate(args) => handle_parse_date(args),
    }
}

// Logs go to stderr so `calc` output stays pipeable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    let mut settings = Settings::from_env()?;
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    let addr = settings.bind_addr()?;

    // The outbound client is blocking; build it before entering the runtime.
    let state = AppState::from_settings(&settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::new(4, format!("Failed to start async runtime: {e}")))?;

    runtime.block_on(crate::server::serve(state, addr))
}

fn handle_calc(args: CalcArgs) -> Result<(), AppError> {
    let settings = Settings::from_env()?;
    let state = AppState::from_settings(&settings);
    let calculator = state.calculator().map_err(|e| AppError::new(4, e.to_string()))?;

    let result = calculator.calculate(&args.to_input());

    if args.text {
        match &result {
            Ok(aggregate) => print!("{}", crate::report::format_aggregate(aggregate)),
            Err(e) => eprintln!("Error: {e}"),
        }
    } else {
        let response = CalculationResponse::from_result(&result);
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| AppError::new(4, format!("Failed to encode response: {e}")))?;
        println!("{json}");
    }

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(AppError::new(2, e.to_string())),
    }
}

fn handle_parse_date(args: ParseDateArgs) -> Result<(), AppError> {
    let date = crate::normalize::normalize(&args.raw, args.hint).map_err(|e| AppError::new(2, e.to_string()))?;
    println!("{date}");
    Ok(())
}
