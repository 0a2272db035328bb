//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, discovers configuration, installs logging,
//! dispatches to a command and prints every error itself. `main` only turns
//! the returned code into a process exit.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use specsmith_utils::logging::{LogFormat, init_tracing};

use super::args::{Cli, Commands};
use super::commands;
use crate::{CliArgs, Config, ExitCode, SpecsmithError};

pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        state_dir: cli.state_dir.clone(),
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        retries: cli.retries,
        schema_policy: cli.schema_policy,
        verbose: cli.verbose.then_some(true),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = SpecsmithError::from(err);
            eprintln!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };

    // A second subscriber (tests driving run() twice) is not an error.
    let _ = init_tracing(config.verbose(), LogFormat::from_env());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = cli.command.operation();
    debug!(command = operation, state_dir = %config.state_dir(), "Dispatching command");

    let result = rt.block_on(async {
        match cli.command {
            Commands::Generate { file } => {
                commands::execute_generate_command(file.as_deref(), config).await
            }
            Commands::Refine {
                trace_id,
                instruction,
                spec,
            } => {
                commands::execute_refine_command(&trace_id, &instruction, spec.as_deref(), config)
                    .await
            }
            Commands::History { trace_id, json } => {
                commands::execute_history_command(&trace_id, json, &config)
            }
            Commands::Show { trace_id, version } => {
                commands::execute_show_command(&trace_id, version, &config)
            }
            Commands::Config => commands::execute_config_command(&config),
        }
    });

    if let Err(error) = result {
        return Err(report(&error, operation));
    }

    Ok(())
}

/// Print `error` to stderr and pick the exit code.
fn report(error: &anyhow::Error, operation: &str) -> ExitCode {
    if let Some(err) = error.downcast_ref::<SpecsmithError>() {
        eprintln!("{}", err.display_for_user());
        return err.to_exit_code();
    }

    eprintln!("✗ {operation} failed: {error:#}");
    eprintln!("\n  Run with --verbose for more detailed output.");
    ExitCode::INTERNAL
}
