use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use serde_json::json;
use tracing::info;
use ttml_api::RollApiClient;
use ttml_engine::{ExecutionState, Executor, ExecutorOptions};
use ttml_util::{TtmlConfig, default_config_path};

mod host;
mod loader;

use host::TerminalHost;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => run_program(sub).await,
        Some(("config", sub)) => show_config(sub),
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

/// Logs go to stderr; stdout carries the run output only.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_directive())
        .with_writer(std::io::stderr)
        .try_init();
}

/// `RUST_LOG` when set, `info` otherwise.
fn log_directive() -> String {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| "info".into())
}

fn build_cli() -> Command {
    Command::new("ttml")
        .about("Run TTML macro programs")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(
            Command::new("run")
                .about("Execute a parsed program and print its output as JSON")
                .arg(
                    Arg::new("program")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to a program (JSON or YAML)"),
                )
                .arg(
                    Arg::new("tokens")
                        .long("tokens")
                        .short('t')
                        .value_parser(value_parser!(PathBuf))
                        .help("Token table to load before running"),
                )
                .arg(
                    Arg::new("library")
                        .long("library")
                        .short('l')
                        .value_parser(value_parser!(PathBuf))
                        .help("Macro library used for inline macro calls"),
                )
                .arg(
                    Arg::new("keep-state")
                        .long("keep-state")
                        .action(ArgAction::SetTrue)
                        .help("Skip cleanup and print the final state alongside the output"),
                )
                .arg(
                    Arg::new("test-mode")
                        .long("test-mode")
                        .action(ArgAction::SetTrue)
                        .help("Start with test mode enabled"),
                ),
        )
        .subcommand(
            Command::new("config").about("Show the effective configuration").arg(
                Arg::new("path")
                    .long("path")
                    .action(ArgAction::SetTrue)
                    .help("Print only the config file location"),
            ),
        )
}

async fn run_program(matches: &ArgMatches) -> Result<()> {
    let config = TtmlConfig::load().context("load config")?;
    let program_path = matches
        .get_one::<PathBuf>("program")
        .context("a program path is required")?;
    let program = loader::load_program(program_path)?;

    let mut state = ExecutionState::new();
    if let Some(path) = matches.get_one::<PathBuf>("tokens") {
        let count = loader::load_tokens(path, &mut state)?;
        info!(tokens = count, path = %path.display(), "loaded tokens");
    }
    if matches.get_flag("test-mode") {
        state.set_test_mode(true);
    }
    let library = matches
        .get_one::<PathBuf>("library")
        .map(|path| loader::load_library(path))
        .transpose()?;

    let client = RollApiClient::new_from_env(Some(&config.roll_api_base), config.request_timeout())?;
    let options = ExecutorOptions {
        callback_timeout: config.callback_timeout(),
    };
    let mut executor = Executor::with_state(TerminalHost::new(client, library), state).with_options(options);

    let keep_state = matches.get_flag("keep-state");
    let cleanup = config.cleanup && !keep_state;
    info!(program = %program.name, steps = program.steps.len(), cleanup, "running program");
    let output = executor
        .execute(&program.steps, cleanup)
        .await
        .with_context(|| format!("program '{}' failed", program.name))?;

    let document = if keep_state {
        let state = executor.state();
        json!({
            "output": output,
            "state": {
                "tokens": state.raw_tokens(),
                "results": state.results(),
                "variables": state.variables(),
                "target": state.target(),
                "run_as": state.run_as(),
                "test_mode": state.test_mode(),
            }
        })
    } else {
        serde_json::to_value(&output)?
    };
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn show_config(matches: &ArgMatches) -> Result<()> {
    let path = default_config_path();
    if matches.get_flag("path") {
        println!("{}", path.display());
        return Ok(());
    }
    let config = TtmlConfig::load_from(&path).context("load config")?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
