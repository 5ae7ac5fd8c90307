// src/main.rs

mod cli;
mod commands;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use commands::GlobalOptions;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let global = GlobalOptions {
        config: cli.config,
        cache_dir: cli.cache_dir,
    };

    match cli.command {
        Commands::Install {
            recipes,
            prefix,
            keep_staging,
            no_deps,
            jobs,
        } => commands::cmd_install(&global, &recipes, prefix, keep_staging, no_deps, jobs),
        Commands::Test { recipe, prefix } => commands::cmd_test(&global, &recipe, prefix),
        Commands::Fetch { recipe } => commands::cmd_fetch(&global, &recipe),
        Commands::Validate { recipe } => commands::cmd_validate(&recipe),
        Commands::List { prefix } => commands::cmd_list(&global, prefix),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "kettle", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Exit code of the first library error in the chain, 1 otherwise
fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<kettle::Error>())
        .map(kettle::Error::exit_code)
        .unwrap_or(1)
}
