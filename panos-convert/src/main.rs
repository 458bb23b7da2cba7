use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod convert_cmd;
mod path_guard;
mod scopes_cmd;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("panos_convert={level}").parse()?),
        )
        .init();

    match cli.command {
        Command::Convert(args) => convert_cmd::run_convert(args),
        Command::Scopes(args) => scopes_cmd::run_scopes(args),
    }
}
