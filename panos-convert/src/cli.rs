use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "panos-convert")]
#[command(about = "Convert Palo Alto Networks policies into Check Point layered policies")]
pub struct Cli {
    /// Log conversion stages (same as RUST_LOG=panos_convert=debug).
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Convert one PAN-OS export.
    Convert(ConvertArgs),
    /// List the vsys and device groups of one export.
    Scopes(ScopesArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// PAN-OS configuration export (firewall or Panorama).
    pub input: PathBuf,
    /// Write the converted scopes as JSON.
    #[arg(long)]
    pub output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Skip NAT rules.
    #[arg(long)]
    pub no_nat: bool,
    /// Convert source users into access roles.
    #[arg(long)]
    pub users: bool,
    /// LDAP account unit attached to access roles.
    #[arg(long, requires = "users")]
    pub ldap_account_unit: Option<String>,
    /// Application match table (`app;cp-apps;cp-services` per line).
    #[arg(long)]
    pub apps_file: Option<PathBuf>,
    /// Directory with reserved_words.toml and known_services.toml.
    #[arg(long)]
    pub mappings_dir: Option<PathBuf>,
    /// Export only objects referenced by converted rules.
    #[arg(long)]
    pub skip_unused: bool,
    /// Fail when any scope records conversion errors.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct ScopesArgs {
    pub input: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
