use std::time::Duration;

use clap::{Args, Subcommand};
use veer_session::Registry;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod config;
pub mod doctor;
pub mod entries;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Call an entry in a fresh child process.
    Call(CallArgs),
    /// List the entries this binary can run.
    Entries(EntriesArgs),
    /// Inspect the effective configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, registry: &Registry, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, registry, format),
        Command::Entries(args) => entries::run(args, registry, format),
        Command::Config(command) => config::run(command, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Entry name, full (`veer::demo::sum`) or short (`sum`).
    pub entry: String,
    /// Positional argument as JSON; bare words are taken as strings.
    #[arg(long = "arg", value_name = "JSON")]
    pub args: Vec<String>,
    /// Keyword argument as NAME=JSON.
    #[arg(long = "kwarg", value_name = "NAME=JSON")]
    pub kwargs: Vec<String>,
    /// Always run inside a container.
    #[arg(long)]
    pub container: bool,
    /// Container image (overrides the configured default).
    #[arg(long, value_name = "PATH")]
    pub image: Option<String>,
    /// Container app (overrides the configured default).
    #[arg(long, value_name = "NAME")]
    pub app: Option<String>,
    /// Give up if the child has not connected within this time (e.g. 5s, 500ms).
    #[arg(long)]
    pub accept_timeout: Option<String>,
    /// Read/write timeout on the connection (e.g. 30s).
    #[arg(long)]
    pub io_timeout: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct EntriesArgs {}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print one item by dotted key.
    Get(ConfigGetArgs),
    /// Print the whole configuration and active environment overrides.
    Show,
}

#[derive(Args, Debug)]
pub struct ConfigGetArgs {
    /// Dotted key, e.g. `default_container.image`.
    pub key: String,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timeout_seconds() {
        assert_eq!(parse_timeout("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_timeout("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_timeout_millis() {
        assert_eq!(parse_timeout("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_timeout_invalid() {
        assert!(parse_timeout("0s").is_err());
        assert!(parse_timeout("bad").is_err());
        assert!(parse_timeout(" ").is_err());
    }
}
