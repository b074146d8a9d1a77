mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::exit::config_error;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "veer", version, about = "Call functions in a fresh process or container")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "VEER_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    /// Read configuration from this file instead of the usual locations.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let registry = veer::demo::registry();

    // A child spawned by `veer call` re-enters here; serve the call and exit.
    if veer::in_child() {
        init_logging(
            LogFormat::Text,
            LogLevel::from_env().unwrap_or(LogLevel::Info),
        );
        veer::run_if_child(&registry);
    }

    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    if let Some(path) = &cli.config {
        if let Err(err) = veer_config::read_set_config(Some(path)) {
            let err = config_error("cannot load config", err);
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, &registry, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "veer", "call", "loopback", "--arg", "3", "--arg", "7", "--kwarg", "foobar=42",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.entry, "loopback");
                assert_eq!(args.args, vec!["3", "7"]);
                assert_eq!(args.kwargs, vec!["foobar=42"]);
                assert!(!args.container);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn parses_container_flags() {
        let cli = Cli::try_parse_from([
            "veer",
            "call",
            "pid",
            "--container",
            "--image",
            "/images/sim.sif",
            "--app",
            "sim",
        ])
        .expect("container args should parse");

        match cli.command {
            Command::Call(args) => {
                assert!(args.container);
                assert_eq!(args.image.as_deref(), Some("/images/sim.sif"));
                assert_eq!(args.app.as_deref(), Some("sim"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn parses_config_get() {
        let cli = Cli::try_parse_from(["veer", "config", "get", "singularity.binary"])
            .expect("config get should parse");
        assert!(matches!(cli.command, Command::Config(cmd::ConfigCommand::Get(_))));
    }

    #[test]
    fn call_requires_entry() {
        let err = Cli::try_parse_from(["veer", "call"]).expect_err("entry is required");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
