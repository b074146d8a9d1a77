use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use veer::demo;
use veer_session::{CallArgs as Arguments, Registry, Remote, SessionOptions};

use crate::cmd::{parse_timeout, CallArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, print_raw, table, value_preview, OutputFormat};

#[derive(Serialize)]
struct CallOutput<'a> {
    entry: &'a str,
    host_pid: u32,
    result: Value,
}

pub fn run(args: CallArgs, registry: &Registry, format: OutputFormat) -> CliResult<i32> {
    let entry = demo::resolve(registry, &args.entry)
        .ok_or_else(|| CliError::new(USAGE, format!("unknown entry: {}", args.entry)))?;
    let arguments = build_arguments(&args.args, &args.kwargs)?;

    let options = SessionOptions {
        accept_timeout: args.accept_timeout.as_deref().map(parse_timeout).transpose()?,
        io_timeout: args.io_timeout.as_deref().map(parse_timeout).transpose()?,
        ..SessionOptions::default()
    };

    let mut remote = registry
        .remote(entry)
        .map_err(|err| session_error("call failed", err))?
        .always_in_container(args.container)
        .options(options);
    if let Some(image) = args.image {
        remote = remote.image(image);
    }
    if let Some(app) = args.app {
        remote = remote.app(app);
    }

    debug!(entry, ?arguments, "calling entry");
    let result = invoke(&remote, arguments)?;

    let out = CallOutput {
        entry,
        host_pid: std::process::id(),
        result,
    };
    print_call(&out, format);
    Ok(SUCCESS)
}

fn invoke(remote: &Remote, arguments: Arguments) -> CliResult<Value> {
    remote
        .invoke(arguments)
        .map_err(|err| session_error("call failed", err))
}

fn build_arguments(positional: &[String], keyword: &[String]) -> CliResult<Arguments> {
    let mut arguments = Arguments::new();
    for raw in positional {
        arguments = arguments.arg(parse_value(raw));
    }
    for raw in keyword {
        let (name, value) = raw
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| CliError::new(USAGE, format!("expected NAME=JSON, got {raw:?}")))?;
        arguments = arguments.kwarg(name, parse_value(value));
    }
    Ok(arguments)
}

/// JSON if it parses, otherwise the text itself.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_call(out: &CallOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = table(["ENTRY", "HOST PID", "RESULT"]);
            table.add_row(vec![
                out.entry.to_string(),
                out.host_pid.to_string(),
                value_preview(&out.result),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "entry={} host_pid={} result={}",
                out.entry,
                out.host_pid,
                value_preview(&out.result)
            );
        }
        OutputFormat::Raw => {
            print_raw(value_preview(&out.result).as_bytes());
            println!();
        }
    }
}
