use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::cmd::{ConfigCommand, ConfigGetArgs};
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, table, value_preview, OutputFormat};

#[derive(Serialize)]
struct ConfigOutput<'a> {
    values: &'a Map<String, Value>,
    overrides: BTreeMap<&'static str, String>,
}

pub fn run(command: ConfigCommand, format: OutputFormat) -> CliResult<i32> {
    match command {
        ConfigCommand::Get(args) => get(args, format),
        ConfigCommand::Show => show(format),
    }
}

fn get(args: ConfigGetArgs, format: OutputFormat) -> CliResult<i32> {
    let value = veer_config::get_config(&args.key)
        .ok_or_else(|| CliError::new(FAILURE, format!("config key not set: {}", args.key)))?;

    match format {
        OutputFormat::Json => print_json(&value),
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => {
            println!("{}", value_preview(&value))
        }
    }
    Ok(SUCCESS)
}

fn show(format: OutputFormat) -> CliResult<i32> {
    let config = veer_config::global();
    let overrides = veer_config::ENV_OVERRIDES
        .iter()
        .filter_map(|(_, var)| config.env_var(var).map(|value| (*var, value)))
        .collect();
    let out = ConfigOutput {
        values: config.values(),
        overrides,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = table(["KEY", "VALUE", "SOURCE"]);
            for (key, value) in flatten(out.values) {
                table.add_row(vec![key, value_preview(&value), "config".to_string()]);
            }
            for (var, value) in &out.overrides {
                table.add_row(vec![var.to_string(), value.clone(), "environment".to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (key, value) in flatten(out.values) {
                println!("{key} = {}", value_preview(&value));
            }
            for (var, value) in &out.overrides {
                println!("${var} = {value}");
            }
        }
    }
    Ok(SUCCESS)
}

/// Leaf items as `(dotted key, value)` pairs in key order.
fn flatten(values: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into(values, "", &mut out);
    out
}

fn flatten_into(values: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, Value)>) {
    for (key, value) in values {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => flatten_into(nested, &path, out),
            other => out.push((path, other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flatten_uses_dotted_keys() {
        let value = json!({
            "singularity": {"binary": "singularity"},
            "default_container": {"image": "/c.sif", "app": "sim"},
            "empty": {},
        });
        let flat = flatten(value.as_object().unwrap());
        let keys: Vec<&str> = flat.iter().map(|(k, _)| k.as_str()).collect();

        assert!(keys.contains(&"singularity.binary"));
        assert!(keys.contains(&"default_container.app"));
        assert!(keys.contains(&"empty"));
        assert_eq!(flat.len(), 4);
    }
}
