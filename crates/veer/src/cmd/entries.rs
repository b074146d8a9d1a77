use serde::Serialize;
use veer_session::Registry;

use crate::cmd::EntriesArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

#[derive(Serialize)]
struct EntriesOutput<'a> {
    entries: Vec<&'a str>,
}

pub fn run(_args: EntriesArgs, registry: &Registry, format: OutputFormat) -> CliResult<i32> {
    let out = EntriesOutput {
        entries: registry.names().collect(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = table(["ENTRY"]);
            for name in &out.entries {
                table.add_row(vec![*name]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for name in &out.entries {
                println!("{name}");
            }
        }
    }
    Ok(SUCCESS)
}
