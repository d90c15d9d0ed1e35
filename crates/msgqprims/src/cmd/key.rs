use serde::Serialize;

use msgqprims_queue::derive_key;

use crate::cmd::{describe_key, KeyArgs};
use crate::exit::{queue_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_json, print_pretty, schema_id, OutputFormat};

#[derive(Serialize)]
struct KeyOutput {
    schema_id: String,
    path: String,
    project_id: i32,
    key: i32,
    key_hex: String,
}

pub fn run(args: KeyArgs, format: OutputFormat) -> CliResult<i32> {
    let key = derive_key(&args.path, args.project_id)
        .map_err(|err| queue_error("key derivation failed", err))?;

    let out = KeyOutput {
        schema_id: schema_id("queue-key"),
        path: args.path.display().to_string(),
        project_id: args.project_id,
        key: key.as_raw(),
        key_hex: describe_key(key),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&rows(&out)),
        OutputFormat::Pretty => print_pretty("Queue Key", &rows(&out)),
        OutputFormat::Raw => println!("{}", out.key),
    }
    Ok(SUCCESS)
}

fn rows(out: &KeyOutput) -> Vec<(&'static str, String)> {
    vec![
        ("path", out.path.clone()),
        ("project_id", out.project_id.to_string()),
        ("key", out.key_hex.clone()),
    ]
}
