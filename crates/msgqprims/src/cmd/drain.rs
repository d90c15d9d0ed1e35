use msgqprims_frame::{drain, DrainReport};
use serde::Serialize;

use crate::cmd::QueueArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_json, print_pretty, schema_id, OutputFormat};

#[derive(Serialize)]
struct DrainOutput {
    schema_id: String,
    queue_id: i32,
    envelopes: usize,
    bodies: usize,
    bytes: usize,
}

pub fn run(args: QueueArgs, format: OutputFormat) -> CliResult<i32> {
    let queue = args.open()?;
    let DrainReport {
        envelopes,
        bodies,
        bytes,
    } = drain(&queue).map_err(|err| frame_error("drain failed", err))?;

    let out = DrainOutput {
        schema_id: schema_id("queue-drained"),
        queue_id: queue.id(),
        envelopes,
        bodies,
        bytes,
    };
    let rows = vec![
        ("queue_id", out.queue_id.to_string()),
        ("envelopes", out.envelopes.to_string()),
        ("bodies", out.bodies.to_string()),
        ("bytes", out.bytes.to_string()),
    ];
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&rows),
        OutputFormat::Pretty => print_pretty("Drained", &rows),
        OutputFormat::Raw => println!("{}", out.envelopes + out.bodies),
    }
    Ok(SUCCESS)
}
