use serde::Serialize;

use crate::cmd::QueueArgs;
use crate::exit::{queue_error, CliResult, SUCCESS};
use crate::output::{print_json, schema_id, OutputFormat};

#[derive(Serialize)]
struct RemoveOutput {
    schema_id: String,
    queue_id: i32,
    removed: bool,
}

pub fn run(args: QueueArgs, format: OutputFormat) -> CliResult<i32> {
    let queue = args.open()?;
    let queue_id = queue.id();
    queue
        .remove()
        .map_err(|err| queue_error("remove failed", err))?;

    match format {
        OutputFormat::Json => print_json(&RemoveOutput {
            schema_id: schema_id("queue-removed"),
            queue_id,
            removed: true,
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("removed queue {queue_id}"),
        OutputFormat::Raw => println!("{queue_id}"),
    }
    Ok(SUCCESS)
}
