use msgqprims_frame::{send_compensating_body, BodyLayout};
use msgqprims_queue::Wait;
use serde::Serialize;

use crate::cmd::CompensateArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_json, schema_id, OutputFormat};

#[derive(Serialize)]
struct CompensateOutput {
    schema_id: String,
    queue_id: i32,
    body_size: usize,
}

pub fn run(args: CompensateArgs, format: OutputFormat) -> CliResult<i32> {
    let queue = args.queue.open()?;
    let sent = send_compensating_body(
        &queue,
        args.declared,
        BodyLayout::chunked(args.chunk_size),
        Wait::NoWait,
    )
    .map_err(|err| frame_error("compensate failed", err))?;

    match format {
        OutputFormat::Json => print_json(&CompensateOutput {
            schema_id: schema_id("queue-compensated"),
            queue_id: queue.id(),
            body_size: sent,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("enqueued {sent}-byte filler body on queue {}", queue.id())
        }
        OutputFormat::Raw => println!("{sent}"),
    }
    Ok(SUCCESS)
}
