use msgqprims_queue::{SysvQueue, SystemInfo};
use serde::Serialize;

use crate::cmd::InfoArgs;
use crate::exit::{queue_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_json, print_pretty, schema_id, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    schema_id: String,
    max_message_size: u64,
    max_queue_bytes: u64,
    max_queues: u64,
    pool_size: u64,
    map_entries: u64,
    segment_size: u64,
    max_headers: u64,
    max_segments: u64,
}

impl From<SystemInfo> for InfoOutput {
    fn from(info: SystemInfo) -> Self {
        Self {
            schema_id: schema_id("system-info"),
            max_message_size: info.max_message_size,
            max_queue_bytes: info.max_queue_bytes,
            max_queues: info.max_queues,
            pool_size: info.pool_size,
            map_entries: info.map_entries,
            segment_size: info.segment_size,
            max_headers: info.max_headers,
            max_segments: info.max_segments,
        }
    }
}

pub fn run(_args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let info = SysvQueue::system_info().map_err(|err| queue_error("info failed", err))?;
    let out = InfoOutput::from(info);

    let rows = vec![
        ("max_message_size", out.max_message_size.to_string()),
        ("max_queue_bytes", out.max_queue_bytes.to_string()),
        ("max_queues", out.max_queues.to_string()),
        ("pool_size", out.pool_size.to_string()),
        ("map_entries", out.map_entries.to_string()),
        ("segment_size", out.segment_size.to_string()),
        ("max_headers", out.max_headers.to_string()),
        ("max_segments", out.max_segments.to_string()),
    ];
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&rows),
        OutputFormat::Pretty => print_pretty("System Limits", &rows),
        OutputFormat::Raw => println!("{}", out.max_message_size),
    }
    Ok(SUCCESS)
}
