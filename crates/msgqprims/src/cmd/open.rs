use serde::Serialize;

use msgqprims_queue::{derive_key, IpcKey, OpenOptions, SysvQueue};

use crate::cmd::{describe_key, OpenArgs};
use crate::exit::{queue_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_fields, print_json, print_pretty, schema_id, OutputFormat};

#[derive(Serialize)]
struct OpenOutput {
    schema_id: String,
    queue_id: i32,
    key: String,
    create: bool,
    mode: String,
}

pub fn run(args: OpenArgs, format: OutputFormat) -> CliResult<i32> {
    let (queue, key) = open_queue(&args)?;

    let out = OpenOutput {
        schema_id: schema_id("queue-open"),
        queue_id: queue.id(),
        key: describe_key(key),
        create: args.private || args.queue.create,
        mode: format!("{:o}", args.queue.mode),
    };

    let rows = vec![
        ("queue_id", out.queue_id.to_string()),
        ("key", out.key.clone()),
        ("create", out.create.to_string()),
        ("mode", out.mode.clone()),
    ];
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&rows),
        OutputFormat::Pretty => print_pretty("Queue", &rows),
        OutputFormat::Raw => println!("{}", out.queue_id),
    }
    Ok(SUCCESS)
}

fn open_queue(args: &OpenArgs) -> CliResult<(SysvQueue, IpcKey)> {
    if args.private {
        let queue = SysvQueue::create_private(args.queue.mode)
            .map_err(|err| queue_error("create failed", err))?;
        return Ok((queue, IpcKey::PRIVATE));
    }
    if args.queue.id.is_some() {
        return Err(CliError::new(
            USAGE,
            "open takes --path or --private; --id already names an open queue",
        ));
    }
    let Some(path) = &args.queue.path else {
        return Err(CliError::new(USAGE, "one of --path or --private is required"));
    };

    let key = derive_key(path, args.queue.project_id)
        .map_err(|err| queue_error("key derivation failed", err))?;
    let options = OpenOptions::new()
        .create(args.queue.create)
        .exclusive(args.exclusive)
        .mode(args.queue.mode);
    let queue = SysvQueue::open(key, &options).map_err(|err| queue_error("open failed", err))?;
    Ok((queue, key))
}
