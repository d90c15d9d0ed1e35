use std::fs;

use msgqprims_frame::{FrameError, Framer, JsonCodec, MsgPackCodec, PayloadCodec};
use msgqprims_queue::{MessageQueue, Wait};
use serde::Serialize;
use serde_json::Value;

use crate::cmd::{CodecChoice, SendArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{now_unix_seconds, print_fields, print_json, print_pretty, schema_id, OutputFormat};

#[derive(Debug)]
enum Payload {
    /// Encoded by the selected codec before sending.
    Value(Value),
    /// Sent as is.
    Encoded(Vec<u8>),
}

#[derive(Serialize)]
struct SendOutput {
    schema_id: String,
    queue_id: i32,
    codec: &'static str,
    payload_size: usize,
    timestamp: String,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let queue = args.queue.open()?;
    let config = args.transfer.frame_config();
    let wait = args.transfer.wait();

    let (codec, sent) = match args.transfer.codec {
        CodecChoice::Json => {
            let framer = Framer::with_config(JsonCodec, config);
            (framer.codec().name(), send_payload(&framer, &queue, wait, &payload))
        }
        CodecChoice::Msgpack => {
            let framer = Framer::with_config(MsgPackCodec, config);
            (framer.codec().name(), send_payload(&framer, &queue, wait, &payload))
        }
    };
    let sent = sent.map_err(|err| send_error(err, args.transfer.chunk_size))?;

    let out = SendOutput {
        schema_id: schema_id("value-sent"),
        queue_id: queue.id(),
        codec,
        payload_size: sent,
        timestamp: now_unix_seconds(),
    };
    let rows = vec![
        ("queue_id", out.queue_id.to_string()),
        ("codec", out.codec.to_string()),
        ("payload_size", out.payload_size.to_string()),
    ];
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&rows),
        OutputFormat::Pretty => print_pretty("Sent", &rows),
        OutputFormat::Raw => println!("{}", out.payload_size),
    }
    Ok(SUCCESS)
}

fn send_payload<C, Q>(
    framer: &Framer<C>,
    queue: &Q,
    wait: Wait,
    payload: &Payload,
) -> msgqprims_frame::Result<usize>
where
    C: PayloadCodec,
    Q: MessageQueue + ?Sized,
{
    match payload {
        Payload::Value(value) => framer.send(queue, wait, value),
        Payload::Encoded(bytes) => framer.send_bytes(queue, wait, bytes),
    }
}

fn send_error(err: FrameError, chunk_size: usize) -> CliError {
    let single_body = chunk_size == 0;
    let hint = matches!(err, FrameError::PayloadTooLarge { .. }) && single_body;
    let mut cli_err = frame_error("send failed", err);
    if hint {
        cli_err
            .message
            .push_str(" (use --chunk-size to split the body across messages)");
    }
    cli_err
}

fn resolve_payload(args: &SendArgs) -> CliResult<Payload> {
    if let Some(json) = &args.json {
        let value = serde_json::from_str::<Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(Payload::Value(value));
    }
    if let Some(data) = &args.data {
        return Ok(Payload::Value(Value::String(data.clone())));
    }
    if let Some(path) = &args.file {
        let bytes = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return Ok(Payload::Encoded(bytes));
    }
    Err(CliError::new(
        USAGE,
        "one of --json, --data or --file is required",
    ))
}
