use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use msgqprims_frame::{Deframer, FrameError, JsonCodec, MsgPackCodec, PayloadCodec};
use msgqprims_queue::{MessageQueue, QueueError, Wait};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::cmd::{CodecChoice, RecvArgs};
use crate::exit::{frame_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{now_unix_seconds, payload_preview, print_json, print_raw, schema_id, OutputFormat};

#[derive(Serialize)]
struct ValueOutput {
    schema_id: String,
    queue_id: i32,
    codec: &'static str,
    payload_size: usize,
    /// Decoded value, absent when the payload does not decode.
    value: Option<Value>,
    payload: String,
    timestamp: String,
}

pub fn run(args: RecvArgs, format: OutputFormat) -> CliResult<i32> {
    let queue = args.queue.open()?;
    let config = args.transfer.frame_config();
    let limit = if args.follow {
        None
    } else {
        Some(args.count.unwrap_or(1))
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printer = Printer::new(queue.id(), format);
    let received = match args.transfer.codec {
        CodecChoice::Json => receive_loop(
            &Deframer::with_config(JsonCodec, config),
            &queue,
            args.transfer.wait(),
            limit,
            &running,
            &mut printer,
        ),
        CodecChoice::Msgpack => receive_loop(
            &Deframer::with_config(MsgPackCodec, config),
            &queue,
            args.transfer.wait(),
            limit,
            &running,
            &mut printer,
        ),
    }
    .map_err(|err| frame_error("receive failed", err))?;

    printer.finish();
    info!(received, "receive finished");
    Ok(SUCCESS)
}

/// Receive until `limit` values arrive or `running` is cleared.
///
/// A receive blocked in the kernel completes before the flag is seen; an
/// interrupted one ends the loop cleanly once the flag is cleared.
fn receive_loop<C, Q, F>(
    deframer: &Deframer<C>,
    queue: &Q,
    wait: Wait,
    limit: Option<usize>,
    running: &AtomicBool,
    sink: &mut F,
) -> msgqprims_frame::Result<usize>
where
    C: PayloadCodec,
    Q: MessageQueue + ?Sized,
    F: Sink,
{
    let mut received = 0usize;
    while running.load(Ordering::SeqCst) && limit.is_none_or(|n| received < n) {
        let payload = match deframer.receive_bytes(queue, wait) {
            Ok(payload) => payload,
            Err(FrameError::Queue(QueueError::Interrupted))
                if !running.load(Ordering::SeqCst) =>
            {
                break
            }
            Err(err) => return Err(err),
        };
        let value = deframer.codec().decode::<Value>(&payload).ok();
        sink.accept(deframer.codec().name(), &payload, value);
        received = received.saturating_add(1);
    }
    Ok(received)
}

trait Sink {
    fn accept(&mut self, codec: &'static str, payload: &[u8], value: Option<Value>);
}

struct Printer {
    queue_id: i32,
    format: OutputFormat,
    table: Option<Table>,
}

impl Printer {
    fn new(queue_id: i32, format: OutputFormat) -> Self {
        let table = matches!(format, OutputFormat::Table).then(|| {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["QUEUE", "CODEC", "SIZE", "VALUE"]);
            table
        });
        Self {
            queue_id,
            format,
            table,
        }
    }

    fn finish(self) {
        if let Some(table) = self.table {
            println!("{table}");
        }
    }
}

impl Sink for Printer {
    fn accept(&mut self, codec: &'static str, payload: &[u8], value: Option<Value>) {
        let shown = match &value {
            Some(value) => value.to_string(),
            None => payload_preview(payload),
        };
        match self.format {
            OutputFormat::Json => print_json(&ValueOutput {
                schema_id: schema_id("value-received"),
                queue_id: self.queue_id,
                codec,
                payload_size: payload.len(),
                value,
                payload: payload_preview(payload),
                timestamp: now_unix_seconds(),
            }),
            OutputFormat::Table => {
                if let Some(table) = self.table.as_mut() {
                    table.add_row(vec![
                        self.queue_id.to_string(),
                        codec.to_string(),
                        payload.len().to_string(),
                        shown,
                    ]);
                }
            }
            OutputFormat::Pretty => {
                println!(
                    "queue={} codec={} size={} value={}",
                    self.queue_id,
                    codec,
                    payload.len(),
                    shown
                );
            }
            OutputFormat::Raw => print_raw(payload),
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
