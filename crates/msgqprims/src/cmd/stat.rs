use msgqprims_queue::{ControlCommand, ControlReply, MessageQueue, QueueStats};
use serde::Serialize;

use crate::cmd::QueueArgs;
use crate::exit::{queue_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_fields, print_json, print_pretty, schema_id, OutputFormat};

#[derive(Serialize)]
struct StatOutput {
    schema_id: String,
    queue_id: i32,
    uid: u32,
    gid: u32,
    creator_uid: u32,
    creator_gid: u32,
    mode: String,
    message_count: u64,
    max_bytes: u64,
    current_bytes: Option<u64>,
    last_send_pid: i32,
    last_recv_pid: i32,
    last_send_time: i64,
    last_recv_time: i64,
    last_change_time: i64,
}

impl StatOutput {
    fn new(queue_id: i32, stats: QueueStats) -> Self {
        Self {
            schema_id: schema_id("queue-stat"),
            queue_id,
            uid: stats.uid,
            gid: stats.gid,
            creator_uid: stats.creator_uid,
            creator_gid: stats.creator_gid,
            mode: format!("{:o}", stats.mode),
            message_count: stats.message_count,
            max_bytes: stats.max_bytes,
            current_bytes: stats.current_bytes,
            last_send_pid: stats.last_send_pid,
            last_recv_pid: stats.last_recv_pid,
            last_send_time: stats.last_send_time,
            last_recv_time: stats.last_recv_time,
            last_change_time: stats.last_change_time,
        }
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        let current = self
            .current_bytes
            .map_or_else(|| "unavailable".to_string(), |n| n.to_string());
        vec![
            ("queue_id", self.queue_id.to_string()),
            ("owner", format!("{}:{}", self.uid, self.gid)),
            ("creator", format!("{}:{}", self.creator_uid, self.creator_gid)),
            ("mode", self.mode.clone()),
            ("messages", self.message_count.to_string()),
            ("bytes", current),
            ("max_bytes", self.max_bytes.to_string()),
            ("last_send_pid", self.last_send_pid.to_string()),
            ("last_recv_pid", self.last_recv_pid.to_string()),
            ("last_send_time", self.last_send_time.to_string()),
            ("last_recv_time", self.last_recv_time.to_string()),
            ("last_change_time", self.last_change_time.to_string()),
        ]
    }
}

pub fn run(args: QueueArgs, format: OutputFormat) -> CliResult<i32> {
    let queue = args.open()?;
    let stats = match queue
        .control(ControlCommand::Stat)
        .map_err(|err| queue_error("stat failed", err))?
    {
        ControlReply::Stat(stats) => stats,
        other => {
            return Err(CliError::new(
                INTERNAL,
                format!("unexpected reply to {}: {other:?}", ControlCommand::Stat),
            ))
        }
    };

    let out = StatOutput::new(queue.id(), stats);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&out.rows()),
        OutputFormat::Pretty => print_pretty("Queue Status", &out.rows()),
        OutputFormat::Raw => println!("{}", out.message_count),
    }
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_is_octal_text() {
        let out = StatOutput::new(
            3,
            QueueStats {
                mode: 0o640,
                message_count: 2,
                ..QueueStats::default()
            },
        );
        assert_eq!(out.mode, "640");
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"message_count\":2"));
        assert!(json.contains("queue-stat.schema.json"));
    }

    #[test]
    fn missing_byte_count_is_unavailable() {
        let out = StatOutput::new(1, QueueStats::default());
        let rows = out.rows();
        let bytes = rows.iter().find(|(name, _)| *name == "bytes").unwrap();
        assert_eq!(bytes.1, "unavailable");
    }
}
