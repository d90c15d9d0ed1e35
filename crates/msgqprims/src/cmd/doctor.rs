use msgqprims_frame::{Deframer, Framer, JsonCodec};
use msgqprims_queue::{SysvQueue, Wait};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{schema_id, OutputFormat};

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    schema_id: String,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        system_limits_check(),
        private_queue_roundtrip_check(),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = DoctorOutput {
        schema_id: schema_id("doctor-report"),
        checks,
        overall,
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("msgqprims doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<22} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
    }
}

fn system_limits_check() -> CheckResult {
    match SysvQueue::system_info() {
        Ok(info) if info.max_message_size < 64 => CheckResult {
            name: "system_limits".to_string(),
            status: CheckStatus::Warn,
            detail: format!(
                "msgmax={} is very small; use --chunk-size",
                info.max_message_size
            ),
        },
        Ok(info) => CheckResult {
            name: "system_limits".to_string(),
            status: CheckStatus::Pass,
            detail: format!(
                "msgmax={} msgmnb={} msgmni={}",
                info.max_message_size, info.max_queue_bytes, info.max_queues
            ),
        },
        Err(err) => CheckResult {
            name: "system_limits".to_string(),
            status: CheckStatus::Fail,
            detail: format!("IPC_INFO failed: {err}"),
        },
    }
}

fn private_queue_roundtrip_check() -> CheckResult {
    let name = "private_queue_roundtrip".to_string();
    let queue = match SysvQueue::create_private(0o600) {
        Ok(queue) => queue,
        Err(err) => {
            return CheckResult {
                name,
                status: CheckStatus::Fail,
                detail: format!("queue creation failed: {err}"),
            }
        }
    };

    let probe = json!({"doctor": true, "pid": std::process::id()});
    let result = Framer::new(JsonCodec)
        .send(&queue, Wait::NoWait, &probe)
        .and_then(|_| Deframer::new(JsonCodec).receive::<_, Value>(&queue, Wait::NoWait));
    let removed = queue.remove();

    match (result, removed) {
        (Ok(value), Ok(())) if value == probe => CheckResult {
            name,
            status: CheckStatus::Pass,
            detail: "envelope and body round-trip succeeded".to_string(),
        },
        (Ok(_), Ok(())) => CheckResult {
            name,
            status: CheckStatus::Fail,
            detail: "received value differs from probe".to_string(),
        },
        (Err(err), _) => CheckResult {
            name,
            status: CheckStatus::Fail,
            detail: format!("round-trip failed: {err}"),
        },
        (Ok(_), Err(err)) => CheckResult {
            name,
            status: CheckStatus::Warn,
            detail: format!("round-trip succeeded but queue removal failed: {err}"),
        },
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "msgpack") {
        features.push("msgpack");
    }
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult {
        name: "compiled_features".to_string(),
        status: CheckStatus::Info,
        detail: features.join(", "),
    }
}
