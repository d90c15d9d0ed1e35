mod exit;

#[cfg(target_os = "linux")]
mod cmd;
#[cfg(target_os = "linux")]
mod logging;
#[cfg(target_os = "linux")]
mod output;

#[cfg(target_os = "linux")]
use clap::Parser;

#[cfg(target_os = "linux")]
use crate::cmd::Command;
#[cfg(target_os = "linux")]
use crate::logging::{init_logging, LogFormat, LogLevel};
#[cfg(target_os = "linux")]
use crate::output::OutputFormat;

#[cfg(target_os = "linux")]
#[derive(Parser, Debug)]
#[command(name = "msgqprims", version, about = "System V message queue framing CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[cfg(target_os = "linux")]
fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("error: System V message queues are only supported on Linux");
    std::process::exit(exit::TRANSPORT_ERROR);
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "msgqprims",
            "send",
            "--id",
            "17",
            "--json",
            "{\"id\":7,\"ok\":true}",
        ])
        .expect("send args should parse");

        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "msgqprims",
            "send",
            "--id",
            "17",
            "--json",
            "{\"x\":1}",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_count_with_follow() {
        let err = Cli::try_parse_from(["msgqprims", "recv", "--id", "1", "--count", "2", "--follow"])
            .expect_err("count and follow should conflict");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_recv_with_transfer_options() {
        let cli = Cli::try_parse_from([
            "msgqprims",
            "--format",
            "json",
            "recv",
            "--id",
            "3",
            "--nowait",
            "--chunk-size",
            "4096",
            "--codec",
            "msgpack",
        ])
        .expect("recv args should parse");

        let Command::Recv(args) = cli.command else {
            panic!("expected recv");
        };
        assert!(args.transfer.nowait);
        assert_eq!(args.transfer.chunk_size, 4096);
        assert_eq!(args.transfer.codec, cmd::CodecChoice::Msgpack);
    }

    #[test]
    fn exclusive_requires_create() {
        let err = Cli::try_parse_from(["msgqprims", "open", "--path", "/tmp", "--exclusive"])
            .expect_err("exclusive without create should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
