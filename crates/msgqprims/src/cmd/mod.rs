use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use msgqprims_frame::{BodyLayout, EnvelopeWait, FrameConfig, DEFAULT_MAX_PAYLOAD};
use msgqprims_queue::{derive_key, IpcKey, OpenOptions, SysvQueue, Wait};

use crate::exit::{queue_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod compensate;
pub mod doctor;
pub mod drain;
pub mod info;
pub mod key;
pub mod open;
pub mod recv;
pub mod rm;
pub mod send;
pub mod stat;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Derive a queue key from a path and project id.
    Key(KeyArgs),
    /// Open or create a queue and print its identifier.
    Open(OpenArgs),
    /// Send one framed value.
    Send(SendArgs),
    /// Receive framed values and print them.
    Recv(RecvArgs),
    /// Show queue attributes and counters.
    Stat(QueueArgs),
    /// Show system-wide message queue limits.
    Info(InfoArgs),
    /// Remove a queue.
    Rm(QueueArgs),
    /// Remove all pending envelopes and bodies from a queue.
    Drain(QueueArgs),
    /// Pair an orphaned envelope with a filler body that no codec decodes.
    Compensate(CompensateArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Key(args) => key::run(args, format),
        Command::Open(args) => open::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Recv(args) => recv::run(args, format),
        Command::Stat(args) => stat::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Rm(args) => rm::run(args, format),
        Command::Drain(args) => drain::run(args, format),
        Command::Compensate(args) => compensate::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach a queue: by identifier, or by key derived from a path.
#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// Queue identifier.
    #[arg(long, env = "MSGQPRIMS_QUEUE_ID", conflicts_with = "path")]
    pub id: Option<i32>,
    /// Existing file to derive the queue key from.
    #[arg(long, env = "MSGQPRIMS_KEY_PATH")]
    pub path: Option<PathBuf>,
    /// Project id combined with --path (low byte must be non-zero).
    #[arg(long, env = "MSGQPRIMS_PROJECT_ID", default_value_t = 1)]
    pub project_id: i32,
    /// Create the queue if it does not exist (with --path).
    #[arg(long)]
    pub create: bool,
    /// Permission bits for a created queue, in octal.
    #[arg(long, value_parser = parse_mode, default_value = "600")]
    pub mode: u32,
}

impl QueueArgs {
    pub fn open(&self) -> CliResult<SysvQueue> {
        if let Some(id) = self.id {
            return Ok(SysvQueue::from_id(id));
        }
        let Some(path) = &self.path else {
            return Err(CliError::new(USAGE, "one of --id or --path is required"));
        };
        let key = derive_key(path, self.project_id)
            .map_err(|err| queue_error("key derivation failed", err))?;
        let options = OpenOptions::new().create(self.create).mode(self.mode);
        SysvQueue::open(key, &options).map_err(|err| queue_error("open failed", err))
    }
}

/// Transfer settings shared by `send` and `recv`.
#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    /// Fail instead of waiting when the queue is full or empty.
    #[arg(long)]
    pub nowait: bool,
    /// Split bodies into chunks of at most this many bytes (0 = single body).
    #[arg(long, env = "MSGQPRIMS_CHUNK_SIZE", default_value_t = 0)]
    pub chunk_size: usize,
    /// Payload codec.
    #[arg(long, value_enum, default_value = "json")]
    pub codec: CodecChoice,
    /// Maximum payload size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

impl TransferArgs {
    pub fn wait(&self) -> Wait {
        if self.nowait {
            Wait::NoWait
        } else {
            Wait::Block
        }
    }

    /// With `--nowait` the envelope step does not block either, so an idle
    /// queue reports empty instead of hanging.
    pub fn frame_config(&self) -> FrameConfig {
        let envelope_wait = if self.nowait {
            EnvelopeWait::FollowCaller
        } else {
            EnvelopeWait::Block
        };
        FrameConfig::default()
            .with_max_payload_size(self.max_payload)
            .with_body(BodyLayout::chunked(self.chunk_size))
            .with_envelope_wait(envelope_wait)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CodecChoice {
    Json,
    Msgpack,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Existing file to derive the key from.
    pub path: PathBuf,
    /// Project id (low byte must be non-zero).
    #[arg(long, default_value_t = 1)]
    pub project_id: i32,
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    #[command(flatten)]
    pub queue: QueueArgs,
    /// Create a new private queue reachable only by its identifier.
    #[arg(long, conflicts_with_all = ["id", "path"])]
    pub private: bool,
    /// Fail if the queue already exists (with --create).
    #[arg(long, requires = "create")]
    pub exclusive: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub queue: QueueArgs,
    #[command(flatten)]
    pub transfer: TransferArgs,
    /// JSON value, re-encoded with the selected codec.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// String value.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Send the file's bytes as an already-encoded payload.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RecvArgs {
    #[command(flatten)]
    pub queue: QueueArgs,
    #[command(flatten)]
    pub transfer: TransferArgs,
    /// Exit after receiving N values.
    #[arg(long, conflicts_with = "follow")]
    pub count: Option<usize>,
    /// Keep receiving until interrupted.
    #[arg(long)]
    pub follow: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {}

#[derive(Args, Debug)]
pub struct CompensateArgs {
    #[command(flatten)]
    pub queue: QueueArgs,
    /// Body size announced by the orphaned envelope.
    #[arg(long)]
    pub declared: usize,
    /// Split the filler body into chunks of at most this many bytes.
    #[arg(long, default_value_t = 0)]
    pub chunk_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

fn parse_mode(input: &str) -> Result<u32, String> {
    let digits = input.trim().trim_start_matches("0o");
    let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode: {input}"))?;
    if mode > 0o777 {
        return Err(format!("mode out of range: {input}"));
    }
    Ok(mode)
}

pub fn describe_key(key: IpcKey) -> String {
    if key.is_private() {
        "private".to_string()
    } else {
        key.to_string()
    }
}
