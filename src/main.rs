use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use clap::Parser;
use futures_util::StreamExt;
use thinkbridge::config::{load_config, AppConfig, ConfigError};
use thinkbridge::error::TranscodeError;
use thinkbridge::observability::{init_tracing, log_usage};
use thinkbridge::protocol::anthropic::response_encoder::{assemble_message, AssembleOptions};
use thinkbridge::protocol::canonical::UpstreamUsage;
use thinkbridge::protocol::openai_chat::OpenAiChatResponse;
use thinkbridge::stream::{
    transcode_sse_stream, PipelineOptions, StreamOptions, StreamTranscoder, WriterSink,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Sse,
    Json,
    Raw,
}

/// Reads an upstream chat-completion stream on stdin and writes Messages SSE
/// events to stdout.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (default: ./config.yaml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stdin is a complete chat-completion JSON body; print one message JSON object
    #[arg(long, conflicts_with = "raw")]
    json: bool,

    /// Stdin is plain model text; every read is one fragment
    #[arg(long)]
    raw: bool,
}

impl Args {
    fn mode(&self) -> InputMode {
        if self.json {
            InputMode::Json
        } else if self.raw {
            InputMode::Raw
        } else {
            InputMode::Sse
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid upstream response: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
}

fn main() {
    let args = Args::parse();

    let config = resolve_config(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level, config.features.log_format);

    let result = match args.mode() {
        InputMode::Json => run_json(&config),
        InputMode::Raw => run_raw(&config),
        InputMode::Sse => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap_or_else(|e| {
                    eprintln!("Failed to initialize Tokio runtime: {e}");
                    std::process::exit(1);
                });
            runtime.block_on(run_sse(&config))
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "translation failed");
        eprintln!("thinkbridge: {e}");
        std::process::exit(1);
    }
}

/// An explicit path must load; the default path may be absent.
fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match load_config(DEFAULT_CONFIG_PATH) {
        Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(AppConfig::default()),
        other => other,
    }
}

fn pipeline_options(config: &AppConfig) -> PipelineOptions {
    let mut ids = config.id_source();
    PipelineOptions {
        markers: config.markers(),
        default_model: config.output.default_model.clone(),
        echo_upstream_model: config.output.echo_upstream_model,
        message_id: ids.next_message_id(),
        finish_on_abort: config.stream.finish_on_abort,
    }
}

async fn run_sse(config: &AppConfig) -> Result<(), CliError> {
    let stdin_stream = futures_util::stream::unfold(tokio::io::stdin(), |mut stdin| async move {
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        match stdin.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok::<Bytes, io::Error>(buf.freeze()), stdin)),
            Err(e) => Some((Err(e), stdin)),
        }
    });

    let frames = transcode_sse_stream(stdin_stream, pipeline_options(config));
    futures_util::pin_mut!(frames);
    let mut stdout = tokio::io::stdout();
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        stdout.write_all(&frame).await?;
        stdout.flush().await?;
    }
    Ok(())
}

fn run_raw(config: &AppConfig) -> Result<(), CliError> {
    let started = Instant::now();
    let opts = pipeline_options(config);
    let stdout = io::stdout();
    let mut transcoder = StreamTranscoder::start(
        WriterSink::new(stdout.lock()),
        StreamOptions {
            message_id: opts.message_id,
            model: opts.default_model,
            markers: opts.markers,
        },
    )?;

    let mut stdin = io::stdin().lock();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut remainder: Vec<u8> = Vec::new();
    loop {
        let n = stdin.read(&mut buf)?;
        if n == 0 {
            break;
        }
        remainder.extend_from_slice(&buf[..n]);
        let valid_up_to = match std::str::from_utf8(&remainder) {
            Ok(text) => {
                transcoder.handle_fragment(text)?;
                remainder.len()
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                if let Ok(text) = std::str::from_utf8(&remainder[..valid_up_to]) {
                    transcoder.handle_fragment(text)?;
                }
                valid_up_to
            }
        };
        remainder.drain(..valid_up_to);
    }
    if !remainder.is_empty() {
        transcoder.handle_fragment(&String::from_utf8_lossy(&remainder))?;
    }
    transcoder.finish()?;
    log_usage(
        transcoder.model(),
        transcoder.input_tokens(),
        transcoder.output_tokens(),
        started.elapsed(),
    );
    Ok(())
}

fn run_json(config: &AppConfig) -> Result<(), CliError> {
    let started = Instant::now();
    let mut body = String::new();
    io::stdin().read_to_string(&mut body)?;
    let response: OpenAiChatResponse = serde_json::from_str(&body)?;

    let markers = config.markers();
    let text = response.first_choice_text(markers.start(), markers.end());
    let model = if config.output.echo_upstream_model && !response.model.is_empty() {
        response.model.as_str()
    } else {
        config.output.default_model.as_str()
    };
    let id = config.id_source().next_message_id();
    let usage = response.usage.map(UpstreamUsage::from);
    let message = assemble_message(
        &text,
        AssembleOptions {
            id: &id,
            model,
            markers: &markers,
        },
        usage,
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, &message)?;
    out.write_all(b"\n")?;
    out.flush()?;

    let usage = usage.unwrap_or_default();
    log_usage(
        model,
        usage.input_tokens(),
        usage.output_tokens(),
        started.elapsed(),
    );
    Ok(())
}
