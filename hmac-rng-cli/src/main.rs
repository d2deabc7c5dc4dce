// SPDX-License-Identifier: MIT
//
// HMAC_RNG: extract-then-expand random bit generator
// Copyright (c) 2025 HMAC_RNG Contributors

//! hmac-rng - command-line front end for the HMAC_RNG generator
//!
//! ```text
//! ┌──────────────┐   poll    ┌──────────────┐  extract  ┌──────────────┐
//! │   Sources    │ ─────────>│  Extractor   │ ─────────>│     PRF      │ ──> stdout
//! │ os/timer/qrng│           │ (salt = XTS) │   (PRK)   │ (counter, K) │
//! └──────────────┘           └──────────────┘           └──────────────┘
//! ```
//!
//! Subcommands:
//!
//! - `bytes`: emit a single block of random bytes
//! - `stream`: emit chunks on a fixed interval until interrupted
//! - `info`: describe the configured generator and its seeding state

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hmac_rng_core::{
    metrics::MetricsSnapshot, EncodingFormat, GeneratorConfig, HmacRng,
    MAX_REQUEST_SIZE,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hmac-rng")]
#[command(about = "HMAC_RNG - extract-then-expand random bit generator", long_about = None)]
struct Args {
    /// Configuration file (YAML, TOML or JSON); HMAC_RNG_* environment
    /// variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write random bytes to stdout
    Bytes {
        /// Number of bytes
        #[arg(short = 'n', long, default_value_t = 32)]
        count: usize,

        /// Output encoding (binary, hex, base64)
        #[arg(short, long, default_value = "hex")]
        format: String,

        /// Extra hex-encoded input absorbed before generating
        #[arg(short, long)]
        entropy: Option<String>,
    },

    /// Write random chunks to stdout on a fixed interval
    Stream {
        /// Bytes per chunk
        #[arg(long, default_value_t = 64)]
        chunk: usize,

        /// Milliseconds between chunks
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Stop after this many chunks
        #[arg(long)]
        limit: Option<u64>,

        /// Output encoding (binary, hex, base64)
        #[arg(short, long, default_value = "hex")]
        format: String,
    },

    /// Describe the configured generator
    Info {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Emit the metrics in Prometheus text exposition format
        #[arg(long, conflicts_with = "json")]
        prometheus: bool,
    },
}

#[derive(Serialize)]
struct GeneratorInfo {
    version: &'static str,
    name: String,
    sources: Vec<String>,
    seeded: bool,
    entropy_bits: u64,
    reseed_interval: u32,
    stir_interval: u32,
    metrics: MetricsSnapshot,
}

fn init_tracing(log_level: &str) {
    let level = log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    // stdout carries random output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<GeneratorConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            GeneratorConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => {
            info!("Loading configuration from environment variables");
            GeneratorConfig::from_env().context("Failed to load configuration from environment")
        }
    }
}

fn parse_format(s: &str) -> Result<EncodingFormat> {
    match EncodingFormat::parse(s) {
        Some(format) => Ok(format),
        None => bail!("Unknown output format '{}' (expected binary, hex or base64)", s),
    }
}

fn check_size(n: usize) -> Result<()> {
    if n > MAX_REQUEST_SIZE {
        bail!("Request of {} bytes exceeds maximum of {}", n, MAX_REQUEST_SIZE);
    }
    Ok(())
}

fn emit(out: &mut impl Write, format: EncodingFormat, data: &[u8]) -> Result<()> {
    out.write_all(&format.encode(data))?;
    if format.is_text() {
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn run_bytes(mut rng: HmacRng, count: usize, format: &str, entropy: Option<&str>) -> Result<()> {
    let format = parse_format(format)?;
    check_size(count)?;

    if let Some(encoded) = entropy {
        let input = hex::decode(encoded.trim()).context("Failed to decode --entropy")?;
        rng.add_entropy(&input);
    }

    let mut buf = vec![0u8; count];
    rng.randomize(&mut buf)?;

    let stdout = std::io::stdout();
    emit(&mut stdout.lock(), format, &buf)
}

fn render_info(mut rng: HmacRng, json: bool, prometheus: bool) -> Result<String> {
    rng.reseed();

    if prometheus {
        return Ok(rng.metrics().prometheus_format());
    }

    let policy = rng.policy();
    let report = GeneratorInfo {
        version: hmac_rng_core::VERSION,
        name: rng.name(),
        sources: rng.source_names(),
        seeded: rng.is_seeded(),
        entropy_bits: rng.entropy_estimate(),
        reseed_interval: policy.reseed_interval(),
        stir_interval: policy.stir_interval(),
        metrics: rng.metrics().snapshot(),
    };

    if json {
        return Ok(serde_json::to_string_pretty(&report)?);
    }

    Ok([
        format!("generator:       {}", report.name),
        format!("version:         {}", report.version),
        format!("sources:         {}", report.sources.join(", ")),
        format!("seeded:          {}", report.seeded),
        format!("entropy (bits):  {}", report.entropy_bits),
        format!("reseed interval: {}", report.reseed_interval),
        format!("stir interval:   {}", report.stir_interval),
        format!("bytes polled:    {}", report.metrics.bytes_polled),
        format!("reseeds:         {}", report.metrics.reseeds_total),
    ]
    .join("\n"))
}

async fn run_stream(
    rng: Arc<Mutex<HmacRng>>,
    chunk: usize,
    period: Duration,
    limit: Option<u64>,
    format: EncodingFormat,
) -> Result<()> {
    let mut ticker = interval(period);
    let mut stdout = tokio::io::stdout();
    let mut emitted = 0u64;

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        if limit.is_some_and(|limit| emitted >= limit) {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                // Source polls may block on the network
                let rng = Arc::clone(&rng);
                let data = tokio::task::spawn_blocking(move || {
                    let mut buf = vec![0u8; chunk];
                    rng.lock().randomize(&mut buf).map(|_| buf)
                })
                .await??;

                let mut encoded = format.encode(&data);
                if format.is_text() {
                    encoded.push(b'\n');
                }
                stdout.write_all(&encoded).await?;
                stdout.flush().await?;
                emitted += 1;
            }
            result = &mut shutdown => {
                result?;
                break;
            }
        }
    }

    let snapshot = rng.lock().metrics().snapshot();
    info!(
        chunks = emitted,
        bytes_generated = snapshot.bytes_generated,
        reseeds = snapshot.reseeds_total,
        "Stream stopped"
    );
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use futures::stream::StreamExt;
        use signal_hook::consts::signal::*;
        use signal_hook_tokio::Signals;

        let mut signals =
            Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;

        if let Some(signal) = signals.next().await {
            info!("Received signal: {:?}", signal);
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C signal");
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("hmac-rng v{}", hmac_rng_core::VERSION);

    let config = load_config(args.config.as_ref())?;

    // Blocking HTTP clients must be built outside the async runtime
    let rng = config.build().context("Failed to assemble generator")?;
    if rng.source_count() == 0 {
        warn!("No entropy sources enabled; output requires --entropy input");
    }

    match args.command {
        Command::Bytes {
            count,
            format,
            entropy,
        } => run_bytes(rng, count, &format, entropy.as_deref()),

        Command::Info { json, prometheus } => {
            println!("{}", render_info(rng, json, prometheus)?);
            Ok(())
        }

        Command::Stream {
            chunk,
            interval_ms,
            limit,
            format,
        } => {
            let format = parse_format(&format)?;
            check_size(chunk)?;
            if interval_ms == 0 {
                bail!("--interval-ms must be > 0");
            }

            let rng = Arc::new(Mutex::new(rng));
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;

            let result = runtime.block_on(run_stream(
                Arc::clone(&rng),
                chunk,
                Duration::from_millis(interval_ms),
                limit,
                format,
            ));

            // The generator (and any blocking HTTP client it owns) is
            // dropped after the runtime has shut down
            drop(runtime);
            drop(rng);
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_bytes_subcommand() {
        let args =
            Args::try_parse_from(["hmac-rng", "bytes", "-n", "16", "--format", "base64"]).unwrap();
        match args.command {
            Command::Bytes { count, format, entropy } => {
                assert_eq!(count, 16);
                assert_eq!(format, "base64");
                assert!(entropy.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_format_and_size() {
        assert_eq!(parse_format("HEX").unwrap(), EncodingFormat::Hex);
        assert!(parse_format("octal").is_err());
        assert!(check_size(MAX_REQUEST_SIZE).is_ok());
        assert!(check_size(MAX_REQUEST_SIZE + 1).is_err());
    }

    #[test]
    fn test_emit_text_appends_newline() {
        let mut out = Vec::new();
        emit(&mut out, EncodingFormat::Hex, &[0xab, 0xcd]).unwrap();
        assert_eq!(out, b"abcd\n");

        let mut out = Vec::new();
        emit(&mut out, EncodingFormat::Binary, &[0xab, 0xcd]).unwrap();
        assert_eq!(out, vec![0xab, 0xcd]);
    }

    #[test]
    fn test_bytes_with_caller_entropy_only() {
        let config = GeneratorConfig {
            os_source: false,
            timer_source: false,
            ..Default::default()
        };
        let rng = config.build().unwrap();
        // 256 bytes credit 256 bits, enough for an HMAC(SHA-256) PRF
        let entropy = "5a".repeat(256);
        assert!(run_bytes(rng, 8, "hex", Some(&entropy)).is_ok());

        let rng = config.build().unwrap();
        assert!(run_bytes(rng, 8, "hex", Some("5a5a")).is_err());
    }

    #[test]
    fn test_bytes_rejects_malformed_entropy() {
        let rng = GeneratorConfig::default().build().unwrap();
        let err = run_bytes(rng, 8, "hex", Some("not hex")).unwrap_err();
        assert!(err.to_string().contains("--entropy"));
    }

    #[test]
    fn test_info_formats() {
        assert!(Args::try_parse_from(["hmac-rng", "info", "--json", "--prometheus"]).is_err());

        let config = GeneratorConfig::default();

        let text = render_info(config.build().unwrap(), false, false).unwrap();
        assert!(text.contains("sources:         os, timer"));
        assert!(text.contains("seeded:          true"));

        let json = render_info(config.build().unwrap(), true, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["seeded"], true);
        assert_eq!(value["metrics"]["reseeds_total"], 1);

        let prom = render_info(config.build().unwrap(), false, true).unwrap();
        assert!(prom.contains("hmac_rng_reseeds_total 1\n"));
        assert!(prom.contains("# TYPE hmac_rng_bytes_polled_total counter"));
    }

    #[tokio::test]
    async fn test_stream_stops_at_limit() {
        let config = GeneratorConfig {
            qrng_urls: Vec::new(),
            ..Default::default()
        };
        let rng = Arc::new(Mutex::new(config.build().unwrap()));

        run_stream(
            Arc::clone(&rng),
            4,
            Duration::from_millis(1),
            Some(3),
            EncodingFormat::Hex,
        )
        .await
        .unwrap();

        assert_eq!(rng.lock().metrics().requests_total(), 3);
        assert_eq!(rng.lock().metrics().bytes_generated(), 12);
    }
}
