//! Trusted Types Helper Analyzer - Main Entry Point
//!
//! Reads newline-delimited JSON messages on stdin and writes one JSON
//! response per line on stdout. Logs go to stderr.
//!
//! ```text
//! tth-analyzer [--config <path>]
//! ```

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use smol::Unblock;
use smol::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use smol::stream::StreamExt;
use tracing_subscriber::EnvFilter;
use tth_service::{AnalysisService, Message, Response, ServiceConfig};

fn main() -> Result<()> {
    // Configure logging to stderr only (stdout carries responses)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = match config_path()? {
        Some(path) => ServiceConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServiceConfig::default(),
    };

    tracing::info!("Starting Trusted Types Helper analyzer v{}", env!("CARGO_PKG_VERSION"));
    smol::block_on(serve(AnalysisService::from_config(config)))
}

/// `--config <path>` from the command line
fn config_path() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(value) => path = Some(PathBuf::from(value)),
                None => bail!("--config requires a path"),
            },
            other => bail!("unexpected argument '{}'", other),
        }
    }
    Ok(path)
}

async fn serve<S, I>(mut service: AnalysisService<S, I>) -> Result<()>
where
    S: tth_html::Sanitizer,
    I: tth_html::FragmentInspector,
{
    let mut lines = BufReader::new(Unblock::new(io::stdin())).lines();
    let mut stdout = Unblock::new(io::stdout());
    let mut handled = 0usize;

    while let Some(line) = lines.next().await {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match Message::decode(&line) {
            Ok(message) => service.handle(message).await,
            Err(err) => {
                tracing::warn!("Rejecting line {}: {}", handled + 1, err);
                Response::error(err)
            }
        };
        handled += 1;

        let mut out = serde_json::to_vec(&response).context("encoding response")?;
        out.push(b'\n');
        stdout.write_all(&out).await.context("writing stdout")?;
        stdout.flush().await.context("flushing stdout")?;
    }

    tracing::info!("Input closed after {} messages", handled);
    Ok(())
}
