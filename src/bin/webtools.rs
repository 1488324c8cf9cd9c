//! CLI binary for webtools-convert.
//!
//! A thin shim over the library crate that maps CLI flags (with
//! `WEBTOOLS_*` environment fallbacks) to `ServiceConfig`, starts the
//! reclamation loop and serves the HTTP API until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use webtools_convert::{
    http, spawn_reclaimer, AppState, ReclaimSchedule, RendererKind, ServiceConfig,
};

const AFTER_HELP: &str = r#"ENDPOINTS:
  GET  /api/file/formats              supported conversion catalogue
  POST /api/file/convert              multipart: file, targetFormat
  GET  /api/file/download/{fileId}    converted artifact
  POST /api/file/cancel/{fileId}      drop a task and its files
  POST /api/image/compress            multipart: image, quality, scale
  POST /api/image/format-convert      multipart: image, targetFormat
  GET  /api/image/download/{imageId}  processed image

Only text → PDF is a real conversion; other pairs are copied unchanged and
flagged with "passthrough": true in the response.
"#;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RendererArg {
    /// In-process A4 text layout.
    Layout,
    /// Headless Chromium `--print-to-pdf`.
    Browser,
}

/// File conversion and image processing web service.
#[derive(Parser, Debug)]
#[command(
    name = "webtools",
    version,
    about = "File conversion and image processing web service",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "WEBTOOLS_BIND", default_value = "0.0.0.0:5002")]
    bind: SocketAddr,

    /// Directory for uploads and converted files.
    #[arg(long, env = "WEBTOOLS_STORAGE_DIR", default_value = "uploads")]
    storage_dir: PathBuf,

    /// Maximum upload size in megabytes.
    #[arg(long, env = "WEBTOOLS_MAX_UPLOAD_MB", default_value_t = 50,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_upload_mb: u64,

    /// Maximum size of a document submitted for conversion, in megabytes.
    #[arg(long, env = "WEBTOOLS_MAX_DOCUMENT_MB", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_document_mb: u64,

    /// Delete stored files older than this many hours.
    #[arg(long, env = "WEBTOOLS_RETENTION_HOURS", default_value_t = 24)]
    retention_hours: u64,

    /// Minutes between reclamation sweeps.
    #[arg(long, env = "WEBTOOLS_SWEEP_MINUTES", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    sweep_minutes: u64,

    /// Per-document render timeout in seconds.
    #[arg(long, env = "WEBTOOLS_RENDER_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    render_timeout: u64,

    /// Text → PDF renderer.
    #[arg(long, env = "WEBTOOLS_RENDERER", value_enum, default_value = "layout")]
    renderer: RendererArg,

    /// Unicode TrueType/OpenType font for the layout renderer (needed for CJK text).
    #[arg(long, env = "WEBTOOLS_LAYOUT_FONT")]
    layout_font: Option<PathBuf>,

    /// Chromium/Chrome executable for `--renderer browser`.
    #[arg(long, env = "WEBTOOLS_BROWSER", default_value = "chromium")]
    browser_binary: PathBuf,

    /// Simulated processing time for passthrough conversions, in milliseconds.
    #[arg(long, env = "WEBTOOLS_PASSTHROUGH_DELAY_MS", default_value_t = 0)]
    passthrough_delay_ms: u64,

    /// Reject format pairs that are not in the advertised catalogue.
    #[arg(long, env = "WEBTOOLS_STRICT_TARGETS")]
    strict_targets: bool,

    /// Include internal error detail in 5xx response bodies (development only).
    #[arg(long, env = "WEBTOOLS_EXPOSE_ERRORS")]
    expose_errors: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "WEBTOOLS_LOG_JSON")]
    log_json: bool,

    /// Enable debug logging.
    #[arg(short, long, env = "WEBTOOLS_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> Result<ServiceConfig> {
        const MIB: u64 = 1024 * 1024;
        let renderer = match self.renderer {
            RendererArg::Layout => RendererKind::Layout,
            RendererArg::Browser => RendererKind::Browser {
                binary: self.browser_binary.clone(),
            },
        };
        let mut builder = ServiceConfig::builder()
            .bind_addr(self.bind)
            .storage_dir(&self.storage_dir)
            .max_upload_bytes(self.max_upload_mb.saturating_mul(MIB))
            .max_document_bytes(self.max_document_mb.saturating_mul(MIB))
            .retention(Duration::from_secs(self.retention_hours.saturating_mul(3600)))
            .sweep_interval(Duration::from_secs(self.sweep_minutes.saturating_mul(60)))
            .render_timeout(Duration::from_secs(self.render_timeout))
            .renderer(renderer)
            .passthrough_delay(Duration::from_millis(self.passthrough_delay_ms))
            .strict_targets(self.strict_targets)
            .expose_error_details(self.expose_errors);
        if let Some(font) = &self.layout_font {
            builder = builder.layout_font(font);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = cli.to_config()?;
    info!(version = env!("CARGO_PKG_VERSION"), "webtools starting");
    if config.expose_error_details {
        warn!("Internal error details will be included in HTTP responses");
    }

    let state = Arc::new(AppState::new(config.clone()));
    state
        .tracker
        .storage()
        .ensure()
        .await
        .with_context(|| format!("Cannot create storage dir {}", config.storage_dir.display()))?;

    // ── Reclamation loop ─────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    let reclaimer = spawn_reclaimer(
        state.tracker.clone(),
        ReclaimSchedule {
            interval: config.sweep_interval,
            max_age: config.retention,
        },
        stop_rx,
    );

    // ── HTTP server ──────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Cannot bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, storage = %config.storage_dir.display(), "HTTP server listening");

    axum::serve(listener, http::build(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    let _ = stop_tx.send(true);
    if let Err(e) = reclaimer.await {
        warn!(error = %e, "reclaimer task ended abnormally");
    }
    info!("webtools stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received; draining connections");
}
