#![forbid(unsafe_code)]

//! `groupctl`: container group provisioning and exec binary.
//!
//! Loads configuration and credentials, builds the backend from the
//! registry, and runs one subcommand against it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use groupctl::backend::registry::BackendRegistry;
use groupctl::backend::TerminalSize;
use groupctl::config::GlobalConfig;
use groupctl::models::group::ContainerGroupSpec;
use groupctl::models::progress::{
    ProgressEvent, ProgressSink, ProgressStatus, TracingProgressSink,
};
use groupctl::orchestrator::Provisioner;
use groupctl::relay::{ExecRequest, WebSocketConnector};
use groupctl::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "groupctl", about = "Provision container groups and open exec sessions", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "groupctl.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the backend type from the configuration file.
    #[arg(long)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a container group from a TOML spec file.
    Create {
        /// Path to the group spec.
        spec: PathBuf,
    },
    /// Show a container group as JSON.
    Show {
        /// Group name.
        group: String,
    },
    /// Print the logs of one container.
    Logs {
        /// Group name.
        group: String,
        /// Container name.
        container: String,
    },
    /// Open an interactive terminal in a container.
    Exec {
        /// Group name.
        group: String,
        /// Container name.
        container: String,
        /// Command to start inside the container.
        #[arg(long, default_value = "/bin/sh")]
        command: String,
    },
    /// Delete a container group.
    Delete {
        /// Group name.
        group: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;
    let outcome = runtime.block_on(run(args));

    // Stdin reads run on the blocking pool and never return on their own.
    runtime.shutdown_background();
    outcome
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    config.load_credentials().await?;
    info!(backend = %config.backend, "configuration loaded");

    // ── Build backend ───────────────────────────────────
    let registry = BackendRegistry::with_defaults();
    let client = registry.get(&config.backend, &config)?;
    let progress: Arc<dyn ProgressSink> = match args.log_format {
        LogFormat::Text => Arc::new(ConsoleProgress),
        LogFormat::Json => Arc::new(TracingProgressSink),
    };
    let provisioner = Provisioner::new(client, Arc::new(WebSocketConnector::new()), progress);

    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    match args.command {
        Command::Create { spec } => {
            let spec = ContainerGroupSpec::load_from_path(&spec)?;
            let group = provisioner.create(&spec, &ct).await?;
            print_json(&group)
        }
        Command::Show { group } => {
            let group = provisioner.get(&group).await?;
            print_json(&group)
        }
        Command::Logs { group, container } => {
            let content = provisioner.logs(&group, &container).await?;
            print!("{content}");
            Ok(())
        }
        Command::Exec {
            group,
            container,
            command,
        } => {
            let request = ExecRequest::new(group, container, command).with_size(terminal_size());
            let _raw = RawModeGuard::enable()?;
            provisioner
                .exec(&request, tokio::io::stdin(), tokio::io::stdout(), &ct)
                .await
        }
        Command::Delete { group } => {
            let deleted = provisioner.delete(&group).await?;
            println!("{}", deleted.name);
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

/// Renders progress events as single lines on stderr.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: ProgressEvent) {
        let marker = match event.status {
            ProgressStatus::Working => "..",
            ProgressStatus::Done => "ok",
            ProgressStatus::Error => "!!",
        };
        eprintln!("[{marker}] {:<24} {}", event.id, event.text);
    }
}

/// Keeps the local terminal in raw mode for the guard's lifetime.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = crossterm::terminal::disable_raw_mode() {
            warn!(%err, "failed to restore terminal mode");
        }
    }
}

fn terminal_size() -> TerminalSize {
    match crossterm::terminal::size() {
        Ok((cols, rows)) => TerminalSize { rows, cols },
        Err(err) => {
            warn!(%err, "cannot read terminal size, using default");
            TerminalSize::default()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
