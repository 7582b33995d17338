use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mirror::{MirrorEngine, MirrorOptions, OutputStyle};

mod config;

use config::MirrorConfig;

#[derive(Parser)]
#[command(name = "mirror")]
#[command(about = "Compile YAML trees into mirrored JSON directories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one full pass over a single source/target pair
    Sync {
        /// Source directory
        source: PathBuf,
        /// Target directory
        target: PathBuf,
        /// Pretty-print compiled JSON
        #[arg(long)]
        pretty: bool,
        /// Indent width for pretty output
        #[arg(long, default_value_t = 2)]
        indent: usize,
    },
    /// Sync a pair, then keep it in sync as the source changes
    Watch {
        /// Source directory
        source: PathBuf,
        /// Target directory
        target: PathBuf,
        /// Pretty-print compiled JSON
        #[arg(long)]
        pretty: bool,
        /// Indent width for pretty output
        #[arg(long, default_value_t = 2)]
        indent: usize,
        /// Settle time for bursts of events, in milliseconds
        #[arg(long, default_value_t = 250)]
        debounce_ms: u64,
    },
    /// Drive every pair declared in a mirror.yaml file
    Run {
        /// Configuration file; searched upward from the working
        /// directory when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match cli.command {
        Commands::Sync {
            source,
            target,
            pretty,
            indent,
        } => {
            let options = MirrorOptions {
                style: OutputStyle { pretty, indent },
                ..Default::default()
            };
            let mut engine = MirrorEngine::new(source, target, options);
            let report = engine.full_sync().await?;
            info!(
                removed = report.removed,
                copied = report.copied,
                compiled = report.compiled,
                refreshed = report.refreshed,
                "sync complete"
            );
            Ok(())
        }
        Commands::Watch {
            source,
            target,
            pretty,
            indent,
            debounce_ms,
        } => {
            let options = MirrorOptions {
                style: OutputStyle { pretty, indent },
                debounce: Duration::from_millis(debounce_ms),
                ..Default::default()
            };
            let mut engine = MirrorEngine::new(source, target, options);
            engine.watch(cancel).await.map_err(Into::into)
        }
        Commands::Run { config } => run_from_config(config, cancel).await,
    }
}

async fn run_from_config(path: Option<PathBuf>, cancel: CancellationToken) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir().context("resolving the working directory")?;
            MirrorConfig::find(&cwd).with_context(|| {
                format!("no {} found above {}", config::CONFIG_FILE_NAME, cwd.display())
            })?
        }
    };
    let config = MirrorConfig::load(&path)?;
    info!(config = %path.display(), pairs = config.files.len(), "configuration loaded");

    // The directory holding the configuration is off limits as a
    // target; wiping it would destroy the project itself.
    let protected_root = path.parent().map(PathBuf::from);
    let options = MirrorOptions {
        style: OutputStyle {
            pretty: config.pretty,
            indent: config.indent,
        },
        debounce: config.debounce,
        protected_root,
    };

    let mut tasks = tokio::task::JoinSet::new();
    for pair in &config.files {
        let mut engine = MirrorEngine::new(&pair.source, &pair.target, options.clone());
        let watch = config.watch;
        let cancel = cancel.clone();
        let label = pair.source.display().to_string();
        tasks.spawn(async move {
            let result = if watch {
                engine.watch(cancel).await
            } else {
                engine.full_sync().await.map(|report| {
                    info!(
                        source = %label,
                        removed = report.removed,
                        copied = report.copied,
                        compiled = report.compiled,
                        refreshed = report.refreshed,
                        "sync complete"
                    );
                })
            };
            (label, result)
        });
    }

    // One failing pair does not take the others down.
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((label, Err(err))) => {
                failed += 1;
                error!(source = %label, %err, "pair failed");
            }
            Err(err) => {
                failed += 1;
                error!(%err, "pair task panicked");
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} pair(s) failed");
    }
    Ok(())
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            cancel.cancel();
        }
    });
}
