//! edgevote cloud daemon: merges signed vote batches from edge nodes.

mod shutdown;

use anyhow::Context;
use clap::Parser;
use edgevote_rpc::RpcServer;
use edgevote_store::MemoryStore;
use edgevote_sync::{spawn_sweeper, CloudSync, NonEmptyProof, SyncConfig};
use edgevote_types::SystemClock;
use edgevote_utils::{format_duration, init_logging, LogFormat};
use shutdown::ShutdownController;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "edgevote-cloud", about = "edgevote cloud sync daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and env vars override them.
    #[arg(long, env = "EDGEVOTE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP API port.
    #[arg(long, env = "EDGEVOTE_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "EDGEVOTE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "EDGEVOTE_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the cloud sync service.
    Run,
    /// Print the effective configuration as TOML and exit.
    PrintConfig,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let path = path.to_string_lossy();
                SyncConfig::from_toml_file(&path)
                    .with_context(|| format!("loading config from {path}"))?
            }
            None => SyncConfig::default(),
        };
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Command::PrintConfig => {
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::Run => run(config).await,
    }
}

async fn run(config: SyncConfig) -> anyhow::Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level);

    tracing::info!(
        rpc_port = config.rpc_port,
        max_batch_size = config.max_batch_size,
        result_ttl = %format_duration(config.result_ttl()),
        elections = config.elections.len(),
        "starting edgevote cloud"
    );
    tracing::warn!("using volatile in-memory storage; merged votes are lost on restart");

    let clock = Arc::new(SystemClock);
    let cloud = Arc::new(CloudSync::new(
        &config,
        Arc::new(MemoryStore::new()),
        Arc::new(NonEmptyProof),
        clock.clone(),
    ));

    let shutdown = ShutdownController::new();
    let sweeper = spawn_sweeper(
        Arc::clone(cloud.results()),
        clock,
        config.sweep_interval(),
        shutdown.subscribe(),
    );
    let server = RpcServer::new(config.rpc_port, Arc::clone(&cloud));
    let mut server = tokio::spawn(server.start(shutdown.subscribe()));

    // The server may exit on its own, e.g. when the port is taken.
    let early_exit = tokio::select! {
        _ = shutdown.wait_for_signal() => None,
        finished = &mut server => Some(finished),
    };
    let finished = match early_exit {
        Some(finished) => {
            shutdown.shutdown();
            finished
        }
        None => server.await,
    };

    sweeper.await.context("result sweeper task panicked")?;
    finished.context("RPC server task panicked")??;
    tracing::info!("edgevote cloud stopped");
    Ok(())
}
