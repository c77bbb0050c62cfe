use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::classify::SeverityClassifier;
use crate::config::{get_opsrelay_home, load_config, Config};
use crate::credentials::FileCredentialStore;
use crate::gateway::{self, GatewayState};
use crate::handlers::Capabilities;
use crate::logsink::SqliteEventLog;
use crate::netconf::ssh::{check_transport, OpenSshConnector, AUTH_NOTE};
use crate::notify::RelaySink;
use crate::router::Dispatcher;

#[derive(Parser)]
#[command(name = "opsrelay")]
#[command(about = "Junos event relay and remote-action service", long_about = None)]
#[command(version = crate::VERSION)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway and dispatcher until interrupted
    Serve,
    /// Load the configuration and report anything that would stop `serve`
    CheckConfig,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::CheckConfig => check_config(&config),
    }
}

fn check_config(config: &Config) -> Result<()> {
    let problems = config.validate();
    if problems.is_empty() {
        println!("configuration ok");
        return Ok(());
    }
    for problem in &problems {
        println!("problem: {}", problem);
    }
    anyhow::bail!("{} problem(s) found", problems.len())
}

async fn serve(config: Config) -> Result<()> {
    for problem in config.validate() {
        warn!("config: {}", problem);
    }

    let home = get_opsrelay_home()?;
    std::fs::create_dir_all(&home)?;

    let credentials_path = config
        .credentials
        .path
        .clone()
        .unwrap_or_else(|| home.join("credentials.json"));
    let log_path = config
        .log_sink
        .path
        .clone()
        .unwrap_or_else(|| home.join("events.db"));

    let caps = Capabilities {
        chat: Arc::new(RelaySink::new(config.chat.relay_url.clone())),
        credentials: Arc::new(FileCredentialStore::new(credentials_path)),
        connector: Arc::new(OpenSshConnector::new()),
        log: Arc::new(SqliteEventLog::open(&log_path, &config.log_sink.table)?),
    };
    check_transport().await;
    info!("{}", AUTH_NOTE);

    let (events_tx, events_rx) = mpsc::channel(256);
    let (commands_tx, commands_rx) = mpsc::channel(64);

    let classifier = Arc::new(SeverityClassifier::new(config.events.clone()));
    let state = GatewayState::new(
        config.gateway.secret.clone(),
        classifier,
        events_tx,
        commands_tx,
    );
    let server = gateway::start(&config.gateway.host, config.gateway.port, state).await?;

    let dispatcher = Dispatcher::new(
        caps,
        config.chat.chat_id.clone(),
        config.log_sink.table.clone(),
        config.ftp.clone(),
    );
    let dispatcher = tokio::spawn(dispatcher.run(events_rx, commands_rx));

    info!("opsrelay {} running", crate::VERSION);
    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    server.abort();
    dispatcher.abort();
    Ok(())
}
