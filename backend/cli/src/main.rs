mod api;
mod client;
mod doctor_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use spoofbar_config::{
    config_dir, config_file_path, load_and_prepare, log_validation, write_config, SpoofBarConfig,
};
use spoofbar_logging::init_logger;
use spoofbar_supervisor::{Supervisor, SupervisorConfig, SupervisorHandle};

use api::AppState;

#[derive(Parser)]
#[command(name = "spoofbar")]
#[command(about = "Controller for a local SpoofDPI proxy")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.spoofbar/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller and its local control API
    Serve {
        /// Port to bind the control API to
        #[arg(short, long)]
        port: Option<u16>,
        /// Start the proxy as soon as the controller is up
        #[arg(long)]
        autostart: bool,
    },
    /// Show proxy status from a running controller
    Status,
    /// Ask a running controller to start the proxy
    Start,
    /// Ask a running controller to stop the proxy
    Stop,
    /// Check the proxy binary and configuration
    Doctor,
    /// Write a config file with default values
    InitConfig {
        /// Overwrite an existing file (a backup is kept)
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));

    if let Commands::InitConfig { force } = cli.command {
        if config_path.exists() && !force {
            bail!("{} already exists; pass --force to overwrite", config_path.display());
        }
        write_config(&SpoofBarConfig::default(), &config_path).await?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    let config = load_and_prepare(&config_path).await?;

    match cli.command {
        Commands::Serve { port, autostart } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            let log_dir = config
                .logging
                .dir
                .clone()
                .unwrap_or_else(|| config_dir().join("logs"));
            let _guard = init_logger(&log_dir, &config.logging.level)?;
            log_validation(&config);
            run_server(config, autostart).await?;
        }
        Commands::Status => client::status(&config.server).await?,
        Commands::Start => client::send_command(&config.server, "start").await?,
        Commands::Stop => client::send_command(&config.server, "stop").await?,
        Commands::Doctor => {
            if !doctor_cmd::run(&config, &config_path).await? {
                std::process::exit(1);
            }
        }
        Commands::InitConfig { .. } => unreachable!("handled before config is loaded"),
    }

    Ok(())
}

async fn run_server(config: SpoofBarConfig, autostart: bool) -> Result<()> {
    let supervisor_config = SupervisorConfig::from_proxy_config(&config.proxy)?;
    let addr = config.server.address();

    info!(
        addr = %addr,
        executable = %supervisor_config.executable.display(),
        "Starting SpoofBar controller"
    );

    let (broadcast_tx, _) = broadcast::channel(100);
    let supervisor = Supervisor::spawn_with(supervisor_config, broadcast_tx);

    if autostart {
        autostart_proxy(&supervisor).await;
    }

    let app_state = Arc::new(AppState {
        supervisor: supervisor.clone(),
    });
    let app = api::build_router(app_state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind control API to {}", addr))?;
    info!(addr = %addr, "Control API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The proxy never outlives the controller.
    if let Err(e) = supervisor.shutdown().await {
        warn!(error = %e, "Supervisor already stopped");
    }
    info!("SpoofBar controller stopped");
    Ok(())
}

async fn autostart_proxy(supervisor: &SupervisorHandle) {
    match supervisor.start().await {
        Ok(message) => info!("{}", message),
        Err(e) => error!(error = %e, "Autostart failed"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
