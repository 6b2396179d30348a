use clap::Parser;
use interact_monitor::configuration::{CliArgs, Config};
use interact_monitor::error_handling::types::MonitorError;
use interact_monitor::reconciler::{ReconcilerSettings, StatusPoller, StreamReconciler};
use interact_monitor::web_interface::WebServer;
use interact_monitor::HttpBackend;
use log::{error, info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    info!("Importing configuration");

    let args = CliArgs::parse();

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration imported successfully");

    if let Err(e) = run(config).await {
        error!("{}, exiting...", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), MonitorError> {
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    info!("Capture backend at {}", config.backend.base_url);

    let settings = ReconcilerSettings::from_config(&config)?;
    let (reconciler, handle) = StreamReconciler::new(backend.clone(), settings);
    let reconciler_task = tokio::spawn(reconciler.run());

    let (poller, status) = StatusPoller::new(backend, config.poll_interval());
    tokio::spawn(poller.run());

    let server = WebServer::new(handle.clone(), status);
    let bind_address = config.web_ui.bind_address.clone();
    let port = config.web_ui.port;

    tokio::select! {
        result = server.start(&bind_address, port) => result?,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Unable to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        }
    }

    handle.shutdown().await;
    reconciler_task
        .await
        .map_err(|e| MonitorError::InitializationFailed(format!("reconciler task: {}", e)))?;
    Ok(())
}
