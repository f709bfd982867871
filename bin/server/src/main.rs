use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use plex_forward_auth_plex::{PlexClient, PlexConfig};
use plex_forward_auth_server::{app::build_app, config::GatewayConfig, telemetry};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match GatewayConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = telemetry::init(config.log_level(), config.log_format()) {
        eprintln!("failed to initialise logging: {err}");
        return ExitCode::FAILURE;
    }
    debug!(?config, "loaded configuration");

    let plex = PlexConfig::new(config.product(), config.client_identifier())
        .with_timeout(config.provider_timeout());
    let provider = match PlexClient::new(plex) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            error!(error = %err, "failed to create plex client");
            return ExitCode::FAILURE;
        }
    };

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port()));
    let app = match build_app(config, provider) {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "failed to build application");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%addr, error = %err, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(%addr, "listening");
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %err, "server error");
        return ExitCode::FAILURE;
    }

    info!("shut down");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
