use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use echo_service::{
    BuildOptions, Config, LogSettings, ShutdownHandle, build_app, metrics, telemetry, utils,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Also loads an .env file if present
    let config = Config::from_env();

    // A broken configuration still gets logged, with lenient settings
    let log_settings = match &config {
        Ok(config) => LogSettings::from(config),
        Err(_) => LogSettings::from_env(),
    };
    if let Err(e) = telemetry::init(&log_settings) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    info!("Starting echo service v{}", env!("CARGO_PKG_VERSION"));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(exit_code) => exit_code,
    }
}

/// Run the application, returning an exit code on error.
///
/// Every failure is logged before the exit code is returned.
async fn run(config: Config) -> Result<(), ExitCode> {
    info!(
        environment = %config.environment,
        host = %config.host,
        port = config.port,
        rate_limit_max = config.rate_limit_max,
        rate_limit_window = %config.rate_limit_window,
        log_format = ?config.log_format,
        "Configuration loaded"
    );

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    }

    let host = config.host.clone();
    let port = config.port;
    let app = build_app(config, BuildOptions::default()).map_err(|e| {
        error!("Failed to build application: {e}");
        ExitCode::FAILURE
    })?;
    let shutdown = app.shutdown_handle();

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| {
            error!("Failed to bind to {host}:{port}: {e}");
            ExitCode::FAILURE
        })?;
    let local_addr = listener.local_addr().map_err(|e| {
        error!("Failed to read listener address: {e}");
        ExitCode::FAILURE
    })?;

    info!("Server listening on http://{local_addr}");
    info!("API endpoints:");
    info!("  GET  /health        - Health check");
    info!("  GET  /health/live   - Liveness probe");
    info!("  GET  /health/ready  - Readiness probe");
    info!("  POST /echo          - Echo a message");

    tokio::spawn(watch_signals(shutdown.clone()));
    app.spawn_background_tasks();

    axum::serve(
        listener,
        app.router()
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.closed())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        ExitCode::FAILURE
    })?;

    app.wait_background_tasks().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Turn every shutdown signal into a close request.
///
/// The first signal starts the drain; later ones are logged and ignored.
async fn watch_signals(shutdown: ShutdownHandle) {
    loop {
        let signal = utils::shutdown_signal().await;
        if shutdown.close() {
            warn!(%signal, "Received shutdown signal, draining in-flight requests");
        } else {
            warn!(%signal, "Shutdown already in progress");
        }
    }
}
