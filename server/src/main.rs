use std::path::PathBuf;
use std::process::ExitCode;

use layscience::{load_effective_config, telemetry, Service};
use layscience_server::{serve, AppState, ServerError};

const CONFIG_ENV: &str = "LAYSCIENCE_CONFIG";

/// `--config <path>` wins over `LAYSCIENCE_CONFIG`.
fn config_path() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    std::env::var_os(CONFIG_ENV).map(PathBuf::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to capture Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to capture SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

async fn run() -> Result<(), ServerError> {
    let config = load_effective_config(config_path().as_deref())?;
    telemetry::init_logging(&config.logging)?;

    let service = Service::from_config(&config)?;
    let report = service.recover().await?;
    log::info!(
        "Recovery: {} job(s) interrupted, {} rescheduled",
        report.interrupted,
        report.rescheduled
    );

    serve(AppState::new(service), &config.server.bind, shutdown_signal()).await
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("layscience-server: {}", e);
            ExitCode::FAILURE
        }
    }
}
