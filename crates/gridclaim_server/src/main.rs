use gridclaim_core::{init_logging, CanvasService};
use gridclaim_server::snapshots::{export_if_changed, import_if_empty, spawn_exporter};
use gridclaim_server::{router, AppState, ServerConfig};
use log::{error, info};
use std::error::Error;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=server status=error error={err}");
            eprintln!("gridclaim_server: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::from_env()?;
    let log_dir = if config.log_dir.is_absolute() {
        config.log_dir.clone()
    } else {
        std::env::current_dir()?.join(&config.log_dir)
    };
    init_logging(&config.log_level, &log_dir.to_string_lossy())?;

    let service = Arc::new(CanvasService::open(&config.db_path, config.canvas.clone())?);
    if let Some(path) = &config.snapshot_path {
        import_if_empty(&service, path);
    }

    let exporter = config.snapshot_path.clone().map(|path| {
        spawn_exporter(Arc::clone(&service), path, config.snapshot_interval)
    });

    let app = router(AppState::new(Arc::clone(&service)));
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(
        "event=server_start module=server status=ok bind={} db_path={}",
        config.bind,
        config.db_path.display()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = exporter {
        handle.abort();
    }
    if let Some(path) = config.snapshot_path {
        let service = Arc::clone(&service);
        tokio::task::spawn_blocking(move || export_if_changed(&service, &path, None)).await?;
    }
    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=shutdown_signal module=server status=error error={err}");
        std::future::pending::<()>().await;
    }
}
