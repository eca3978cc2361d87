//! Periodic JSON snapshot export and startup import.

use gridclaim_core::{now_ms, CanvasService};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Exports a snapshot unless nothing was committed since `last_seq`.
///
/// Returns the commit sequence now on disk, or `last_seq` when the export
/// was skipped or failed.
pub fn export_if_changed(service: &CanvasService, path: &Path, last_seq: Option<u64>) -> Option<u64> {
    let current = match service.commit_seq() {
        Ok(seq) => seq,
        Err(err) => {
            error!("event=snapshot_export module=server status=error error={err}");
            return last_seq;
        }
    };
    if last_seq == Some(current) {
        return last_seq;
    }
    match service.export_snapshot(path, now_ms()) {
        Ok(snapshot) => Some(snapshot.commit_seq),
        Err(err) => {
            error!(
                "event=snapshot_export module=server status=error path={} error={err}",
                path.display()
            );
            last_seq
        }
    }
}

/// Imports `path` into a canvas that has never committed anything.
///
/// Returns whether a snapshot was imported.
pub fn import_if_empty(service: &CanvasService, path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match service.commit_seq() {
        Ok(0) => {}
        Ok(_) => return false,
        Err(err) => {
            warn!("event=snapshot_import module=server status=error error={err}");
            return false;
        }
    }
    match service.import_snapshot(path) {
        Ok(snapshot) => {
            info!(
                "event=snapshot_import module=server status=ok snapshot_id={} cells={}",
                snapshot.snapshot_id,
                snapshot.cells.len()
            );
            true
        }
        Err(err) => {
            warn!(
                "event=snapshot_import module=server status=error path={} error={err}",
                path.display()
            );
            false
        }
    }
}

/// Spawns the export loop. The first export happens one interval after
/// start.
pub fn spawn_exporter(
    service: Arc<CanvasService>,
    path: PathBuf,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut last_seq = None;
        loop {
            ticker.tick().await;
            let service = Arc::clone(&service);
            let path = path.clone();
            match tokio::task::spawn_blocking(move || export_if_changed(&service, &path, last_seq))
                .await
            {
                Ok(seq) => last_seq = seq,
                Err(err) => error!("event=snapshot_export module=server status=error error={err}"),
            }
        }
    })
}
