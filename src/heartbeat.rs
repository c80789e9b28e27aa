//! Liveness file for external supervisors
//!
//! A background task rewrites the file with the current time at a fixed
//! interval. A watchdog that sees a stale modification time can restart us.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Write the current time to `path`, creating parent directories
pub async fn touch(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, Utc::now().to_rfc3339()).await
}

/// Spawn the periodic touch; the first beat happens immediately
pub fn spawn(path: PathBuf, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(path = %path.display(), interval_secs = interval.as_secs(), "Heartbeat started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = touch(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Heartbeat write failed");
            }
        }
    })
}
