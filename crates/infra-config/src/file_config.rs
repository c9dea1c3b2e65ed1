// File-Backed Configuration Service
//
// The snapshot file holds a JSON array of AppConfig. `reload` swaps the
// in-memory snapshot wholesale and bumps the change-notification version;
// a malformed file keeps the previous snapshot live. An optional watcher
// task polls the file's mtime and reloads on change, standing in for the
// push notifier of a real configuration service.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};

use hookbridge_core::domain::{AppConfig, CallbackConfig};
use hookbridge_core::error::{AppError, Result};
use hookbridge_core::port::ConfigService;

pub struct FileConfigService {
    path: PathBuf,
    snapshot: RwLock<Vec<AppConfig>>,
    version_tx: watch::Sender<u64>,
}

impl FileConfigService {
    /// Load the initial snapshot; a missing or malformed file is a boot
    /// error, not a condition to limp through.
    pub async fn load(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let snapshot = read_snapshot(&path).await?;
        info!(path = %path.display(), apps = snapshot.len(), "Loaded configuration snapshot");

        let (version_tx, _) = watch::channel(0);
        Ok(Arc::new(Self {
            path,
            snapshot: RwLock::new(snapshot),
            version_tx,
        }))
    }

    /// Re-read the file and notify subscribers. On error the previous
    /// snapshot stays live and no notification fires.
    pub async fn reload(&self) -> Result<()> {
        let snapshot = read_snapshot(&self.path).await?;
        let apps = snapshot.len();
        *self.snapshot.write().await = snapshot;
        self.version_tx.send_modify(|v| *v += 1);
        info!(path = %self.path.display(), apps, "Reloaded configuration snapshot");
        Ok(())
    }

    /// Poll the file mtime and reload on change, until the returned task is
    /// aborted or the service is dropped.
    pub fn spawn_watcher(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut last_mtime = file_mtime(&service.path).await;
            loop {
                tokio::time::sleep(interval).await;
                let mtime = file_mtime(&service.path).await;
                if mtime != last_mtime {
                    last_mtime = mtime;
                    if let Err(e) = service.reload().await {
                        error!(error = %e, "Configuration reload failed, keeping previous snapshot");
                    }
                }
            }
        })
    }
}

async fn read_snapshot(path: &Path) -> Result<Vec<AppConfig>> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::Config(format!("malformed snapshot {}: {e}", path.display())))
}

async fn file_mtime(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

#[async_trait]
impl ConfigService for FileConfigService {
    async fn snapshot(&self) -> Result<Vec<AppConfig>> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn callback_configs(&self, app_id: &str, queue_code: &str) -> Result<Vec<CallbackConfig>> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .iter()
            .filter(|app| app.app_id == app_id)
            .flat_map(|app| &app.queues)
            .filter(|queue| queue.code == queue_code)
            .flat_map(|queue| queue.callbacks.clone())
            .collect())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }
}
