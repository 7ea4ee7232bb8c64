use crate::config::AppConfig;
use crate::services::records::RecordStore;
use crate::services::staging::{is_pending, promoted_at};
use crate::services::storage::BlobStore;
use chrono::Utc;
use futures::{StreamExt, stream};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

const HEAD_CONCURRENCY: usize = 8;

/// Periodically deletes committed-looking blobs that no user references.
///
/// Staged objects are never touched. A blob's age runs from the later of
/// its upload and its promotion, and blobs younger than the grace period
/// are kept so a commit between promotion and its conditional update is
/// not swept from under it.
pub struct BackgroundWorker {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    config: AppConfig,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        config: AppConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            blobs,
            records,
            config,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Background worker started");

        let interval = Duration::from_secs(self.config.orphan_sweep_interval_secs.max(1));

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = sleep(interval) => {
                    if self.config.enable_orphan_sweep {
                        match self.sweep_orphans().await {
                            Ok(deleted) => tracing::info!("✅ Orphan sweep removed {} blob(s)", deleted.len()),
                            Err(e) => tracing::error!("Orphan sweep failed: {}", e),
                        }
                    }
                }
            }
        }
    }

    /// Runs one sweep and returns the deleted keys.
    pub async fn sweep_orphans(&self) -> anyhow::Result<Vec<String>> {
        tracing::info!("🧹 Sweeping orphaned avatar blobs...");

        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.orphan_grace_secs as i64);
        let keys = self.blobs.list_objects("").await?;

        let heads = stream::iter(keys)
            .map(|key| async move {
                let head = self.blobs.head_object(&key).await;
                (key, head)
            })
            .buffer_unordered(HEAD_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        let mut candidates = Vec::new();
        for (key, head) in heads {
            match head {
                Ok(Some(head)) => {
                    if is_pending(&head) {
                        continue;
                    }
                    let settled = promoted_at(&head).max(head.last_modified);
                    if settled.is_some_and(|at| at < cutoff) {
                        candidates.push(key);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping {} during sweep: {}", key, e),
            }
        }

        // Snapshot references after inspecting blobs, so a commit finishing
        // mid-sweep is seen as referenced.
        let referenced: HashSet<String> = self
            .records
            .scan()
            .await?
            .into_iter()
            .filter_map(|record| record.avatar)
            .collect();

        let mut deleted = Vec::new();
        for key in candidates {
            if referenced.contains(&key) {
                continue;
            }
            match self.blobs.delete_object(&key).await {
                Ok(()) => {
                    tracing::info!("Deleted orphaned blob {}", key);
                    deleted.push(key);
                }
                Err(e) => tracing::error!("Failed to delete orphaned blob {}: {}", key, e),
            }
        }

        Ok(deleted)
    }
}
