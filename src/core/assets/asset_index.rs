use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::downloader::{DownloadSource, Downloader, Integrity};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::progress::ProgressTracker;
use crate::core::retry::check_cancelled;
use crate::core::version::AssetIndexInfo;

pub const DEFAULT_ASSET_WORKERS: usize = 8;
const STEP: &str = "assets";

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    #[serde(default)]
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    #[serde(default)]
    pub size: u64,
}

impl AssetObject {
    /// `<hh>/<hash>`
    fn shard_path(&self) -> Option<String> {
        let prefix = self.hash.get(..2)?;
        Some(format!("{}/{}", prefix, self.hash))
    }
}

/// Downloads an asset index and every object it references.
pub struct AssetSync<'a> {
    pub downloader: &'a Downloader,
    pub resources_base: &'a str,
    pub assets_dir: &'a Path,
    pub workers: usize,
    pub progress: &'a Arc<ProgressTracker>,
}

impl AssetSync<'_> {
    /// Returns the number of distinct objects now present on disk.
    pub async fn run(&self, index: &AssetIndexInfo, cancel: &CancellationToken) -> LauncherResult<u64> {
        if index.id.is_empty() || index.url.is_empty() {
            debug!("Version declares no asset index");
            return Ok(0);
        }

        let index_path = self
            .assets_dir
            .join("indexes")
            .join(format!("{}.json", index.id));
        self.downloader
            .ensure_file(
                &DownloadSource::new(index.url.clone()),
                &index_path,
                &Integrity::sha1(index.size, &index.sha1),
                cancel,
            )
            .await?;

        let raw = tokio::fs::read_to_string(&index_path)
            .await
            .map_err(|e| LauncherError::io(&index_path, e))?;
        let parsed: AssetIndex = serde_json::from_str(&raw)?;

        // Several names can share one object; each file gets exactly one job.
        let objects: BTreeMap<String, AssetObject> = parsed
            .objects
            .into_values()
            .filter(|o| o.hash.len() > 2)
            .map(|o| (o.hash.clone(), o))
            .collect();

        info!(
            "Syncing {} asset objects for index {} ({} workers)",
            objects.len(),
            index.id,
            self.workers.max(1)
        );
        self.fetch_objects(objects.into_values().collect(), cancel).await
    }

    async fn fetch_objects(
        &self,
        objects: Vec<AssetObject>,
        cancel: &CancellationToken,
    ) -> LauncherResult<u64> {
        let total = objects.len() as u64;
        self.progress.set_total(STEP, total);
        if total == 0 {
            return Ok(0);
        }

        let workers = self.workers.max(1);
        let objects_dir = self.assets_dir.join("objects");
        let (tx, rx) = mpsc::channel::<AssetObject>(workers * 2);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        // Cancelled on the first worker failure, or when the caller cancels.
        let abort = cancel.child_token();
        let first_error: Arc<Mutex<Option<LauncherError>>> = Arc::new(Mutex::new(None));
        let done = Arc::new(AtomicU64::new(0));

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let rx = rx.clone();
            let abort = abort.clone();
            let first_error = first_error.clone();
            let done = done.clone();
            let downloader = self.downloader.clone();
            let progress = self.progress.clone();
            let objects_dir = objects_dir.clone();
            let base = self.resources_base.trim_end_matches('/').to_string();

            pool.spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    let Some(object) = job else { break };
                    if abort.is_cancelled() {
                        // drain without executing
                        continue;
                    }
                    let Some(shard) = object.shard_path() else {
                        continue;
                    };

                    let dest: PathBuf = shard
                        .split('/')
                        .fold(objects_dir.clone(), |p, part| p.join(part));
                    let result = downloader
                        .ensure_file(
                            &DownloadSource::new(format!("{}/{}", base, shard)),
                            &dest,
                            &Integrity::sha1(object.size, &object.hash),
                            &abort,
                        )
                        .await;

                    match result {
                        Ok(_) => {
                            done.fetch_add(1, Ordering::Relaxed);
                            progress.increment(STEP);
                        }
                        Err(err) => {
                            if let Ok(mut slot) = first_error.lock() {
                                if slot.is_none() {
                                    *slot = Some(err);
                                }
                            }
                            abort.cancel();
                        }
                    }
                }
            });
        }

        for object in objects {
            tokio::select! {
                _ = abort.cancelled() => break,
                sent = tx.send(object) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        drop(tx);

        while let Some(joined) = pool.join_next().await {
            joined?;
        }

        let failure = first_error.lock().ok().and_then(|mut slot| slot.take());
        if let Some(err) = failure {
            warn!("Asset sync aborted: {}", err);
            return Err(err);
        }
        check_cancelled(cancel)?;

        Ok(done.load(Ordering::Relaxed))
    }
}
