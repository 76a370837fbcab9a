pub mod config;
pub mod extract;
pub mod fetch;
pub mod input;
pub mod naming;
pub mod types;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::config::{Config, Overrides};
    pub use crate::extract::{extract_media, MediaRef};
    pub use crate::fetch::{DownloadJob, DownloadOutcome, DownloadProgress, Fetch, FetchCoordinator, FetchSummary, HttpFetcher};
    pub use crate::naming::MediaKind;
    pub use crate::types::Post;
    pub use crate::{Harvester, RunReport};
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::fetch::{plan_downloads, DownloadProgress, Fetch, FetchCoordinator, HttpFetcher};
use crate::naming::MediaKind;

/// What a run found and did. Early exits leave the later counters at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub output_dir: PathBuf,
    pub json_files: usize,
    pub posts: usize,
    pub unique_media: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Files present per category directory after the run, keyed by directory name.
    pub per_kind_counts: BTreeMap<&'static str, usize>,
}

/// Loads posts, extracts and deduplicates their media, then downloads everything into
/// one output directory.
pub struct Harvester {
    input_dir: PathBuf,
    coordinator: FetchCoordinator,
}

impl Harvester {
    pub fn new(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent, config.timeout())?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn Fetch>) -> Self {
        Self { input_dir: config.input_dir.clone(), coordinator: FetchCoordinator::new(fetcher, config.workers) }
    }

    pub async fn run(&self, output_dir: &Path) -> Result<RunReport> {
        self.run_with_progress(output_dir, |_| {}).await
    }

    pub async fn run_with_progress<F>(&self, output_dir: &Path, progress_callback: F) -> Result<RunReport>
    where
        F: FnMut(DownloadProgress),
    {
        let mut report = RunReport { output_dir: output_dir.to_path_buf(), ..Default::default() };

        let is_dir = tokio::fs::metadata(&self.input_dir).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            tracing::warn!(dir = %self.input_dir.display(), "input directory does not exist");
            return Ok(report);
        }

        let loaded = match input::load_posts(&self.input_dir).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(dir = %self.input_dir.display(), error = %format!("{e:#}"), "input directory is not readable");
                return Ok(report);
            }
        };
        report.json_files = loaded.files;
        report.posts = loaded.posts.len();
        tracing::info!(posts = report.posts, skipped_files = loaded.skipped_files, "posts loaded");
        if loaded.posts.is_empty() {
            tracing::warn!(dir = %self.input_dir.display(), "no posts found; put Reddit JSON files in the input directory");
            return Ok(report);
        }

        let jobs = plan_downloads(&loaded.posts, output_dir);
        report.unique_media = jobs.len();
        tracing::info!(unique = jobs.len(), "extracted media addresses");
        if jobs.is_empty() {
            tracing::warn!("no media addresses found to download");
            return Ok(report);
        }

        for kind in MediaKind::ALL {
            let dir = output_dir.join(kind.dir_name());
            tokio::fs::create_dir_all(&dir).await.with_context(|| format!("creating {}", dir.display()))?;
        }

        tracing::info!(workers = self.coordinator.workers(), output = %output_dir.display(), "starting downloads");
        let summary = self.coordinator.run_with_progress(jobs, progress_callback).await;
        report.succeeded = summary.succeeded;
        report.failed = summary.failed;
        report.per_kind_counts = count_files(output_dir).await;
        tracing::info!(succeeded = report.succeeded, failed = report.failed, output = %output_dir.display(), "downloads complete");
        for (dir, count) in report.per_kind_counts.iter().filter(|(_, c)| **c > 0) {
            tracing::info!(category = dir, files = count, "saved");
        }
        Ok(report)
    }
}

async fn count_files(output_dir: &Path) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for kind in MediaKind::ALL {
        let mut n = 0;
        if let Ok(mut entries) = tokio::fs::read_dir(output_dir.join(kind.dir_name())).await {
            while let Ok(Some(_)) = entries.next_entry().await { n += 1; }
        }
        counts.insert(kind.dir_name(), n);
    }
    counts
}
