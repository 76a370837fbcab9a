use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

use crate::extract::{extract_media, MediaRef};
use crate::naming::MediaKind;
use crate::types::Post;

pub const DEFAULT_WORKERS: usize = 16;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0";

/// A unique reference with its resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub reference: MediaRef,
    pub kind: MediaKind,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub job: DownloadJob,
    pub success: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub outcomes: Vec<DownloadOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Reported once per finished job, in completion order.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub current: usize,
    pub total: usize,
    pub current_item: String,
    pub success: bool,
}

/// Extract every post, keep the first reference seen for each address and place it under
/// `output_dir/<kind>/`.
pub fn plan_downloads(posts: &[Post], output_dir: &Path) -> Vec<DownloadJob> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut jobs = Vec::new();
    for reference in posts.iter().flat_map(extract_media) {
        if !seen.insert(reference.url.clone()) { continue; }
        let kind = MediaKind::from_file_name(&reference.file_name);
        let destination = output_dir.join(kind.dir_name()).join(&reference.file_name);
        jobs.push(DownloadJob { reference, kind, destination });
    }
    jobs
}

/// Retrieves one address into one file.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Plain HTTP GET with browser-like headers so CDNs do not reject the default client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(user_agent).context("invalid user agent")?);
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let client = reqwest::Client::builder().default_headers(headers).timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(destination, &bytes).await.with_context(|| format!("writing {}", destination.display()))?;
        Ok(())
    }
}

/// Runs jobs on a bounded set of spawned tasks. Each job is tried once; a failure only
/// affects its own outcome.
pub struct FetchCoordinator {
    fetcher: Arc<dyn Fetch>,
    workers: usize,
}

impl FetchCoordinator {
    pub fn new(fetcher: Arc<dyn Fetch>, workers: usize) -> Self {
        Self { fetcher, workers: workers.max(1) }
    }

    pub fn workers(&self) -> usize { self.workers }

    pub async fn run(&self, jobs: Vec<DownloadJob>) -> FetchSummary {
        self.run_with_progress(jobs, |_| {}).await
    }

    /// Same as [`run`](Self::run), calling `progress_callback` after every completion.
    pub async fn run_with_progress<F>(&self, jobs: Vec<DownloadJob>, mut progress_callback: F) -> FetchSummary
    where
        F: FnMut(DownloadProgress),
    {
        let total = jobs.len();
        let mut completions = stream::iter(jobs)
            .map(|job| {
                let fetcher = Arc::clone(&self.fetcher);
                let handle = tokio::spawn({
                    let job = job.clone();
                    async move { fetch_one(fetcher.as_ref(), &job).await }
                });
                async move {
                    let success = match handle.await {
                        Ok(ok) => ok,
                        Err(e) => {
                            tracing::error!(url = %job.reference.url, error = %e, "download task aborted");
                            false
                        }
                    };
                    DownloadOutcome { job, success }
                }
            })
            .buffer_unordered(self.workers);

        // single point of accumulation; no shared counters between tasks
        let mut summary = FetchSummary { outcomes: Vec::with_capacity(total), ..Default::default() };
        while let Some(outcome) = completions.next().await {
            if outcome.success { summary.succeeded += 1 } else { summary.failed += 1 }
            progress_callback(DownloadProgress {
                current: summary.succeeded + summary.failed,
                total,
                current_item: outcome.job.reference.file_name.clone(),
                success: outcome.success,
            });
            summary.outcomes.push(outcome);
        }
        summary
    }
}

async fn fetch_one(fetcher: &dyn Fetch, job: &DownloadJob) -> bool {
    match fetcher.fetch(&job.reference.url, &job.destination).await {
        Ok(()) => {
            tracing::debug!(file = %job.reference.file_name, "downloaded");
            true
        }
        Err(e) => {
            tracing::debug!(url = %job.reference.url, error = %format!("{e:#}"), "download failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job(url: &str, name: &str, dir: &Path) -> DownloadJob {
        let kind = MediaKind::from_file_name(name);
        DownloadJob {
            reference: MediaRef { url: url.to_string(), file_name: name.to_string() },
            kind,
            destination: dir.join(kind.dir_name()).join(name),
        }
    }

    /// Fails every address containing `fail`, tracks peak concurrency.
    #[derive(Default)]
    struct FakeFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetch for FakeFetcher {
        async fn fetch(&self, url: &str, _destination: &Path) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(url.to_string());
            if url.contains("fail") { anyhow::bail!("boom") }
            Ok(())
        }
    }

    #[test]
    fn plan_dedups_by_address_across_posts() {
        let posts: Vec<Post> = vec![
            serde_json::from_value(json!({"id": "a", "title": "one", "url_overridden_by_dest": "http://x/same.jpg"})).unwrap(),
            serde_json::from_value(json!({"id": "b", "title": "two", "url_overridden_by_dest": "http://x/same.jpg"})).unwrap(),
            serde_json::from_value(json!({"id": "c", "title": "three", "url_overridden_by_dest": "http://x/SAME.jpg"})).unwrap(),
        ];
        let jobs = plan_downloads(&posts, Path::new("/out"));
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].reference.file_name, "a_one.jpg");
        assert_eq!(jobs[0].destination, PathBuf::from("/out/images/a_one.jpg"));
        assert_eq!(jobs[1].reference.url, "http://x/SAME.jpg");
    }

    #[test]
    fn plan_classifies_by_name() {
        let post: Post = serde_json::from_value(json!({
            "id": "v", "title": "t", "is_video": true,
            "media": {"reddit_video": {"fallback_url": "http://v/DASH_480.mp4"}},
            "preview": {"images": [{"source": {"url": "http://p/raw"}}]}
        })).unwrap();
        let jobs = plan_downloads(&[post], Path::new("out"));
        let kinds: Vec<_> = jobs.iter().map(|j| j.kind).collect();
        assert_eq!(kinds, [MediaKind::Video, MediaKind::Video, MediaKind::Other]);
        assert_eq!(jobs[2].destination, PathBuf::from("out/other/v_t_preview.bin"));
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let dir = Path::new("/unused");
        let fake = Arc::new(FakeFetcher::default());
        let coordinator = FetchCoordinator::new(fake.clone(), 4);
        let jobs = vec![job("http://a/ok.jpg", "ok.jpg", dir), job("http://a/fail.mp4", "fail.mp4", dir), job("http://a/ok2.gif", "ok2.gif", dir)];

        let summary = coordinator.run(jobs).await;
        assert_eq!((summary.succeeded, summary.failed), (2, 1));
        assert_eq!(summary.outcomes.len(), 3);
        let failed: Vec<_> = summary.outcomes.iter().filter(|o| !o.success).map(|o| o.job.reference.url.as_str()).collect();
        assert_eq!(failed, ["http://a/fail.mp4"]);
        assert_eq!(fake.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_workers() {
        let dir = Path::new("/unused");
        let fake = Arc::new(FakeFetcher::default());
        let coordinator = FetchCoordinator::new(fake.clone(), 3);
        let jobs: Vec<_> = (0..20).map(|i| job(&format!("http://a/{i}.jpg"), &format!("{i}.jpg"), dir)).collect();

        let mut reports = Vec::new();
        let summary = coordinator.run_with_progress(jobs, |p| reports.push(p.current)).await;
        assert_eq!(summary.succeeded, 20);
        assert!(fake.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(reports, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn zero_workers_is_clamped() {
        let coordinator = FetchCoordinator::new(Arc::new(FakeFetcher::default()), 0);
        assert_eq!(coordinator.workers(), 1);
    }

    #[tokio::test]
    async fn http_fetcher_writes_body_and_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .and(header("user-agent", BROWSER_USER_AGENT))
            .and(header("accept", "*/*"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("images").join("nested").join("img.png");
        let fetcher = HttpFetcher::new(BROWSER_USER_AGENT, Duration::from_secs(5)).unwrap();
        fetcher.fetch(&format!("{}/img.png", server.uri()), &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"PNGDATA");
    }

    #[tokio::test]
    async fn http_fetcher_treats_error_status_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("missing.mp4");
        let fetcher = HttpFetcher::new(BROWSER_USER_AGENT, Duration::from_secs(5)).unwrap();
        assert!(fetcher.fetch(&format!("{}/DASH_audio.mp4", server.uri()), &dest).await.is_err());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn http_fetcher_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let fetcher = HttpFetcher::new(BROWSER_USER_AGENT, Duration::from_millis(200)).unwrap();
        assert!(fetcher.fetch(&server.uri(), &tmp.path().join("slow.jpg")).await.is_err());
    }

    #[tokio::test]
    async fn companion_audio_404_does_not_affect_video() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/DASH_480.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"VIDEO".to_vec()))
            .mount(&server).await;
        Mock::given(method("GET")).and(path("/DASH_audio.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server).await;

        let post: Post = serde_json::from_value(json!({
            "id": "v", "title": "clip", "is_video": true,
            "media": {"reddit_video": {"fallback_url": format!("{}/DASH_480.mp4", server.uri())}}
        })).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let jobs = plan_downloads(&[post], tmp.path());
        let fetcher = Arc::new(HttpFetcher::new(BROWSER_USER_AGENT, Duration::from_secs(5)).unwrap());
        let summary = FetchCoordinator::new(fetcher, DEFAULT_WORKERS).run(jobs).await;

        assert_eq!((summary.succeeded, summary.failed), (1, 1));
        let video = summary.outcomes.iter().find(|o| o.job.reference.file_name == "v_clip_video.mp4").unwrap();
        assert!(video.success);
        assert_eq!(std::fs::read(tmp.path().join("videos/v_clip_video.mp4")).unwrap(), b"VIDEO");
    }
}
