//! Scripted [`Downloader`] for tests.
//!
//! Responses are registered up front as raw yt-dlp JSON, so tests exercise
//! the same parsing the real binary's output goes through. Every call is
//! recorded for later assertions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::core::error::{AppError, AppResult};
use crate::ytdlp::errors::summarize_stderr;
use crate::ytdlp::{analyze_stderr, channel_videos_url, Downloader, Entry, RunOutcome, YtDlpInfo};

#[derive(Debug, Default)]
struct Calls {
    metadata: Vec<String>,
    details: Vec<String>,
    downloads: Vec<(String, String)>,
}

/// In-memory downloader with canned responses.
#[derive(Debug, Default)]
pub struct MockDownloader {
    metadata: HashMap<String, String>,
    details: HashMap<String, String>,
    filenames: HashMap<String, String>,
    download_failures: HashMap<String, String>,
    download_delay: Option<Duration>,
    version: Option<String>,
    calls: Mutex<Calls>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn parse(json: &str) -> AppResult<YtDlpInfo> {
    Ok(serde_json::from_str(json)?)
}

impl MockDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// `fetch_metadata(url)` returns this JSON.
    pub fn with_metadata(mut self, url: &str, json: &str) -> Self {
        self.metadata.insert(url.to_string(), json.to_string());
        self
    }

    /// `list_channel_videos(channel_id)` returns the entries of this JSON.
    pub fn with_channel_videos(self, channel_id: &str, json: &str) -> Self {
        let url = channel_videos_url(channel_id);
        self.with_metadata(&url, json)
    }

    pub fn with_video_details(mut self, video_id: &str, json: &str) -> Self {
        self.details.insert(video_id.to_string(), json.to_string());
        self
    }

    /// `expected_filename(video_id, _)` returns `filename`; unregistered ids fail.
    pub fn with_filename(mut self, video_id: &str, filename: &str) -> Self {
        self.filenames.insert(video_id.to_string(), filename.to_string());
        self
    }

    /// `download(url, _)` exits 1 with this stderr.
    pub fn with_download_failure(mut self, url: &str, stderr: &str) -> Self {
        self.download_failures.insert(url.to_string(), stderr.to_string());
        self
    }

    /// Every download sleeps this long.
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    fn calls(&self) -> MutexGuard<'_, Calls> {
        match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn metadata_calls(&self) -> usize {
        self.calls().metadata.len()
    }

    pub fn detail_calls(&self) -> usize {
        self.calls().details.len()
    }

    /// URLs passed to `download`, in call order.
    pub fn downloaded_urls(&self) -> Vec<String> {
        self.calls().downloads.iter().map(|(url, _)| url.clone()).collect()
    }

    /// Parameters passed to the most recent `download`.
    pub fn last_parameters(&self) -> Option<String> {
        self.calls().downloads.last().map(|(_, params)| params.clone())
    }

    /// Highest number of downloads that ran at the same time.
    pub fn max_concurrent_downloads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn fetch_metadata(&self, url: &str) -> AppResult<YtDlpInfo> {
        self.calls().metadata.push(url.to_string());
        match self.metadata.get(url) {
            Some(json) => parse(json),
            None => Err(AppError::Tool(format!("ERROR: Unsupported URL: {}", url))),
        }
    }

    async fn list_channel_videos(&self, channel_id: &str) -> AppResult<Vec<Entry>> {
        let info = self.fetch_metadata(&channel_videos_url(channel_id)).await?;
        Ok(info.entries.into_iter().flatten().collect())
    }

    async fn video_details(&self, video_id: &str) -> AppResult<YtDlpInfo> {
        self.calls().details.push(video_id.to_string());
        match self.details.get(video_id) {
            Some(json) => parse(json),
            None => Err(AppError::Tool(format!("ERROR: [youtube] {}: Video unavailable", video_id))),
        }
    }

    async fn expected_filename(&self, video_id: &str, _parameters: &str) -> AppResult<String> {
        self.filenames
            .get(video_id)
            .cloned()
            .ok_or_else(|| AppError::Tool(format!("no filename for {}", video_id)))
    }

    async fn download(&self, url: &str, parameters: &str) -> AppResult<RunOutcome> {
        self.calls().downloads.push((url.to_string(), parameters.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(match self.download_failures.get(url) {
            Some(stderr) => RunOutcome::failed(
                Some(1),
                analyze_stderr(stderr),
                summarize_stderr(stderr).unwrap_or_else(|| stderr.clone()),
            ),
            None => RunOutcome::succeeded(),
        })
    }

    async fn version(&self) -> AppResult<String> {
        Ok(self.version.clone().unwrap_or_else(|| "2024.01.01".to_string()))
    }
}
