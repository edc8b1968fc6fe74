//! `SubscriptionService`: the single entry point the web layer, CLI and
//! scheduler use.
//!
//! It owns the pool, the downloader, the options and the event bus, and
//! serializes downloads behind one job lock.

use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::error::{AppError, AppResult};
use crate::core::options::OptionsStore;
use crate::events::EventBus;
use crate::scanner::{scan_channel, ChannelStats, VideoRecord};
use crate::storage::{get_connection, DbPool};
use crate::subscriptions::{classify_url, db, DownloadRun, Subscription};
use crate::thumbnail::PosterFetcher;
use crate::ytdlp::{Downloader, FailureKind, RunOutcome, YtDlpInfo};

/// A subscription with everything the list view shows.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub stats: ChannelStats,
    pub poster_path: Option<String>,
    pub last_run: Option<DownloadRun>,
}

pub struct SubscriptionService {
    pub(crate) pool: DbPool,
    pub(crate) downloader: Arc<dyn Downloader>,
    pub(crate) options: Arc<OptionsStore>,
    pub(crate) events: EventBus,
    pub(crate) posters: PosterFetcher,
    /// Held for the duration of a download
    job_lock: Mutex<()>,
}

impl SubscriptionService {
    pub fn new(
        pool: DbPool,
        downloader: Arc<dyn Downloader>,
        options: Arc<OptionsStore>,
        events: EventBus,
        data_root: impl Into<PathBuf>,
    ) -> AppResult<Self> {
        Ok(Self {
            pool,
            downloader,
            options,
            events,
            posters: PosterFetcher::new(data_root)?,
            job_lock: Mutex::new(()),
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn data_root(&self) -> &Path {
        self.posters.data_root()
    }

    // ── subscriptions ──────────────────────────────────────────────────────

    /// Adds a subscription.
    ///
    /// The kind comes from the URL layout; when the layout is unknown,
    /// yt-dlp is asked and its metadata decides. The metadata fetched that
    /// way is returned so enrichment doesn't fetch it twice.
    pub async fn add(&self, url: &str) -> AppResult<(Subscription, Option<YtDlpInfo>)> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::InvalidUrl("empty URL".to_string()));
        }

        {
            let conn = get_connection(&self.pool)?;
            if db::get_subscription(&conn, url)?.is_some() {
                return Err(AppError::Duplicate(url.to_string()));
            }
        }

        let (kind, prefetched) = match classify_url(url) {
            Some(kind) => (kind, None),
            None => {
                log::info!("Unrecognised URL layout, asking yt-dlp: {}", url);
                let info = self.downloader.fetch_metadata(url).await.map_err(|e| {
                    log::warn!("Metadata lookup failed for {}: {}", url, e);
                    AppError::InvalidUrl(url.to_string())
                })?;
                let kind = info
                    .subscription_kind()
                    .ok_or_else(|| AppError::InvalidUrl(url.to_string()))?;
                (kind, Some(info))
            }
        };

        let conn = get_connection(&self.pool)?;
        let subscription = db::insert_subscription(&conn, url, kind, None)?;
        log::info!("Added {} subscription {}", kind, url);
        self.events.enrichment("started", url, "Starting subscription enrichment...");

        Ok((subscription, prefetched))
    }

    /// Adds a subscription and enriches it in the background.
    pub async fn add_and_enrich(self: &Arc<Self>, url: &str) -> AppResult<Subscription> {
        let (subscription, prefetched) = self.add(url).await?;

        let service = Arc::clone(self);
        let url = subscription.url.clone();
        tokio::spawn(async move {
            if let Err(e) = service.enrich(&url, prefetched).await {
                log::error!("Enrichment failed for {}: {}", url, e);
            }
        });

        Ok(subscription)
    }

    /// Removes a subscription. `false` when it didn't exist.
    pub fn remove(&self, url: &str) -> AppResult<bool> {
        let conn = get_connection(&self.pool)?;
        let removed = db::delete_subscription(&conn, url)?;
        if removed {
            log::info!("Removed subscription {}", url);
        } else {
            log::info!("Remove requested for unknown subscription {}", url);
        }
        Ok(removed)
    }

    pub fn get(&self, url: &str) -> AppResult<Option<Subscription>> {
        let conn = get_connection(&self.pool)?;
        db::get_subscription(&conn, url)
    }

    pub fn list(&self) -> AppResult<Vec<Subscription>> {
        let conn = get_connection(&self.pool)?;
        db::list_subscriptions(&conn)
    }

    /// All subscriptions, newest first, each with its channel's stats.
    pub fn list_with_stats(&self) -> AppResult<Vec<SubscriptionView>> {
        let conn = get_connection(&self.pool)?;
        let subscriptions = db::list_subscriptions(&conn)?;

        let mut views = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let last_run = db::latest_run(&conn, &subscription.url)?;
            let (stats, poster_path) = match subscription.channel_id.as_deref() {
                Some(channel_id) => {
                    let records = self.scan(&conn, channel_id)?;
                    let poster = db::get_channel(&conn, channel_id)?.and_then(|c| c.poster_path);
                    (ChannelStats::from_records(&records), poster)
                }
                None => (ChannelStats::default(), None),
            };
            views.push(SubscriptionView {
                subscription,
                stats,
                poster_path,
                last_run,
            });
        }
        Ok(views)
    }

    /// Known videos of a channel, reconciled with the disk.
    pub fn videos_for_channel(&self, channel_id: &str) -> AppResult<Vec<VideoRecord>> {
        let conn = get_connection(&self.pool)?;
        self.scan(&conn, channel_id)
    }

    fn scan(&self, conn: &rusqlite::Connection, channel_id: &str) -> AppResult<Vec<VideoRecord>> {
        let Some(channel) = db::get_channel(conn, channel_id)? else {
            return Ok(Vec::new());
        };
        let videos = db::videos_for_channel(conn, channel_id)?;
        let latest_failed = db::latest_run_for_channel(conn, channel_id)?
            .map(|run| run.failed())
            .unwrap_or(false);
        Ok(scan_channel(self.data_root(), &channel.name, &videos, latest_failed))
    }

    // ── downloads ──────────────────────────────────────────────────────────

    /// Runs yt-dlp for one subscription and records the run.
    ///
    /// Waits for any download already in progress. A failed invocation is a
    /// successful call: the failure is in the returned outcome.
    pub async fn process_subscription(&self, url: &str) -> AppResult<RunOutcome> {
        let _job = self.job_lock.lock().await;

        let run_id = {
            let conn = get_connection(&self.pool)?;
            if db::get_subscription(&conn, url)?.is_none() {
                return Err(AppError::NotFound(url.to_string()));
            }
            db::start_run(&conn, url)?
        };

        let parameters = self.options.parameters();
        self.events.download("started", url, json!({}));

        let outcome = match self.downloader.download(url, &parameters).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Could not run yt-dlp for {}: {}", url, e);
                let kind = match e {
                    AppError::Timeout(_) => FailureKind::Timeout,
                    _ => FailureKind::Unknown,
                };
                RunOutcome::failed(None, kind, e.to_string())
            }
        };

        {
            let conn = get_connection(&self.pool)?;
            db::finish_run(&conn, run_id, &outcome)?;
        }

        self.events.download(
            "finished",
            url,
            json!({
                "success": outcome.success,
                "exit_code": outcome.exit_code,
                "failure_kind": outcome.failure_kind,
                "message": outcome.message,
            }),
        );
        Ok(outcome)
    }

    /// Marks runs left open by a previous process as failed.
    ///
    /// Call once at startup, before the scheduler or any route can start a
    /// download.
    pub fn close_interrupted_runs(&self) -> AppResult<usize> {
        let conn = get_connection(&self.pool)?;
        let closed = db::close_interrupted_runs(&conn)?;
        if closed > 0 {
            log::warn!("Closed {} download run(s) interrupted by a restart", closed);
        }
        Ok(closed)
    }

    /// Queues an immediate download of one subscription.
    ///
    /// Returns once the subscription is known to exist; the download itself
    /// runs in the background behind the job lock.
    pub fn update_now(self: &Arc<Self>, url: &str) -> AppResult<()> {
        let subscription = self.get(url)?.ok_or_else(|| AppError::NotFound(url.to_string()))?;

        let service = Arc::clone(self);
        tokio::spawn(async move {
            let url = subscription.url.clone();
            let name = subscription.display_name().to_string();
            service
                .events
                .enrichment("update_started", &url, format!("Starting update for {}...", name));
            match service.process_subscription(&url).await {
                Ok(_) => service
                    .events
                    .enrichment("update_complete", &url, format!("Update complete for {}", name)),
                Err(e) => {
                    log::error!("Manual update failed for {}: {}", url, e);
                    service.events.enrichment("error", &url, e.to_string());
                }
            }
        });
        Ok(())
    }

    // ── options ────────────────────────────────────────────────────────────

    pub fn parameters(&self) -> String {
        self.options.parameters()
    }

    pub fn set_parameters(&self, parameters: &str) -> AppResult<()> {
        self.options.set_parameters(parameters)
    }

    pub async fn ytdlp_version(&self) -> AppResult<String> {
        self.downloader.version().await
    }
}
