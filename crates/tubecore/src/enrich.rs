//! Background enrichment of a freshly added subscription.
//!
//! Resolves the channel behind the URL, fetches its poster and seeds the
//! discovery cache with the videos the scanner should look for. Progress is
//! pushed to the browser through the event bus as each step completes.

use serde_json::json;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::utils::clean_filename_part;
use crate::events::{Event, Namespace};
use crate::service::SubscriptionService;
use crate::storage::get_connection;
use crate::subscriptions::{db, NewVideo, SubscriptionKind};
use crate::ytdlp::{ChannelInfo, YtDlpInfo};

/// Filename used when yt-dlp can't tell us the real one.
pub fn fallback_filename(uploader: &str, title: &str, video_id: &str) -> String {
    format!(
        "{}/Unknown-Date - {} [{}].mp4",
        clean_filename_part(uploader),
        clean_filename_part(title),
        video_id
    )
}

impl SubscriptionService {
    /// Runs every enrichment step for `url`.
    ///
    /// `prefetched` is metadata already fetched while classifying the URL.
    /// Only a failed metadata fetch aborts; poster and discovery failures are
    /// logged and reported but the subscription stays usable.
    pub async fn enrich(&self, url: &str, prefetched: Option<YtDlpInfo>) -> AppResult<()> {
        let subscription = self.get(url)?.ok_or_else(|| AppError::NotFound(url.to_string()))?;
        log::info!("Starting enrichment for {}", url);

        let info = match prefetched {
            Some(info) => info,
            None => {
                self.events.enrichment("metadata_fetch", url, "Fetching URL metadata...");
                match self.downloader.fetch_metadata(url).await {
                    Ok(info) => info,
                    Err(e) => {
                        log::error!("Could not get metadata for {}: {}", url, e);
                        self.events.enrichment("error", url, "Failed to fetch URL metadata");
                        return Err(e);
                    }
                }
            }
        };

        self.events.enrichment("channel_info", url, "Extracting channel information...");
        let channel = info.channel_info();

        match &channel {
            Some(channel) => self.setup_channel(url, subscription.kind, &info, channel).await?,
            None => log::warn!("No channel id in metadata for {}", url),
        }

        match subscription.kind {
            SubscriptionKind::Video => self.record_single_video(url, &info, channel.as_ref()).await?,
            SubscriptionKind::Channel => {
                if let Some(channel) = &channel {
                    self.events.enrichment(
                        "video_discovery_start",
                        url,
                        format!("Starting video discovery for channel: {}", channel.name),
                    );
                    match self.discover_channel_videos(channel).await {
                        Ok(added) => self.events.enrichment(
                            "video_discovery_complete",
                            url,
                            format!("Video discovery complete for {} ({} new)", channel.name, added),
                        ),
                        Err(e) => {
                            log::error!("Video discovery failed for {}: {}", channel.channel_id, e);
                            self.events.enrichment(
                                "video_discovery_error",
                                url,
                                format!("Video discovery failed for {}", channel.name),
                            );
                        }
                    }
                }
            }
            SubscriptionKind::Playlist => {
                let name = channel.as_ref().map(|c| c.name.as_str()).unwrap_or("Unknown");
                log::info!("Playlist subscription detected: {}", name);
                self.events.enrichment(
                    "playlist_detected",
                    url,
                    format!("Playlist subscription detected: {}", name),
                );
            }
        }

        let subscription = self.get(url)?;
        self.events.emit(Event::new(
            Namespace::SubscriptionEnrichment,
            "complete",
            json!({
                "url": url,
                "message": "Subscription enrichment complete!",
                "subscription": subscription,
            }),
        ));
        log::info!("Enrichment finished for {}", url);
        Ok(())
    }

    /// Upserts the channel, links it and makes sure it has a poster.
    async fn setup_channel(
        &self,
        url: &str,
        kind: SubscriptionKind,
        info: &YtDlpInfo,
        channel: &ChannelInfo,
    ) -> AppResult<()> {
        self.events.enrichment("channel_setup", url, format!("Setting up channel: {}", channel.name));
        {
            let conn = get_connection(&self.pool)?;
            db::upsert_channel(&conn, &channel.channel_id, &channel.name)?;
            if !db::attach_channel(&conn, url, &channel.channel_id)? {
                log::debug!("{} already linked to a channel", url);
            }
        }

        self.events.emit(Event::new(
            Namespace::SubscriptionEnrichment,
            "channel_ready",
            json!({
                "url": url,
                "channel": channel.name,
                "channel_id": channel.channel_id,
                "type": kind,
                "message": format!("Channel info loaded for {}, starting content discovery...", channel.name),
            }),
        ));

        self.events.enrichment("thumbnail_download", url, format!("Downloading thumbnail for {}...", channel.name));
        match self.fetch_poster(kind, info, channel).await {
            Ok(Some(poster)) => {
                let conn = get_connection(&self.pool)?;
                db::set_channel_poster(&conn, &channel.channel_id, &poster)?;
                self.events.enrichment("thumbnail_complete", url, format!("Thumbnail downloaded for {}", channel.name));
            }
            Ok(None) => log::warn!("No avatar found for {}", channel.name),
            Err(e) => log::warn!("Poster download failed for {}: {}", channel.name, e),
        }
        Ok(())
    }

    /// Finds the channel's avatar and stores it as its poster.
    ///
    /// A channel subscription's own metadata usually carries the avatar;
    /// otherwise the channel page is fetched.
    async fn fetch_poster(
        &self,
        kind: SubscriptionKind,
        info: &YtDlpInfo,
        channel: &ChannelInfo,
    ) -> AppResult<Option<String>> {
        if let Some(existing) = self.posters.existing_poster(&channel.name) {
            log::info!("Poster already exists for {}", channel.name);
            return Ok(Some(existing));
        }

        let avatar = match info.best_avatar_url().filter(|_| kind == SubscriptionKind::Channel) {
            Some(avatar) => Some(avatar),
            None => {
                let channel_url = format!("https://www.youtube.com/channel/{}", channel.channel_id);
                self.downloader.fetch_metadata(&channel_url).await?.best_avatar_url()
            }
        };

        match avatar {
            Some(avatar) => Ok(Some(self.posters.download_poster(&channel.name, &avatar).await?)),
            None => Ok(None),
        }
    }

    async fn record_single_video(&self, url: &str, info: &YtDlpInfo, channel: Option<&ChannelInfo>) -> AppResult<()> {
        let Some(video_id) = info.id.as_deref().filter(|id| !id.is_empty()) else {
            log::warn!("No video id in metadata for {}", url);
            return Ok(());
        };
        let title = info.title.clone().unwrap_or_else(|| "Unknown Title".to_string());
        self.events.enrichment("video_add", url, format!("Adding video: {}", title));

        let uploader = info
            .uploader
            .as_deref()
            .or(channel.map(|c| c.name.as_str()))
            .unwrap_or("Unknown");
        let expected_filename = self.expected_filename_or_fallback(video_id, &title, uploader).await;

        let video = NewVideo {
            video_id: video_id.to_string(),
            title,
            expected_filename: Some(expected_filename),
            expected_size: info.expected_size(),
            channel_id: channel.map(|c| c.channel_id.clone()),
        };
        let conn = get_connection(&self.pool)?;
        if db::insert_video(&conn, &video)? {
            log::info!("Added video {} ({})", video.title, video.video_id);
        }
        Ok(())
    }

    async fn expected_filename_or_fallback(&self, video_id: &str, title: &str, uploader: &str) -> String {
        let parameters = self.options.parameters();
        match self.downloader.expected_filename(video_id, &parameters).await {
            Ok(filename) if !filename.is_empty() => filename,
            Ok(_) => fallback_filename(uploader, title, video_id),
            Err(e) => {
                log::debug!("Falling back to default filename for {}: {}", video_id, e);
                fallback_filename(uploader, title, video_id)
            }
        }
    }

    /// Seeds the discovery cache with a channel's most recent uploads.
    ///
    /// Already known videos are skipped. Returns how many were added.
    pub async fn discover_channel_videos(&self, channel: &ChannelInfo) -> AppResult<usize> {
        let mut entries = self.downloader.list_channel_videos(&channel.channel_id).await?;
        entries.truncate(config::discovery::MAX_VIDEOS_PER_CHANNEL);
        let total = entries.len();
        log::info!("Processing {} videos for channel {}", total, channel.name);

        let mut added = 0;
        for (index, entry) in entries.iter().enumerate() {
            let Some(video_id) = entry.id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };

            let known = {
                let conn = get_connection(&self.pool)?;
                db::video_exists(&conn, video_id)?
            };

            if !known {
                let details = match self.downloader.video_details(video_id).await {
                    Ok(details) => Some(details),
                    Err(e) => {
                        log::warn!("No details for {}, using listing data: {}", video_id, e);
                        None
                    }
                };

                let title = details
                    .as_ref()
                    .and_then(|d| d.title.clone())
                    .or_else(|| entry.title.clone())
                    .unwrap_or_else(|| "Unknown Title".to_string());
                let uploader = details
                    .as_ref()
                    .and_then(|d| d.uploader.clone())
                    .unwrap_or_else(|| channel.name.clone());
                let expected_filename = self.expected_filename_or_fallback(video_id, &title, &uploader).await;

                let video = NewVideo {
                    video_id: video_id.to_string(),
                    title,
                    expected_filename: Some(expected_filename),
                    expected_size: details.as_ref().and_then(YtDlpInfo::expected_size),
                    channel_id: Some(channel.channel_id.clone()),
                };
                let conn = get_connection(&self.pool)?;
                if db::insert_video(&conn, &video)? {
                    added += 1;
                }
            }

            self.events.progress(
                Namespace::VideoDiscovery,
                index + 1,
                total,
                format!("Processed {}/{} videos", index + 1, total),
                json!({ "channel_id": channel.channel_id, "video_id": video_id }),
            );
        }

        self.events.emit(Event::new(
            Namespace::VideoDiscovery,
            "complete",
            json!({ "channel_id": channel.channel_id, "total": total, "added": added }),
        ));
        log::info!("Added {} new videos for channel {}", added, channel.name);
        Ok(added)
    }
}
