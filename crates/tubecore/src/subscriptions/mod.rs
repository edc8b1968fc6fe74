//! Subscription model: what the user tracks, plus the rows derived from it.
//!
//! A subscription is keyed by its URL. Its kind is decided once, on add, and
//! never changes; the channel link is filled in later by enrichment and is
//! write-once.

pub mod classify;
pub mod db;

pub use classify::classify_url;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// What a subscription URL points at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Video,
    Channel,
    Playlist,
}

/// A tracked URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub url: String,
    pub kind: SubscriptionKind,
    /// Resolved channel (None until enrichment has run)
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub created_at: String,
}

impl Subscription {
    /// Channel name for display, or a placeholder while enrichment is pending.
    pub fn display_name(&self) -> &str {
        self.channel_name.as_deref().unwrap_or("Processing...")
    }
}

/// A channel resolved from yt-dlp metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub channel_id: String,
    pub name: String,
    /// Poster path relative to the data root
    pub poster_path: Option<String>,
    pub created_at: String,
}

/// A video the tool told us about; the scanner checks it against the disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownVideo {
    pub video_id: String,
    pub title: String,
    /// Path relative to the data root
    pub expected_filename: Option<String>,
    pub expected_size: Option<u64>,
    pub channel_id: Option<String>,
    pub created_at: String,
}

/// Insert payload for [`db::insert_video`].
#[derive(Debug, Clone, Default)]
pub struct NewVideo {
    pub video_id: String,
    pub title: String,
    pub expected_filename: Option<String>,
    pub expected_size: Option<u64>,
    pub channel_id: Option<String>,
}

/// One yt-dlp invocation for a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRun {
    pub id: i64,
    pub subscription_url: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub failure_kind: Option<String>,
    pub message: Option<String>,
}

impl DownloadRun {
    /// A run that finished unsuccessfully. Runs still in flight don't count.
    pub fn failed(&self) -> bool {
        self.finished_at.is_some() && !self.success
    }
}
