//! URL classification by pattern.
//!
//! Recognised layouts:
//! - video: `/watch?v=ID`, `youtu.be/ID`, `/shorts/ID`, `/live/ID`, `/embed/ID`
//! - playlist: `/playlist?list=ID`
//! - channel: `/@handle`, `/channel/ID`, `/c/NAME`, `/user/NAME` (tabs allowed)
//!
//! Pure function of the input string: no network, no state.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::SubscriptionKind;

static VIDEO_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{6,}$").unwrap());

static HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@[\w.\-·]+$").unwrap());

const YOUTUBE_HOSTS: [&str; 4] = ["youtube.com", "www.youtube.com", "m.youtube.com", "music.youtube.com"];

/// Classifies a subscription URL into video, channel or playlist.
///
/// Returns `None` when the URL doesn't match a known layout; callers may then
/// fall back to asking yt-dlp.
///
/// # Examples
///
/// ```
/// use tubecore::subscriptions::{classify_url, SubscriptionKind};
///
/// assert_eq!(classify_url("https://www.youtube.com/@veritasium"), Some(SubscriptionKind::Channel));
/// assert_eq!(classify_url("https://youtu.be/dQw4w9WgXcQ"), Some(SubscriptionKind::Video));
/// assert_eq!(classify_url("https://example.com/"), None);
/// ```
pub fn classify_url(raw: &str) -> Option<SubscriptionKind> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let url = if raw.contains("://") {
        Url::parse(raw).ok()?
    } else {
        Url::parse(&format!("https://{}", raw)).ok()?
    };

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let host = url.host_str()?.to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if host == "youtu.be" {
        return match segments.first() {
            Some(id) if VIDEO_ID.is_match(id) => Some(SubscriptionKind::Video),
            _ => None,
        };
    }

    if !YOUTUBE_HOSTS.contains(&host.as_str()) {
        return None;
    }

    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    };

    match segments.as_slice() {
        ["watch", ..] => query("v")
            .filter(|id| VIDEO_ID.is_match(id))
            .map(|_| SubscriptionKind::Video),
        ["playlist", ..] => query("list").map(|_| SubscriptionKind::Playlist),
        ["shorts" | "live" | "embed" | "v", id, ..] if VIDEO_ID.is_match(id) => Some(SubscriptionKind::Video),
        [handle, ..] if HANDLE.is_match(handle) => Some(SubscriptionKind::Channel),
        ["channel" | "c" | "user", _, ..] => Some(SubscriptionKind::Channel),
        _ => None,
    }
}
