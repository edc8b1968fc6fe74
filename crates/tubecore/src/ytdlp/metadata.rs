//! Typed view over `yt-dlp -J` output.
//!
//! Only the fields this crate reads are modelled; everything else in the
//! JSON is ignored. All fields are optional because flat listings, channel
//! tabs and full video extractions each fill in a different subset.

use serde::{Deserialize, Deserializer};

use crate::subscriptions::SubscriptionKind;

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Sizes sometimes come back as floats (`filesize_approx`).
fn size_to_bytes(size: Option<f64>) -> Option<u64> {
    size.filter(|s| s.is_finite() && *s >= 0.0).map(|s| s as u64)
}

/// One thumbnail candidate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Thumbnail {
    fn area(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }

    /// Square-ish image that isn't a cropped banner.
    fn looks_like_avatar(&self) -> bool {
        let (Some(width), Some(height)) = (self.width, self.height) else {
            return false;
        };
        if width == 0 || height == 0 {
            return false;
        }
        let aspect = f64::from(width) / f64::from(height);
        (0.8..=1.25).contains(&aspect) && !self.url.contains("fcrop64") && !self.url.to_lowercase().contains("banner")
    }
}

/// A format yt-dlp picked for a merged download.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestedFormat {
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

impl RequestedFormat {
    fn size(&self) -> Option<u64> {
        size_to_bytes(self.filesize).or_else(|| size_to_bytes(self.filesize_approx))
    }
}

/// Entry of a flat playlist listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// Parsed `yt-dlp -J` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YtDlpInfo {
    #[serde(rename = "_type")]
    pub kind: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub channel_id: Option<String>,
    pub uploader: Option<String>,
    pub uploader_id: Option<String>,
    pub extractor: Option<String>,
    pub extractor_key: Option<String>,
    pub avatar_uncropped: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnails: Vec<Thumbnail>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entries: Vec<Option<Entry>>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requested_formats: Vec<RequestedFormat>,
}

/// Channel identity pulled out of metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub channel_id: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl YtDlpInfo {
    /// Subscription kind implied by the metadata.
    ///
    /// `_type` decides first (a playlist produced by a channel extractor is a
    /// channel); otherwise the extractor name is mapped.
    pub fn subscription_kind(&self) -> Option<SubscriptionKind> {
        match self.kind.as_deref() {
            Some("playlist") => {
                return match self.extractor_key.as_deref() {
                    Some("YoutubeTab" | "YoutubeChannel") => Some(SubscriptionKind::Channel),
                    _ => Some(SubscriptionKind::Playlist),
                };
            }
            Some("video") => return Some(SubscriptionKind::Video),
            Some("channel" | "url_transparent") => return Some(SubscriptionKind::Channel),
            _ => {}
        }

        match self.extractor.as_deref() {
            Some("youtube") => Some(SubscriptionKind::Video),
            Some("youtube:playlist") => Some(SubscriptionKind::Playlist),
            Some("youtube:channel" | "youtube:user" | "youtube:tab") => Some(SubscriptionKind::Channel),
            _ => None,
        }
    }

    /// Channel name and id, when the metadata carries an id.
    pub fn channel_info(&self) -> Option<ChannelInfo> {
        let channel_id = non_empty(&self.channel_id).or_else(|| non_empty(&self.uploader_id))?;
        let name = non_empty(&self.channel)
            .or_else(|| non_empty(&self.uploader))
            .or_else(|| non_empty(&self.title))
            .unwrap_or("Unknown Channel");
        Some(ChannelInfo {
            name: name.to_string(),
            channel_id: channel_id.to_string(),
        })
    }

    /// Best URL for a channel poster.
    ///
    /// `avatar_uncropped` when present, else the largest avatar-shaped
    /// thumbnail, else the smallest thumbnail of any shape.
    pub fn best_avatar_url(&self) -> Option<String> {
        if let Some(url) = non_empty(&self.avatar_uncropped) {
            return Some(url.to_string());
        }

        let thumbnails = self.thumbnails.iter().filter(|t| !t.url.is_empty());

        thumbnails
            .clone()
            .filter(|t| t.looks_like_avatar())
            .max_by_key(|t| t.area())
            .or_else(|| thumbnails.min_by_key(|t| t.area()))
            .map(|t| t.url.clone())
    }

    /// Expected download size in bytes.
    pub fn expected_size(&self) -> Option<u64> {
        if let Some(size) = size_to_bytes(self.filesize).or_else(|| size_to_bytes(self.filesize_approx)) {
            return Some(size);
        }

        let sizes: Vec<u64> = self.requested_formats.iter().filter_map(RequestedFormat::size).collect();
        if sizes.is_empty() {
            None
        } else {
            Some(sizes.iter().sum())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> YtDlpInfo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_kind_from_type() {
        assert_eq!(
            parse(r#"{"_type": "playlist", "extractor_key": "YoutubeTab"}"#).subscription_kind(),
            Some(SubscriptionKind::Channel)
        );
        assert_eq!(
            parse(r#"{"_type": "playlist", "extractor_key": "YoutubePlaylist"}"#).subscription_kind(),
            Some(SubscriptionKind::Playlist)
        );
        assert_eq!(parse(r#"{"_type": "video"}"#).subscription_kind(), Some(SubscriptionKind::Video));
        assert_eq!(
            parse(r#"{"_type": "url_transparent"}"#).subscription_kind(),
            Some(SubscriptionKind::Channel)
        );
    }

    #[test]
    fn test_kind_from_extractor() {
        assert_eq!(parse(r#"{"extractor": "youtube"}"#).subscription_kind(), Some(SubscriptionKind::Video));
        assert_eq!(
            parse(r#"{"extractor": "youtube:user"}"#).subscription_kind(),
            Some(SubscriptionKind::Channel)
        );
        assert_eq!(parse(r#"{"extractor": "vimeo"}"#).subscription_kind(), None);
        assert_eq!(parse("{}").subscription_kind(), None);
    }

    #[test]
    fn test_channel_info_fallbacks() {
        let info = parse(r#"{"uploader": "Up", "title": "T", "uploader_id": "@up"}"#);
        assert_eq!(
            info.channel_info(),
            Some(ChannelInfo {
                name: "Up".into(),
                channel_id: "@up".into()
            })
        );

        let info = parse(r#"{"channel": "Chan", "channel_id": "UC1", "uploader_id": "@up"}"#);
        assert_eq!(info.channel_info().unwrap().channel_id, "UC1");

        assert!(parse(r#"{"channel": "No id"}"#).channel_info().is_none());
    }

    #[test]
    fn test_avatar_prefers_uncropped() {
        let info = parse(
            r#"{"avatar_uncropped": "https://img/avatar", "thumbnails": [{"url": "https://img/t", "width": 10, "height": 10}]}"#,
        );
        assert_eq!(info.best_avatar_url().as_deref(), Some("https://img/avatar"));
    }

    #[test]
    fn test_avatar_skips_banners() {
        let info = parse(
            r#"{"thumbnails": [
                {"url": "https://img/banner=w2560-fcrop64", "width": 2560, "height": 424},
                {"url": "https://img/small", "width": 88, "height": 88},
                {"url": "https://img/large", "width": 900, "height": 900},
                {"url": "https://img/banner_square", "width": 1000, "height": 1000}
            ]}"#,
        );
        assert_eq!(info.best_avatar_url().as_deref(), Some("https://img/large"));
    }

    #[test]
    fn test_avatar_falls_back_to_smallest() {
        let info = parse(
            r#"{"thumbnails": [
                {"url": "https://img/wide", "width": 1920, "height": 1080},
                {"url": "https://img/wider", "width": 1280, "height": 720}
            ]}"#,
        );
        assert_eq!(info.best_avatar_url().as_deref(), Some("https://img/wider"));
        assert_eq!(parse("{}").best_avatar_url(), None);
    }

    #[test]
    fn test_expected_size() {
        assert_eq!(parse(r#"{"filesize": 10, "filesize_approx": 20}"#).expected_size(), Some(10));
        assert_eq!(parse(r#"{"filesize_approx": 20.7}"#).expected_size(), Some(20));
        assert_eq!(
            parse(r#"{"requested_formats": [{"filesize": 100}, {"filesize_approx": 50}, {}]}"#).expected_size(),
            Some(150)
        );
        assert_eq!(parse("{}").expected_size(), None);
    }

    #[test]
    fn test_null_entries_parse() {
        let info = parse(r#"{"entries": [{"id": "a"}, null, {"title": "no id"}, {"id": "b"}]}"#);
        let ids: Vec<_> = info.entries.iter().flatten().map(|e| e.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("a"), None, Some("b")]);
    }
}
