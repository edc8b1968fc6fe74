//! Reconciles the data root against the videos a channel is expected to have.
//!
//! yt-dlp templates embed the video id as `[<id>]` in every filename, so a
//! directory listing can be matched to known videos without trusting the
//! exact expected path (titles change, dates may be missing). Files are only
//! ever read, never moved or deleted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use strum::{AsRefStr, Display};
use walkdir::WalkDir;

use crate::core::config::scanner::MIN_COMPLETE_RATIO;
use crate::core::utils::{clean_filename_part, format_filesize};
use crate::subscriptions::KnownVideo;

/// Final media containers yt-dlp produces.
pub const MEDIA_EXTENSIONS: [&str; 8] = ["mp4", "mkv", "webm", "m4a", "mp3", "opus", "mov", "flv"];

static ID_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([A-Za-z0-9_-]{6,})\]").unwrap());

/// Download state of one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Downloaded,
    Pending,
    Partial,
    Failed,
}

/// A known video joined with what is on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    /// Path relative to the data root: the file found, else the expected one
    pub filename: Option<String>,
    pub downloaded_size: u64,
    pub expected_size: Option<u64>,
    pub status: VideoStatus,
}

impl VideoRecord {
    pub fn downloaded_size_human(&self) -> String {
        format_filesize(self.downloaded_size)
    }

    pub fn expected_size_human(&self) -> Option<String> {
        self.expected_size.map(format_filesize)
    }
}

/// Per-channel download summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub total: usize,
    pub downloaded: usize,
    pub pending: usize,
    pub partial: usize,
    pub failed: usize,
    pub downloaded_bytes: u64,
    pub expected_bytes: u64,
}

impl ChannelStats {
    pub fn from_records(records: &[VideoRecord]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.status {
                VideoStatus::Downloaded => stats.downloaded += 1,
                VideoStatus::Pending => stats.pending += 1,
                VideoStatus::Partial => stats.partial += 1,
                VideoStatus::Failed => stats.failed += 1,
            }
            stats.downloaded_bytes += record.downloaded_size;
            stats.expected_bytes += record.expected_size.unwrap_or(0);
        }
        stats
    }

    /// `downloaded/total`, e.g. `3/50`.
    pub fn progress(&self) -> String {
        format!("{}/{}", self.downloaded, self.total)
    }

    pub fn downloaded_size_human(&self) -> String {
        format_filesize(self.downloaded_bytes)
    }

    pub fn expected_size_human(&self) -> String {
        format_filesize(self.expected_bytes)
    }
}

#[derive(Debug, Clone)]
struct FoundFile {
    relative: PathBuf,
    size: u64,
}

#[derive(Debug, Default)]
struct IdFiles {
    media: Option<FoundFile>,
    partial: Option<FoundFile>,
}

/// Media and partial files under a set of directories, keyed by video id.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    by_id: HashMap<String, IdFiles>,
}

fn is_partial_file(name: &str) -> bool {
    name.ends_with(".part") || name.ends_with(".ytdl") || name.contains(".part-Frag")
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MEDIA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Last `[id]` token in a filename.
pub fn video_id_from_filename(name: &str) -> Option<&str> {
    ID_TOKEN
        .captures_iter(name)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

impl DirectoryIndex {
    /// Walks each directory (relative to `data_root`) recursively.
    ///
    /// Missing directories are skipped: a channel nobody downloaded yet has
    /// no folder.
    pub fn build(data_root: &Path, directories: &[PathBuf]) -> Self {
        let mut index = Self::default();

        for dir in directories {
            let full = data_root.join(dir);
            if !full.is_dir() {
                continue;
            }

            for entry in WalkDir::new(&full).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str() else {
                    continue;
                };
                let partial = is_partial_file(name);
                if !partial && !is_media_file(entry.path()) {
                    continue;
                }
                let Some(id) = video_id_from_filename(name) else {
                    continue;
                };
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                let relative = entry
                    .path()
                    .strip_prefix(data_root)
                    .unwrap_or(entry.path())
                    .to_path_buf();
                let found = FoundFile { relative, size };

                let slot = index.by_id.entry(id.to_string()).or_default();
                let target = if partial { &mut slot.partial } else { &mut slot.media };
                // Keep the largest candidate (merged file over a leftover format stream)
                if target.as_ref().map(|f| f.size < found.size).unwrap_or(true) {
                    *target = Some(found);
                }
            }
        }

        index
    }

    fn get(&self, video_id: &str) -> Option<&IdFiles> {
        self.by_id.get(video_id)
    }
}

/// Top-level directories a channel's files can live in.
fn channel_directories(channel_name: &str, videos: &[KnownVideo]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut dirs = Vec::new();

    let candidates = std::iter::once(clean_filename_part(channel_name)).chain(videos.iter().filter_map(|v| {
        let expected = v.expected_filename.as_deref()?;
        match Path::new(expected).components().next()? {
            Component::Normal(first) if Path::new(expected).components().count() > 1 => {
                Some(first.to_string_lossy().into_owned())
            }
            _ => None,
        }
    }));

    for dir in candidates {
        if seen.insert(dir.clone()) {
            dirs.push(PathBuf::from(dir));
        }
    }
    dirs
}

fn classify(
    video: &KnownVideo,
    data_root: &Path,
    index: &DirectoryIndex,
    latest_run_failed: bool,
) -> VideoRecord {
    let expected_file = video.expected_filename.as_deref().and_then(|name| {
        let path = data_root.join(name);
        let meta = fs_err::metadata(&path).ok().filter(|m| m.is_file())?;
        Some(FoundFile {
            relative: PathBuf::from(name),
            size: meta.len(),
        })
    });

    let indexed = index.get(&video.video_id);
    let media = expected_file.or_else(|| indexed.and_then(|f| f.media.clone()));
    let partial = indexed.and_then(|f| f.partial.clone());

    let (status, found) = match (media, partial) {
        (Some(file), _) => {
            let undersized = video
                .expected_size
                .filter(|expected| *expected > 0)
                .map(|expected| (file.size as f64) < expected as f64 * MIN_COMPLETE_RATIO)
                .unwrap_or(false);
            let status = if undersized {
                VideoStatus::Partial
            } else {
                VideoStatus::Downloaded
            };
            (status, Some(file))
        }
        (None, Some(file)) => (VideoStatus::Partial, Some(file)),
        (None, None) if latest_run_failed => (VideoStatus::Failed, None),
        (None, None) => (VideoStatus::Pending, None),
    };

    VideoRecord {
        video_id: video.video_id.clone(),
        title: video.title.clone(),
        filename: found
            .as_ref()
            .map(|f| f.relative.to_string_lossy().into_owned())
            .or_else(|| video.expected_filename.clone()),
        downloaded_size: found.map(|f| f.size).unwrap_or(0),
        expected_size: video.expected_size,
        status,
    }
}

/// Reconciles a channel's known videos with the files under `data_root`.
///
/// `latest_run_failed` turns missing videos from pending into failed.
/// Records come back in the order of `videos`.
pub fn scan_channel(
    data_root: &Path,
    channel_name: &str,
    videos: &[KnownVideo],
    latest_run_failed: bool,
) -> Vec<VideoRecord> {
    if videos.is_empty() {
        return Vec::new();
    }

    let index = DirectoryIndex::build(data_root, &channel_directories(channel_name, videos));
    videos
        .iter()
        .map(|video| classify(video, data_root, &index, latest_run_failed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn video(id: &str, expected_size: Option<u64>) -> KnownVideo {
        KnownVideo {
            video_id: id.to_string(),
            title: format!("Title {}", id),
            expected_filename: Some(format!("Chan/2024-01-01 - Title {} [{}].mp4", id, id)),
            expected_size,
            channel_id: Some("UC1".into()),
            created_at: String::new(),
        }
    }

    fn write(root: &Path, relative: &str, size: usize) {
        let path = root.join(relative);
        fs_err::create_dir_all(path.parent().unwrap()).unwrap();
        fs_err::write(path, vec![0u8; size]).unwrap();
    }

    fn status_of(records: &[VideoRecord], id: &str) -> VideoStatus {
        records.iter().find(|r| r.video_id == id).unwrap().status
    }

    #[test]
    fn test_status_matrix() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        // complete at the expected path
        write(root, "Chan/2024-01-01 - Title aaaaaa1 [aaaaaa1].mp4", 1000);
        // undersized
        write(root, "Chan/2024-01-01 - Title bbbbbb2 [bbbbbb2].mp4", 100);
        // only a .part file
        write(root, "Chan/2024-01-01 - Title cccccc3 [cccccc3].mp4.part", 400);
        // renamed on disk but carries the id
        write(root, "Chan/sub/Other Title [eeeeee5].mkv", 10);
        // sidecars are ignored
        write(root, "Chan/2024-01-01 - Title dddddd4 [dddddd4].info.json", 10);

        let videos = vec![
            video("aaaaaa1", Some(1000)),
            video("bbbbbb2", Some(1000)),
            video("cccccc3", Some(1000)),
            video("dddddd4", None),
            video("eeeeee5", None),
        ];

        let records = scan_channel(root, "Chan", &videos, false);
        assert_eq!(status_of(&records, "aaaaaa1"), VideoStatus::Downloaded);
        assert_eq!(status_of(&records, "bbbbbb2"), VideoStatus::Partial);
        assert_eq!(status_of(&records, "cccccc3"), VideoStatus::Partial);
        assert_eq!(status_of(&records, "dddddd4"), VideoStatus::Pending);
        assert_eq!(status_of(&records, "eeeeee5"), VideoStatus::Downloaded);

        let renamed = records.iter().find(|r| r.video_id == "eeeeee5").unwrap();
        assert_eq!(renamed.filename.as_deref(), Some("Chan/sub/Other Title [eeeeee5].mkv"));
        assert_eq!(renamed.downloaded_size, 10);
    }

    #[test]
    fn test_half_expected_size_is_the_boundary() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "Chan/2024-01-01 - Title aaaaaa1 [aaaaaa1].mp4", 500);
        write(root, "Chan/2024-01-01 - Title bbbbbb2 [bbbbbb2].mp4", 499);
        write(root, "Chan/2024-01-01 - Title cccccc3 [cccccc3].mp4", 1);

        let videos = vec![
            video("aaaaaa1", Some(1000)),
            video("bbbbbb2", Some(1000)),
            // zero means unknown, never undersized
            video("cccccc3", Some(0)),
        ];

        let records = scan_channel(root, "Chan", &videos, false);
        assert_eq!(status_of(&records, "aaaaaa1"), VideoStatus::Downloaded);
        assert_eq!(status_of(&records, "bbbbbb2"), VideoStatus::Partial);
        assert_eq!(status_of(&records, "cccccc3"), VideoStatus::Downloaded);
    }

    #[test]
    fn test_missing_after_failed_run_is_failed() {
        let dir = tempdir().unwrap();
        let records = scan_channel(dir.path(), "Chan", &[video("aaaaaa1", None)], true);
        assert_eq!(records[0].status, VideoStatus::Failed);
        assert_eq!(records[0].downloaded_size, 0);
        assert_eq!(
            records[0].filename.as_deref(),
            Some("Chan/2024-01-01 - Title aaaaaa1 [aaaaaa1].mp4")
        );
    }

    #[test]
    fn test_present_file_beats_failed_run() {
        let dir = tempdir().unwrap();
        write(dir.path(), "Chan/2024-01-01 - Title aaaaaa1 [aaaaaa1].mp4", 10);
        let records = scan_channel(dir.path(), "Chan", &[video("aaaaaa1", None)], true);
        assert_eq!(records[0].status, VideoStatus::Downloaded);
    }

    #[test]
    fn test_zero_downloaded_reports_zero_of_n() {
        let dir = tempdir().unwrap();
        let videos: Vec<KnownVideo> = (0..3).map(|i| video(&format!("vid{:04}", i), Some(2048))).collect();

        let stats = ChannelStats::from_records(&scan_channel(dir.path(), "Chan", &videos, false));
        assert_eq!(stats.progress(), "0/3");
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.downloaded_size_human(), "0 B");
        assert_eq!(stats.expected_size_human(), "6.0 KB");
    }

    #[test]
    fn test_stats_counts() {
        let dir = tempdir().unwrap();
        write(dir.path(), "Chan/2024-01-01 - Title aaaaaa1 [aaaaaa1].mp4", 1536);
        let videos = vec![video("aaaaaa1", Some(1536)), video("bbbbbb2", Some(512))];

        let stats = ChannelStats::from_records(&scan_channel(dir.path(), "Chan", &videos, true));
        assert_eq!(
            stats,
            ChannelStats {
                total: 2,
                downloaded: 1,
                pending: 0,
                partial: 0,
                failed: 1,
                downloaded_bytes: 1536,
                expected_bytes: 2048,
            }
        );
        assert_eq!(stats.downloaded_size_human(), "1.5 KB");
    }

    #[test]
    fn test_empty_channel() {
        let dir = tempdir().unwrap();
        assert!(scan_channel(dir.path(), "Chan", &[], false).is_empty());
        assert_eq!(ChannelStats::from_records(&[]).progress(), "0/0");
    }

    #[test]
    fn test_video_id_from_filename() {
        assert_eq!(video_id_from_filename("x [abc] - y [dQw4w9WgXcQ].mp4"), Some("dQw4w9WgXcQ"));
        assert_eq!(video_id_from_filename("no id.mp4"), None);
    }

    #[test]
    fn test_partial_file_names() {
        assert!(is_partial_file("a [x].mp4.part"));
        assert!(is_partial_file("a [x].f137.mp4.part-Frag12"));
        assert!(is_partial_file("a [x].mp4.ytdl"));
        assert!(!is_partial_file("a [x].mp4"));
    }
}
