//! yt-dlp failure classification.
//!
//! yt-dlp reports everything through stderr text, so the kind of failure is
//! recovered by matching known phrases.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

/// Why a yt-dlp invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Cookies are missing, expired or rotated
    InvalidCookies,
    /// YouTube flagged the request as automated
    BotDetection,
    /// Private, removed or region-locked
    VideoUnavailable,
    Network,
    /// Killed after the invocation timeout
    Timeout,
    Unknown,
}

/// Classifies yt-dlp stderr output.
///
/// Checks run from most to least specific: a cookie error often also
/// mentions "sign in", which would otherwise look like bot detection.
pub fn analyze_stderr(stderr: &str) -> FailureKind {
    let stderr = stderr.to_lowercase();

    if stderr.contains("cookies are no longer valid")
        || stderr.contains("cookies have likely been rotated")
        || stderr.contains("sign in to confirm you're not a bot")
        || stderr.contains("please sign in")
        || stderr.contains("use --cookies-from-browser")
        || stderr.contains("use --cookies for the authentication")
    {
        return FailureKind::InvalidCookies;
    }

    if stderr.contains("bot detection")
        || stderr.contains("http error 403")
        || stderr.contains("unable to extract")
        || stderr.contains("signature extraction failed")
    {
        return FailureKind::BotDetection;
    }

    if stderr.contains("private video")
        || stderr.contains("video unavailable")
        || stderr.contains("this video is not available")
        || stderr.contains("video is private")
        || stderr.contains("video has been removed")
        || stderr.contains("this video does not exist")
        || stderr.contains("video is not available")
    {
        return FailureKind::VideoUnavailable;
    }

    if stderr.contains("timed out") {
        return FailureKind::Timeout;
    }

    if stderr.contains("timeout")
        || stderr.contains("connection")
        || stderr.contains("network")
        || stderr.contains("socket")
        || stderr.contains("dns")
        || stderr.contains("failed to connect")
    {
        return FailureKind::Network;
    }

    FailureKind::Unknown
}

/// Last `ERROR:` line of stderr, or its last non-empty line.
pub fn summarize_stderr(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
}
