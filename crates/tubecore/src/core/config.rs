use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Expands `~` and returns an owned path.
fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Data root: one directory per channel, served under /static/data
/// Read from DATA_DIR environment variable
/// Default: data
pub static DATA_DIR: Lazy<PathBuf> =
    Lazy::new(|| expand_path(&env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())));

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: config/app.db
pub static DATABASE_PATH: Lazy<PathBuf> =
    Lazy::new(|| expand_path(&env::var("DATABASE_PATH").unwrap_or_else(|_| "config/app.db".to_string())));

/// Persisted options file (downloader parameters)
/// Read from OPTIONS_PATH environment variable
/// Default: config/options.json
pub static OPTIONS_PATH: Lazy<PathBuf> =
    Lazy::new(|| expand_path(&env::var("OPTIONS_PATH").unwrap_or_else(|_| "config/options.json".to_string())));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: tubewatch.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "tubewatch.log".to_string()));

/// Web server configuration
pub mod web {
    use once_cell::sync::Lazy;
    use std::env;

    /// Bind address, WEB_HOST (default 0.0.0.0)
    pub static HOST: Lazy<String> = Lazy::new(|| env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()));

    /// Listen port, WEB_PORT (default 5000)
    pub static PORT: Lazy<u16> = Lazy::new(|| {
        env::var("WEB_PORT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(5000)
    });
}

/// Scheduler configuration
pub mod scheduler {
    use once_cell::sync::Lazy;
    use std::env;
    use std::time::Duration;

    /// Minutes between download cycles, SCHEDULER_INTERVAL_MINUTES (default 120)
    pub static INTERVAL_MINUTES: Lazy<u64> = Lazy::new(|| {
        env::var("SCHEDULER_INTERVAL_MINUTES")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .filter(|v: &u64| *v > 0)
            .unwrap_or(120)
    });

    /// Scheduler interval duration
    pub fn interval() -> Duration {
        Duration::from_secs(*INTERVAL_MINUTES * 60)
    }
}

/// yt-dlp invocation timeouts
pub mod ytdlp {
    use super::Duration;

    /// Timeout for a full subscription download (in seconds)
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 3600; // 1 hour for large channels

    /// Timeout for JSON metadata queries (in seconds)
    pub const METADATA_TIMEOUT_SECS: u64 = 30;

    /// Timeout for listing a channel's videos (in seconds)
    pub const CHANNEL_LISTING_TIMEOUT_SECS: u64 = 60;

    pub fn download_timeout() -> Duration {
        Duration::from_secs(DOWNLOAD_TIMEOUT_SECS)
    }

    pub fn metadata_timeout() -> Duration {
        Duration::from_secs(METADATA_TIMEOUT_SECS)
    }

    pub fn channel_listing_timeout() -> Duration {
        Duration::from_secs(CHANNEL_LISTING_TIMEOUT_SECS)
    }
}

/// Enrichment / discovery configuration
pub mod discovery {
    use super::Duration;

    /// Maximum number of videos discovered per channel on enrichment
    pub const MAX_VIDEOS_PER_CHANNEL: usize = 50;

    /// Timeout for downloading a channel poster (in seconds)
    pub const POSTER_TIMEOUT_SECS: u64 = 30;

    pub fn poster_timeout() -> Duration {
        Duration::from_secs(POSTER_TIMEOUT_SECS)
    }
}

/// File scanner heuristics
pub mod scanner {
    /// A final media file smaller than this share of the expected size is partial
    pub const MIN_COMPLETE_RATIO: f64 = 0.5;
}

/// Push channel configuration
pub mod events {
    /// Buffered events per subscriber before slow clients start lagging
    pub const CHANNEL_CAPACITY: usize = 256;
}
