//! yt-dlp invocation.
//!
//! Everything that shells out to yt-dlp goes through the [`Downloader`]
//! trait so the service, scheduler and web layer can be tested without the
//! real binary.

pub mod args;
pub mod errors;
pub mod metadata;

pub use errors::{analyze_stderr, FailureKind};
pub use metadata::{ChannelInfo, Entry, YtDlpInfo};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::process::{display_command, run_with_timeout};

/// Result of one download invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// None when the process was killed or never started
    pub exit_code: Option<i32>,
    pub success: bool,
    pub failure_kind: Option<FailureKind>,
    /// Short failure description for the UI
    pub message: Option<String>,
}

impl RunOutcome {
    pub fn succeeded() -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            failure_kind: None,
            message: None,
        }
    }

    pub fn failed(exit_code: Option<i32>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            success: false,
            failure_kind: Some(kind),
            message: Some(message.into()),
        }
    }

    /// Builds an outcome from a finished process. The exit status decides.
    pub fn from_output(output: &Output) -> Self {
        if output.status.success() {
            return Self::succeeded();
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code();
        let message = errors::summarize_stderr(&stderr).unwrap_or_else(|| match code {
            Some(code) => format!("yt-dlp exited with code {}", code),
            None => "yt-dlp was terminated by a signal".to_string(),
        });
        Self::failed(code, analyze_stderr(&stderr), message)
    }
}

/// Operations the rest of the crate needs from yt-dlp.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// `--flat-playlist -J <url>`
    async fn fetch_metadata(&self, url: &str) -> AppResult<YtDlpInfo>;

    /// Flat listing of a channel's uploads tab.
    async fn list_channel_videos(&self, channel_id: &str) -> AppResult<Vec<Entry>>;

    /// Full extraction of a single video (sizes, uploader).
    async fn video_details(&self, video_id: &str) -> AppResult<YtDlpInfo>;

    /// Path yt-dlp would write `video_id` to, relative to the data root.
    async fn expected_filename(&self, video_id: &str, parameters: &str) -> AppResult<String>;

    /// Downloads `url` with the user's parameters.
    ///
    /// A non-zero exit is reported through the outcome; `Err` is reserved
    /// for invocations that could not start (bad parameters, missing binary).
    async fn download(&self, url: &str, parameters: &str) -> AppResult<RunOutcome>;

    async fn version(&self) -> AppResult<String>;
}

/// Watch page URL for a video id.
pub fn video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Uploads tab URL for a channel id.
pub fn channel_videos_url(channel_id: &str) -> String {
    format!("https://www.youtube.com/channel/{}/videos", channel_id)
}

/// The real yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    data_dir: PathBuf,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Binary and data root from the environment.
    pub fn from_config() -> Self {
        Self::new(config::YTDL_BIN.as_str(), config::DATA_DIR.as_path())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn run(&self, args: &[String], timeout: Duration) -> AppResult<Output> {
        log::debug!("Running {}", display_command(&self.binary, args));
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        run_with_timeout(&mut cmd, timeout).await.map_err(|e| match e {
            AppError::Io(io) => AppError::Tool(format!("failed to run {}: {}", self.binary, io)),
            other => other,
        })
    }

    /// Runs yt-dlp expecting a single JSON document on stdout.
    async fn run_json(&self, args: Vec<String>, timeout: Duration) -> AppResult<YtDlpInfo> {
        let output = self.run(&args, timeout).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Tool(
                errors::summarize_stderr(&stderr).unwrap_or_else(|| format!("yt-dlp exited with {}", output.status)),
            ));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Makes a printed filename relative to the data root.
fn strip_data_root(filename: &str, roots: &[&Path]) -> String {
    let path = Path::new(filename.trim());
    for root in roots {
        if root.as_os_str().is_empty() {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(root) {
            return relative.to_string_lossy().into_owned();
        }
    }
    path.strip_prefix("./")
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[async_trait]
impl Downloader for YtDlp {
    async fn fetch_metadata(&self, url: &str) -> AppResult<YtDlpInfo> {
        let args = vec!["--flat-playlist".to_string(), "-J".to_string(), url.to_string()];
        self.run_json(args, config::ytdlp::metadata_timeout()).await
    }

    async fn list_channel_videos(&self, channel_id: &str) -> AppResult<Vec<Entry>> {
        let args = vec![
            "--flat-playlist".to_string(),
            "-J".to_string(),
            channel_videos_url(channel_id),
        ];
        let info = self.run_json(args, config::ytdlp::channel_listing_timeout()).await?;
        Ok(info.entries.into_iter().flatten().collect())
    }

    async fn video_details(&self, video_id: &str) -> AppResult<YtDlpInfo> {
        let args = vec!["-J".to_string(), video_url(video_id)];
        self.run_json(args, config::ytdlp::metadata_timeout()).await
    }

    async fn expected_filename(&self, video_id: &str, parameters: &str) -> AppResult<String> {
        let user_args = args::split_parameters(parameters)?;
        let mut cmd_args = vec!["--print".to_string(), "filename".to_string()];
        cmd_args.extend(args::filename_relevant_args(&user_args));
        cmd_args.push(video_url(video_id));

        let output = self.run(&cmd_args, config::ytdlp::metadata_timeout()).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Tool(
                errors::summarize_stderr(&stderr).unwrap_or_else(|| format!("yt-dlp exited with {}", output.status)),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .ok_or_else(|| AppError::Tool(format!("yt-dlp printed no filename for {}", video_id)))?;

        let paths = args::paths_value(&user_args).map(PathBuf::from);
        let mut roots: Vec<&Path> = Vec::new();
        if let Some(paths) = paths.as_deref() {
            roots.push(paths);
        }
        roots.push(self.data_dir.as_path());

        Ok(strip_data_root(printed, &roots))
    }

    async fn download(&self, url: &str, parameters: &str) -> AppResult<RunOutcome> {
        let mut cmd_args = args::split_parameters(parameters)?;
        cmd_args.push(url.to_string());

        log::info!("Starting download: {}", display_command(&self.binary, &cmd_args));

        let output = match self.run(&cmd_args, config::ytdlp::download_timeout()).await {
            Ok(output) => output,
            Err(AppError::Timeout(secs)) => {
                log::error!("Download of {} timed out after {}s", url, secs);
                return Ok(RunOutcome::failed(
                    None,
                    FailureKind::Timeout,
                    format!("timed out after {}s", secs),
                ));
            }
            Err(e) => return Err(e),
        };

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            log::info!("[yt-dlp] {}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            log::warn!("[yt-dlp] {}", line);
        }

        let outcome = RunOutcome::from_output(&output);
        if outcome.success {
            log::info!("Download finished for {}", url);
        } else {
            log::error!(
                "Download failed for {} (exit {:?}, {}): {}",
                url,
                outcome.exit_code,
                outcome.failure_kind.unwrap_or(FailureKind::Unknown),
                outcome.message.as_deref().unwrap_or("")
            );
        }
        Ok(outcome)
    }

    async fn version(&self) -> AppResult<String> {
        let output = self
            .run(&["--version".to_string()], config::ytdlp::metadata_timeout())
            .await?;
        if !output.status.success() {
            return Err(AppError::Tool(format!("{} --version exited with {}", self.binary, output.status)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_root() {
        let data = Path::new("data");
        assert_eq!(
            strip_data_root("data/Chan/2024-01-01 - T [abc].mp4", &[data]),
            "Chan/2024-01-01 - T [abc].mp4"
        );
        assert_eq!(strip_data_root("./Chan/x.mp4", &[data]), "Chan/x.mp4");
        assert_eq!(
            strip_data_root("/srv/media/Chan/x.mp4", &[Path::new("/srv/media"), data]),
            "Chan/x.mp4"
        );
        assert_eq!(strip_data_root("Chan/x.mp4\n", &[data]), "Chan/x.mp4");
    }

    #[test]
    fn test_urls() {
        assert_eq!(video_url("abc"), "https://www.youtube.com/watch?v=abc");
        assert_eq!(channel_videos_url("UC1"), "https://www.youtube.com/channel/UC1/videos");
    }

    #[cfg(unix)]
    #[test]
    fn test_outcome_from_output() {
        use std::os::unix::process::ExitStatusExt;

        let ok = Output {
            status: std::process::ExitStatus::from_raw(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        assert_eq!(RunOutcome::from_output(&ok), RunOutcome::succeeded());

        // Raw wait status: exit code lives in the high byte
        let failed = Output {
            status: std::process::ExitStatus::from_raw(1 << 8),
            stdout: Vec::new(),
            stderr: b"ERROR: [youtube] abc: Video unavailable\n".to_vec(),
        };
        let outcome = RunOutcome::from_output(&failed);
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(1));
        assert_eq!(outcome.failure_kind, Some(FailureKind::VideoUnavailable));
        assert_eq!(outcome.message.as_deref(), Some("ERROR: [youtube] abc: Video unavailable"));
    }
}
