//! Channel poster download.
//!
//! Posters live next to the channel's videos as `<data>/<channel>/poster.jpg`
//! so media servers pick them up. Callers check [`PosterFetcher::existing_poster`]
//! first; a download always overwrites.

use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::utils::clean_filename_part;

pub const POSTER_FILE_NAME: &str = "poster.jpg";

/// Poster location for a channel, relative to the data root.
pub fn poster_relative_path(channel_name: &str) -> String {
    format!("{}/{}", clean_filename_part(channel_name), POSTER_FILE_NAME)
}

/// Downloads channel posters over HTTP.
#[derive(Debug, Clone)]
pub struct PosterFetcher {
    client: Client,
    data_root: PathBuf,
}

impl PosterFetcher {
    pub fn new(data_root: impl Into<PathBuf>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config::discovery::poster_timeout())
            .user_agent(concat!("tubewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            data_root: data_root.into(),
        })
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Poster path relative to the data root, if the channel already has one.
    pub fn existing_poster(&self, channel_name: &str) -> Option<String> {
        let relative = poster_relative_path(channel_name);
        self.data_root.join(&relative).is_file().then_some(relative)
    }

    /// Downloads `url` as the channel's poster.
    ///
    /// Returns the poster path relative to the data root.
    pub async fn download_poster(&self, channel_name: &str, url: &str) -> AppResult<String> {
        let relative = poster_relative_path(channel_name);
        let dest = self.data_root.join(&relative);

        if let Some(parent) = dest.parent() {
            fs_err::tokio::create_dir_all(parent).await?;
        }

        let tmp_path = dest.with_file_name(format!("{}.part", POSTER_FILE_NAME));

        let mut resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Tool(format!("poster download for {} failed with {}", channel_name, status)));
        }

        let mut dst = fs_err::tokio::File::create(&tmp_path).await?;
        while let Some(chunk) = resp.chunk().await? {
            dst.write_all(&chunk).await?;
        }
        dst.flush().await?;
        drop(dst);
        fs_err::tokio::rename(&tmp_path, &dest).await?;

        log::info!("Downloaded poster for {} to {}", channel_name, dest.display());
        Ok(relative)
    }
}
