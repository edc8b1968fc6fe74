//! Persisted process-wide options.
//!
//! The options live in a small JSON file next to the database. They are read
//! once at start, changed through the web API, and written back on every
//! change (write to a temp file, then rename).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::core::error::{AppError, AppResult};
use crate::ytdlp::args::split_parameters;

/// Default yt-dlp parameters for new installations.
pub const DEFAULT_PARAMETERS: &str = concat!(
    r#"-f "bv[vcodec^=av01][height<=1080]+ba/bv[ext=mp4][height<=1080]+ba/b[height<=1080]" "#,
    "--merge-output-format mp4 ",
    r#"-o "%(uploader)s/%(upload_date>%Y-%m-%d)s - %(title)s [%(id)s].%(ext)s" "#,
    r#"--write-subs --sub-langs "en.*" "#,
    "--download-archive data/downloaded.txt ",
    "--sponsorblock-mark all ",
    "--sponsorblock-remove sponsor ",
    "--embed-metadata ",
    "--embed-thumbnail ",
    "--write-info-json ",
    "--write-description ",
    "--write-thumbnail ",
    "--convert-thumbnail jpg ",
    r#"-P "data""#,
);

/// Options as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Extra yt-dlp arguments, shell-quoted, applied to every download
    #[serde(default)]
    pub parameters: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            parameters: DEFAULT_PARAMETERS.to_string(),
        }
    }
}

/// File-backed options with an in-memory copy.
pub struct OptionsStore {
    path: PathBuf,
    current: RwLock<Options>,
}

impl OptionsStore {
    /// Loads options from `path`, creating the file with defaults when missing.
    pub fn load(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();

        let options = if path.exists() {
            let raw = fs_err::read_to_string(&path)?;
            let options: Options = serde_json::from_str(&raw)
                .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
            log::info!("Loaded options from {}", path.display());
            options
        } else {
            let options = Options::default();
            write_atomically(&path, &options)?;
            log::info!("Created {} with default parameters", path.display());
            options
        };

        Ok(Self {
            path,
            current: RwLock::new(options),
        })
    }

    /// Store that is never written to disk. Used by tests and dry runs.
    pub fn in_memory(options: Options) -> Self {
        Self {
            path: PathBuf::new(),
            current: RwLock::new(options),
        }
    }

    pub fn get(&self) -> Options {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn parameters(&self) -> String {
        self.get().parameters
    }

    /// Replaces the downloader parameters and persists them.
    ///
    /// Rejects strings that don't split into arguments (e.g. an unbalanced
    /// quote), so the scheduler never picks up a broken command line.
    pub fn set_parameters(&self, parameters: &str) -> AppResult<()> {
        let parameters = parameters.trim();
        split_parameters(parameters)?;

        let updated = {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.parameters = parameters.to_string();
            guard.clone()
        };

        if !self.path.as_os_str().is_empty() {
            write_atomically(&self.path, &updated)?;
        }
        log::info!("Downloader parameters updated");
        Ok(())
    }
}

fn write_atomically(path: &Path, options: &Options) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs_err::write(&tmp, serde_json::to_string_pretty(options)?)?;
    fs_err::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_load_creates_file_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config").join("options.json");

        let store = OptionsStore::load(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.parameters(), DEFAULT_PARAMETERS);
    }

    #[test]
    fn test_set_parameters_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("options.json");

        let store = OptionsStore::load(&path).unwrap();
        store.set_parameters("  -f best -o \"%(title)s.%(ext)s\"  ").unwrap();

        let reloaded = OptionsStore::load(&path).unwrap();
        assert_eq!(reloaded.parameters(), "-f best -o \"%(title)s.%(ext)s\"");
    }

    #[test]
    fn test_set_parameters_rejects_unbalanced_quotes() {
        let store = OptionsStore::in_memory(Options::default());
        let result = store.set_parameters("-o \"unterminated");
        assert!(matches!(result, Err(AppError::InvalidParameters(_))));
        assert_eq!(store.parameters(), DEFAULT_PARAMETERS);
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(OptionsStore::load(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn test_default_parameters_split() {
        let args = split_parameters(DEFAULT_PARAMETERS).unwrap();
        assert!(args.contains(&"--merge-output-format".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("data"));
    }
}
