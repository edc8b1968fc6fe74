use thiserror::Error;

/// Centralized error types for the library
///
/// Every fallible operation in `tubecore` returns this enum so the web layer
/// can decide between an inline message and a status code, and the scheduler
/// can log and move on.
///
/// # Example
///
/// ```no_run
/// use tubecore::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The URL is already subscribed
    #[error("Subscription already exists: {0}")]
    Duplicate(String),

    /// No such subscription / channel
    #[error("Not found: {0}")]
    NotFound(String),

    /// The URL could not be classified as video, channel or playlist
    #[error("Unsupported URL: {0}")]
    InvalidUrl(String),

    /// The downloader parameter string does not parse
    #[error("Invalid downloader parameters: {0}")]
    InvalidParameters(String),

    /// yt-dlp ran but reported a failure (or produced unusable output)
    #[error("yt-dlp error: {0}")]
    Tool(String),

    /// An external process exceeded its time budget
    #[error("Process timed out after {0}s")]
    Timeout(u64),

    /// Start-up configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Errors that come from user input rather than the system.
    ///
    /// The web layer shows these inline instead of logging them as failures.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::Duplicate(_) | AppError::NotFound(_) | AppError::InvalidUrl(_) | AppError::InvalidParameters(_)
        )
    }
}

impl From<refinery::Error> for AppError {
    fn from(err: refinery::Error) -> Self {
        AppError::Migration(err.to_string())
    }
}
