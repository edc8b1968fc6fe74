//! Parameter string handling.
//!
//! Users configure yt-dlp with one shell-quoted string. It is split with
//! POSIX shell-word rules, so `-o "%(title)s [%(id)s].%(ext)s"` stays one
//! argument.

use crate::core::error::{AppError, AppResult};

/// Options that take a value and influence the output filename.
const FILENAME_OPTIONS: [&str; 7] = ["-f", "--format", "-o", "--output", "--merge-output-format", "-P", "--paths"];

/// Splits a parameter string into arguments.
///
/// # Errors
///
/// [`AppError::InvalidParameters`] when quoting is unbalanced.
///
/// # Examples
///
/// ```
/// use tubecore::ytdlp::args::split_parameters;
///
/// let args = split_parameters(r#"-o "%(title)s.%(ext)s" --embed-metadata"#).unwrap();
/// assert_eq!(args, vec!["-o", "%(title)s.%(ext)s", "--embed-metadata"]);
/// assert!(split_parameters(r#"-o "unterminated"#).is_err());
/// ```
pub fn split_parameters(parameters: &str) -> AppResult<Vec<String>> {
    shell_words::split(parameters).map_err(|e| AppError::InvalidParameters(format!("{}: {}", e, parameters)))
}

/// Keeps only the arguments that decide where a download lands.
///
/// Handles both `--opt value` and `--opt=value` spellings. Everything else
/// (subtitles, sponsorblock, archives) is dropped so `--print filename`
/// stays cheap and side-effect free.
pub fn filename_relevant_args(args: &[String]) -> Vec<String> {
    let mut kept = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if FILENAME_OPTIONS.contains(&arg.as_str()) {
            if let Some(value) = iter.next() {
                kept.push(arg.clone());
                kept.push(value.clone());
            }
            continue;
        }

        if let Some((name, _)) = arg.split_once('=') {
            if FILENAME_OPTIONS.contains(&name) {
                kept.push(arg.clone());
            }
        }
    }

    kept
}

/// Value of the last `-P/--paths` argument, if any.
///
/// Only the plain form is considered; `TYPE:PATH` forms don't set the
/// home directory.
pub fn paths_value(args: &[String]) -> Option<String> {
    let mut found = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let value = match arg.as_str() {
            "-P" | "--paths" => iter.next().cloned(),
            other => other.strip_prefix("--paths=").map(str::to_string),
        };
        if let Some(value) = value {
            if !value.contains(':') || value.starts_with('/') {
                found = Some(value);
            }
        }
    }

    found
}
