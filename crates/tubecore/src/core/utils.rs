/// Cleans a channel name or title so it can be used as a single path component.
///
/// Mirrors how the output template lays out channel directories: path
/// separators become `-`, surrounding whitespace is dropped. Leading dots are
/// stripped so the result can never be `.`, `..` or a hidden entry.
///
/// # Example
///
/// ```
/// use tubecore::core::utils::clean_filename_part;
///
/// assert_eq!(clean_filename_part(" AC/DC "), "AC-DC");
/// assert_eq!(clean_filename_part(".."), "Unknown");
/// ```
pub fn clean_filename_part(name: &str) -> String {
    let cleaned = name.replace(['/', '\\'], "-");
    let cleaned = cleaned
        .trim()
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        "Unknown".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Formats a byte count for humans, base 1024.
///
/// # Example
///
/// ```
/// use tubecore::core::utils::format_filesize;
///
/// assert_eq!(format_filesize(0), "0 B");
/// assert_eq!(format_filesize(1536), "1.5 KB");
/// ```
pub fn format_filesize(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
