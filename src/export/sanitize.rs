//! Filesystem-safe names for attachments and message folders.

/// Name used when nothing usable is left of the input.
pub const PLACEHOLDER_NAME: &str = "unnamed_file";

/// Longest name produced, in characters.
pub const MAX_NAME_CHARS: usize = 200;

/// Characters that some filesystem or shell treats specially; replaced with `_`.
const REPLACED: [char; 7] = [':', '?', '*', '"', '<', '>', '|'];

/// Turn an arbitrary string into a file name that is safe on every common filesystem.
///
/// 1. path separators and control characters are removed
/// 2. `: ? * " < > |` become `_`
/// 3. the result is cut to [`MAX_NAME_CHARS`] characters and trimmed
///
/// Empty, whitespace-only, `.` and `..` results become [`PLACEHOLDER_NAME`].
/// The function is idempotent.
pub fn sanitize_file_name(name: &str) -> String {
    if name.trim().is_empty() {
        return PLACEHOLDER_NAME.to_string();
    }

    let replaced: String = name
        .chars()
        .filter(|&c| !is_forbidden(c))
        .map(|c| if REPLACED.contains(&c) { '_' } else { c })
        .take(MAX_NAME_CHARS)
        .collect();

    match replaced.trim() {
        "" | "." | ".." => PLACEHOLDER_NAME.to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Characters no mainstream filesystem accepts inside a single path component.
fn is_forbidden(c: char) -> bool {
    c == '/' || c == '\\' || c.is_control()
}

/// Human-readable size with binary units, stopping at GB.
///
/// At most two decimals are shown and trailing zeros are dropped:
/// `512 → "512 B"`, `1536 → "1.5 KB"`, `1048576 → "1 MB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let number = format!("{value:.2}");
    let number = number.trim_end_matches('0').trim_end_matches('.');
    format!("{number} {}", UNITS[unit])
}
