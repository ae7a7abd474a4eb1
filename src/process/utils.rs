// src/process/utils.rs

/// Values the spreadsheet (or an earlier export of it) uses for "nothing here".
const PLACEHOLDERS: [&str; 4] = ["", "nan", "none", "null"];

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Header text as compared against configured column names: cleaned, with
/// runs of whitespace (including line breaks inside a header cell) collapsed.
pub fn clean_header(raw: &str) -> String {
    clean_str(raw).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lookup key for a human-readable label: header-cleaned and lower-cased.
pub fn label_key(raw: &str) -> String {
    clean_header(raw).to_lowercase()
}

pub fn is_placeholder(raw: &str) -> bool {
    let cleaned = clean_str(raw).to_lowercase();
    PLACEHOLDERS.contains(&cleaned.as_str())
}

/// Split a comma-separated list of free-text entries, dropping placeholders.
pub fn split_entries(text: &str) -> Vec<String> {
    text.split(',')
        .map(clean_str)
        .filter(|s| !is_placeholder(s))
        .collect()
}

/// Cut `s` to at most `max` characters, never inside a UTF-8 sequence.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
