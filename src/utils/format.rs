use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

/// Pad `s` with spaces to `width` terminal columns (names may hold wide characters).
pub fn pad(s: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(s);
    if used >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - used))
    }
}

/// Widest display width among `items`, at least `min`.
pub fn column_width<'a>(items: impl IntoIterator<Item = &'a str>, min: usize) -> usize {
    items
        .into_iter()
        .map(UnicodeWidthStr::width)
        .max()
        .unwrap_or(0)
        .max(min)
}

/// "Mon 06 Jan"
pub fn short_date(d: NaiveDate) -> String {
    d.format("%a %d %b").to_string()
}

/// Create a simple ASCII progress bar
pub fn progress_bar(filled: u32, total: u32, width: usize) -> String {
    if total == 0 {
        return "░".repeat(width);
    }
    let ratio = (filled as f64 / total as f64).min(1.0);
    let filled_count = (ratio * width as f64).round() as usize;
    let empty_count = width.saturating_sub(filled_count);
    format!("{}{}", "█".repeat(filled_count), "░".repeat(empty_count))
}
