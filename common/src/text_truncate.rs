/// Shortens upstream response bodies before they end up in errors and log lines.
pub fn truncate_with_count(s: &str, limit: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= limit {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(limit).collect();
        let remaining = char_count - limit;
        format!("{truncated}...({remaining} more chars)")
    }
}

/// Flattens a response body onto one line and truncates it.
pub fn log_snippet(body: &str, limit: usize) -> String {
    let single_line = body.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_with_count(&single_line, limit)
}
