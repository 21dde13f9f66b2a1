/// Parse a `[HH:]MM:SS[.mmm]` clock value into seconds.
///
/// The hour component is optional. Returns `None` for anything that is not
/// a well-formed clock value.
pub fn parse_clock(raw: &str) -> Option<f64> {
    let parts: Vec<&str> = raw.trim().split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (0u64, *m, *s),
        [h, m, s] => (h.trim().parse().ok()?, *m, *s),
        _ => return None,
    };

    let minutes: u64 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// Parse a bracketed recognizer timestamp range like
/// `[00:01.500 --> 00:04.200]` (hours optional on either side).
///
/// Returns `(start, end)` in seconds. An unrecognized line is simply not
/// progress, never an error.
pub fn parse_timestamp_range(line: &str) -> Option<(f64, f64)> {
    let open = line.find('[')?;
    let close = open + line[open..].find(']')?;
    let inner = &line[open + 1..close];

    let (start_raw, end_raw) = inner.split_once("-->")?;
    let start = parse_clock(start_raw)?;
    let end = parse_clock(end_raw)?;

    Some((start, end))
}

/// Extract a direct percent marker (`"42%"`, `"42% done"`) from a line.
/// Values above 100 are clamped.
pub fn parse_percent(line: &str) -> Option<u8> {
    let marker = line.find('%')?;
    let digits_start = line[..marker]
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);

    if digits_start == marker {
        return None;
    }

    let value: u32 = line[digits_start..marker].parse().ok()?;
    Some(value.min(100) as u8)
}

/// Format elapsed seconds as `[H:]MM:SS`, omitting the hour when zero.
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
