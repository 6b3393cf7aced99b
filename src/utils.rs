use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// Marks a wordlist line as a comment.
pub const COMMENT_PREFIX: char = '#';

/// Returns the candidate password carried by a wordlist line, or `None` for
/// comment and empty lines. A trailing carriage return is dropped so CRLF
/// wordlists behave like LF ones; no other whitespace is touched.
pub fn candidate_from_line(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
        None
    } else {
        Some(line)
    }
}

/// Turns one raw wordlist line into text. The line terminator is removed at
/// the byte level and invalid UTF-8 is replaced rather than rejected, so
/// latin-1 entries still reach the prober.
pub fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

/// Attempts per second, zero until any time has passed.
pub fn attempts_per_second(completed: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        completed as f64 / secs
    } else {
        0.0
    }
}

pub fn validate_url(url: &str) -> Result<Url, url::ParseError> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(url::ParseError::InvalidDomainCharacter),
    }
}
