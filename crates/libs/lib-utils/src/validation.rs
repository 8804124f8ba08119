//! # Validation Utilities
//!
//! Input validation helpers.

/// Validate that a value looks like an absolute http(s) URL.
pub fn validate_http_url(value: &str, field_name: &str) -> Result<(), String> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));

    match rest {
        Some(host) if !host.trim().is_empty() => Ok(()),
        _ => Err(format!("{} must be an http(s) URL, got '{}'", field_name, value)),
    }
}

/// Validate that a numeric value falls inside `[min, max]`.
pub fn validate_range<T>(value: T, min: T, max: T, field_name: &str) -> Result<(), String>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        Err(format!("{} must be between {} and {}", field_name, min, max))
    } else {
        Ok(())
    }
}

/// Percent-encode a single URL path segment (collection symbols, mint addresses).
pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
