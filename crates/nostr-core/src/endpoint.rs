//! Endpoint URL validation and normalization for relays and mints.

use thiserror::Error;

/// Why an endpoint URL was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidEndpoint {
    #[error("URL is empty")]
    Empty,
    #[error("URL must start with {expected}")]
    UnsupportedScheme { expected: &'static str },
    #[error("URL has no host")]
    MissingHost,
    #[error("URL contains whitespace")]
    Whitespace,
}

/// Normalize a relay URL (`ws://` or `wss://`).
///
/// Scheme and host are lowercased and trailing slashes dropped, so two
/// spellings of the same relay compare equal.
pub fn normalize_relay_url(input: &str) -> Result<String, InvalidEndpoint> {
    normalize(input, &["wss", "ws"], "ws:// or wss://")
}

/// Normalize a mint URL (`http://` or `https://`).
pub fn normalize_mint_url(input: &str) -> Result<String, InvalidEndpoint> {
    normalize(input, &["https", "http"], "http:// or https://")
}

fn normalize(
    input: &str,
    schemes: &[&str],
    expected: &'static str,
) -> Result<String, InvalidEndpoint> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InvalidEndpoint::Empty);
    }

    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or(InvalidEndpoint::UnsupportedScheme { expected })?;
    let scheme = scheme.to_ascii_lowercase();
    if !schemes.contains(&scheme.as_str()) {
        return Err(InvalidEndpoint::UnsupportedScheme { expected });
    }

    if rest.chars().any(char::is_whitespace) {
        return Err(InvalidEndpoint::Whitespace);
    }

    let rest = rest.trim_end_matches('/');
    let (host, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };
    if host.is_empty() {
        return Err(InvalidEndpoint::MissingHost);
    }

    Ok(format!("{scheme}://{}{path}", host.to_ascii_lowercase()))
}
