//! Component A: parses a raw `Cache-Control` header value into a directive
//! key set and a `max-age` duration.

use std::collections::HashSet;
use std::time::Duration;

/// The parsed form of a `Cache-Control` header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    /// Every directive name seen, recognized or not, bare or valued.
    pub keys: HashSet<String>,
    /// The parsed `max-age` value, or zero if absent or malformed.
    pub max_age: Duration,
}

impl CacheControl {
    /// True if `key` (e.g. `"no-store"`) was present in the header.
    pub fn has(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Parses a `Cache-Control` header value, possibly empty or multi-directive.
///
/// Splits on `,`, trims whitespace per element. Each element is `key` or
/// `key=value`; unrecognized directives are recorded in `keys` with no value
/// interpretation. `max-age=<int seconds>` is parsed as a non-negative
/// integer; on parse failure the numeric value stays zero but the key is
/// still recorded.
pub fn parse(value: &str) -> CacheControl {
    let mut cc = CacheControl::default();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('=') {
            Some((key, val)) => {
                let key = key.trim().to_ascii_lowercase();
                if key == "max-age" {
                    if let Ok(secs) = val.trim().trim_matches('"').parse::<u64>() {
                        cc.max_age = Duration::from_secs(secs);
                    }
                }
                cc.keys.insert(key);
            }
            None => {
                cc.keys.insert(part.to_ascii_lowercase());
            }
        }
    }
    cc
}
