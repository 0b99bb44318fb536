//! Component C: the on-disk/on-wire cache entry codec.
//!
//! ```text
//! <Header-Name>: <value>\n
//! <Header-Name>: <value>\n
//! ...
//! \n
//! <body bytes>
//! ```
//!
//! A blank line (CRLF or LF) terminates the header block; everything after
//! it is the body verbatim. The codec round-trips: `decode(encode(e)) == e`
//! up to per-name value order (order across distinct names may be lost).

use bytes::Bytes;
use http::{HeaderName, HeaderValue};
use proxycache_types::{CacheEntry, HeaderEntries, ProxyError, Result};

/// Encodes a cache entry to its wire/on-disk byte representation.
pub fn encode(entry: &CacheEntry) -> Vec<u8> {
    let mut out = Vec::with_capacity(entry.size() + 2);
    for (name, value) in entry.headers.iter() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.push(b'\n');
    }
    out.push(b'\n');
    out.extend_from_slice(&entry.body);
    out
}

/// Decodes a cache entry from its wire/on-disk byte representation.
///
/// Rejects a header line without `: `, a missing blank-line separator, or
/// bytes that don't form a valid header name/value.
pub fn decode(bytes: &[u8]) -> Result<CacheEntry> {
    let mut headers = HeaderEntries::new();
    let mut pos = 0usize;
    loop {
        let nl = memchr_newline(&bytes[pos..]).ok_or(ProxyError::Codec(
            "missing blank line separating headers from body",
        ))?;
        let line_end = pos + nl;
        let mut line = &bytes[pos..line_end];
        // Strip a trailing CR so both CRLF and LF line endings are accepted.
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        pos = line_end + 1;
        if line.is_empty() {
            // Blank line: header block is done, the rest is body.
            let body = Bytes::copy_from_slice(&bytes[pos..]);
            return Ok(CacheEntry { headers, body });
        }
        let sep = find_subslice(line, b": ")
            .ok_or(ProxyError::Codec("header line without \": \" separator"))?;
        let name = HeaderName::from_bytes(&line[..sep])?;
        let value = HeaderValue::from_bytes(&line[sep + 2..])?;
        headers.push(name, value);
    }
}

fn memchr_newline(haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == b'\n')
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
