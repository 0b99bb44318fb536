//! Component B: the cacheability classifier. Three predicates, each reading
//! only the method/status and the `Cache-Control` header — nothing here
//! touches a cache tier.

use std::time::Duration;

use http::{Method, StatusCode};

use crate::cachecontrol;

/// The one-hour ceiling for memory (volatile) cacheability: a `max-age`
/// equal to or above this is not volatile — it is either durable (via
/// `immutable`/`must-revalidate`) or not cacheable at all.
const VOLATILE_MAX_AGE_CEILING: Duration = Duration::from_secs(3600);

/// The 60-day threshold past which `must-revalidate` is treated as
/// effectively immutable. This preserves a source behavior that diverges
/// from strict HTTP semantics (which require revalidation regardless of
/// `max-age`); see the design ledger for the reasoning.
const MUST_REVALIDATE_DURABLE_THRESHOLD: Duration = Duration::from_secs(60 * 24 * 60 * 60);

/// `true` iff `method` is `GET` and `cache_control` (the request's
/// `Cache-Control` value, or `""` if absent) does not contain `no-store`.
pub fn request_cacheable(method: &Method, cache_control: &str) -> bool {
    if method != Method::GET {
        return false;
    }
    !cachecontrol::parse(cache_control).has("no-store")
}

/// `true` iff a `200` response with the given `Cache-Control` value should
/// be written to the durable tiers (local + remote).
pub fn response_durably_cacheable(status: StatusCode, cache_control: &str) -> bool {
    if status != StatusCode::OK {
        return false;
    }
    let cc = cachecontrol::parse(cache_control);
    if cc.has("no-store") {
        return false;
    }
    if cc.has("immutable") {
        return true;
    }
    cc.has("must-revalidate") && cc.max_age > MUST_REVALIDATE_DURABLE_THRESHOLD
}

/// `true` iff a `200` response with the given `Cache-Control` value should
/// be written to the memory tier, along with the `max-age` to use.
///
/// `no-cache` is treated as non-cacheable here because it mandates
/// revalidation before reuse, which this system does not perform.
pub fn response_memory_cacheable(status: StatusCode, cache_control: &str) -> (Duration, bool) {
    if status != StatusCode::OK {
        return (Duration::ZERO, false);
    }
    let cc = cachecontrol::parse(cache_control);
    if cc.has("no-store") || cc.has("no-cache") {
        return (Duration::ZERO, false);
    }
    if cc.max_age > Duration::ZERO && cc.max_age < VOLATILE_MAX_AGE_CEILING {
        return (cc.max_age, true);
    }
    (Duration::ZERO, false)
}
