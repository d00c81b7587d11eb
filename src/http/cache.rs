//! HTTP cache control module
//!
//! Provides `ETag` generation and conditional request handling.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Devices must revalidate: the image behind the route changes between builds
pub const IMAGE_CACHE_CONTROL: &str = "no-cache";

/// Strong `ETag` for the image bytes, e.g. `"e0000-9f3c..."`
///
/// The length prefix keeps tags of different-sized images apart even on a hash collision.
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}-{:x}\"", content.len(), hasher.finish())
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Handles comma-separated lists, the `*` wildcard and weak (`W/`) tags,
/// which compare weakly for `If-None-Match`.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|header| {
        header.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
    })
}
