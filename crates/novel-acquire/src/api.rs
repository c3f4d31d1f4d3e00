//! Content API wire contract.
//!
//! The static query parameters are what the remote service expects from its
//! Android client and must be sent exactly as written here.

use serde_json::Value;

/// Full-chapter reader endpoint.
pub const CONTENT_API_BASE: &str = "https://novel.snssdk.com/api/novel/book/reader/full/v1/";

const STATIC_QUERY: &str =
    "device_platform=android&parent_enterfrom=novel_channel_search.tab.&aid=2329&platform_id=1";

/// Content API URL for a chapter on the public endpoint.
pub fn content_api_url(chapter_id: &str) -> String {
    build_api_url(CONTENT_API_BASE, chapter_id)
}

/// Content API URL for a chapter against an arbitrary base (used by tests and mirrors).
pub fn build_api_url(base: &str, chapter_id: &str) -> String {
    format!("{base}?{STATIC_QUERY}&group_id={chapter_id}&item_id={chapter_id}")
}

/// Pull `data.content` out of a decoded response envelope.
///
/// A missing `data` object, a missing `content` key and a non-string
/// `content` are all treated the same way.
pub fn extract_content(envelope: &Value) -> Option<&str> {
    envelope.pointer("/data/content").and_then(Value::as_str)
}
