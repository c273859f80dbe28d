//! Deterministic cache key construction.
//!
//! Keys are pure functions of query identity: equal queries always map to
//! the same key, distinct queries never collide. Free-text segments are
//! escaped so a search string cannot forge another key's separators.

use uuid::Uuid;

/// Prefix for all catalog listing pages, used for bulk eviction.
pub const ITEM_PAGE_PREFIX: &str = "items:list:";

pub fn item_key(id: Uuid) -> String {
    format!("item:{}", id)
}

pub fn item_image_key(id: Uuid) -> String {
    format!("item:image:{}", id)
}

pub fn item_page_key(search: Option<&str>, sort: &str, page: u32, size: u32) -> String {
    format!(
        "{}search={}:sort={}:page={}:size={}",
        ITEM_PAGE_PREFIX,
        escape(search.unwrap_or("")),
        sort,
        page,
        size
    )
}

/// Escape the separator characters used in key layout.
fn escape(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A").replace('=', "%3D")
}
