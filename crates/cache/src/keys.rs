//! Deterministic cache keys for catalog listings.

use domain::{Pagination, RecordFilter};

/// Prefix shared by every catalog list key.
pub const LIST_PREFIX: &str = "records:list:";

/// Builds the cache key for one page of a catalog query.
///
/// The key depends only on the logical parameters, always written in the
/// order `search, artist, album, format, category, mbid, page, limit`.
/// Absent fields are written empty; present ones are trimmed and URL-encoded
/// so separators in values cannot collide.
pub fn build_key(filter: &RecordFilter, pagination: &Pagination) -> String {
    fn part(value: Option<&str>) -> String {
        value
            .map(|v| urlencoding::encode(v.trim()).into_owned())
            .unwrap_or_default()
    }

    let fields = [
        ("search", part(filter.search.as_deref())),
        ("artist", part(filter.artist.as_deref())),
        ("album", part(filter.album.as_deref())),
        ("format", part(filter.format.map(|f| f.as_str()))),
        ("category", part(filter.category.as_deref())),
        ("mbid", part(filter.mbid.as_deref())),
        ("page", pagination.page.to_string()),
        ("limit", pagination.limit.to_string()),
    ];

    let body = fields
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("{LIST_PREFIX}{body}")
}
