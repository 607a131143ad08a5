//! Query types for catalog reads.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::record::RecordFormat;

/// Default page size for catalog listings.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// Filter for catalog queries.
///
/// `search` is a free-text query ranked by relevance; all other fields are
/// exact matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub search: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub format: Option<RecordFormat>,
    pub category: Option<String>,
    pub mbid: Option<String>,
}

impl RecordFilter {
    /// Creates an empty filter matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter from `(name, value)` parameters in any order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "search" => filter = filter.search(value),
                "artist" => filter = filter.artist(value),
                "album" => filter = filter.album(value),
                "format" => filter = filter.format(value.parse()?),
                "category" => filter = filter.category(value),
                "mbid" => filter = filter.mbid(value),
                other => {
                    return Err(DomainError::validation(
                        "filter",
                        format!("unknown filter field '{other}'"),
                    ));
                }
            }
        }
        Ok(filter.normalized())
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn format(mut self, format: RecordFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn mbid(mut self, mbid: impl Into<String>) -> Self {
        self.mbid = Some(mbid.into());
        self
    }

    /// Trims every text field and drops the blank ones.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            search: clean(self.search),
            artist: clean(self.artist),
            album: clean(self.album),
            format: self.format,
            category: clean(self.category),
            mbid: clean(self.mbid),
        }
    }

    /// Returns the lowercase search terms, if a search was requested.
    pub fn search_terms(&self) -> Vec<String> {
        self.search
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_lowercase).collect())
            .unwrap_or_default()
    }
}

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// Creates a pagination, rejecting page 0 and limits outside `1..=100`.
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page == 0 {
            return Err(DomainError::validation("page", "must be at least 1"));
        }
        if limit == 0 || limit > MAX_LIMIT {
            return Err(DomainError::validation(
                "limit",
                format!("must be between 1 and {MAX_LIMIT}"),
            ));
        }
        Ok(Self { page, limit })
    }

    /// Number of rows to skip before this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            data,
            total,
            page: pagination.page,
            limit: pagination.limit,
            total_pages: total.div_ceil(u64::from(pagination.limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_is_order_independent() {
        let a = RecordFilter::from_pairs([("artist", "A"), ("format", "CD")]).unwrap();
        let b = RecordFilter::from_pairs([("format", "CD"), ("artist", "A")]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn from_pairs_rejects_unknown_fields() {
        assert!(RecordFilter::from_pairs([("colour", "red")]).is_err());
    }

    #[test]
    fn normalized_drops_blank_values() {
        let filter = RecordFilter::new().artist("  ").album(" Blue ").normalized();
        assert_eq!(filter.artist, None);
        assert_eq!(filter.album.as_deref(), Some("Blue"));
    }

    #[test]
    fn search_terms_are_lowercased() {
        let filter = RecordFilter::new().search("Kind  OF blue");
        assert_eq!(filter.search_terms(), vec!["kind", "of", "blue"]);
    }

    #[test]
    fn pagination_bounds() {
        assert!(Pagination::new(0, 10).is_err());
        assert!(Pagination::new(1, 0).is_err());
        assert!(Pagination::new(1, 101).is_err());
        assert_eq!(Pagination::new(3, 20).unwrap().skip(), 40);
    }

    #[test]
    fn page_counts_partial_pages() {
        let page: Page<u8> = Page::new(vec![], 21, Pagination::new(1, 10).unwrap());
        assert_eq!(page.total_pages, 3);
    }
}
