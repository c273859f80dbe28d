use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog item as served by the source of truth
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
}

/// One page of a filtered/sorted catalog listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub page: u32,
    pub size: u32,
    pub total: i64,
}

/// Sort order for catalog listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Title,
    PriceAsc,
    PriceDesc,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Title => "title",
            SortBy::PriceAsc => "price_asc",
            SortBy::PriceDesc => "price_desc",
        }
    }
}

/// Identity of a catalog listing query. Two queries with equal fields
/// must map to the same cache entry, distinct queries must not collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub search: Option<String>,
    pub sort: SortBy,
    pub page: u32,
    pub size: u32,
}

impl ItemQuery {
    pub fn new(search: Option<String>, sort: SortBy, page: u32, size: u32) -> Self {
        Self { search, sort, page, size }
    }

    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_offset() {
        let q = ItemQuery::new(None, SortBy::Title, 3, 20);
        assert_eq!(q.offset(), 60);
    }

    #[test]
    fn test_sort_as_str() {
        assert_eq!(SortBy::PriceDesc.as_str(), "price_desc");
        assert_eq!(SortBy::default(), SortBy::Title);
    }
}
