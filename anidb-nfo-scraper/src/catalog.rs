//! The seam between the resolver and search-based secondary catalogs.

use anidb_nfo_core::{CrossRefField, Script};
use async_trait::async_trait;

use crate::error::ScrapeError;

/// One title search issued against a secondary catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub title: String,
    /// Set for the year-stripped form of a `Title (YYYY)` variant.
    pub year: Option<i32>,
    pub script: Script,
}

impl SearchQuery {
    pub fn is_year_qualified(&self) -> bool {
        self.year.is_some()
    }
}

/// A search hit, reduced to what matching needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: u32,
    /// Every title the catalog reports for the entry, in its preferred order.
    pub titles: Vec<String>,
    /// Release or season year.
    pub year: Option<i32>,
    /// Whether the entry satisfies the catalog's category constraint
    /// (e.g., tagged as animation).
    pub in_category: bool,
}

/// A search-based catalog whose ids are cross-linked to AniDB ids.
#[async_trait]
pub trait SecondaryCatalog: Send + Sync {
    /// The identity field this catalog fills.
    fn field(&self) -> CrossRefField;

    /// Display name for logs.
    fn name(&self) -> &str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, ScrapeError>;
}
