//! Read-side projection of a catalog: season selection, search or field
//! filters, then pagination. Everything here is pure.

use crate::error::{CatalogError, Result};
use crate::models::{Catalog, Entry, Season};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_PAGE_SIZE: usize = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Filters {
    pub year: Option<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub season: Season,
    pub filters: Filters,
    pub search: Option<String>,
    /// 1-based; 0 is treated as 1.
    pub page: usize,
    pub page_size: usize,
}

impl Query {
    pub fn new(season: Season) -> Self {
        Self {
            season,
            filters: Filters::default(),
            search: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: usize,
    pub total_items: usize,
    pub current_page: usize,
}

/// Runs the query against the catalog.
///
/// A non-blank search term takes precedence and the year/genre filters are
/// ignored while it is set.
pub fn run_query(catalog: &Catalog, query: &Query) -> Result<Page<Entry>> {
    let base = catalog.season(query.season);
    let term = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase);

    let matched: Vec<Entry> = match term {
        Some(term) => base
            .iter()
            .filter(|e| matches_search(e, &term))
            .cloned()
            .collect(),
        None => base
            .iter()
            .filter(|e| matches_filters(e, &query.filters))
            .cloned()
            .collect(),
    };

    paginate(matched, query.page, query.page_size)
}

fn matches_search(entry: &Entry, term: &str) -> bool {
    let haystacks = [
        entry.title.to_lowercase(),
        entry.original_title.to_lowercase(),
        entry.desc.to_lowercase(),
        entry.genre.join(",").to_lowercase(),
        entry.cast.join(",").to_lowercase(),
    ];
    haystacks.iter().any(|h| h.contains(term))
}

fn matches_filters(entry: &Entry, filters: &Filters) -> bool {
    let year_ok = match filters.year.as_deref().filter(|y| !y.is_empty()) {
        Some(year) => entry.year == year,
        None => true,
    };
    let genre_ok = match filters.genre.as_deref().filter(|g| !g.is_empty()) {
        Some(genre) => entry.genre.iter().any(|g| g == genre),
        None => true,
    };
    year_ok && genre_ok
}

/// Slices `items` into the requested 1-based page.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Result<Page<T>> {
    if page_size == 0 {
        return Err(CatalogError::Validation(
            "page size must be at least 1".to_string(),
        ));
    }
    let current_page = page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let start = (current_page - 1).saturating_mul(page_size);
    let items = items
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();
    Ok(Page {
        items,
        total_pages,
        total_items,
        current_page,
    })
}

/// Distinct genre labels across the whole catalog.
pub fn all_genres(catalog: &Catalog) -> BTreeSet<String> {
    catalog
        .iter()
        .flat_map(|e| e.genre.iter().cloned())
        .collect()
}
