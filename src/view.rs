//! Presentation projections over the shared catalog. The visitor view is
//! read-only; the admin view wraps it and adds the editing operations.

use crate::catalog::{CatalogStats, CatalogStore};
use crate::error::{CatalogError, Result};
use crate::metadata::{parse_source_url, FetchError, MetadataSource};
use crate::models::{Entry, EntryDraft, Links, Season};
use crate::poster::{IngestError, PosterIngest};
use crate::query::{all_genres, run_query, Filters, Page, Query};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The one catalog instance, created at startup and handed to every view.
pub type SharedCatalog = Arc<Mutex<CatalogStore>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonSummary {
    pub season: Season,
    pub count: usize,
}

/// What a list card shows; the full entry is served by the detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub title: String,
    pub original_title: String,
    pub season: Season,
    pub year: String,
    pub day: String,
    pub rating: f64,
    pub genre: Vec<String>,
    pub poster: Option<String>,
    pub desc: String,
    pub links: Links,
}

impl From<Entry> for Card {
    fn from(e: Entry) -> Self {
        Self {
            id: e.id,
            title: e.title,
            original_title: e.original_title,
            season: e.season,
            year: e.year,
            day: e.day,
            rating: e.rating,
            genre: e.genre,
            poster: e.poster,
            desc: e.desc,
            links: e.links,
        }
    }
}

#[derive(Clone)]
pub struct VisitorView {
    catalog: SharedCatalog,
    page_size: usize,
}

impl VisitorView {
    pub fn new(catalog: SharedCatalog, page_size: usize) -> Self {
        Self { catalog, page_size }
    }

    pub async fn seasons(&self) -> Vec<SeasonSummary> {
        let store = self.catalog.lock().await;
        Season::ALL
            .into_iter()
            .map(|season| SeasonSummary {
                season,
                count: store.season(season).len(),
            })
            .collect()
    }

    pub async fn browse(
        &self,
        season: Season,
        filters: Filters,
        search: Option<String>,
        page: usize,
    ) -> Result<Page<Card>> {
        let query = Query {
            season,
            filters,
            search,
            page,
            page_size: self.page_size,
        };
        let page = {
            let store = self.catalog.lock().await;
            run_query(store.catalog(), &query)?
        };
        Ok(Page {
            items: page.items.into_iter().map(Card::from).collect(),
            total_pages: page.total_pages,
            total_items: page.total_items,
            current_page: page.current_page,
        })
    }

    pub async fn detail(&self, id: &str) -> Result<Entry> {
        self.catalog
            .lock()
            .await
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    pub async fn genres(&self) -> Vec<String> {
        let store = self.catalog.lock().await;
        all_genres(store.catalog()).into_iter().collect()
    }
}

#[derive(Clone)]
pub struct AdminView {
    visitor: VisitorView,
    catalog: SharedCatalog,
    metadata: Arc<dyn MetadataSource>,
    posters: Arc<dyn PosterIngest>,
}

impl AdminView {
    pub fn new(
        catalog: SharedCatalog,
        page_size: usize,
        metadata: Arc<dyn MetadataSource>,
        posters: Arc<dyn PosterIngest>,
    ) -> Self {
        Self {
            visitor: VisitorView::new(catalog.clone(), page_size),
            catalog,
            metadata,
            posters,
        }
    }

    /// Read-only operations are the visitor's.
    pub fn visitor(&self) -> &VisitorView {
        &self.visitor
    }

    pub async fn create(&self, draft: EntryDraft) -> Result<Entry> {
        self.write(move |store| store.create(draft)).await?
    }

    pub async fn update(&self, id: &str, draft: EntryDraft) -> Result<Entry> {
        let id = id.to_string();
        self.write(move |store| store.update(&id, draft)).await?
    }

    /// `Ok(false)` when no entry has the id.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.write(move |store| store.delete(&id)).await
    }

    /// Runs a mutation on the blocking pool, since every effective mutation
    /// rewrites the whole catalog to storage. The lock is held throughout.
    async fn write<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut CatalogStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut store = self.catalog.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || op(&mut *store))
            .await
            .map_err(|e| CatalogError::Task(e.to_string()))
    }

    pub async fn stats(&self) -> CatalogStats {
        self.catalog.lock().await.stats()
    }

    /// Fetches metadata for `url` and layers it over `base` (or a blank
    /// autumn draft). The catalog itself is not touched.
    pub async fn import_metadata(
        &self,
        url: &str,
        base: Option<EntryDraft>,
    ) -> std::result::Result<EntryDraft, FetchError> {
        parse_source_url(url)?;
        let url = url.trim();
        let record = match self.metadata.fetch(url).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Metadata fetch for {} failed: {}", url, e);
                return Err(e);
            }
        };
        let mut draft = base.unwrap_or_else(|| EntryDraft::new("", Season::Autumn));
        record.apply_to(&mut draft);
        info!("Imported metadata for '{}'", draft.title);
        Ok(draft)
    }

    /// Re-encodes an uploaded image off the async workers.
    pub async fn ingest_poster(&self, bytes: Vec<u8>) -> std::result::Result<String, IngestError> {
        let posters = self.posters.clone();
        tokio::task::spawn_blocking(move || posters.ingest(&bytes))
            .await
            .map_err(|e| IngestError::Encode(format!("ingest task failed: {}", e)))?
    }
}
