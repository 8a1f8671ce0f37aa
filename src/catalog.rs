//! The catalog store: owns every entry, keeps the season/id invariants, and
//! persists the whole catalog after each effective mutation.

use crate::error::{CatalogError, Result};
use crate::ids::generate_id;
use crate::models::{Catalog, Entry, EntryDraft, Links, Season};
use crate::storage::StorageAdapter;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Storage key holding the serialized catalog.
pub const CATALOG_KEY: &str = "dramaData";

pub struct CatalogStore {
    catalog: Catalog,
    storage: StorageAdapter,
    dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total: usize,
    pub winter: usize,
    pub spring: usize,
    pub summer: usize,
    pub autumn: usize,
    /// True when the last persist failed and memory is ahead of storage.
    pub unsaved_changes: bool,
}

impl CatalogStore {
    /// Reads the catalog from storage, seeding (and persisting) the sample
    /// catalog when nothing usable is stored.
    pub fn load(storage: StorageAdapter) -> Self {
        let stored: Option<Value> = storage.load(CATALOG_KEY, None);
        match stored.and_then(read_catalog) {
            Some((catalog, salvaged)) => {
                let (catalog, normalized) = normalize(catalog);
                let repaired = salvaged || normalized;
                info!("Loaded catalog with {} entries", catalog.len());
                let mut store = Self {
                    catalog,
                    storage,
                    dirty: false,
                };
                if repaired {
                    store.persist();
                }
                store
            }
            None => {
                info!("No stored catalog, installing seed data");
                let mut store = Self {
                    catalog: seed_catalog(),
                    storage,
                    dirty: false,
                };
                store.persist();
                store
            }
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn season(&self, season: Season) -> &[Entry] {
        self.catalog.season(season)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Entry> {
        self.catalog.iter().find(|e| e.id == id)
    }

    pub fn create(&mut self, mut draft: EntryDraft) -> Result<Entry> {
        validate(&mut draft)?;
        let entry = Entry::from_draft(generate_id(), draft);
        self.catalog.season_mut(entry.season).push(entry.clone());
        info!(
            "Created entry '{}' ({}) in {}",
            entry.title, entry.id, entry.season
        );
        self.persist();
        Ok(entry)
    }

    /// Replaces the entry in place. A changed season moves the entry to the
    /// end of its new season's sequence.
    pub fn update(&mut self, id: &str, mut draft: EntryDraft) -> Result<Entry> {
        validate(&mut draft)?;
        let (old_season, idx) = self
            .catalog
            .locate(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        let entry = Entry::from_draft(id.to_string(), draft);
        if entry.season == old_season {
            self.catalog.season_mut(old_season)[idx] = entry.clone();
        } else {
            self.catalog.season_mut(old_season).remove(idx);
            self.catalog.season_mut(entry.season).push(entry.clone());
            debug!("Moved entry {} from {} to {}", id, old_season, entry.season);
        }
        info!("Updated entry '{}' ({})", entry.title, entry.id);
        self.persist();
        Ok(entry)
    }

    /// Removes the entry; `false` (and no write) when the id is unknown.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some((season, idx)) = self.catalog.locate(id) else {
            debug!("Delete ignored, no entry {}", id);
            return false;
        };
        let removed = self.catalog.season_mut(season).remove(idx);
        info!("Deleted entry '{}' ({}) from {}", removed.title, id, season);
        self.persist();
        true
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            total: self.catalog.len(),
            winter: self.catalog.winter.len(),
            spring: self.catalog.spring.len(),
            summer: self.catalog.summer.len(),
            autumn: self.catalog.autumn.len(),
            unsaved_changes: self.dirty,
        }
    }

    fn persist(&mut self) {
        if self.storage.save(CATALOG_KEY, &self.catalog) {
            self.dirty = false;
        } else {
            warn!("Catalog kept in memory only; persist failed");
            self.dirty = true;
        }
    }
}

/// Checks and tidies a draft before it reaches the catalog.
///
/// Ratings that are not finite are coerced to 0 to match how form input has
/// always been treated; negative ratings are rejected.
pub fn validate(draft: &mut EntryDraft) -> Result<()> {
    draft.title = draft.title.trim().to_string();
    if draft.title.is_empty() {
        return Err(CatalogError::Validation("title is required".to_string()));
    }

    draft.year = draft.year.trim().to_string();
    if !draft.year.is_empty()
        && !(draft.year.len() == 4 && draft.year.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(CatalogError::Validation(format!(
            "year '{}' is not a four-digit year",
            draft.year
        )));
    }

    if !draft.rating.is_finite() {
        draft.rating = 0.0;
    }
    if draft.rating < 0.0 {
        return Err(CatalogError::Validation(format!(
            "rating {} is negative",
            draft.rating
        )));
    }

    tidy_list(&mut draft.genre);
    tidy_list(&mut draft.cast);
    Ok(())
}

fn tidy_list(items: &mut Vec<String>) {
    for item in items.iter_mut() {
        *item = item.trim().to_string();
    }
    items.retain(|s| !s.is_empty());
}

/// Reads a stored catalog one entry at a time. An entry whose season label is
/// unusable takes its sequence key; an entry that still cannot be read is
/// dropped with a warning. `None` when the blob is not a catalog object.
fn read_catalog(stored: Value) -> Option<(Catalog, bool)> {
    let Value::Object(mut root) = stored else {
        warn!("Stored catalog is not an object");
        return None;
    };
    let mut catalog = Catalog::default();
    let mut repaired = false;

    for season in Season::ALL {
        let items = match root.remove(season.as_str()) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(items)) => items,
            Some(other) => {
                warn!("Stored {} is not a list, ignoring: {}", season, other);
                repaired = true;
                continue;
            }
        };
        for mut item in items {
            if let Value::Object(fields) = &mut item {
                let labelled = fields
                    .get("season")
                    .and_then(Value::as_str)
                    .is_some_and(|s| s.parse::<Season>().is_ok());
                if !labelled {
                    fields.insert("season".to_string(), Value::from(season.as_str()));
                    repaired = true;
                }
            }
            match serde_json::from_value::<Entry>(item) {
                Ok(entry) => catalog.season_mut(season).push(entry),
                Err(e) => {
                    warn!("Dropping unreadable entry in {}: {}", season, e);
                    repaired = true;
                }
            }
        }
    }
    Some((catalog, repaired))
}

/// Restores the season and id invariants on data read from storage. Returns
/// the repaired catalog and whether anything changed.
fn normalize(catalog: Catalog) -> (Catalog, bool) {
    let mut seen = HashSet::new();
    let mut out = Catalog::default();
    let mut repaired = false;

    for season in Season::ALL {
        for mut entry in catalog.season(season).iter().cloned() {
            if entry.id.trim().is_empty() {
                entry.id = generate_id();
                warn!("Entry '{}' had no id, assigned {}", entry.title, entry.id);
                repaired = true;
            }
            if !seen.insert(entry.id.clone()) {
                warn!("Dropping duplicate entry id {} in {}", entry.id, season);
                repaired = true;
                continue;
            }
            if entry.season != season {
                warn!(
                    "Entry {} stored under {} but labelled {}, relabelling",
                    entry.id, season, entry.season
                );
                entry.season = season;
                repaired = true;
            }
            out.season_mut(season).push(entry);
        }
    }
    (out, repaired)
}

/// Catalog installed when storage holds nothing usable.
pub fn seed_catalog() -> Catalog {
    let sample = Entry {
        id: generate_id(),
        title: "Silent Love".to_string(),
        original_title: "サイレントラブ".to_string(),
        season: Season::Autumn,
        year: "2025".to_string(),
        day: "Monday".to_string(),
        genre: vec!["Romance".to_string(), "Drama".to_string()],
        rating: 8.7,
        poster: Some(
            "https://via.placeholder.com/300x450/667eea/ffffff?text=Silent+Love".to_string(),
        ),
        desc: "A hearing-impaired young woman and an ordinary young man find a love \
               that crosses every barrier between them."
            .to_string(),
        director: "Yoji Yamada".to_string(),
        screenwriter: "Yuji Sakamoto".to_string(),
        cast: vec![
            "Takeru Satoh".to_string(),
            "Satomi Ishihara".to_string(),
            "Masaki Suda".to_string(),
        ],
        broadcast: "TBS, Mondays 22:00".to_string(),
        links: Links {
            primary: Some("https://pan.example.com/s/silent-love".to_string()),
            secondary: Some("https://drive.example.com/s/silent-love".to_string()),
            tertiary: Some("https://share.example.com/s/silent-love".to_string()),
        },
    };

    Catalog {
        autumn: vec![sample],
        ..Catalog::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn store_with(memory: &Arc<MemoryStore>) -> CatalogStore {
        CatalogStore::load(StorageAdapter::new(memory.clone()))
    }

    fn draft(title: &str, season: Season) -> EntryDraft {
        let mut d = EntryDraft::new(title, season);
        d.year = "2025".to_string();
        d.genre = vec!["Drama".to_string()];
        d
    }

    fn stored_catalog(memory: &MemoryStore) -> Catalog {
        serde_json::from_str(&memory.raw(CATALOG_KEY).expect("persisted")).expect("valid json")
    }

    #[test]
    fn empty_storage_installs_and_persists_seed() {
        let memory = Arc::new(MemoryStore::new());
        let store = store_with(&memory);
        assert_eq!(store.season(Season::Autumn).len(), 1);
        for season in [Season::Winter, Season::Spring, Season::Summer] {
            assert!(store.season(season).is_empty());
        }
        assert_eq!(&stored_catalog(&memory), store.catalog());
    }

    #[test]
    fn corrupt_storage_is_replaced_by_seed() {
        let memory = Arc::new(MemoryStore::with_raw(CATALOG_KEY, "{\"winter\": 5"));
        let store = store_with(&memory);
        assert_eq!(store.stats().total, 1);
        assert_eq!(store.stats().autumn, 1);
    }

    #[test]
    fn created_entry_is_findable_and_unique() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        for season in Season::ALL {
            let created = store.create(draft("Show", season)).unwrap();
            let found = store.find_by_id(&created.id).expect("found");
            assert_eq!(found.season, season);
            assert_eq!(store.catalog().iter().filter(|e| e.id == created.id).count(), 1);
        }
        assert_eq!(stored_catalog(&memory), *store.catalog());
    }

    #[test]
    fn create_coerces_bad_rating_to_zero() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        let d: EntryDraft = serde_json::from_value(serde_json::json!({
            "title": "X",
            "season": "winter",
            "genre": ["Drama"],
            "rating": "bad"
        }))
        .unwrap();
        let before = store.season(Season::Winter).len();
        let entry = store.create(d).unwrap();
        assert_eq!(entry.rating, 0.0);
        assert_eq!(entry.season, Season::Winter);
        assert_eq!(store.season(Season::Winter).len(), before + 1);
    }

    #[test]
    fn create_rejects_invalid_drafts_without_mutation() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        let before = store.catalog().clone();

        let blank = draft("   ", Season::Spring);
        assert!(matches!(store.create(blank), Err(CatalogError::Validation(_))));

        let mut bad_year = draft("Y", Season::Spring);
        bad_year.year = "25".to_string();
        assert!(matches!(store.create(bad_year), Err(CatalogError::Validation(_))));

        let mut negative = draft("N", Season::Spring);
        negative.rating = -1.0;
        assert!(matches!(store.create(negative), Err(CatalogError::Validation(_))));

        assert_eq!(store.catalog(), &before);
    }

    #[test]
    fn update_in_same_season_keeps_position() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        let a = store.create(draft("A", Season::Summer)).unwrap();
        let b = store.create(draft("B", Season::Summer)).unwrap();
        let c = store.create(draft("C", Season::Summer)).unwrap();

        let mut changed = b.to_draft();
        changed.title = "B2".to_string();
        let updated = store.update(&b.id, changed).unwrap();
        assert_eq!(updated.id, b.id);

        let titles: Vec<_> = store
            .season(Season::Summer)
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(titles, vec!["A", "B2", "C"]);
        assert_eq!(store.find_by_id(&a.id).unwrap().title, "A");
        assert_eq!(store.find_by_id(&c.id).unwrap().title, "C");
    }

    #[test]
    fn update_with_new_season_moves_entry() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        let e = store.create(draft("Mover", Season::Winter)).unwrap();
        let _other = store.create(draft("Stays", Season::Spring)).unwrap();

        let mut moved = e.to_draft();
        moved.season = Season::Spring;
        store.update(&e.id, moved).unwrap();

        assert!(store.season(Season::Winter).iter().all(|x| x.id != e.id));
        let spring = store.season(Season::Spring);
        assert_eq!(spring.last().map(|x| x.id.as_str()), Some(e.id.as_str()));
        assert_eq!(store.catalog().iter().filter(|x| x.id == e.id).count(), 1);
        assert_eq!(store.find_by_id(&e.id).unwrap().season, Season::Spring);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        let err = store
            .update("missing", draft("Ghost", Season::Winter))
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(id) if id == "missing"));
    }

    #[test]
    fn delete_unknown_id_is_a_no_op() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        let raw_before = memory.raw(CATALOG_KEY);
        let before = store.catalog().clone();
        assert!(!store.delete("nope"));
        assert_eq!(store.catalog(), &before);
        assert_eq!(memory.raw(CATALOG_KEY), raw_before);
    }

    #[test]
    fn delete_removes_and_persists() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        let e = store.create(draft("Gone", Season::Autumn)).unwrap();
        assert!(store.delete(&e.id));
        assert!(store.find_by_id(&e.id).is_none());
        assert!(stored_catalog(&memory).iter().all(|x| x.id != e.id));
    }

    #[test]
    fn failed_persist_keeps_mutation_and_flags_unsaved() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        memory.set_fail_writes(true);
        let e = store.create(draft("Offline", Season::Winter)).unwrap();
        assert!(store.find_by_id(&e.id).is_some());
        assert!(store.stats().unsaved_changes);

        memory.set_fail_writes(false);
        assert!(store.delete(&e.id));
        assert!(!store.stats().unsaved_changes);
    }

    #[test]
    fn load_repairs_mislabelled_and_duplicate_entries() {
        let raw = serde_json::json!({
            "winter": [
                { "id": "a", "title": "Labelled spring", "season": "spring" },
                { "id": "b", "title": "Fine", "season": "winter" }
            ],
            "spring": [],
            "summer": [ { "id": "a", "title": "Duplicate", "season": "summer" } ],
            "autumn": []
        });
        let memory = Arc::new(MemoryStore::with_raw(CATALOG_KEY, &raw.to_string()));
        let store = store_with(&memory);
        assert_eq!(store.season(Season::Winter).len(), 2);
        assert_eq!(store.find_by_id("a").unwrap().season, Season::Winter);
        assert!(store.season(Season::Summer).is_empty());
        assert_eq!(stored_catalog(&memory), *store.catalog());
    }

    #[test]
    fn load_keeps_entries_with_loose_fields() {
        let raw = serde_json::json!({
            "winter": [
                { "id": "keep1", "title": "User Show", "season": "winter", "rating": 7.0 },
                { "id": "keep2", "title": "Other", "season": "winter", "desc": null, "year": 2024 }
            ],
            "spring": [ { "id": "keep3", "title": "Shouty", "season": "Spring" } ],
            "summer": [ { "id": "keep4", "title": "Unlabelled" }, "garbage" ],
            "autumn": []
        });
        let memory = Arc::new(MemoryStore::with_raw(CATALOG_KEY, &raw.to_string()));
        let store = store_with(&memory);

        assert_eq!(store.stats().total, 4);
        assert_eq!(store.season(Season::Winter).len(), 2);
        assert_eq!(store.find_by_id("keep2").unwrap().year, "2024");
        assert_eq!(store.find_by_id("keep3").unwrap().season, Season::Spring);
        assert_eq!(store.find_by_id("keep4").unwrap().season, Season::Summer);

        let persisted = stored_catalog(&memory);
        assert_eq!(persisted, *store.catalog());
        assert!(persisted.iter().any(|e| e.id == "keep1"));
    }

    #[test]
    fn non_object_storage_is_replaced_by_seed() {
        let memory = Arc::new(MemoryStore::with_raw(CATALOG_KEY, "[1, 2, 3]"));
        let store = store_with(&memory);
        assert_eq!(store.stats().total, 1);
        assert_eq!(store.stats().autumn, 1);
    }

    #[test]
    fn catalog_round_trips_through_storage() {
        let memory = Arc::new(MemoryStore::new());
        let mut store = store_with(&memory);
        let mut d = draft("Round", Season::Summer);
        d.cast = vec!["One".to_string(), "Two".to_string()];
        d.links.secondary = Some("https://s.example".to_string());
        d.rating = 7.25;
        store.create(d).unwrap();

        let reloaded = store_with(&memory);
        assert_eq!(reloaded.catalog(), store.catalog());
    }
}
