use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use walkdir::WalkDir;

use crate::apps_client::apps_category;
use crate::catalog::{self, CatalogClient};
use crate::category::{Category, CategoryKind};
use crate::index_store::IndexStore;
use crate::model::SearchItem;
use crate::search_manager::{SearchManager, SearchSet};

pub const LOCAL_SEARCH_SET: &str = "local";
const DEFAULT_STORED_ACTION: &str = "view";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("read failed for '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("manifest '{0}' has no list id")]
    MissingId(PathBuf),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StoredListManifest {
    id: String,
    name: String,
    enabled: bool,
    action: String,
    items: Vec<ManifestItem>,
}

impl Default for StoredListManifest {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            enabled: true,
            action: String::new(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ManifestItem {
    key: String,
    value: String,
    display: Value,
    extra: Value,
}

#[derive(Debug, Clone)]
pub struct StoredList {
    pub category: Category,
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Default, Clone)]
pub struct StoredLists {
    pub lists: Vec<StoredList>,
    pub load_warnings: Vec<String>,
}

impl StoredLists {
    pub fn load(paths: &[PathBuf]) -> Self {
        let mut registry = Self::default();
        for path in paths {
            for manifest_path in discover_manifest_paths(path) {
                match load_manifest(&manifest_path) {
                    Ok(manifest) => registry.append(manifest),
                    Err(error) => {
                        tracing::warn!(%error, "stored list skipped");
                        registry.load_warnings.push(error.to_string());
                    }
                }
            }
        }
        tracing::info!(
            lists = registry.lists.len(),
            warnings = registry.load_warnings.len(),
            "stored lists loaded"
        );
        registry
    }

    fn append(&mut self, manifest: StoredListManifest) {
        if !manifest.enabled {
            tracing::debug!(list = %manifest.id, "stored list disabled");
            return;
        }
        let id = manifest.id.trim().to_string();
        if self.lists.iter().any(|list| list.category.id() == id) {
            self.load_warnings
                .push(format!("duplicate stored list '{id}' ignored"));
            return;
        }

        let name = if manifest.name.trim().is_empty() {
            id.clone()
        } else {
            manifest.name.trim().to_string()
        };
        let action = if manifest.action.trim().is_empty() {
            DEFAULT_STORED_ACTION.to_string()
        } else {
            manifest.action.trim().to_string()
        };

        let items = manifest
            .items
            .into_iter()
            .filter(|item| !item.key.trim().is_empty() && !item.value.trim().is_empty())
            .map(|item| {
                SearchItem::new(&id, item.key.trim(), item.value.trim(), item.display)
                    .with_extra(item.extra)
            })
            .collect();

        self.lists.push(StoredList {
            category: Category::new(&id, &name, CategoryKind::Stored { action }),
            items,
        });
    }

    pub fn sync_items(&self, store: &IndexStore) {
        for list in &self.lists {
            let category = list.category.id();
            if let Err(error) = store.remove_item(category, None) {
                tracing::warn!(%category, %error, "failed to clear stored list");
                continue;
            }
            let mut indexed = 0;
            for item in &list.items {
                match store.insert_item(item) {
                    Ok(()) => indexed += 1,
                    Err(error) => {
                        tracing::warn!(%category, key = %item.key, %error, "failed to index stored item")
                    }
                }
            }
            tracing::info!(%category, indexed, "stored list synced");
        }
    }
}

fn discover_manifest_paths(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    if !path.is_dir() {
        return Vec::new();
    }

    let mut out: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|entry_path| {
            entry_path
                .extension()
                .and_then(|v| v.to_str())
                .is_some_and(|v| v.eq_ignore_ascii_case("json"))
        })
        .collect();
    out.sort();
    out
}

fn load_manifest(path: &Path) -> Result<StoredListManifest, ManifestError> {
    let raw = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: StoredListManifest =
        serde_json::from_str(&raw).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if manifest.id.trim().is_empty() {
        return Err(ManifestError::MissingId(path.to_path_buf()));
    }
    Ok(manifest)
}

pub trait ProviderModule {
    fn module_id(&self) -> &str;
    fn search_set(&self) -> SearchSet;
}

pub struct LocalModule {
    store: Rc<IndexStore>,
    stored: StoredLists,
}

impl LocalModule {
    pub fn new(store: Rc<IndexStore>, stored: StoredLists) -> Self {
        Self { store, stored }
    }
}

impl ProviderModule for LocalModule {
    fn module_id(&self) -> &str {
        LOCAL_SEARCH_SET
    }

    fn search_set(&self) -> SearchSet {
        let mut set = SearchSet::new(LOCAL_SEARCH_SET, self.store.clone());
        set.add_category(apps_category());
        for list in &self.stored.lists {
            set.add_category(list.category.clone());
        }
        set
    }
}

pub struct MediaModule {
    client: Rc<CatalogClient>,
}

impl MediaModule {
    pub fn new(client: Rc<CatalogClient>) -> Self {
        Self { client }
    }
}

impl ProviderModule for MediaModule {
    fn module_id(&self) -> &str {
        catalog::MEDIA_SEARCH_SET
    }

    fn search_set(&self) -> SearchSet {
        catalog::media_search_set(Rc::clone(&self.client))
    }
}

pub fn install(manager: &SearchManager, modules: &[Box<dyn ProviderModule>]) -> usize {
    let mut installed = 0;
    for module in modules {
        match manager.add_search_set(module.search_set()) {
            Ok(()) => installed += 1,
            Err(error) => tracing::warn!(module = module.module_id(), %error, "provider module not installed"),
        }
    }
    installed
}
