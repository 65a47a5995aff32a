use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::apps_client::AppRecord;
use crate::category::DEFAULT_LANGUAGE;
use crate::model::SearchItem;

pub const CATEGORY_PREFIX: &str = "app-contents.";
const RESOURCE_DIR: &str = "resources";
const LABEL_MANIFEST: &str = "ilibmanifest.json";
const SUPPORTED_APP_TYPE: &str = "web";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("app {0} has no search index")]
    NoSearchIndex(String),
    #[error("app {app_id} has unsupported type {app_type:?}")]
    UnsupportedType { app_id: String, app_type: String },
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    action: String,
    #[serde(default)]
    uri: String,
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    path: String,
    labels: Vec<String>,
    #[serde(default)]
    extra: Value,
}

#[derive(Debug, Default, Deserialize)]
struct LabelManifest {
    #[serde(default)]
    files: Vec<String>,
}

// label key -> language -> text
pub type LabelBundle = BTreeMap<String, BTreeMap<String, String>>;

pub fn category_id(app_id: &str) -> String {
    format!("{CATEGORY_PREFIX}{app_id}")
}

pub fn check_indexable(app: &AppRecord) -> Result<&str, ContentError> {
    let index = app
        .search_index
        .as_deref()
        .filter(|index| !index.is_empty())
        .ok_or_else(|| ContentError::NoSearchIndex(app.id.clone()))?;
    if app.app_type != SUPPORTED_APP_TYPE {
        return Err(ContentError::UnsupportedType {
            app_id: app.id.clone(),
            app_type: app.app_type.clone(),
        });
    }
    Ok(index)
}

pub fn load_labels(folder_path: &Path) -> LabelBundle {
    let resources = folder_path.join(RESOURCE_DIR);
    let manifest: LabelManifest = match read_json(&resources.join(LABEL_MANIFEST)) {
        Ok(manifest) => manifest,
        Err(error) => {
            tracing::debug!(%error, "no label manifest");
            return LabelBundle::new();
        }
    };

    let mut bundle = LabelBundle::new();
    for file in manifest.files {
        if file.is_empty() || file == LABEL_MANIFEST {
            continue;
        }
        let language = file.split('/').next().unwrap_or_default().to_string();
        let labels: Map<String, Value> = match read_json(&resources.join(&file)) {
            Ok(labels) => labels,
            Err(error) => {
                tracing::warn!(%error, "skipping label file");
                continue;
            }
        };
        for (key, value) in labels {
            let Some(text) = value.as_str() else {
                continue;
            };
            bundle
                .entry(key)
                .or_default()
                .insert(language.clone(), text.to_string());
        }
    }
    bundle
}

pub fn build_items(app: &AppRecord) -> Result<Vec<SearchItem>, ContentError> {
    let index_name = check_indexable(app)?;
    let folder = Path::new(&app.folder_path);
    let index: IndexFile = read_json(&folder.join(index_name))?;
    let labels = load_labels(folder);
    let category = category_id(&app.id);
    let icon = folder.join(&app.icon).to_string_lossy().into_owned();

    let mut items = Vec::new();
    for raw in index.items {
        let entry: IndexEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(app = %app.id, %error, "index entry without path or labels");
                continue;
            }
        };

        let mut titles: Option<Map<String, Value>> = None;
        let mut values = Vec::new();
        for label_key in &entry.labels {
            let Some(languages) = labels.get(label_key) else {
                tracing::warn!(app = %app.id, label = %label_key, "label missing from resources");
                continue;
            };
            let mut languages = languages.clone();
            languages
                .entry(DEFAULT_LANGUAGE.to_string())
                .or_insert_with(|| label_key.clone());

            if titles.is_none() {
                titles = Some(
                    languages
                        .iter()
                        .map(|(lang, text)| (lang.clone(), Value::String(text.clone())))
                        .collect(),
                );
            }
            values.extend(languages.into_values());
        }

        if values.is_empty() {
            tracing::warn!(app = %app.id, path = %entry.path, "no labels resolved; item skipped");
            continue;
        }

        let mut display = Map::new();
        display.insert("icon".into(), Value::String(icon.clone()));
        if let Some(titles) = titles {
            display.insert("title".into(), Value::Object(titles));
        }

        let key = format!("{}{}", index.uri, entry.path);
        items.push(
            SearchItem::new(&category, &key, &values.join(", "), Value::Object(display))
                .with_extra(entry.extra),
        );
    }

    tracing::info!(app = %app.id, action = %index.action, count = items.len(), "app contents indexed");
    Ok(items)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ContentError> {
    let raw = fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ContentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
