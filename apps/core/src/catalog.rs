use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{json, Map, Value};

use crate::category::{Category, CategoryKind};
use crate::fan_in::FanIn;
use crate::model::SearchItem;
use crate::provider::{Provider, ProviderError, SearchCallback};
use crate::search_manager::SearchSet;
use crate::service_client::{BusHandle, ServiceClient, TaskId, INVALID_TASK_ID};

const FIND: &str = "find";

pub const MEDIA_SEARCH_SET: &str = "media";
pub const MEDIA_SOURCE_ID: &str = "catalog";
pub const AUDIO_CATEGORY: &str = "media.audio";
const AUDIO_CATEGORY_NAME: &str = "Audio Files";
const AUDIO_KIND: &str = "media.audio:1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogKind {
    pub kind: String,
    pub targets: Vec<String>,
    pub extras: Vec<String>,
}

impl CatalogKind {
    pub fn new(kind: &str, targets: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
            extras: Vec::new(),
        }
    }

    pub fn with_extras(mut self, extras: &[&str]) -> Self {
        self.extras = extras.iter().map(|e| e.to_string()).collect();
        self
    }
}

pub struct CatalogClient {
    client: ServiceClient,
}

impl CatalogClient {
    pub fn new(service: &str, handle: Rc<BusHandle>) -> Rc<Self> {
        Rc::new(Self {
            client: ServiceClient::new(service, handle),
        })
    }

    pub fn initialize(&self) {
        self.client.initialize();
    }

    pub fn finalize(&self) {
        self.client.finalize();
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub fn find(
        &self,
        kind: &str,
        prop: &str,
        value: &str,
        callback: impl FnOnce(Result<Vec<Value>, ProviderError>) + 'static,
    ) -> TaskId {
        if !self.client.is_connected() {
            tracing::warn!(service = %self.client.name(), "catalog is not connected");
            return INVALID_TASK_ID;
        }

        let payload = json!({
            "query": {
                "from": kind,
                "where": [{ "prop": prop, "op": "%", "val": value, "collate": "primary" }],
            }
        });
        let mut callback = Some(callback);
        self.client.call(
            FIND,
            payload,
            move |reply| {
                if let Some(callback) = callback.take() {
                    callback(parse_find_reply(reply));
                }
            },
            false,
        )
    }
}

fn parse_find_reply(reply: Value) -> Result<Vec<Value>, ProviderError> {
    if reply.get("returnValue").and_then(Value::as_bool) != Some(true) {
        let text = reply
            .get("errorText")
            .and_then(Value::as_str)
            .unwrap_or("find failed");
        return Err(ProviderError::new(text));
    }
    match reply.get("results") {
        Some(Value::Array(results)) => Ok(results.clone()),
        _ => Err(ProviderError::new("find reply without results")),
    }
}

pub struct CatalogSource {
    id: String,
    client: Rc<CatalogClient>,
    kinds: RefCell<BTreeMap<String, CatalogKind>>,
}

impl CatalogSource {
    pub fn new(id: &str, client: Rc<CatalogClient>) -> Self {
        Self {
            id: id.to_string(),
            client,
            kinds: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn add_kind(&self, category_id: &str, kind: CatalogKind) -> bool {
        if kind.kind.is_empty() || kind.targets.is_empty() {
            tracing::warn!(category = category_id, "catalog kind needs a kind and targets");
            return false;
        }
        let mut kinds = self.kinds.borrow_mut();
        if kinds.contains_key(category_id) {
            tracing::warn!(category = category_id, "catalog kind already registered");
            return false;
        }
        kinds.insert(category_id.to_string(), kind);
        true
    }

    pub fn remove_kind(&self, category_id: &str) -> bool {
        let removed = self.kinds.borrow_mut().remove(category_id).is_some();
        if !removed {
            tracing::warn!(category = category_id, "catalog kind not registered");
        }
        removed
    }
}

impl Provider for CatalogSource {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn search(&self, key: &str, callback: SearchCallback) -> Result<(), ProviderError> {
        let source_id = self.id.clone();
        let fan = FanIn::new(
            "catalog",
            Vec::<SearchItem>::new(),
            move |items: Vec<SearchItem>| callback(&source_id, items),
        );

        let kinds: Vec<(String, CatalogKind)> = self
            .kinds
            .borrow()
            .iter()
            .map(|(id, kind)| (id.clone(), kind.clone()))
            .collect();
        for (category_id, kind) in kinds {
            for target in &kind.targets {
                let branch = fan.branch();
                let category_id = category_id.clone();
                let extras = kind.extras.clone();
                let target_name = target.clone();
                let search_key = key.to_string();
                self.client.find(&kind.kind, target, key, move |result| match result {
                    Ok(rows) => {
                        tracing::info!(
                            key = %search_key,
                            category = %category_id,
                            target = %target_name,
                            count = rows.len(),
                            "catalog find done"
                        );
                        branch.complete(|items| {
                            for row in &rows {
                                if let Some(item) = row_to_item(&category_id, row, &extras) {
                                    if !items
                                        .iter()
                                        .any(|i| i.category == item.category && i.key == item.key)
                                    {
                                        items.push(item);
                                    }
                                }
                            }
                        });
                    }
                    Err(error) => {
                        tracing::warn!(category = %category_id, target = %target_name, %error, "catalog find failed");
                        branch.complete(|_| {});
                    }
                });
            }
        }

        fan.seal();
        Ok(())
    }
}

fn row_to_item(category_id: &str, row: &Value, extras: &[String]) -> Option<SearchItem> {
    let file = row.get("file_path").and_then(Value::as_str)?;
    let title = row
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut display = Map::new();
    display.insert("title".into(), Value::String(title.to_string()));
    if let Some(artist) = row.get("artist") {
        display.insert("artist".into(), artist.clone());
    }
    if let Some(thumbnail) = row.get("thumbnail") {
        display.insert("icon".into(), thumbnail.clone());
    }

    let item = SearchItem::new(category_id, file, title, Value::Object(display));
    if extras.is_empty() {
        return Some(item);
    }
    let extra: Map<String, Value> = extras
        .iter()
        .map(|want| (want.clone(), row.get(want).cloned().unwrap_or(Value::Null)))
        .collect();
    Some(item.with_extra(Value::Object(extra)))
}

pub fn media_search_set(client: Rc<CatalogClient>) -> SearchSet {
    let kind = CatalogKind::new(AUDIO_KIND, &["title", "artist"]);
    let source = CatalogSource::new(MEDIA_SOURCE_ID, client);
    source.add_kind(AUDIO_CATEGORY, kind.clone());

    let mut set = SearchSet::new(MEDIA_SEARCH_SET, Rc::new(source));
    set.add_category(Category::new(
        AUDIO_CATEGORY,
        AUDIO_CATEGORY_NAME,
        CategoryKind::RemoteCatalog { kind: kind.kind },
    ));
    set
}
