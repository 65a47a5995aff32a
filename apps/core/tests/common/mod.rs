#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{json, Value};

use unisearch_core::bus::{LocalBus, Responder};
use unisearch_core::category::{Category, CategoryKind};
use unisearch_core::index_store::IndexStore;
use unisearch_core::model::SearchItem;
use unisearch_core::provider::{Provider, ProviderError, SearchCallback};
use unisearch_core::search_manager::SearchManager;
use unisearch_core::settings_client::LocaleSettings;

pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

pub fn memory_store() -> Rc<IndexStore> {
    Rc::new(IndexStore::open_memory().unwrap())
}

pub fn manager(store: &Rc<IndexStore>) -> Rc<SearchManager> {
    Rc::new(SearchManager::new(Rc::clone(store), LocaleSettings::new("en")))
}

pub fn stored(id: &str) -> Category {
    Category::new(
        id,
        id,
        CategoryKind::Stored {
            action: "view".to_string(),
        },
    )
}

pub fn item(category: &str, key: &str, value: &str) -> SearchItem {
    SearchItem::new(category, key, value, json!({ "title": value }))
}

pub struct ManualProvider {
    id: String,
    calls: Cell<usize>,
    pending: RefCell<Vec<SearchCallback>>,
}

impl ManualProvider {
    pub fn new(id: &str) -> Rc<Self> {
        Rc::new(Self {
            id: id.to_string(),
            calls: Cell::new(0),
            pending: RefCell::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn reply(&self, items: Vec<SearchItem>) {
        let callback = self.pending.borrow_mut().remove(0);
        callback(&self.id, items);
    }

    pub fn abandon(&self) {
        let callback = self.pending.borrow_mut().remove(0);
        drop(callback);
    }
}

impl Provider for ManualProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn search(&self, _key: &str, callback: SearchCallback) -> Result<(), ProviderError> {
        self.calls.set(self.calls.get() + 1);
        self.pending.borrow_mut().push(callback);
        Ok(())
    }
}

pub struct FakeService {
    pub name: String,
    pub requests: RefCell<Vec<(String, Value)>>,
    pub subscribers: RefCell<Vec<(String, Responder)>>,
}

impl FakeService {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            requests: RefCell::new(Vec::new()),
            subscribers: RefCell::new(Vec::new()),
        })
    }

    pub fn method(self: &Rc<Self>, bus: &LocalBus, method: &str, reply: impl Fn(&Value) -> Value + 'static) {
        let this = Rc::clone(self);
        let name = method.to_string();
        bus.register_method(
            &self.name,
            method,
            Rc::new(move |payload: Value, responder: Responder| {
                this.requests.borrow_mut().push((name.clone(), payload.clone()));
                responder.respond(reply(&payload));
                if payload.get("subscribe").and_then(Value::as_bool) == Some(true) {
                    this.subscribers.borrow_mut().push((name.clone(), responder));
                }
            }),
        );
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|(name, _)| name == method)
            .count()
    }

    pub fn push(&self, method: &str, payload: Value) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|(name, _)| name == method)
            .filter(|(_, responder)| responder.respond(payload.clone()))
            .count()
    }
}

pub fn write_web_app(root: &std::path::Path, id: &str) -> serde_json::Value {
    let folder = root.join(id);
    let resources = folder.join("resources");
    std::fs::create_dir_all(resources.join("ko")).unwrap();
    std::fs::create_dir_all(resources.join("en")).unwrap();

    std::fs::write(
        folder.join("search.json"),
        json!({
            "action": "view",
            "uri": format!("{id}://"),
            "items": [
                { "path": "settings/network", "labels": ["Network", "Wi-Fi"], "extra": { "tab": 2 } },
                { "path": "settings/sound", "labels": ["Sound"] },
                { "path": "settings/ghost", "labels": ["Missing"] },
                { "labels": ["Network"] }
            ]
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        resources.join("ilibmanifest.json"),
        json!({ "files": ["ko/strings.json", "en/strings.json", "ilibmanifest.json"] }).to_string(),
    )
    .unwrap();
    std::fs::write(
        resources.join("ko").join("strings.json"),
        json!({ "Network": "네트워크", "Sound": "사운드" }).to_string(),
    )
    .unwrap();
    std::fs::write(
        resources.join("en").join("strings.json"),
        json!({ "Wi-Fi": "Wireless" }).to_string(),
    )
    .unwrap();

    json!({
        "id": id,
        "title": "Foo Settings",
        "icon": "icon.png",
        "folderPath": folder.to_string_lossy(),
        "visible": true,
        "type": "web",
        "searchIndex": "search.json"
    })
}
