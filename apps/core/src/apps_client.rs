use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::Path;
use std::rc::{Rc, Weak};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_contents;
use crate::category::{Category, CategoryKind};
use crate::model::SearchItem;
use crate::provider_registry::LOCAL_SEARCH_SET;
use crate::search_manager::{ManagerError, SearchManager};
use crate::service_client::{BusHandle, ServiceClient, TaskId, INVALID_TASK_ID};
use crate::settings_client::LocaleSettings;

pub const APPS_CATEGORY: &str = "apps";
const APPS_CATEGORY_NAME: &str = "Apps";
const LIST_APPS: &str = "listApps";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub folder_path: String,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub search_index: Option<String>,
    #[serde(default, rename = "type")]
    pub app_type: String,
}

fn visible_by_default() -> bool {
    true
}

impl AppRecord {
    fn icon_path(&self) -> String {
        if self.icon.is_empty() {
            return String::new();
        }
        Path::new(&self.folder_path)
            .join(&self.icon)
            .to_string_lossy()
            .into_owned()
    }

    fn has_search_index(&self) -> bool {
        self.search_index
            .as_deref()
            .map(|index| !index.is_empty())
            .unwrap_or(false)
    }
}

pub fn apps_category() -> Category {
    Category::new(APPS_CATEGORY, APPS_CATEGORY_NAME, CategoryKind::Application)
}

pub struct AppsClient {
    this: Weak<AppsClient>,
    client: ServiceClient,
    manager: Rc<SearchManager>,
    subscription: Cell<TaskId>,
    content_apps: RefCell<BTreeSet<String>>,
}

impl AppsClient {
    pub fn new(
        service: &str,
        handle: Rc<BusHandle>,
        manager: Rc<SearchManager>,
        locale: &LocaleSettings,
    ) -> Rc<Self> {
        let this = Rc::new_cyclic(|this| Self {
            this: this.clone(),
            client: ServiceClient::new(service, handle),
            manager,
            subscription: Cell::new(INVALID_TASK_ID),
            content_apps: RefCell::new(BTreeSet::new()),
        });

        let weak = Rc::downgrade(&this);
        this.client.on_status_change(move |connected| {
            if let Some(this) = weak.upgrade() {
                this.on_server_status_changed(connected);
            }
        });

        let weak = Rc::downgrade(&this);
        locale.on_language_change(move |language| {
            if let Some(this) = weak.upgrade() {
                tracing::info!(%language, "language changed, reloading app list");
                this.refresh();
            }
        });
        this
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

    pub fn content_apps(&self) -> Vec<String> {
        self.content_apps.borrow().iter().cloned().collect()
    }

    pub fn refresh(&self) {
        let previous = self.subscription.replace(INVALID_TASK_ID);
        if previous != INVALID_TASK_ID {
            self.client.cancel(previous);
        }
        if self.client.is_connected() {
            self.subscribe();
        }
    }

    fn on_server_status_changed(&self, connected: bool) {
        if connected {
            self.subscribe();
        } else {
            self.subscription.set(INVALID_TASK_ID);
        }
    }

    fn subscribe(&self) {
        let weak = self.this.clone();
        let id = self.client.call(
            LIST_APPS,
            json!({ "subscribe": true }),
            move |payload| {
                if let Some(this) = weak.upgrade() {
                    this.handle_payload(&payload);
                }
            },
            true,
        );
        self.subscription.set(id);
    }

    pub fn handle_payload(&self, payload: &Value) {
        if payload.get("returnValue").and_then(Value::as_bool) == Some(false) {
            let error_text = payload
                .get("errorText")
                .and_then(Value::as_str)
                .unwrap_or_default();
            tracing::warn!(error = %error_text, "listApps failed");
            return;
        }

        if let Some(apps) = payload.get("apps").and_then(Value::as_array) {
            let apps: Vec<AppRecord> = apps.iter().filter_map(parse_app).collect();
            self.resync(&apps);
            return;
        }

        let Some(change) = payload.get("change").and_then(Value::as_str) else {
            return;
        };
        let Some(app) = payload.get("app").and_then(parse_app) else {
            tracing::warn!(change, "app change without app record");
            return;
        };
        match change {
            "added" | "updated" => self.apply_app(&app),
            "removed" => self.remove_app(&app.id),
            other => tracing::debug!(change = other, "ignoring app change"),
        }
    }

    fn resync(&self, apps: &[AppRecord]) {
        let store = self.manager.store();
        if let Err(error) = store.remove_item(APPS_CATEGORY, None) {
            tracing::warn!(%error, "failed to clear app items");
        }

        let listed: BTreeSet<&str> = apps
            .iter()
            .filter(|app| app.visible && app.has_search_index())
            .map(|app| app.id.as_str())
            .collect();
        let stale: Vec<String> = self
            .content_apps
            .borrow()
            .iter()
            .filter(|id| !listed.contains(id.as_str()))
            .cloned()
            .collect();
        for app_id in stale {
            self.remove_contents(&app_id);
        }
        self.remove_orphaned_contents(&listed);

        for app in apps {
            self.apply_app(app);
        }
        tracing::info!(count = apps.len(), "app list synced");
    }

    fn apply_app(&self, app: &AppRecord) {
        let store = self.manager.store();
        if !app.visible {
            tracing::debug!(app = %app.id, "ignoring invisible app");
            if let Err(error) = store.remove_item(APPS_CATEGORY, Some(&app.id)) {
                tracing::warn!(app = %app.id, %error, "failed to remove app item");
            }
            self.remove_contents(&app.id);
            return;
        }

        let item = SearchItem::new(
            APPS_CATEGORY,
            &app.id,
            &app.title,
            json!({ "title": app.title, "icon": app.icon_path() }),
        );
        if let Err(error) = store.insert_item(&item) {
            tracing::warn!(app = %app.id, %error, "failed to index app");
        }

        if app.has_search_index() {
            self.index_contents(app);
        } else {
            self.remove_contents(&app.id);
        }
    }

    fn remove_app(&self, app_id: &str) {
        if let Err(error) = self.manager.store().remove_item(APPS_CATEGORY, Some(app_id)) {
            tracing::warn!(app = app_id, %error, "failed to remove app item");
        }
        self.remove_contents(app_id);
        tracing::info!(app = app_id, "app removed");
    }

    fn index_contents(&self, app: &AppRecord) {
        let items = match app_contents::build_items(app) {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(app = %app.id, %error, "app contents not indexed");
                return;
            }
        };

        let category_id = app_contents::category_id(&app.id);
        let category = Category::new(
            &category_id,
            &app.title,
            CategoryKind::ApplicationContent {
                app_id: app.id.clone(),
            },
        );
        match self.manager.add_category(LOCAL_SEARCH_SET, category) {
            Ok(()) | Err(ManagerError::CategoryExists(_)) => {}
            Err(error) => {
                tracing::warn!(app = %app.id, %error, "content category not registered");
                return;
            }
        }
        self.content_apps.borrow_mut().insert(app.id.clone());

        let store = self.manager.store();
        if let Err(error) = store.remove_item(&category_id, None) {
            tracing::warn!(category = %category_id, %error, "failed to clear content items");
        }
        for item in &items {
            if let Err(error) = store.insert_item(item) {
                tracing::warn!(category = %category_id, key = %item.key, %error, "failed to index content item");
            }
        }
    }

    // Content categories persist in the store across restarts while
    // `content_apps` does not, so unlisted ones are found by id prefix.
    fn remove_orphaned_contents(&self, listed: &BTreeSet<&str>) {
        let store = self.manager.store();
        let categories = match store.get_categories() {
            Ok(categories) => categories,
            Err(error) => {
                tracing::warn!(%error, "failed to list categories for content cleanup");
                return;
            }
        };
        for category in categories {
            let Some(app_id) = category.id.strip_prefix(app_contents::CATEGORY_PREFIX) else {
                continue;
            };
            if listed.contains(app_id) {
                continue;
            }
            let result = match self.manager.remove_category(LOCAL_SEARCH_SET, &category.id) {
                Err(ManagerError::CategoryNotFound(_)) => store
                    .remove_category(&category.id)
                    .map_err(ManagerError::from),
                other => other,
            };
            match result {
                Ok(()) => {
                    tracing::info!(category = %category.id, "orphaned content category removed")
                }
                Err(error) => tracing::warn!(
                    category = %category.id,
                    %error,
                    "failed to remove orphaned content category"
                ),
            }
        }
    }

    fn remove_contents(&self, app_id: &str) {
        if !self.content_apps.borrow_mut().remove(app_id) {
            return;
        }
        let category_id = app_contents::category_id(app_id);
        if let Err(error) = self.manager.remove_category(LOCAL_SEARCH_SET, &category_id) {
            tracing::warn!(category = %category_id, %error, "failed to remove content category");
        }
    }
}

fn parse_app(value: &Value) -> Option<AppRecord> {
    match serde_json::from_value::<AppRecord>(value.clone()) {
        Ok(app) if !app.id.is_empty() => Some(app),
        Ok(_) => None,
        Err(error) => {
            tracing::warn!(%error, "skipping malformed app record");
            None
        }
    }
}
