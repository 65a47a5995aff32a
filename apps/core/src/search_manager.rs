use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use thiserror::Error;

use crate::category::Category;
use crate::fan_in::FanIn;
use crate::index_store::{IndexStore, StoreError};
use crate::model::{CategoryInfo, CategoryResult, Intent, SearchItem, SearchResults};
use crate::provider::Provider;
use crate::settings_client::LocaleSettings;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("search set already exists: {0}")]
    SearchSetExists(String),
    #[error("search set not found: {0}")]
    SearchSetNotFound(String),
    #[error("category already exists: {0}")]
    CategoryExists(String),
    #[error("category not found: {0}")]
    CategoryNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SearchSet {
    id: String,
    provider: Rc<dyn Provider>,
    categories: BTreeMap<String, Rc<Category>>,
}

impl SearchSet {
    pub fn new(id: &str, provider: Rc<dyn Provider>) -> Self {
        Self {
            id: id.to_string(),
            provider,
            categories: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values().map(Rc::as_ref)
    }

    pub fn add_category(&mut self, category: Category) -> bool {
        if self.categories.contains_key(category.id()) {
            tracing::warn!(search_set = %self.id, category = %category.id(), "category already exists");
            return false;
        }
        self.categories
            .insert(category.id().to_string(), Rc::new(category));
        true
    }

    pub fn remove_category(&mut self, id: &str) -> Option<Category> {
        let removed = self.categories.remove(id)?;
        Some(Rc::try_unwrap(removed).unwrap_or_else(|shared| (*shared).clone()))
    }

    pub fn find_category(&self, id: &str) -> Option<&Category> {
        self.categories.get(id).map(Rc::as_ref)
    }
}

struct SearchTask {
    key: String,
    intents: HashMap<String, Vec<Intent>>,
}

pub struct SearchManager {
    store: Rc<IndexStore>,
    locale: Rc<LocaleSettings>,
    sets: RefCell<BTreeMap<String, SearchSet>>,
    search_timeout: Option<Duration>,
    in_flight: Rc<Cell<usize>>,
}

impl SearchManager {
    pub fn new(store: Rc<IndexStore>, locale: Rc<LocaleSettings>) -> Self {
        Self {
            store,
            locale,
            sets: RefCell::new(BTreeMap::new()),
            search_timeout: None,
            in_flight: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_search_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Rc<IndexStore> {
        &self.store
    }

    pub fn add_search_set(&self, mut set: SearchSet) -> Result<(), ManagerError> {
        if self.sets.borrow().contains_key(&set.id) {
            tracing::warn!(search_set = %set.id, "search set already exists");
            return Err(ManagerError::SearchSetExists(set.id));
        }

        let mut registered = BTreeMap::new();
        for (id, category) in std::mem::take(&mut set.categories) {
            let mut category = Rc::try_unwrap(category).unwrap_or_else(|shared| (*shared).clone());
            if self.store.create_or_adjust_category(&mut category.info).is_ok() {
                registered.insert(id, Rc::new(category));
            }
        }
        set.categories = registered;

        tracing::info!(
            search_set = %set.id,
            categories = set.categories.len(),
            "search set added"
        );
        self.sets.borrow_mut().insert(set.id.clone(), set);
        Ok(())
    }

    pub fn remove_search_set(&self, id: &str) -> Result<SearchSet, ManagerError> {
        let removed = self.sets.borrow_mut().remove(id);
        match removed {
            Some(set) => {
                tracing::info!(search_set = %id, "search set removed");
                Ok(set)
            }
            None => {
                tracing::warn!(search_set = %id, "remove_search_set: unknown search set");
                Err(ManagerError::SearchSetNotFound(id.to_string()))
            }
        }
    }

    pub fn has_search_set(&self, id: &str) -> bool {
        self.sets.borrow().contains_key(id)
    }

    pub fn add_category(&self, set_id: &str, mut category: Category) -> Result<(), ManagerError> {
        let mut sets = self.sets.borrow_mut();
        let set = sets
            .get_mut(set_id)
            .ok_or_else(|| ManagerError::SearchSetNotFound(set_id.to_string()))?;
        if set.find_category(category.id()).is_some() {
            return Err(ManagerError::CategoryExists(category.id().to_string()));
        }
        self.store.create_or_adjust_category(&mut category.info)?;
        set.add_category(category);
        Ok(())
    }

    pub fn remove_category(&self, set_id: &str, category_id: &str) -> Result<(), ManagerError> {
        let mut sets = self.sets.borrow_mut();
        let set = sets
            .get_mut(set_id)
            .ok_or_else(|| ManagerError::SearchSetNotFound(set_id.to_string()))?;
        if set.remove_category(category_id).is_none() {
            return Err(ManagerError::CategoryNotFound(category_id.to_string()));
        }
        drop(sets);

        match self.store.remove_category(category_id) {
            Ok(()) | Err(StoreError::CategoryNotFound(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    pub fn find_category(&self, category_id: &str) -> Option<Category> {
        self.sets
            .borrow()
            .values()
            .find_map(|set| set.find_category(category_id).cloned())
    }

    pub fn pending_searches(&self) -> usize {
        self.in_flight.get()
    }

    pub fn search(&self, key: &str, on_complete: impl FnOnce(SearchResults) + 'static) {
        let snapshot = match self.store.get_categories() {
            Ok(categories) => categories,
            Err(error) => {
                tracing::warn!(key, %error, "category snapshot failed; searching nothing");
                Vec::new()
            }
        };
        let enabled: Rc<HashMap<String, CategoryInfo>> = Rc::new(
            snapshot
                .iter()
                .filter(|c| c.enabled)
                .map(|c| (c.id.clone(), c.clone()))
                .collect(),
        );

        let targets: Vec<(String, Rc<dyn Provider>, BTreeMap<String, Rc<Category>>)> = self
            .sets
            .borrow()
            .values()
            .filter(|set| set.categories.keys().any(|id| enabled.contains_key(id)))
            .map(|set| (set.id.clone(), Rc::clone(&set.provider), set.categories.clone()))
            .collect();

        tracing::debug!(key, providers = targets.len(), "search started");
        self.in_flight.set(self.in_flight.get() + 1);

        let store = Rc::clone(&self.store);
        let in_flight = Rc::clone(&self.in_flight);
        let task = SearchTask {
            key: key.to_string(),
            intents: HashMap::new(),
        };
        let fan = FanIn::new("search", task, move |task: SearchTask| {
            in_flight.set(in_flight.get().saturating_sub(1));
            let results = finalize(&store, &snapshot, task);
            on_complete(results);
        });

        for (set_id, provider, categories) in targets {
            let branch = fan.branch();
            let enabled = Rc::clone(&enabled);
            let locale = Rc::clone(&self.locale);
            let source_set = set_id.clone();
            let dispatched = provider.search(
                key,
                Box::new(move |source_id: &str, items: Vec<SearchItem>| {
                    let language = locale.language();
                    branch.complete(|task| {
                        collect_intents(
                            task,
                            &source_set,
                            source_id,
                            &categories,
                            &enabled,
                            items,
                            &language,
                        )
                    });
                }),
            );
            if let Err(error) = dispatched {
                tracing::warn!(search_set = %set_id, %error, "provider search failed");
            }
        }

        let finish = fan.seal();
        if let Some(timeout) = self.search_timeout {
            if !finish.is_finished() {
                tokio::task::spawn_local(async move {
                    tokio::time::sleep(timeout).await;
                    finish.finish_now();
                });
            }
        }
    }

    pub async fn search_async(&self, key: &str) -> SearchResults {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.search(key, move |results| {
            let _ = tx.send(results);
        });
        rx.await.unwrap_or_default()
    }
}

fn collect_intents(
    task: &mut SearchTask,
    set_id: &str,
    source_id: &str,
    categories: &BTreeMap<String, Rc<Category>>,
    enabled: &HashMap<String, CategoryInfo>,
    items: Vec<SearchItem>,
    language: &str,
) {
    let count = items.len();
    for item in items {
        let Some(category) = categories.get(&item.category) else {
            tracing::warn!(
                search_set = %set_id,
                key = %item.key,
                category = %item.category,
                "ignoring item: no such category"
            );
            continue;
        };
        if !enabled.contains_key(&item.category) {
            tracing::debug!(key = %item.key, category = %item.category, "ignoring item: category disabled");
            continue;
        }
        let intent = category.generate_intent(&item, language);
        task.intents
            .entry(item.category.clone())
            .or_default()
            .push(intent);
    }
    tracing::debug!(key = %task.key, source = source_id, count, "provider replied");
}

fn finalize(store: &IndexStore, snapshot: &[CategoryInfo], mut task: SearchTask) -> SearchResults {
    let order = match store.get_categories() {
        Ok(current) => current,
        Err(error) => {
            tracing::warn!(%error, "rank ordering unavailable; using search-time snapshot");
            snapshot.to_vec()
        }
    };

    let mut results = Vec::with_capacity(task.intents.len());
    for category in order {
        if let Some(intents) = task.intents.remove(&category.id) {
            results.push(CategoryResult {
                category_id: category.id,
                name: category.name,
                intents,
            });
        }
    }

    let mut leftovers: Vec<_> = task.intents.into_iter().collect();
    leftovers.sort_by(|a, b| a.0.cmp(&b.0));
    for (category_id, intents) in leftovers {
        results.push(CategoryResult {
            name: category_id.clone(),
            category_id,
            intents,
        });
    }

    let total: usize = results.iter().map(|r| r.intents.len()).sum();
    tracing::info!(key = %task.key, categories = results.len(), intents = total, "search finished");
    results
}
