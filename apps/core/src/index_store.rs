use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::model::{CategoryInfo, SearchItem, RANK_MAX};
use crate::provider::{Provider, ProviderError, SearchCallback};

pub const STORE_PROVIDER_ID: &str = "storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("payload encoding: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("category not found: {0}")]
    CategoryNotFound(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryUpdate {
    pub id: String,
    pub rank: Option<i64>,
    pub enabled: Option<bool>,
    pub name: Option<String>,
}

pub struct IndexStore {
    db: Connection,
}

impl IndexStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Connection::open(path)?;
        let store = Self { db };
        store.init_schema()?;
        tracing::info!(path = %path.display(), "index store opened");
        Ok(store)
    }

    pub fn open_memory() -> Result<Self, StoreError> {
        let store = Self {
            db: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.db.execute_batch(
            "CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                rank INTEGER NOT NULL,
                enabled INTEGER NOT NULL
             );
             CREATE VIRTUAL TABLE IF NOT EXISTS search_items USING fts5(
                category UNINDEXED,
                item_key UNINDEXED,
                text,
                display UNINDEXED,
                extra UNINDEXED
             );",
        )?;
        Ok(())
    }

    pub fn create_or_adjust_category(&self, category: &mut CategoryInfo) -> Result<(), StoreError> {
        let result = self.create_or_adjust_inner(category);
        if let Err(error) = &result {
            tracing::warn!(category = %category.id, %error, "create_or_adjust_category failed");
        }
        result
    }

    fn create_or_adjust_inner(&self, category: &mut CategoryInfo) -> Result<(), StoreError> {
        if let Some(stored) = self.get_category(&category.id)? {
            category.name = stored.name;
            category.rank = stored.rank;
            category.enabled = stored.enabled;
            tracing::debug!(category = %category.id, rank = category.rank, "category adopted");
            return Ok(());
        }

        let max_rank: i64 = self.db.query_row(
            "SELECT COALESCE(MAX(rank), 0) FROM categories WHERE enabled = 1",
            [],
            |row| row.get(0),
        )?;
        let rank = max_rank + 1;
        self.db.execute(
            "INSERT INTO categories (id, name, rank, enabled) VALUES (?1, ?2, ?3, 1)",
            params![category.id, category.name, rank],
        )?;
        category.rank = rank;
        category.enabled = true;
        tracing::info!(category = %category.id, rank, "category created");
        Ok(())
    }

    pub fn remove_category(&self, id: &str) -> Result<(), StoreError> {
        let Some(existing) = self.get_category(id)? else {
            tracing::warn!(category = %id, "remove_category: unknown category");
            return Err(StoreError::CategoryNotFound(id.to_string()));
        };

        let tx = self.db.unchecked_transaction()?;
        if existing.enabled {
            shift_ranks(&tx, id, -1, existing.rank + 1, RANK_MAX - 1)?;
        }
        tx.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM search_items WHERE category = ?1", params![id])?;
        tx.commit()?;
        tracing::info!(category = %id, "category removed");
        Ok(())
    }

    /// Applies a rank/enable/name change while keeping enabled ranks a dense
    /// permutation of `1..=N`.
    pub fn update_category(&self, update: &CategoryUpdate) -> Result<CategoryInfo, StoreError> {
        let result = self.update_category_inner(update);
        if let Err(error) = &result {
            tracing::warn!(category = %update.id, %error, "update_category failed");
        }
        result
    }

    fn update_category_inner(&self, update: &CategoryUpdate) -> Result<CategoryInfo, StoreError> {
        let categories = self.get_categories()?;
        let target = categories
            .iter()
            .find(|c| c.id == update.id)
            .cloned()
            .ok_or_else(|| StoreError::CategoryNotFound(update.id.clone()))?;

        let old_rank = target.rank;
        let old_enabled = target.enabled;
        let new_enabled = update.enabled.unwrap_or(old_enabled);
        let others_enabled = categories
            .iter()
            .filter(|c| c.enabled && c.id != target.id)
            .count() as i64;
        let count_enabled = others_enabled + i64::from(new_enabled);

        let tx = self.db.unchecked_transaction()?;
        let new_rank = match (old_enabled, new_enabled) {
            (true, false) => {
                shift_ranks(&tx, &target.id, -1, old_rank + 1, RANK_MAX - 1)?;
                RANK_MAX
            }
            (false, false) => RANK_MAX,
            (was_enabled, true) => {
                // A category being enabled enters at the tail, then moves.
                let from = if was_enabled { old_rank } else { count_enabled };
                let to = update.rank.unwrap_or(from).clamp(1, count_enabled.max(1));
                if to > from {
                    shift_ranks(&tx, &target.id, -1, from + 1, to)?;
                } else if to < from {
                    shift_ranks(&tx, &target.id, 1, to, from - 1)?;
                }
                to
            }
        };

        let name = update.name.clone().unwrap_or(target.name);
        tx.execute(
            "UPDATE categories SET name = ?2, rank = ?3, enabled = ?4 WHERE id = ?1",
            params![target.id, name, new_rank, new_enabled],
        )?;
        tx.commit()?;

        tracing::info!(
            category = %target.id,
            old_rank,
            new_rank,
            enabled = new_enabled,
            "category updated"
        );
        Ok(CategoryInfo {
            id: target.id,
            name,
            rank: new_rank,
            enabled: new_enabled,
        })
    }

    pub fn get_category(&self, id: &str) -> Result<Option<CategoryInfo>, StoreError> {
        let category = self
            .db
            .query_row(
                "SELECT id, name, rank, enabled FROM categories WHERE id = ?1",
                params![id],
                read_category,
            )
            .optional()?;
        Ok(category)
    }

    pub fn get_categories(&self) -> Result<Vec<CategoryInfo>, StoreError> {
        let mut stmt = self
            .db
            .prepare("SELECT id, name, rank, enabled FROM categories ORDER BY rank ASC, id ASC")?;
        let rows = stmt.query_map([], read_category)?;
        let categories = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn insert_item(&self, item: &SearchItem) -> Result<(), StoreError> {
        let display = serde_json::to_string(&item.display)?;
        let extra = serde_json::to_string(&item.extra)?;

        let tx = self.db.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM search_items WHERE category = ?1 AND item_key = ?2",
            params![item.category, item.key],
        )?;
        tx.execute(
            "INSERT INTO search_items (category, item_key, text, display, extra)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![item.category, item.key, item.value, display, extra],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn remove_item(&self, category: &str, key: Option<&str>) -> Result<usize, StoreError> {
        let removed = match key {
            Some(key) => self.db.execute(
                "DELETE FROM search_items WHERE category = ?1 AND item_key = ?2",
                params![category, key],
            )?,
            None => self.db.execute(
                "DELETE FROM search_items WHERE category = ?1",
                params![category],
            )?,
        };
        tracing::debug!(category, key = key.unwrap_or("*"), removed, "items removed");
        Ok(removed)
    }

    pub fn count_items(&self, category: &str) -> Result<usize, StoreError> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM search_items WHERE category = ?1",
            params![category],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn search_items(&self, key: &str) -> Result<Vec<SearchItem>, StoreError> {
        let Some(expression) = prefix_expression(key) else {
            return Ok(Vec::new());
        };

        let mut stmt = self.db.prepare(
            "SELECT category, item_key, text, display, extra FROM search_items
             WHERE search_items MATCH ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![expression], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (category, key, value, display, extra) = row?;
            items.push(SearchItem {
                category,
                key,
                value,
                display: serde_json::from_str(&display)?,
                extra: serde_json::from_str(&extra)?,
            });
        }
        Ok(items)
    }
}

impl Provider for IndexStore {
    fn provider_id(&self) -> &str {
        STORE_PROVIDER_ID
    }

    fn search(&self, key: &str, callback: SearchCallback) -> Result<(), ProviderError> {
        match self.search_items(key) {
            Ok(items) => {
                tracing::debug!(key, count = items.len(), "store search");
                callback(STORE_PROVIDER_ID, items);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(key, %error, "store search failed");
                Err(ProviderError::new(error.to_string()))
            }
        }
    }
}

fn read_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<CategoryInfo> {
    Ok(CategoryInfo {
        id: row.get(0)?,
        name: row.get(1)?,
        rank: row.get(2)?,
        enabled: row.get(3)?,
    })
}

fn shift_ranks(
    db: &Connection,
    skip_id: &str,
    delta: i64,
    start: i64,
    end: i64,
) -> Result<(), StoreError> {
    if start > end {
        return Ok(());
    }
    db.execute(
        "UPDATE categories SET rank = rank + ?1
         WHERE enabled = 1 AND id != ?2 AND rank BETWEEN ?3 AND ?4",
        params![delta, skip_id, start, end],
    )?;
    Ok(())
}

fn prefix_expression(key: &str) -> Option<String> {
    let tokens: Vec<String> = key
        .split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| format!("\"{}\"*", token.replace('"', "\"\"")))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}
