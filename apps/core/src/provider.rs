use thiserror::Error;

use crate::model::SearchItem;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type SearchCallback = Box<dyn FnOnce(&str, Vec<SearchItem>)>;

/// A source of search items.
///
/// `search` may answer synchronously or later from the event loop. The callback
/// must be invoked at most once; dropping it without invoking it (including when
/// `search` returns an error) is treated as an empty reply by the caller.
pub trait Provider {
    fn provider_id(&self) -> &str;
    fn search(&self, key: &str, callback: SearchCallback) -> Result<(), ProviderError>;
}

pub struct StaticProvider {
    id: String,
    items: Vec<SearchItem>,
}

impl StaticProvider {
    pub fn new(id: &str, items: Vec<SearchItem>) -> Self {
        Self {
            id: id.to_string(),
            items,
        }
    }
}

impl Provider for StaticProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn search(&self, key: &str, callback: SearchCallback) -> Result<(), ProviderError> {
        let needle = key.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ProviderError::new("empty search key"));
        }
        let matched = self
            .items
            .iter()
            .filter(|item| {
                item.value
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|word| word.starts_with(&needle))
            })
            .cloned()
            .collect();
        callback(&self.id, matched);
        Ok(())
    }
}
