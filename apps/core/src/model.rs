use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const RANK_MAX: i64 = 999_999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: String,
    pub name: String,
    pub rank: i64,
    pub enabled: bool,
}

impl CategoryInfo {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            rank: RANK_MAX,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub category: String,
    pub key: String,
    pub value: String,
    pub display: Value,
    pub extra: Value,
}

impl SearchItem {
    pub fn new(category: &str, key: &str, value: &str, display: Value) -> Self {
        Self {
            category: category.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            display,
            extra: Value::Null,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub category: String,
    pub action: String,
    pub uri: String,
    pub base: Map<String, Value>,
    pub display: Value,
    pub extra: Value,
}

impl Intent {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            action: String::new(),
            uri: String::new(),
            base: Map::new(),
            display: Value::Null,
            extra: Value::Null,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = self.base.clone();
        if !self.action.is_empty() {
            obj.insert("action".into(), Value::String(self.action.clone()));
        }
        if !self.uri.is_empty() {
            obj.insert("uri".into(), Value::String(self.uri.clone()));
        }
        if !self.extra.is_null() {
            obj.insert("extra".into(), self.extra.clone());
        }
        if !self.display.is_null() {
            obj.insert("display".into(), self.display.clone());
        }
        Value::Object(obj)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub category_id: String,
    pub name: String,
    pub intents: Vec<Intent>,
}

pub type SearchResults = Vec<CategoryResult>;
