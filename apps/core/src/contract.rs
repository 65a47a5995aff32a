use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{CategoryInfo, CategoryResult};

pub const METHOD_SEARCH: &str = "search";
pub const METHOD_GET_CATEGORIES: &str = "getCategories";
pub const METHOD_UPDATE_CATEGORY: &str = "updateCategory";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRequest {
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreRequest {
    Search(SearchRequest),
    GetCategories,
    UpdateCategory(UpdateCategoryRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestEnvelope {
    pub method: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResultDto {
    pub category_id: String,
    pub name: String,
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub return_value: bool,
    pub results: Vec<CategoryResultDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetCategoriesResponse {
    pub return_value: bool,
    pub enabled: Vec<CategorySummary>,
    pub disabled: Vec<CategorySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryResponse {
    pub return_value: bool,
    pub category: CategoryInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CoreResponse {
    Search(SearchResponse),
    GetCategories(GetCategoriesResponse),
    UpdateCategory(UpdateCategoryResponse),
}

impl From<CategoryResult> for CategoryResultDto {
    fn from(value: CategoryResult) -> Self {
        Self {
            category_id: value.category_id,
            name: value.name,
            items: value.intents.iter().map(|intent| intent.to_json()).collect(),
        }
    }
}

impl From<&CategoryInfo> for CategorySummary {
    fn from(value: &CategoryInfo) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
        }
    }
}
