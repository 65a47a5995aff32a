use std::rc::Rc;

use thiserror::Error;

use crate::config::Config;
use crate::contract::{
    CategoryResultDto, CategorySummary, CoreRequest, CoreResponse, GetCategoriesResponse,
    SearchRequest, SearchResponse, UpdateCategoryRequest, UpdateCategoryResponse,
};
use crate::index_store::{CategoryUpdate, StoreError};
use crate::search_manager::SearchManager;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("'key' isn't specified")]
    MissingKey,
    #[error("'key' must be at least {0} characters")]
    KeyTooShort(usize),
    #[error("'id' isn't specified")]
    MissingId,
    #[error("'rank' is required when the category stays enabled")]
    MissingRank,
    #[error("'rank' can't be given when disabling a category")]
    UnexpectedRank,
    #[error("category not found: {0}")]
    CategoryNotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct CoreService {
    manager: Rc<SearchManager>,
    min_key_length: usize,
}

impl CoreService {
    pub fn new(manager: Rc<SearchManager>, config: &Config) -> Self {
        Self {
            manager,
            min_key_length: config.min_key_length,
        }
    }

    pub fn with_min_key_length(manager: Rc<SearchManager>, min_key_length: usize) -> Self {
        Self {
            manager,
            min_key_length,
        }
    }

    pub fn manager(&self) -> &Rc<SearchManager> {
        &self.manager
    }

    pub async fn handle_command(&self, request: CoreRequest) -> Result<CoreResponse, ServiceError> {
        match request {
            CoreRequest::Search(request) => self.search(&request).await.map(CoreResponse::Search),
            CoreRequest::GetCategories => self.get_categories().map(CoreResponse::GetCategories),
            CoreRequest::UpdateCategory(request) => {
                self.update_category(&request).map(CoreResponse::UpdateCategory)
            }
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ServiceError> {
        let key = request
            .key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ServiceError::MissingKey)?;
        if key.chars().count() < self.min_key_length {
            return Err(ServiceError::KeyTooShort(self.min_key_length));
        }

        let results = self.manager.search_async(key).await;
        Ok(SearchResponse {
            return_value: true,
            results: results.into_iter().map(CategoryResultDto::from).collect(),
        })
    }

    pub fn get_categories(&self) -> Result<GetCategoriesResponse, ServiceError> {
        let categories = self.manager.store().get_categories()?;
        let (enabled, disabled): (Vec<_>, Vec<_>) =
            categories.iter().partition(|category| category.enabled);
        Ok(GetCategoriesResponse {
            return_value: true,
            enabled: enabled.into_iter().map(CategorySummary::from).collect(),
            disabled: disabled.into_iter().map(CategorySummary::from).collect(),
        })
    }

    pub fn update_category(
        &self,
        request: &UpdateCategoryRequest,
    ) -> Result<UpdateCategoryResponse, ServiceError> {
        let id = request
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ServiceError::MissingId)?;
        let current = self
            .manager
            .store()
            .get_category(id)?
            .ok_or_else(|| ServiceError::CategoryNotFound(id.to_string()))?;

        let enabled = request.enabled.unwrap_or(current.enabled);
        match (enabled, request.rank) {
            (true, None) => return Err(ServiceError::MissingRank),
            (false, Some(_)) => return Err(ServiceError::UnexpectedRank),
            _ => {}
        }

        let update = CategoryUpdate {
            id: id.to_string(),
            rank: request.rank,
            enabled: request.enabled,
            name: request.name.clone(),
        };
        let category = match self.manager.store().update_category(&update) {
            Ok(category) => category,
            Err(StoreError::CategoryNotFound(id)) => return Err(ServiceError::CategoryNotFound(id)),
            Err(error) => return Err(error.into()),
        };
        tracing::info!(
            category = %category.id,
            rank = category.rank,
            enabled = category.enabled,
            "category updated"
        );
        Ok(UpdateCategoryResponse {
            return_value: true,
            category,
        })
    }
}
