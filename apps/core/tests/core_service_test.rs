mod common;

use std::rc::Rc;

use unisearch_core::contract::{SearchRequest, UpdateCategoryRequest};
use unisearch_core::core_service::{CoreService, ServiceError};
use unisearch_core::index_store::IndexStore;
use unisearch_core::search_manager::SearchSet;

use common::{item, memory_store, stored};

fn service() -> (Rc<IndexStore>, CoreService) {
    let store = memory_store();
    let manager = common::manager(&store);
    let mut set = SearchSet::new("local", store.clone());
    set.add_category(stored("bookmarks"));
    set.add_category(stored("notes"));
    manager.add_search_set(set).unwrap();
    store
        .insert_item(&item("bookmarks", "https://rust.example", "Rust Book"))
        .unwrap();
    store
        .insert_item(&item("notes", "note-1", "Rust ownership notes"))
        .unwrap();
    (store, CoreService::with_min_key_length(manager, 2))
}

fn search(key: Option<&str>) -> SearchRequest {
    SearchRequest {
        key: key.map(str::to_string),
    }
}

fn update(id: &str) -> UpdateCategoryRequest {
    UpdateCategoryRequest {
        id: Some(id.to_string()),
        ..Default::default()
    }
}

#[tokio::test(flavor = "current_thread")]
async fn search_returns_categories_in_rank_order() {
    let (_store, service) = service();

    let response = service.search(&search(Some("  rust "))).await.unwrap();

    assert!(response.return_value);
    let ids: Vec<&str> = response
        .results
        .iter()
        .map(|result| result.category_id.as_str())
        .collect();
    assert_eq!(ids, vec!["bookmarks", "notes"]);
    assert_eq!(response.results[0].items[0]["uri"], "https://rust.example");
    assert_eq!(response.results[0].items[0]["action"], "view");
}

#[tokio::test(flavor = "current_thread")]
async fn search_key_is_validated() {
    let (_store, service) = service();

    assert!(matches!(
        service.search(&search(None)).await,
        Err(ServiceError::MissingKey)
    ));
    assert!(matches!(
        service.search(&search(Some("   "))).await,
        Err(ServiceError::MissingKey)
    ));
    assert!(matches!(
        service.search(&search(Some(" r "))).await,
        Err(ServiceError::KeyTooShort(2))
    ));
    let response = service.search(&search(Some("zz"))).await.unwrap();
    assert!(response.results.is_empty());
}

#[test]
fn get_categories_splits_by_state() {
    let (_store, service) = service();
    service
        .update_category(&UpdateCategoryRequest {
            enabled: Some(false),
            ..update("notes")
        })
        .unwrap();

    let response = service.get_categories().unwrap();

    assert!(response.return_value);
    let enabled: Vec<&str> = response.enabled.iter().map(|c| c.id.as_str()).collect();
    let disabled: Vec<&str> = response.disabled.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(enabled, vec!["bookmarks"]);
    assert_eq!(disabled, vec!["notes"]);
}

#[test]
fn update_category_moves_rank_and_renames() {
    let (store, service) = service();

    let response = service
        .update_category(&UpdateCategoryRequest {
            rank: Some(1),
            name: Some("My Notes".into()),
            ..update("notes")
        })
        .unwrap();

    assert_eq!(response.category.rank, 1);
    assert_eq!(response.category.name, "My Notes");
    assert_eq!(store.get_category("bookmarks").unwrap().unwrap().rank, 2);
}

#[test]
fn update_category_rejects_bad_requests() {
    let (_store, service) = service();

    assert!(matches!(
        service.update_category(&UpdateCategoryRequest::default()),
        Err(ServiceError::MissingId)
    ));
    assert!(matches!(
        service.update_category(&UpdateCategoryRequest {
            rank: Some(1),
            ..update("missing")
        }),
        Err(ServiceError::CategoryNotFound(id)) if id == "missing"
    ));
    assert!(matches!(
        service.update_category(&update("notes")),
        Err(ServiceError::MissingRank)
    ));
    assert!(matches!(
        service.update_category(&UpdateCategoryRequest {
            enabled: Some(false),
            rank: Some(1),
            ..update("notes")
        }),
        Err(ServiceError::UnexpectedRank)
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn disabled_category_can_be_re_enabled_at_a_rank() {
    let (store, service) = service();
    service
        .update_category(&UpdateCategoryRequest {
            enabled: Some(false),
            ..update("bookmarks")
        })
        .unwrap();

    let response = service.search(&search(Some("rust"))).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].category_id, "notes");

    service
        .update_category(&UpdateCategoryRequest {
            enabled: Some(true),
            rank: Some(1),
            ..update("bookmarks")
        })
        .unwrap();
    assert_eq!(store.get_category("bookmarks").unwrap().unwrap().rank, 1);
    assert_eq!(store.get_category("notes").unwrap().unwrap().rank, 2);
}
