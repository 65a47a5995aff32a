mod common;

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};
use tokio::task::LocalSet;

use unisearch_core::bus::LocalBus;
use unisearch_core::catalog::{
    media_search_set, CatalogClient, CatalogKind, CatalogSource, AUDIO_CATEGORY,
};
use unisearch_core::model::SearchItem;
use unisearch_core::provider::Provider;
use unisearch_core::service_client::{BusHandle, INVALID_TASK_ID};

use common::{memory_store, settle, FakeService};

fn song(path: &str, title: &str, artist: &str) -> Value {
    json!({ "file_path": path, "title": title, "artist": artist, "thumbnail": format!("{path}.jpg") })
}

fn catalog_service(bus: &LocalBus) -> Rc<FakeService> {
    let songs = vec![
        song("/media/blue.mp3", "Blue Train", "Coltrane"),
        song("/media/giant.mp3", "Giant Steps", "Coltrane"),
        song("/media/cold.mp3", "Cold Duck", "Blue Note Trio"),
    ];
    let service = FakeService::new("media-catalog");
    service.method(bus, "find", move |payload| {
        let clause = &payload["query"]["where"][0];
        let prop = clause["prop"].as_str().unwrap_or_default().to_string();
        let prefix = clause["val"].as_str().unwrap_or_default().to_lowercase();
        let results: Vec<Value> = songs
            .iter()
            .filter(|song| {
                song[prop.as_str()]
                    .as_str()
                    .is_some_and(|v| v.to_lowercase().starts_with(&prefix))
            })
            .cloned()
            .collect();
        json!({ "returnValue": true, "results": results })
    });
    bus.register_service("media-catalog");
    service
}

fn connected_client(bus: &Rc<LocalBus>) -> Rc<CatalogClient> {
    let handle = BusHandle::new();
    handle.attach(Rc::clone(bus));
    let client = CatalogClient::new("media-catalog", handle);
    client.initialize();
    client
}

type Replies = Rc<RefCell<Vec<(String, Vec<SearchItem>)>>>;

fn run(provider: &dyn Provider, key: &str) -> Replies {
    let replies: Replies = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&replies);
    provider
        .search(
            key,
            Box::new(move |source: &str, items: Vec<SearchItem>| {
                sink.borrow_mut().push((source.to_string(), items))
            }),
        )
        .unwrap();
    replies
}

#[tokio::test(flavor = "current_thread")]
async fn find_sends_prefix_query() {
    LocalSet::new()
        .run_until(async {
            let bus = LocalBus::new();
            let service = catalog_service(&bus);
            let client = connected_client(&bus);
            settle().await;

            let rows = Rc::new(RefCell::new(None));
            let sink = Rc::clone(&rows);
            let id = client.find("media.audio:1", "title", "gi", move |result| {
                *sink.borrow_mut() = Some(result.unwrap());
            });
            assert_ne!(id, INVALID_TASK_ID);
            settle().await;

            assert_eq!(rows.borrow().as_ref().unwrap().len(), 1);
            let (_, request) = service.requests.borrow()[0].clone();
            assert_eq!(
                request,
                json!({
                    "query": {
                        "from": "media.audio:1",
                        "where": [{ "prop": "title", "op": "%", "val": "gi", "collate": "primary" }]
                    }
                })
            );
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn merges_targets_without_duplicates() {
    LocalSet::new()
        .run_until(async {
            let bus = LocalBus::new();
            let _service = catalog_service(&bus);
            let client = connected_client(&bus);
            settle().await;

            let source = CatalogSource::new("catalog", client);
            assert!(source.add_kind(
                "media.audio",
                CatalogKind::new("media.audio:1", &["title", "artist"]).with_extras(&["artist"]),
            ));
            assert!(!source.add_kind("media.audio", CatalogKind::new("media.audio:1", &["title"])));
            assert!(!source.add_kind("empty", CatalogKind::new("media.audio:1", &[])));

            let replies = run(&source, "blue");
            settle().await;

            let replies = replies.borrow();
            assert_eq!(replies.len(), 1);
            let (source_id, items) = &replies[0];
            assert_eq!(source_id, "catalog");
            let mut keys: Vec<&str> = items.iter().map(|item| item.key.as_str()).collect();
            keys.sort();
            assert_eq!(keys, vec!["/media/blue.mp3", "/media/cold.mp3"]);

            let blue = items.iter().find(|item| item.key == "/media/blue.mp3").unwrap();
            assert_eq!(blue.value, "Blue Train");
            assert_eq!(blue.display["icon"], "/media/blue.mp3.jpg");
            assert_eq!(blue.extra, json!({ "artist": "Coltrane" }));

            let coltrane = run(&source, "colt");
            settle().await;
            assert_eq!(coltrane.borrow()[0].1.len(), 2);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn disconnected_catalog_replies_empty() {
    LocalSet::new()
        .run_until(async {
            let bus = LocalBus::new();
            let client = connected_client(&bus);
            settle().await;
            assert!(!client.client().is_connected());

            let dropped = client.find("media.audio:1", "title", "x", |_| panic!("not called"));
            assert_eq!(dropped, INVALID_TASK_ID);

            let source = CatalogSource::new("catalog", Rc::clone(&client));
            source.add_kind("media.audio", CatalogKind::new("media.audio:1", &["title"]));
            let replies = run(&source, "blue");
            settle().await;

            let replies = replies.borrow();
            assert_eq!(replies.len(), 1);
            assert!(replies[0].1.is_empty());
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn removed_kind_is_no_longer_queried() {
    LocalSet::new()
        .run_until(async {
            let bus = LocalBus::new();
            let service = catalog_service(&bus);
            let client = connected_client(&bus);
            settle().await;

            let source = CatalogSource::new("catalog", client);
            source.add_kind("media.audio", CatalogKind::new("media.audio:1", &["title"]));
            assert!(source.remove_kind("media.audio"));
            assert!(!source.remove_kind("media.audio"));

            let replies = run(&source, "blue");
            settle().await;
            assert_eq!(replies.borrow()[0].1.len(), 0);
            assert_eq!(service.request_count("find"), 0);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn media_set_answers_through_the_search_manager() {
    LocalSet::new()
        .run_until(async {
            let bus = LocalBus::new();
            let _service = catalog_service(&bus);
            let client = connected_client(&bus);
            settle().await;

            let store = memory_store();
            let manager = common::manager(&store);
            manager.add_search_set(media_search_set(client)).unwrap();

            let results = manager.search_async("giant").await;

            assert_eq!(results.len(), 1);
            assert_eq!(results[0].category_id, AUDIO_CATEGORY);
            let intent = &results[0].intents[0];
            assert_eq!(intent.action, "view");
            assert_eq!(intent.uri, "/media/giant.mp3");
            assert_eq!(intent.display["artist"], "Coltrane");
        })
        .await;
}
