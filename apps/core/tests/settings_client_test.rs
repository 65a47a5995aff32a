mod common;

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use tokio::task::LocalSet;

use unisearch_core::bus::LocalBus;
use unisearch_core::service_client::BusHandle;
use unisearch_core::settings_client::{LocaleSettings, SettingsClient};

use common::{settle, FakeService};

fn locale_payload(ui: &str) -> serde_json::Value {
    json!({
        "returnValue": true,
        "settings": { "localeInfo": { "locales": { "UI": ui } } }
    })
}

#[tokio::test(flavor = "current_thread")]
async fn follows_ui_locale_from_settings_service() {
    LocalSet::new()
        .run_until(async {
            let bus = LocalBus::new();
            let settings = FakeService::new("settings");
            settings.method(&bus, "getSystemSettings", |_| locale_payload("en-US"));
            bus.register_service("settings");

            let handle = BusHandle::new();
            let locale = LocaleSettings::new("en");
            let changes = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&changes);
            locale.on_language_change(move |language| sink.borrow_mut().push(language.to_string()));

            let client = SettingsClient::new("settings", Rc::clone(&handle), Rc::clone(&locale));
            client.initialize();
            handle.attach(Rc::clone(&bus));
            settle().await;

            assert_eq!(locale.locale_info(), "en-US");
            assert_eq!(locale.language(), "en");
            assert!(changes.borrow().is_empty());
            let (_, request) = settings.requests.borrow()[0].clone();
            assert_eq!(request, json!({ "keys": ["localeInfo"], "subscribe": true }));

            settings.push("getSystemSettings", locale_payload("ko-KR"));
            settle().await;
            assert_eq!(locale.language(), "ko");
            assert_eq!(*changes.borrow(), vec!["ko".to_string()]);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn ignores_failed_and_partial_replies() {
    LocalSet::new()
        .run_until(async {
            let bus = LocalBus::new();
            let settings = FakeService::new("settings");
            settings.method(&bus, "getSystemSettings", |_| {
                json!({ "returnValue": false, "errorText": "denied" })
            });
            bus.register_service("settings");

            let handle = BusHandle::new();
            handle.attach(Rc::clone(&bus));
            let locale = LocaleSettings::new("en");
            let client = SettingsClient::new("settings", handle, Rc::clone(&locale));
            client.initialize();
            settle().await;

            assert_eq!(locale.locale_info(), "");
            assert_eq!(locale.language(), "en");

            settings.push("getSystemSettings", json!({ "returnValue": true, "settings": {} }));
            settle().await;
            assert_eq!(locale.language(), "en");
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn resubscribes_after_settings_service_restarts() {
    LocalSet::new()
        .run_until(async {
            let bus = LocalBus::new();
            let settings = FakeService::new("settings");
            settings.method(&bus, "getSystemSettings", |_| locale_payload("en-US"));
            bus.register_service("settings");

            let handle = BusHandle::new();
            handle.attach(Rc::clone(&bus));
            let locale = LocaleSettings::new("en");
            let client = SettingsClient::new("settings", handle, Rc::clone(&locale));
            client.initialize();
            settle().await;
            assert_eq!(client.subscription(), 1);

            bus.unregister_service("settings");
            settle().await;
            assert_eq!(client.subscription(), 0);

            settings.method(&bus, "getSystemSettings", |_| locale_payload("de-DE"));
            bus.register_service("settings");
            settle().await;
            assert_eq!(settings.request_count("getSystemSettings"), 2);
            assert_eq!(locale.language(), "de");
        })
        .await;
}
