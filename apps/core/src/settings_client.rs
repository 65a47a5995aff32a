use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{json, Value};

use crate::service_client::{BusHandle, ServiceClient, TaskId, INVALID_TASK_ID};

const GET_SYSTEM_SETTINGS: &str = "getSystemSettings";

type LanguageListener = Rc<dyn Fn(&str)>;

pub struct LocaleSettings {
    locale_info: RefCell<String>,
    language: RefCell<String>,
    listeners: RefCell<Vec<LanguageListener>>,
}

impl LocaleSettings {
    pub fn new(default_language: &str) -> Rc<Self> {
        Rc::new(Self {
            locale_info: RefCell::new(String::new()),
            language: RefCell::new(default_language.to_string()),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn language(&self) -> String {
        self.language.borrow().clone()
    }

    pub fn locale_info(&self) -> String {
        self.locale_info.borrow().clone()
    }

    pub fn on_language_change(&self, listener: impl Fn(&str) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn update_locale(&self, locale_info: &str) -> bool {
        if locale_info.is_empty() || *self.locale_info.borrow() == locale_info {
            return false;
        }

        let first_report = self.locale_info.borrow().is_empty();
        let language = locale_info
            .split('-')
            .next()
            .unwrap_or(locale_info)
            .to_string();
        *self.locale_info.borrow_mut() = locale_info.to_string();
        *self.language.borrow_mut() = language.clone();
        tracing::info!(locale = locale_info, %language, "ui locale updated");

        if !first_report {
            let listeners: Vec<LanguageListener> = self.listeners.borrow().clone();
            for listener in listeners {
                listener(&language);
            }
        }
        true
    }
}

pub struct SettingsClient {
    client: ServiceClient,
    locale: Rc<LocaleSettings>,
    subscription: Cell<TaskId>,
}

impl SettingsClient {
    pub fn new(service: &str, handle: Rc<BusHandle>, locale: Rc<LocaleSettings>) -> Rc<Self> {
        let this = Rc::new(Self {
            client: ServiceClient::new(service, handle),
            locale,
            subscription: Cell::new(INVALID_TASK_ID),
        });

        let weak = Rc::downgrade(&this);
        this.client.on_status_change(move |connected| {
            if let Some(this) = weak.upgrade() {
                this.on_server_status_changed(connected);
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

    pub fn subscription(&self) -> TaskId {
        self.subscription.get()
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    fn on_server_status_changed(&self, connected: bool) {
        if !connected {
            self.subscription.set(INVALID_TASK_ID);
            return;
        }

        let locale = Rc::clone(&self.locale);
        let id = self.client.call(
            GET_SYSTEM_SETTINGS,
            json!({ "keys": ["localeInfo"], "subscribe": true }),
            move |payload| apply_settings(&locale, &payload),
            true,
        );
        self.subscription.set(id);
    }
}

fn apply_settings(locale: &LocaleSettings, payload: &Value) {
    if payload.get("returnValue").and_then(Value::as_bool) == Some(false) {
        tracing::warn!("invalid message from settings service");
        return;
    }
    let Some(ui) = payload
        .pointer("/settings/localeInfo/locales/UI")
        .and_then(Value::as_str)
    else {
        return;
    };
    locale.update_locale(ui);
}
