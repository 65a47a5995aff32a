use serde_json::Value;

use crate::model::{CategoryInfo, Intent, SearchItem};

pub const DEFAULT_LANGUAGE: &str = "en";
const APP_URI_SCHEME: &str = "app://";
const DEFAULT_LAUNCH_POINT_SUFFIX: &str = "_default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryKind {
    Stored { action: String },
    Application,
    ApplicationContent { app_id: String },
    RemoteCatalog { kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub info: CategoryInfo,
    pub kind: CategoryKind,
}

impl Category {
    pub fn new(id: &str, name: &str, kind: CategoryKind) -> Self {
        Self {
            info: CategoryInfo::new(id, name),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn generate_intent(&self, item: &SearchItem, language: &str) -> Intent {
        let mut intent = Intent::new(&self.info.id);
        intent.extra = item.extra.clone();

        match &self.kind {
            CategoryKind::Stored { action } => {
                intent.action = action.clone();
                intent.uri = item.key.clone();
                intent.display = item.display.clone();
            }
            CategoryKind::Application => {
                let name = item
                    .key
                    .strip_suffix(DEFAULT_LAUNCH_POINT_SUFFIX)
                    .unwrap_or(&item.key);
                intent
                    .base
                    .insert("name".into(), Value::String(name.to_string()));
                intent.action = "launch".into();
                intent.uri = format!("{APP_URI_SCHEME}{}", item.key);
                intent.display = item.display.clone();
            }
            CategoryKind::ApplicationContent { app_id } => {
                intent
                    .base
                    .insert("name".into(), Value::String(app_id.clone()));
                intent.action = "view".into();
                intent.uri = item.key.clone();
                intent.display = localize_title(&item.display, language);
            }
            CategoryKind::RemoteCatalog { kind } => {
                intent.base.insert("kind".into(), Value::String(kind.clone()));
                intent.action = "view".into();
                intent.uri = item.key.clone();
                intent.display = item.display.clone();
            }
        }
        intent
    }
}

pub fn localize_title(display: &Value, language: &str) -> Value {
    let mut display = display.clone();
    let Some(obj) = display.as_object_mut() else {
        return display;
    };
    let Some(Value::Object(titles)) = obj.get("title") else {
        return display;
    };

    let title = titles
        .get(language)
        .or_else(|| titles.get(DEFAULT_LANGUAGE))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    obj.insert("title".into(), Value::String(title));
    display
}
