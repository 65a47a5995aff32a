//! Everything here runs on one thread; handlers and deliveries are spawned with
//! `tokio::task::spawn_local`, so the bus must be used inside a `LocalSet`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub type MethodHandler = Rc<dyn Fn(Value, Responder)>;

#[derive(Clone)]
pub struct Responder {
    tx: UnboundedSender<Value>,
}

impl Responder {
    pub fn respond(&self, payload: Value) -> bool {
        self.tx.send(payload).is_ok()
    }
}

pub struct PendingReply {
    rx: UnboundedReceiver<Value>,
}

impl PendingReply {
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

#[derive(Default)]
struct ServiceEntry {
    connected: bool,
    methods: HashMap<String, MethodHandler>,
    watchers: Vec<UnboundedSender<Value>>,
}

#[derive(Default)]
pub struct LocalBus {
    services: RefCell<HashMap<String, ServiceEntry>>,
}

impl LocalBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn register_service(&self, name: &str) {
        self.set_connected(name, true);
        tracing::info!(service = name, "service registered");
    }

    pub fn unregister_service(&self, name: &str) {
        if let Some(entry) = self.services.borrow_mut().get_mut(name) {
            entry.methods.clear();
        }
        self.set_connected(name, false);
        tracing::info!(service = name, "service unregistered");
    }

    pub fn register_method(&self, service: &str, method: &str, handler: MethodHandler) {
        self.services
            .borrow_mut()
            .entry(service.to_string())
            .or_default()
            .methods
            .insert(method.to_string(), handler);
    }

    pub fn is_connected(&self, service: &str) -> bool {
        self.services
            .borrow()
            .get(service)
            .map(|entry| entry.connected)
            .unwrap_or(false)
    }

    pub fn call(&self, uri: &str, payload: Value) -> PendingReply {
        let (tx, rx) = mpsc::unbounded_channel();
        let responder = Responder { tx };

        let handler = match resolve(uri) {
            Some((service, method)) => {
                let services = self.services.borrow();
                match services.get(service) {
                    Some(entry) if entry.connected => entry.methods.get(method).cloned(),
                    _ => None,
                }
            }
            None => None,
        };

        match handler {
            Some(handler) => {
                tokio::task::spawn_local(async move {
                    handler(payload, responder);
                });
            }
            None => {
                tracing::debug!(uri, "call to unknown service method");
                responder.respond(json!({
                    "returnValue": false,
                    "errorCode": -1,
                    "errorText": format!("Unknown method: {uri}"),
                }));
            }
        }

        PendingReply { rx }
    }

    pub fn watch_server_status(&self, service: &str) -> PendingReply {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut services = self.services.borrow_mut();
        let entry = services.entry(service.to_string()).or_default();
        let _ = tx.send(json!({ "connected": entry.connected }));
        entry.watchers.push(tx);
        PendingReply { rx }
    }

    fn set_connected(&self, name: &str, connected: bool) {
        let mut services = self.services.borrow_mut();
        let entry = services.entry(name.to_string()).or_default();
        entry.connected = connected;
        entry
            .watchers
            .retain(|watcher| watcher.send(json!({ "connected": connected })).is_ok());
    }
}

fn resolve(uri: &str) -> Option<(&str, &str)> {
    let (service, method) = uri.split_once('/')?;
    if service.is_empty() || method.is_empty() {
        return None;
    }
    Some((service, method))
}

pub fn method_uri(service: &str, method: &str) -> String {
    format!("{service}/{method}")
}
