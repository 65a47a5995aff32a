//! Request/subscribe multiplexer over the bus, tracking whether the remote
//! service is up.
//!
//! State machine: `Deferred` (no bus yet) -> `Registered` -> `Connected` <->
//! `Disconnected`. Calls are only issued while connected; a disconnect cancels
//! every pending call and restarts task ids from 1.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::bus::{method_uri, LocalBus};

pub type TaskId = u64;

pub const INVALID_TASK_ID: TaskId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Deferred,
    Registered,
    Connected,
    Disconnected,
}

#[derive(Default)]
pub struct BusHandle {
    bus: RefCell<Option<Rc<LocalBus>>>,
    deferred: RefCell<Vec<ServiceClient>>,
}

impl BusHandle {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn get(&self) -> Option<Rc<LocalBus>> {
        self.bus.borrow().clone()
    }

    pub fn attach(&self, bus: Rc<LocalBus>) {
        if self.bus.borrow().is_some() {
            tracing::warn!("bus handle already attached; ignored");
            return;
        }
        *self.bus.borrow_mut() = Some(bus);

        let deferred = std::mem::take(&mut *self.deferred.borrow_mut());
        for client in deferred {
            tracing::info!(service = %client.name(), "bus ready, initializing deferred client");
            client.initialize();
        }
    }

    fn defer(&self, client: ServiceClient) {
        self.deferred.borrow_mut().push(client);
    }
}

type StatusListener = Rc<dyn Fn(bool)>;

struct ClientInner {
    name: String,
    handle: Rc<BusHandle>,
    state: Cell<ClientState>,
    next_id: Cell<TaskId>,
    epoch: Cell<u64>,
    calls: RefCell<HashMap<TaskId, JoinHandle<()>>>,
    status_watch: RefCell<Option<JoinHandle<()>>>,
    listeners: RefCell<Vec<StatusListener>>,
}

#[derive(Clone)]
pub struct ServiceClient {
    inner: Rc<ClientInner>,
}

impl ServiceClient {
    pub fn new(name: &str, handle: Rc<BusHandle>) -> Self {
        Self {
            inner: Rc::new(ClientInner {
                name: name.to_string(),
                handle,
                state: Cell::new(ClientState::Deferred),
                next_id: Cell::new(0),
                epoch: Cell::new(0),
                calls: RefCell::new(HashMap::new()),
                status_watch: RefCell::new(None),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> ClientState {
        self.inner.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ClientState::Connected
    }

    pub fn epoch(&self) -> u64 {
        self.inner.epoch.get()
    }

    pub fn pending_calls(&self) -> usize {
        self.inner.calls.borrow().len()
    }

    pub fn on_status_change(&self, listener: impl Fn(bool) + 'static) {
        self.inner.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn initialize(&self) {
        let Some(bus) = self.inner.handle.get() else {
            tracing::info!(service = %self.name(), "bus not ready, deferring initialization");
            self.inner.state.set(ClientState::Deferred);
            self.inner.handle.defer(self.clone());
            return;
        };

        let mut watch = bus.watch_server_status(self.name());
        let weak = Rc::downgrade(&self.inner);
        let task = tokio::task::spawn_local(async move {
            while let Some(payload) = watch.recv().await {
                let Some(connected) = payload.get("connected").and_then(Value::as_bool) else {
                    continue;
                };
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                ServiceClient { inner }.on_server_status(connected);
            }
        });

        if let Some(previous) = self.inner.status_watch.borrow_mut().replace(task) {
            previous.abort();
        }
        self.inner.state.set(ClientState::Registered);
        tracing::debug!(service = %self.name(), "status watch registered");
    }

    pub fn finalize(&self) {
        if let Some(watch) = self.inner.status_watch.borrow_mut().take() {
            watch.abort();
        }
        self.cancel_all();
    }

    fn on_server_status(&self, connected: bool) {
        let inner = &self.inner;
        if connected {
            tracing::info!(service = %inner.name, "service is up");
            inner.state.set(ClientState::Connected);
        } else {
            tracing::info!(service = %inner.name, "service is down");
            self.cancel_all();
            inner.next_id.set(0);
            if inner.state.get() == ClientState::Connected {
                inner.epoch.set(inner.epoch.get() + 1);
            }
            inner.state.set(ClientState::Disconnected);
        }

        let listeners: Vec<StatusListener> = inner.listeners.borrow().clone();
        for listener in listeners {
            listener(connected);
        }
    }

    fn cancel_all(&self) {
        let calls: Vec<_> = self.inner.calls.borrow_mut().drain().collect();
        for (_, call) in calls {
            call.abort();
        }
    }

    /// Issues a one-shot call, or a subscription when `subscribe` is set, and
    /// returns its task id. Returns [`INVALID_TASK_ID`] without queuing when
    /// the service is not connected.
    pub fn call(
        &self,
        method: &str,
        payload: Value,
        mut callback: impl FnMut(Value) + 'static,
        subscribe: bool,
    ) -> TaskId {
        let bus = match self.inner.handle.get() {
            Some(bus) if self.is_connected() => bus,
            _ => {
                tracing::warn!(service = %self.name(), method, "called before connecting");
                return INVALID_TASK_ID;
            }
        };

        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);

        let mut reply = bus.call(&method_uri(self.name(), method), payload);
        let weak: Weak<ClientInner> = Rc::downgrade(&self.inner);
        let task = tokio::task::spawn_local(async move {
            while let Some(payload) = reply.recv().await {
                callback(payload);
                if !subscribe {
                    break;
                }
            }
            if let Some(inner) = weak.upgrade() {
                inner.calls.borrow_mut().remove(&id);
            }
        });

        self.inner.calls.borrow_mut().insert(id, task);
        tracing::debug!(service = %self.name(), method, task_id = id, subscribe, "call issued");
        id
    }

    pub fn cancel(&self, id: TaskId) -> bool {
        let Some(call) = self.inner.calls.borrow_mut().remove(&id) else {
            return false;
        };
        call.abort();
        tracing::debug!(service = %self.name(), task_id = id, "call cancelled");
        true
    }
}
