//! Application session state.
//!
//! [`SessionStore`] is an explicit key-value store with per-key observers,
//! created at startup and passed to whatever needs it. Cloning shares the same
//! store. [`SelectedStocks`] tracks the user's stock picks.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::{Map, Value};

use crate::filter_call_options;
use crate::stock::StockSnapshot;

// ============================================================
// SESSION STORE
// ============================================================

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    by_key: HashMap<String, Vec<(u64, Callback)>>,
}

#[derive(Default)]
struct Inner {
    data: RwLock<HashMap<String, Value>>,
    observers: RwLock<Observers>,
}

/// Shared key-value session state with publish/subscribe.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.data.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<&String> = data.keys().collect();
        keys.sort();
        f.debug_struct("SessionStore").field("keys", &keys).finish()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, notifying that key's subscribers when `publish` is set.
    ///
    /// Callbacks run after the store's locks are released and may use the store.
    pub fn set(&self, key: impl Into<String>, value: Value, publish: bool) {
        let key = key.into();
        let notify = publish.then(|| value.clone());
        self.inner
            .data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), value);

        if let Some(value) = notify {
            self.publish(&key, &value);
        }
    }

    /// Store every entry of a JSON object, publishing each key in turn.
    pub fn set_all(&self, entries: Map<String, Value>, publish: bool) {
        for (key, value) in entries {
            self.set(key, value, publish);
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Values for `keys`; missing keys map to `null`.
    pub fn get_many(&self, keys: &[&str]) -> Map<String, Value> {
        let data = self.inner.data.read().unwrap_or_else(PoisonError::into_inner);
        keys.iter()
            .map(|k| (k.to_string(), data.get(*k).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    /// Copy of everything currently stored.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner
            .data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Drop all stored values. Subscriptions stay registered.
    pub fn clear(&self) {
        let mut data = self.inner.data.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(keys = data.len(), "clearing session store");
        data.clear();
    }

    /// Call `callback` with each value published under `key` until the
    /// returned [`Subscription`] is dropped or unsubscribed.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, key: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let key = key.into();
        let mut observers = self
            .inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = observers.next_id;
        observers.next_id += 1;
        observers
            .by_key
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            store: Arc::downgrade(&self.inner),
            key,
            id,
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_key
            .get(key)
            .map_or(0, Vec::len)
    }

    fn publish(&self, key: &str, value: &Value) {
        let callbacks: Vec<Callback> = {
            let observers = self
                .inner
                .observers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match observers.by_key.get(key) {
                Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };
        tracing::trace!(key, subscribers = callbacks.len(), "publishing session value");
        for callback in callbacks {
            callback(value);
        }
    }
}

/// Handle to one registered observer. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    store: Weak<Inner>,
    key: String,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut observers = inner.observers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = observers.by_key.get_mut(&self.key) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                observers.by_key.remove(&self.key);
            }
        }
    }
}

// ============================================================
// SELECTED STOCKS
// ============================================================

/// Stocks picked by the user, keyed by instrument key, in selection order.
#[derive(Debug, Clone, Default)]
pub struct SelectedStocks {
    stocks: Vec<StockSnapshot>,
    user_modified: bool,
}

impl SelectedStocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with the losers flagged by the call-option
    /// heuristic. Has no effect once the user has toggled anything.
    pub fn preselect(&mut self, losers: &[StockSnapshot]) {
        if self.user_modified {
            return;
        }
        self.stocks = filter_call_options(losers).into_iter().cloned().collect();
    }

    /// Add `stock` if absent, remove it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, stock: &StockSnapshot) -> bool {
        self.user_modified = true;
        let before = self.stocks.len();
        self.stocks.retain(|s| s.instrument_key != stock.instrument_key);
        if self.stocks.len() == before {
            self.stocks.push(stock.clone());
            true
        } else {
            false
        }
    }

    pub fn is_selected(&self, instrument_key: &str) -> bool {
        self.stocks.iter().any(|s| s.instrument_key == instrument_key)
    }

    pub fn stocks(&self) -> &[StockSnapshot] {
        &self.stocks
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    /// Empty the selection and re-enable preselection.
    pub fn clear(&mut self) {
        self.stocks.clear();
        self.user_modified = false;
    }
}
