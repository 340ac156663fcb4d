//! Keyed query cache with explicit load states. Concurrent loads of one key
//! share a single request; failures are recorded but never cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Idle,
    Loading,
    Ready(Arc<T>),
    Failed(String),
}

struct Slot<T> {
    value: OnceCell<Arc<T>>,
    in_flight: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            value: OnceCell::new(),
            in_flight: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    fn set_failure(&self, failure: Option<String>) {
        match self.failure.lock() {
            Ok(mut guard) => *guard = failure,
            Err(poisoned) => *poisoned.into_inner() = failure,
        }
    }

    fn failure(&self) -> Option<String> {
        match self.failure.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Decrements the in-flight count even if the load future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct QueryCache<T> {
    slots: Mutex<HashMap<String, Arc<Slot<T>>>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Slot<T>>>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn slot(&self, key: &str) -> Arc<Slot<T>> {
        Arc::clone(
            self.slots()
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Slot::new())),
        )
    }

    /// Returns the cached value for `key` or runs `fetch` to produce it.
    pub async fn load<F, Fut>(&self, key: &str, fetch: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let slot = self.slot(key);
        if let Some(value) = slot.value.get() {
            return Ok(Arc::clone(value));
        }

        let result = {
            let _in_flight = InFlight::enter(&slot.in_flight);
            slot.value
                .get_or_try_init(move || async move { fetch().await.map(Arc::new) })
                .await
                .map(Arc::clone)
        };

        match &result {
            Ok(_) => slot.set_failure(None),
            Err(err) => {
                tracing::debug!(key, error = %err, "query failed");
                slot.set_failure(Some(err.user_message()));
            }
        }
        result
    }

    pub fn state(&self, key: &str) -> LoadState<T> {
        let Some(slot) = self.slots().get(key).cloned() else {
            return LoadState::Idle;
        };
        if let Some(value) = slot.value.get() {
            return LoadState::Ready(Arc::clone(value));
        }
        if slot.in_flight.load(Ordering::SeqCst) > 0 {
            return LoadState::Loading;
        }
        match slot.failure() {
            Some(message) => LoadState::Failed(message),
            None => LoadState::Idle,
        }
    }

    /// Drops the cached entry so the next `load` fetches again.
    pub fn invalidate(&self, key: &str) {
        self.slots().remove(key);
    }

    pub fn clear(&self) {
        self.slots().clear();
    }
}
