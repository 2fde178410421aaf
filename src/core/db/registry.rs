/// Handle Registry Module
///
/// Maps opaque integer handles to live connections. The map and its id
/// counter sit behind a single mutex; nothing in here touches the disk, so
/// opening and closing always happen outside the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Internal registry state, only reachable through the mutex
#[derive(Debug)]
struct RegistryState<T> {
    entries: HashMap<i64, Arc<T>>,
    /// Last id handed out; ids start at 1 and are never reused
    last_id: i64,
}

/// Thread-safe handle → connection map.
#[derive(Debug)]
pub struct HandleRegistry<T> {
    state: Mutex<RegistryState<T>>,
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        HandleRegistry {
            state: Mutex::new(RegistryState {
                entries: HashMap::new(),
                last_id: 0,
            }),
        }
    }

    // The state is a plain map and counter that no panic can leave half
    // written, so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, RegistryState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a connection and returns its new handle.
    pub fn allocate(&self, connection: T) -> i64 {
        let mut state = self.lock();
        state.last_id += 1;
        let id = state.last_id;
        state.entries.insert(id, Arc::new(connection));
        debug!("Registered handle {}", id);
        id
    }

    /// Returns the connection registered under `id`, if it is still live.
    pub fn lookup(&self, id: i64) -> Option<Arc<T>> {
        self.lock().entries.get(&id).cloned()
    }

    /// Unregisters `id`. Removing an absent id is a no-op.
    pub fn remove(&self, id: i64) -> Option<Arc<T>> {
        let removed = self.lock().entries.remove(&id);
        if removed.is_some() {
            debug!("Unregistered handle {}", id);
        }
        removed
    }

    /// Unregisters every live handle, returning them in ascending id order.
    pub fn drain(&self) -> Vec<(i64, Arc<T>)> {
        let mut drained: Vec<_> = self.lock().entries.drain().collect();
        drained.sort_by_key(|(id, _)| *id);
        drained
    }

    /// Ids of every live handle, ascending.
    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.lock().entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
