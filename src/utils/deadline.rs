// src/utils/deadline.rs

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::task::AbortHandle;

/// Keyed, cancellable one-shot timers.
///
/// Each key holds at most one pending task; scheduling again replaces (and
/// aborts) the previous one.
#[derive(Clone, Default)]
pub struct DeadlineScheduler {
    tasks: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl DeadlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` once `after` has elapsed unless `key` is cancelled first.
    pub fn schedule<F>(&self, key: String, after: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tasks = Arc::clone(&self.tasks);
        let own_key = key.clone();

        // Hold the lock across spawn so the task cannot deregister before
        // its handle is stored.
        let mut pending = self.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Ok(mut map) = tasks.lock() {
                map.remove(&own_key);
            }
            task.await;
        });

        if let Some(previous) = pending.insert(key, handle.abort_handle()) {
            previous.abort();
        }
    }

    /// Aborts the pending task for `key`. Returns false if none was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.lock().remove(key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AbortHandle>> {
        // A poisoned map only ever holds abort handles, so recover it.
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
