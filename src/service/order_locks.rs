use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type OrderKey = (String, i64);

/// Per-order async locks. Create, verify, refund and webhook handling for
/// one order run one at a time inside this process; the store's
/// compare-and-set covers other processes.
#[derive(Clone, Default)]
pub struct OrderLocks {
    inner: Arc<DashMap<OrderKey, Arc<Mutex<()>>>>,
}

pub struct OrderGuard {
    key: OrderKey,
    locks: Arc<DashMap<OrderKey, Arc<Mutex<()>>>>,
    _guard: OwnedMutexGuard<()>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, store_id: &str, order_id: i64) -> OrderGuard {
        let key = (store_id.to_string(), order_id);
        let mutex = self.inner.entry(key.clone()).or_default().clone();
        OrderGuard {
            key,
            locks: self.inner.clone(),
            _guard: mutex.lock_owned().await,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for OrderGuard {
    fn drop(&mut self) {
        // Two references left means the map and this guard: nobody is waiting.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}
