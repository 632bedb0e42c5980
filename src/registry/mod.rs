//! Capacity-bounded symbol registry
//!
//! Maps symbols to shared per-symbol handles. Admission of a new symbol is a
//! single critical section, so two callers racing for the last free slot
//! cannot both get in. The registry guards only the mapping; whatever the
//! handle points at must bring its own synchronization.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

/// Default number of symbols tracked at once
pub const DEFAULT_MAX_SYMBOLS: usize = 10;

/// Outcome of [`KeyRegistry::check_and_create`]
#[derive(Debug)]
pub enum Admission<T> {
    /// Key was already registered
    Existing(Arc<T>),
    /// Key was admitted and a new entry created
    Created(Arc<T>),
    /// Key is new and the registry is full
    Rejected,
}

impl<T> Admission<T> {
    /// Handle for the key, unless admission was rejected
    pub fn into_handle(self) -> Option<Arc<T>> {
        match self {
            Admission::Existing(handle) | Admission::Created(handle) => Some(handle),
            Admission::Rejected => None,
        }
    }

    /// Whether this call created the entry
    pub fn is_created(&self) -> bool {
        matches!(self, Admission::Created(_))
    }
}

/// Bounded map from symbol to shared handle
#[derive(Debug)]
pub struct KeyRegistry<T> {
    capacity: usize,
    entries: Mutex<HashMap<String, Arc<T>>>,
}

impl<T> Default for KeyRegistry<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SYMBOLS)
    }
}

impl<T> KeyRegistry<T> {
    /// Create an empty registry admitting at most `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Look up `key`, admitting it through `factory` if absent and a slot is free.
    ///
    /// Lookup, capacity check and insert happen under one lock. `factory`
    /// runs inside that lock and must stay cheap.
    pub fn check_and_create<F>(&self, key: &str, factory: F) -> Admission<T>
    where
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.get(key) {
            return Admission::Existing(Arc::clone(existing));
        }

        if entries.len() >= self.capacity {
            debug!(key, capacity = self.capacity, "registry full, admission rejected");
            return Admission::Rejected;
        }

        let handle = Arc::new(factory());
        entries.insert(key.to_string(), Arc::clone(&handle));
        info!(key, count = entries.len(), capacity = self.capacity, "admitted new key");
        Admission::Created(handle)
    }

    /// Handle for `key`, if registered
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.lock().get(key).cloned()
    }

    /// Whether `key` is registered
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of registered keys
    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Maximum number of keys
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove every entry. Administrative reset only.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        info!(dropped, "registry cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_admit_existing_and_reject() {
        let registry: KeyRegistry<u32> = KeyRegistry::with_capacity(2);

        assert!(registry.check_and_create("A", || 1).is_created());
        assert!(registry.check_and_create("B", || 2).is_created());

        match registry.check_and_create("A", || 99) {
            Admission::Existing(handle) => assert_eq!(*handle, 1),
            other => panic!("expected existing entry, got {:?}", other),
        }

        assert!(matches!(
            registry.check_and_create("C", || 3),
            Admission::Rejected
        ));
        assert_eq!(registry.count(), 2);
        assert!(!registry.contains("C"));
    }

    #[test]
    fn test_factory_not_called_for_existing_or_rejected() {
        let registry: KeyRegistry<u32> = KeyRegistry::with_capacity(1);
        let calls = AtomicUsize::new(0);
        let factory = || {
            calls.fetch_add(1, Ordering::SeqCst);
            7
        };

        registry.check_and_create("A", factory);
        registry.check_and_create("A", factory);
        registry.check_and_create("B", factory);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_accessors_and_clear() {
        let registry: KeyRegistry<u32> = KeyRegistry::default();
        assert_eq!(registry.capacity(), DEFAULT_MAX_SYMBOLS);

        registry.check_and_create("MSFT", || 1);
        registry.check_and_create("AAPL", || 2);

        assert_eq!(registry.keys(), vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(registry.get("AAPL").as_deref(), Some(&2));
        assert!(registry.get("GOOG").is_none());

        registry.clear();
        assert_eq!(registry.count(), 0);
        assert!(!registry.contains("AAPL"));
        assert!(registry.check_and_create("GOOG", || 3).is_created());
    }

    #[test]
    fn test_concurrent_admission_respects_capacity() {
        const THREADS: usize = 32;
        let registry: Arc<KeyRegistry<usize>> = Arc::new(KeyRegistry::with_capacity(10));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry
                        .check_and_create(&format!("SYM{}", i), || i)
                        .is_created()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|created| *created)
            .count();

        assert_eq!(admitted, 10);
        assert_eq!(registry.count(), 10);
    }

    #[test]
    fn test_concurrent_same_key_creates_once() {
        const THREADS: usize = 16;
        let registry: Arc<KeyRegistry<usize>> = Arc::new(KeyRegistry::with_capacity(10));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.check_and_create("AAPL", || i).is_created()
                })
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|c| *c)
            .count();

        assert_eq!(created, 1);
        assert_eq!(registry.count(), 1);
    }
}
