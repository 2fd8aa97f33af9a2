//! Registry of bridge-owned values.

use super::handle::{HandleId, NULL_HANDLE};
use super::slots::SlotTable;
use super::GenerationalRegistry;
use crate::error::{BridgeError, Result};
use std::sync::RwLock;
use tracing::debug;

/// Registry that owns a heap copy of every registered value.
///
/// Used for aggregate values the bridge builds itself (snapshots of host
/// state) rather than for host memory. Values are destroyed by `remove` or by
/// a generation bump.
pub struct OwningRegistry<T> {
    name: &'static str,
    table: RwLock<SlotTable<Box<T>>>,
}

impl<T: Send + Sync> OwningRegistry<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            table: RwLock::new(SlotTable::new()),
        }
    }

    /// Take ownership of `value` and return its handle.
    pub fn register(&self, value: T) -> HandleId {
        self.table
            .write()
            .expect("registry lock poisoned")
            .insert(Box::new(value))
    }

    /// `None` registers nothing and yields `0`.
    pub fn register_opt(&self, value: Option<T>) -> HandleId {
        match value {
            Some(value) => self.register(value),
            None => NULL_HANDLE,
        }
    }

    /// Clone the value behind a handle.
    pub fn get(&self, id: HandleId) -> Option<T>
    where
        T: Clone,
    {
        self.with(id, T::clone)
    }

    /// Borrow the value behind a handle for the duration of `f`.
    pub fn with<R>(&self, id: HandleId, f: impl FnOnce(&T) -> R) -> Option<R> {
        let table = self.table.read().expect("registry lock poisoned");
        table.get(id).map(|value| f(&**value))
    }

    pub fn resolve(&self, id: HandleId) -> Result<T>
    where
        T: Clone,
    {
        self.get(id).ok_or(BridgeError::InvalidHandle {
            category: self.name,
            id,
        })
    }

    /// Destroy the value behind a handle. Returns whether a live slot existed.
    pub fn remove(&self, id: HandleId) -> bool {
        let removed = self
            .table
            .write()
            .expect("registry lock poisoned")
            .remove(id);
        removed.is_some()
    }

    /// Destroy every owned value and invalidate all handles.
    pub fn bump_generation(&self) {
        let cleared = {
            let mut table = self.table.write().expect("registry lock poisoned");
            table.bump()
        };
        // Owned values are dropped after the write lock is released.
        debug!(
            "{} registry: destroyed {} owned value(s)",
            self.name,
            cleared.len()
        );
        drop(cleared);
    }

    pub fn size(&self) -> usize {
        self.table.read().expect("registry lock poisoned").len()
    }

    pub fn generation(&self) -> u32 {
        self.table.read().expect("registry lock poisoned").generation()
    }

    pub fn next_id(&self) -> HandleId {
        self.table.read().expect("registry lock poisoned").next_id()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Send + Sync> GenerationalRegistry for OwningRegistry<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn bump_generation(&self) {
        OwningRegistry::bump_generation(self)
    }

    fn size(&self) -> usize {
        OwningRegistry::size(self)
    }

    fn generation(&self) -> u32 {
        OwningRegistry::generation(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts its own drops.
    struct Tracked {
        label: &'static str,
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked(label: &'static str, drops: &Arc<AtomicUsize>) -> Tracked {
        Tracked {
            label,
            drops: drops.clone(),
        }
    }

    #[test]
    fn test_register_and_borrow() {
        let registry = OwningRegistry::new("snapshot");
        let id = registry.register(String::from("hello"));
        assert_eq!(id, 1);
        assert_eq!(registry.get(id).as_deref(), Some("hello"));
        assert_eq!(registry.with(id, |s| s.len()), Some(5));
    }

    #[test]
    fn test_null_handling() {
        let registry: OwningRegistry<String> = OwningRegistry::new("snapshot");
        assert_eq!(registry.register_opt(None), NULL_HANDLE);
        assert!(registry.get(NULL_HANDLE).is_none());
        assert_eq!(registry.size(), 0);
    }

    #[test]
    fn test_remove_destroys_value() {
        let drops = Arc::new(AtomicUsize::new(0));
        let registry = OwningRegistry::new("snapshot");
        let id = registry.register(tracked("a", &drops));
        let other = registry.register(tracked("b", &drops));

        assert!(registry.remove(id));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(!registry.remove(id));
        assert_eq!(registry.with(other, |t| t.label), Some("b"));
    }

    #[test]
    fn test_bump_destroys_everything() {
        let drops = Arc::new(AtomicUsize::new(0));
        let registry = OwningRegistry::new("snapshot");
        let ids: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|label| registry.register(tracked(label, &drops)))
            .collect();

        registry.bump_generation();
        assert_eq!(drops.load(Ordering::SeqCst), 3);
        assert!(ids.iter().all(|id| registry.with(*id, |_| ()).is_none()));

        let next = registry.register(tracked("d", &drops));
        assert!(ids.iter().all(|id| next > *id));
    }
}
