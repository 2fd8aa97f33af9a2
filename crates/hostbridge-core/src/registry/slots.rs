//! Slot table and the borrowed-reference registry.

use super::handle::{HandleId, HostHandle, NULL_HANDLE};
use super::GenerationalRegistry;
use crate::error::{BridgeError, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// One entry in a [`SlotTable`].
#[derive(Debug)]
pub(super) struct Slot<V> {
    pub(super) value: V,
    pub(super) generation: u32,
}

/// Unsynchronized generational slot map shared by both registry kinds.
#[derive(Debug)]
pub(super) struct SlotTable<V> {
    slots: HashMap<HandleId, Slot<V>>,
    next_id: HandleId,
    generation: u32,
}

impl<V> SlotTable<V> {
    pub(super) fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_id: 1,
            generation: 0,
        }
    }

    pub(super) fn insert(&mut self, value: V) -> HandleId {
        let id = self.next_id;
        self.next_id = id.checked_add(1).expect("handle id space exhausted");
        self.slots.insert(
            id,
            Slot {
                value,
                generation: self.generation,
            },
        );
        id
    }

    pub(super) fn get(&self, id: HandleId) -> Option<&V> {
        if id == NULL_HANDLE {
            return None;
        }
        self.slots
            .get(&id)
            .filter(|slot| slot.generation == self.generation)
            .map(|slot| &slot.value)
    }

    pub(super) fn remove(&mut self, id: HandleId) -> Option<V> {
        let generation = self.generation;
        match self.slots.get(&id) {
            Some(slot) if slot.generation == generation => {
                self.slots.remove(&id).map(|slot| slot.value)
            }
            _ => None,
        }
    }

    pub(super) fn retain(&mut self, mut keep: impl FnMut(&V) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| keep(&slot.value));
        before - self.slots.len()
    }

    /// Advance the generation and hand back the cleared slots. `next_id` is untouched.
    pub(super) fn bump(&mut self) -> HashMap<HandleId, Slot<V>> {
        self.generation = self.generation.wrapping_add(1);
        std::mem::take(&mut self.slots)
    }

    pub(super) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(super) fn generation(&self) -> u32 {
        self.generation
    }

    pub(super) fn next_id(&self) -> HandleId {
        self.next_id
    }
}

/// Registry of borrowed host references.
///
/// The registry never owns the objects behind its references; the host does.
/// `get` takes a read lock, every mutation takes the write lock.
pub struct Registry<T: HostHandle> {
    name: &'static str,
    table: RwLock<SlotTable<T>>,
}

impl<T: HostHandle> Registry<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            table: RwLock::new(SlotTable::new()),
        }
    }

    /// Store a reference and return its handle. A null reference yields `0`
    /// without touching the registry.
    pub fn register(&self, reference: T) -> HandleId {
        if reference.is_null() {
            return NULL_HANDLE;
        }
        self.table
            .write()
            .expect("registry lock poisoned")
            .insert(reference)
    }

    /// Look up a handle. Unknown, null and stale handles all return `None`.
    pub fn get(&self, id: HandleId) -> Option<T> {
        self.table
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .copied()
    }

    /// Like [`get`](Self::get) but reports a missing handle as an error.
    pub fn resolve(&self, id: HandleId) -> Result<T> {
        self.get(id).ok_or(BridgeError::InvalidHandle {
            category: self.name,
            id,
        })
    }

    /// Drop every slot that refers to `reference`. Returns the number removed.
    pub fn invalidate(&self, reference: T) -> usize {
        let removed = self
            .table
            .write()
            .expect("registry lock poisoned")
            .retain(|stored| *stored != reference);
        if removed > 0 {
            debug!("{} registry: invalidated {} slot(s)", self.name, removed);
        }
        removed
    }

    /// Invalidate every handle issued so far.
    pub fn bump_generation(&self) {
        let mut table = self.table.write().expect("registry lock poisoned");
        let cleared = table.bump();
        debug!(
            "{} registry: generation {} ({} slot(s) cleared)",
            self.name,
            table.generation(),
            cleared.len()
        );
    }

    pub fn size(&self) -> usize {
        self.table.read().expect("registry lock poisoned").len()
    }

    pub fn generation(&self) -> u32 {
        self.table.read().expect("registry lock poisoned").generation()
    }

    /// The id the next `register` call will hand out.
    pub fn next_id(&self) -> HandleId {
        self.table.read().expect("registry lock poisoned").next_id()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: HostHandle> GenerationalRegistry for Registry<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn bump_generation(&self) {
        Registry::bump_generation(self)
    }

    fn size(&self) -> usize {
        Registry::size(self)
    }

    fn generation(&self) -> u32 {
        Registry::generation(self)
    }
}
