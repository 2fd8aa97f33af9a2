//! Host reference types.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Wire identifier for a registered object. `0` is reserved for "no object";
/// negative values are never issued.
pub type HandleId = i64;

/// The reserved "no object" handle.
pub const NULL_HANDLE: HandleId = 0;

/// A value that can be stored in a borrowed [`Registry`](super::Registry).
pub trait HostHandle: Copy + Eq + Send + Sync + 'static {
    /// Whether this is the host's null reference.
    fn is_null(&self) -> bool;
}

/// Typed, non-owning reference to a host object.
///
/// Holds the host's opaque address for the object. It is never dereferenced by
/// the bridge; only host API code on the main thread gives it meaning.
pub struct HostRef<K> {
    addr: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<K> HostRef<K> {
    pub const NULL: Self = Self::from_addr(0);

    pub const fn from_addr(addr: usize) -> Self {
        Self {
            addr,
            _kind: PhantomData,
        }
    }

    pub fn addr(&self) -> usize {
        self.addr
    }
}

impl<K> Clone for HostRef<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for HostRef<K> {}

impl<K> PartialEq for HostRef<K> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl<K> Eq for HostRef<K> {}

impl<K> Hash for HostRef<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl<K> fmt::Debug for HostRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostRef({:#x})", self.addr)
    }
}

impl<K: 'static> HostHandle for HostRef<K> {
    fn is_null(&self) -> bool {
        self.addr == 0
    }
}

/// Marker for art objects (paths, text frames, groups).
pub enum Art {}
/// Marker for layers.
pub enum Layer {}
/// Marker for open documents.
pub enum Document {}
/// Marker for key/value dictionaries attached to documents.
pub enum Dictionary {}

pub type ArtRef = HostRef<Art>;
pub type LayerRef = HostRef<Layer>;
pub type DocumentRef = HostRef<Document>;
pub type DictionaryRef = HostRef<Dictionary>;
