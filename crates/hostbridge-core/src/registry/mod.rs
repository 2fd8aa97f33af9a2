//! Generation-stamped handle registries.
//!
//! Host object pointers are only valid on the host's main thread and only until
//! the active document changes. The registries here turn those pointers (and
//! bridge-owned snapshot values) into small integer handles that can travel in
//! JSON, and invalidate every outstanding handle at once when the host's
//! document state changes.
//!
//! - [`Registry`]: borrowed, non-owning references to host objects
//! - [`OwningRegistry`]: values whose lifetime the bridge controls
//! - [`RegistryGroup`]: one registry per host object category, invalidated together
//!
//! Handle `0` always means "no object". Handles are never reused: a bump of the
//! generation clears the slots but keeps the id counter running.

mod group;
mod handle;
mod owning;
mod slots;

pub use group::{DocumentLayout, RegistryGroup, RegistrySize};
pub use handle::{
    Art, ArtRef, Dictionary, DictionaryRef, Document, DocumentRef, HandleId, HostHandle, HostRef,
    Layer, LayerRef, NULL_HANDLE,
};
pub use owning::OwningRegistry;
pub use slots::Registry;

/// Operations shared by every registry in a [`RegistryGroup`].
pub trait GenerationalRegistry: Send + Sync {
    /// Category name used in diagnostics and error messages.
    fn name(&self) -> &'static str;

    /// Invalidate every outstanding handle.
    fn bump_generation(&self);

    /// Number of live slots.
    fn size(&self) -> usize;

    /// Current generation counter.
    fn generation(&self) -> u32;
}
