//! Reference-counted resource cache
//!
//! A [`ResourceManager`] maps an interned id to one pooled instance of a
//! resource kind. The first `load` of an id constructs the resource; later
//! loads and explicit `reference` calls only bump the count. When the count
//! drops to zero the resource is unloaded immediately, unless it was marked
//! [`Usage::KeepLoaded`].
//!
//! The manager has no internal locking and expects to be driven from the
//! frame-loop thread. Callers must not release a GPU-backed resource that an
//! in-flight frame may still read; the renderer idles the device before
//! teardown for that reason.

use super::data::DataError;
use crate::foundation::pool::{Handle, Pool, PoolError};
use crate::foundation::string_id::StringId;
use crate::render::RenderError;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Resource errors
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Id has no live entry
    #[error("Resource '{0}' is not loaded")]
    NotLoaded(StringId),

    /// Constructing the resource failed
    #[error("Failed to load '{id}': {reason}")]
    LoadFailed {
        /// Resource id
        id: StringId,
        /// Underlying failure
        reason: String,
    },

    /// Resource asked for itself while loading
    #[error("Resource '{0}' is already being loaded")]
    Cyclic(StringId),

    /// Pool error
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// GPU upload failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Resource file content was malformed
    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

/// Lifecycle of one cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No entry
    Unloaded,
    /// Load in progress
    Loading,
    /// Resident
    Loaded,
}

/// What happens when the reference count reaches zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Usage {
    /// Unload and evict at zero references
    #[default]
    UnloadWhenUnused,
    /// Stay resident with zero references
    KeepLoaded,
}

/// A cacheable resource kind
pub trait Resource: Sized {
    /// Whatever the resource needs to create and destroy itself
    type Context: ?Sized;
    /// Per-load arguments; ignored when the id is already resident
    type Args;

    /// Short kind name for log messages
    const KIND: &'static str;

    /// Construct the resource
    fn load(id: StringId, ctx: &mut Self::Context, args: Self::Args) -> Result<Self, ResourceError>;

    /// Release whatever `load` acquired
    fn unload(&mut self, ctx: &mut Self::Context);
}

#[derive(Debug)]
struct Entry<R> {
    handle: Handle<R>,
    ref_count: u32,
    usage: Usage,
}

/// Reference-counted cache for one resource kind
pub struct ResourceManager<R: Resource> {
    entries: HashMap<StringId, Entry<R>>,
    pool: Pool<R>,
    loading: HashSet<StringId>,
}

impl<R: Resource> Default for ResourceManager<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> ResourceManager<R> {
    /// Empty cache
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            pool: Pool::new(),
            loading: HashSet::new(),
        }
    }

    /// Load `id`, or add a reference if it is already resident
    ///
    /// `args` only matter for the first load of an id.
    pub fn load(
        &mut self,
        id: StringId,
        ctx: &mut R::Context,
        args: R::Args,
    ) -> Result<Handle<R>, ResourceError> {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.ref_count += 1;
            log::trace!("{} '{}' ref_count -> {}", R::KIND, id, entry.ref_count);
            return Ok(entry.handle);
        }
        if self.pool.is_full() {
            // a resource built now could not be stored, so it is never built
            log::error!("{} pool full while loading '{}'", R::KIND, id);
            return Err(PoolError::Exhausted(self.pool.capacity()).into());
        }
        if !self.loading.insert(id) {
            return Err(ResourceError::Cyclic(id));
        }

        let result = R::load(id, ctx, args);
        self.loading.remove(&id);
        let resource = result?;

        let handle = match self.pool.allocate_or_return(resource) {
            Ok(handle) => handle,
            Err((err, mut resource)) => {
                resource.unload(ctx);
                log::error!("{} pool full while loading '{}'", R::KIND, id);
                return Err(err.into());
            }
        };
        self.entries.insert(
            id,
            Entry {
                handle,
                ref_count: 1,
                usage: Usage::default(),
            },
        );
        log::debug!("Loaded {} '{}'", R::KIND, id);
        Ok(handle)
    }

    /// Add a reference to a resident id
    ///
    /// Unknown ids are reported and ignored.
    pub fn reference(&mut self, id: StringId) -> Option<Handle<R>> {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.ref_count += 1;
                Some(entry.handle)
            }
            None => {
                log::warn!("reference: {} '{}' is not loaded", R::KIND, id);
                None
            }
        }
    }

    /// Drop a reference; returns true when this evicted the resource
    ///
    /// Unknown ids and entries already at zero are reported and ignored.
    pub fn unreference(&mut self, id: StringId, ctx: &mut R::Context) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            log::warn!("unreference: {} '{}' is not loaded", R::KIND, id);
            return false;
        };
        if entry.ref_count == 0 {
            log::warn!("unreference: {} '{}' has no references left", R::KIND, id);
            return false;
        }

        entry.ref_count -= 1;
        if entry.ref_count == 0 && entry.usage == Usage::UnloadWhenUnused {
            self.evict(id, ctx);
            return true;
        }
        false
    }

    /// Change the zero-reference policy of a resident id
    ///
    /// Switching an unreferenced entry back to `UnloadWhenUnused` evicts it.
    pub fn set_usage(
        &mut self,
        id: StringId,
        usage: Usage,
        ctx: &mut R::Context,
    ) -> Result<(), ResourceError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(ResourceError::NotLoaded(id))?;
        entry.usage = usage;
        if entry.ref_count == 0 && usage == Usage::UnloadWhenUnused {
            self.evict(id, ctx);
        }
        Ok(())
    }

    /// Resolve a handle
    pub fn get(&self, handle: Handle<R>) -> Option<&R> {
        self.pool.get(handle)
    }

    /// Resolve a handle mutably
    pub fn get_mut(&mut self, handle: Handle<R>) -> Option<&mut R> {
        self.pool.get_mut(handle)
    }

    /// Resource for a resident id
    pub fn get_by_id(&self, id: StringId) -> Option<&R> {
        self.handle(id).and_then(|handle| self.pool.get(handle))
    }

    /// Handle for a resident id
    pub fn handle(&self, id: StringId) -> Option<Handle<R>> {
        self.entries.get(&id).map(|entry| entry.handle)
    }

    /// Current reference count, `None` when not resident
    pub fn ref_count(&self, id: StringId) -> Option<u32> {
        self.entries.get(&id).map(|entry| entry.ref_count)
    }

    /// Lifecycle state of `id`
    pub fn status(&self, id: StringId) -> LoadStatus {
        if self.loading.contains(&id) {
            LoadStatus::Loading
        } else if self.entries.contains_key(&id) {
            LoadStatus::Loaded
        } else {
            LoadStatus::Unloaded
        }
    }

    /// Whether `id` is resident
    pub fn contains(&self, id: StringId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of resident resources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is resident
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resident ids
    pub fn ids(&self) -> impl Iterator<Item = StringId> + '_ {
        self.entries.keys().copied()
    }

    /// Unload everything regardless of reference counts
    pub fn unload_all(&mut self, ctx: &mut R::Context) {
        let ids: Vec<StringId> = self.entries.keys().copied().collect();
        for id in ids {
            self.evict(id, ctx);
        }
        debug_assert!(self.pool.is_empty());
    }

    fn evict(&mut self, id: StringId, ctx: &mut R::Context) {
        let Some(entry) = self.entries.remove(&id) else {
            return;
        };
        match self.pool.free(entry.handle) {
            Ok(mut resource) => {
                resource.unload(ctx);
                log::debug!("Unloaded {} '{}'", R::KIND, id);
            }
            Err(err) => log::error!("Evicting {} '{}': {}", R::KIND, id, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counters {
        loads: u32,
        unloads: u32,
    }

    struct Blob {
        size: usize,
    }

    impl Resource for Blob {
        type Context = Counters;
        type Args = usize;
        const KIND: &'static str = "blob";

        fn load(id: StringId, ctx: &mut Counters, size: usize) -> Result<Self, ResourceError> {
            if size == 0 {
                return Err(ResourceError::LoadFailed {
                    id,
                    reason: "empty".to_string(),
                });
            }
            ctx.loads += 1;
            Ok(Self { size })
        }

        fn unload(&mut self, ctx: &mut Counters) {
            ctx.unloads += 1;
        }
    }

    #[test]
    fn test_second_load_shares_instance() {
        let mut ctx = Counters::default();
        let mut manager = ResourceManager::<Blob>::new();
        let id = StringId::new("blob:a");

        let first = manager.load(id, &mut ctx, 4).unwrap();
        let second = manager.load(id, &mut ctx, 99).unwrap();

        assert_eq!(first, second);
        assert_eq!(ctx.loads, 1);
        assert_eq!(manager.ref_count(id), Some(2));
        // first loader wins
        assert_eq!(manager.get(first).unwrap().size, 4);
    }

    #[test]
    fn test_evicted_at_zero() {
        let mut ctx = Counters::default();
        let mut manager = ResourceManager::<Blob>::new();
        let id = StringId::new("blob:b");

        let handle = manager.load(id, &mut ctx, 1).unwrap();
        manager.load(id, &mut ctx, 1).unwrap();

        assert!(!manager.unreference(id, &mut ctx));
        assert!(manager.unreference(id, &mut ctx));
        assert_eq!(ctx.unloads, 1);
        assert_eq!(manager.status(id), LoadStatus::Unloaded);
        assert!(manager.get(handle).is_none());

        // extra unreference is a warning, not a crash
        assert!(!manager.unreference(id, &mut ctx));
        assert_eq!(ctx.unloads, 1);
    }

    #[test]
    fn test_keep_loaded_survives_zero() {
        let mut ctx = Counters::default();
        let mut manager = ResourceManager::<Blob>::new();
        let id = StringId::new("blob:c");

        manager.load(id, &mut ctx, 1).unwrap();
        manager.set_usage(id, Usage::KeepLoaded, &mut ctx).unwrap();
        assert!(!manager.unreference(id, &mut ctx));
        assert_eq!(manager.ref_count(id), Some(0));
        assert_eq!(manager.status(id), LoadStatus::Loaded);

        // past zero is a no-op
        assert!(!manager.unreference(id, &mut ctx));
        assert_eq!(manager.ref_count(id), Some(0));

        // a reference brings it back into use without reloading
        assert!(manager.reference(id).is_some());
        assert_eq!(ctx.loads, 1);

        manager.unreference(id, &mut ctx);
        manager.set_usage(id, Usage::UnloadWhenUnused, &mut ctx).unwrap();
        assert!(!manager.contains(id));
        assert_eq!(ctx.unloads, 1);
    }

    #[test]
    fn test_reference_unknown_is_none() {
        let mut manager = ResourceManager::<Blob>::new();
        assert!(manager.reference(StringId::new("blob:missing")).is_none());
    }

    #[test]
    fn test_failed_load_leaves_no_entry() {
        let mut ctx = Counters::default();
        let mut manager = ResourceManager::<Blob>::new();
        let id = StringId::new("blob:broken");

        assert!(matches!(
            manager.load(id, &mut ctx, 0),
            Err(ResourceError::LoadFailed { .. })
        ));
        assert_eq!(manager.status(id), LoadStatus::Unloaded);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_unload_all() {
        let mut ctx = Counters::default();
        let mut manager = ResourceManager::<Blob>::new();
        for name in ["blob:x", "blob:y", "blob:z"] {
            manager.load(StringId::new(name), &mut ctx, 1).unwrap();
        }
        manager
            .set_usage(StringId::new("blob:y"), Usage::KeepLoaded, &mut ctx)
            .unwrap();

        manager.unload_all(&mut ctx);
        assert!(manager.is_empty());
        assert_eq!(ctx.unloads, 3);
    }

    #[test]
    fn test_full_pool_skips_load() {
        let mut ctx = Counters::default();
        let mut manager = ResourceManager::<Blob>::new();
        while !manager.pool.is_full() {
            manager.pool.allocate(Blob { size: 1 }).unwrap();
        }

        let id = StringId::new("blob:overflow");
        assert!(matches!(manager.load(id, &mut ctx, 1), Err(ResourceError::Pool(_))));
        assert_eq!(ctx.loads, 0);
        assert_eq!(ctx.unloads, 0);
        assert_eq!(manager.status(id), LoadStatus::Unloaded);
    }
}
