//! Prototype resource manager (spec §4.4).
//!
//! Grounded on `pool/pool.rs`'s two-phase `pending -> live` drain and on
//! `rodengine`'s `parking_lot` usage for its staging locks: a manager owns
//! one append-only [`PagedArena`] of published records plus a staging
//! buffer and a load-request queue, both reader-writer locked. `update()`
//! alternates draining the staging buffer into `resources` and running
//! queued loads until both are empty, since a loader can itself mint new
//! handles (spec §4.4 "loading one resource may enqueue another via
//! handles embedded in components").
//!
//! Simplification versus a truly lock-free `resources` array: reads take
//! a `parking_lot::RwLock::read()` rather than an atomic-pointer load.
//! `update()` is the only writer and always runs with no process dispatch
//! in flight (spec §4.6 step 2 precedes step 7), so contention is nil;
//! this trades the teacher's lock-free read for a cheap uncontended lock
//! acquire, documented here rather than in the hot path.

use crate::error::LoadError;
use crate::resource::arena::PagedArena;
use crossbeam_queue::SegQueue;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};

/// What one [`ResourceManager`] instance manages: a descriptor type it
/// loads from, and the payload type it produces.
pub trait ResourceKind {
    type Descriptor: Clone + Send + Sync;
    type Payload: Send + Sync;

    fn load(descriptor: &Self::Descriptor) -> Result<Self::Payload, LoadError>;

    /// Identity equality used by [`ResourceManager::handle`] to dedup
    /// (spec §4.4: "equal-by-identity descriptor" reuses its handle).
    /// Descriptors with no notion of identity (plain values) are never
    /// equal to one another here — only wrapper types with a stable
    /// pointer identity (e.g. an `Arc`) should override this.
    fn same_identity(_a: &Self::Descriptor, _b: &Self::Descriptor) -> bool {
        false
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle(u32);

impl ResourceHandle {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResourceState {
    New,
    Loading,
    Loaded,
    LoadFailed,
}

enum Slot<K: ResourceKind> {
    New,
    Loading,
    Loaded(K::Payload),
    LoadFailed(LoadError),
}

struct Record<K: ResourceKind> {
    descriptor: K::Descriptor,
    state: Slot<K>,
}

pub struct ResourceManager<K: ResourceKind> {
    resources: RwLock<PagedArena<Record<K>>>,
    staging: RwLock<Vec<K::Descriptor>>,
    load_queue: SegQueue<u32>,
}

impl<K: ResourceKind> ResourceManager<K> {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(PagedArena::new(64)),
            staging: RwLock::new(Vec::new()),
            load_queue: SegQueue::new(),
        }
    }

    /// Returns the existing handle for an equal-by-identity descriptor
    /// already recorded (published or still staged); otherwise mints a
    /// fresh one (spec §4.4). Two structurally-identical but distinct
    /// descriptors (spec's Open Question: "two source wrappers never
    /// collapse to the same handle, even if identical") never match here
    /// because [`ResourceKind::same_identity`] defaults to `false` and a
    /// descriptor's own identity check (e.g. `Arc::ptr_eq`) only ever
    /// matches its own wrapper.
    pub fn handle(&self, descriptor: K::Descriptor) -> ResourceHandle {
        let resources = self.resources.read();
        if let Some(index) = resources.iter().position(|r| K::same_identity(&r.descriptor, &descriptor)) {
            return ResourceHandle(index as u32);
        }
        let resources_len = resources.len();
        drop(resources);

        let mut staging = self.staging.write();
        if let Some(offset) = staging.iter().position(|existing| K::same_identity(existing, &descriptor)) {
            return ResourceHandle((resources_len + offset) as u32);
        }
        let index = (resources_len + staging.len()) as u32;
        staging.push(descriptor);
        ResourceHandle(index)
    }

    pub fn state(&self, handle: ResourceHandle) -> ResourceState {
        let resources = self.resources.read();
        match resources.get(handle.index()) {
            Some(record) => match &record.state {
                Slot::New => ResourceState::New,
                Slot::Loading => ResourceState::Loading,
                Slot::Loaded(_) => ResourceState::Loaded,
                Slot::LoadFailed(_) => ResourceState::LoadFailed,
            },
            // Still staged, not yet drained into `resources`.
            None => ResourceState::New,
        }
    }

    pub fn request_load(&self, handle: ResourceHandle) {
        if self.state(handle) == ResourceState::New {
            self.load_queue.push(handle.index());
        }
    }

    /// Valid only when `state(handle) == Loaded`.
    pub fn resource(&self, handle: ResourceHandle) -> Option<MappedRwLockReadGuard<'_, K::Payload>> {
        let guard = self.resources.read();
        RwLockReadGuard::try_map(guard, |arena| match arena.get(handle.index()) {
            Some(Record {
                state: Slot::Loaded(payload),
                ..
            }) => Some(payload),
            _ => None,
        })
        .ok()
    }

    pub fn failed_descriptors(&self) -> Vec<K::Descriptor> {
        self.resources
            .read()
            .iter()
            .filter_map(|r| match r.state {
                Slot::LoadFailed(_) => Some(r.descriptor.clone()),
                _ => None,
            })
            .collect()
    }

    /// The error a failed load reported, if `state(handle) == LoadFailed`.
    pub fn load_error(&self, handle: ResourceHandle) -> Option<LoadError> {
        match self.resources.read().get(handle.index()) {
            Some(Record {
                state: Slot::LoadFailed(err),
                ..
            }) => Some(err.clone()),
            _ => None,
        }
    }

    pub fn clear(&self) {
        self.resources.write().clear();
        self.staging.write().clear();
        while self.load_queue.pop().is_some() {}
    }

    /// Drain staging into `resources`, then run every queued load,
    /// repeating until both are empty (spec §4.4).
    pub fn update(&self) {
        loop {
            let mut progressed = false;

            let staged = {
                let mut staging = self.staging.write();
                std::mem::take(&mut *staging)
            };
            if !staged.is_empty() {
                let mut resources = self.resources.write();
                for descriptor in staged {
                    resources.push(Record {
                        descriptor,
                        state: Slot::New,
                    });
                }
                progressed = true;
            }

            while let Some(index) = self.load_queue.pop() {
                progressed = true;
                self.run_one_load(index);
            }

            if !progressed {
                break;
            }
        }
    }

    fn run_one_load(&self, index: u32) {
        let descriptor = {
            let mut resources = self.resources.write();
            match resources.get_mut(index) {
                Some(record) if matches!(record.state, Slot::New) => {
                    record.state = Slot::Loading;
                    Some(record.descriptor.clone())
                }
                _ => None,
            }
        };
        let Some(descriptor) = descriptor else {
            return;
        };
        let outcome = K::load(&descriptor);
        let mut resources = self.resources.write();
        if let Some(record) = resources.get_mut(index) {
            record.state = match outcome {
                Ok(payload) => Slot::Loaded(payload),
                Err(err) => {
                    tracing::warn!(%err, index, "resource load failed");
                    Slot::LoadFailed(err)
                }
            };
        }
    }
}

impl<K: ResourceKind> Default for ResourceManager<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;
    impl ResourceKind for Doubler {
        type Descriptor = u32;
        type Payload = u32;
        fn load(descriptor: &u32) -> Result<u32, LoadError> {
            if *descriptor == 0 {
                Err(LoadError::SourceNull)
            } else {
                Ok(descriptor * 2)
            }
        }
    }

    /// A descriptor kind with a real notion of identity, like
    /// `PrototypeDescriptor`'s wrapped `Arc<dyn Source>`.
    struct Wrapped;
    impl ResourceKind for Wrapped {
        type Descriptor = std::sync::Arc<u32>;
        type Payload = u32;
        fn load(descriptor: &std::sync::Arc<u32>) -> Result<u32, LoadError> {
            Ok(**descriptor)
        }
        fn same_identity(a: &std::sync::Arc<u32>, b: &std::sync::Arc<u32>) -> bool {
            std::sync::Arc::ptr_eq(a, b)
        }
    }

    #[test]
    fn handle_never_dedupes_descriptors_with_no_identity() {
        // A bare u32 carries no identity of its own (`same_identity`
        // defaults to false), so equal values still mint distinct handles.
        let mgr: ResourceManager<Doubler> = ResourceManager::new();
        let a = mgr.handle(7);
        let b = mgr.handle(7);
        assert_ne!(a, b);
    }

    #[test]
    fn handle_dedupes_the_same_arc_but_not_an_equal_clone() {
        let mgr: ResourceManager<Wrapped> = ResourceManager::new();
        let source = std::sync::Arc::new(9);

        // Same Arc, still staged: returns the handle already minted for it.
        let a = mgr.handle(source.clone());
        let b = mgr.handle(source.clone());
        assert_eq!(a, b);

        // A different Arc with equal content never collapses to `a`.
        let distinct = mgr.handle(std::sync::Arc::new(9));
        assert_ne!(a, distinct);

        // Same Arc still dedupes once its record has been published.
        mgr.update();
        let c = mgr.handle(source);
        assert_eq!(a, c);
    }

    #[test]
    fn new_handle_starts_new_and_reaches_loaded() {
        let mgr: ResourceManager<Doubler> = ResourceManager::new();
        let h = mgr.handle(21);
        assert_eq!(mgr.state(h), ResourceState::New);
        mgr.request_load(h);
        mgr.update();
        assert_eq!(mgr.state(h), ResourceState::Loaded);
        assert_eq!(*mgr.resource(h).unwrap(), 42);
    }

    #[test]
    fn failing_load_transitions_to_load_failed() {
        let mgr: ResourceManager<Doubler> = ResourceManager::new();
        let ok = mgr.handle(5);
        let bad = mgr.handle(0);
        mgr.request_load(ok);
        mgr.request_load(bad);
        mgr.update();
        assert_eq!(mgr.state(ok), ResourceState::Loaded);
        assert_eq!(mgr.state(bad), ResourceState::LoadFailed);
        assert_eq!(mgr.failed_descriptors(), vec![0]);
    }

    #[test]
    fn state_is_monotonic_once_loaded() {
        let mgr: ResourceManager<Doubler> = ResourceManager::new();
        let h = mgr.handle(3);
        mgr.request_load(h);
        mgr.update();
        assert_eq!(mgr.state(h), ResourceState::Loaded);
        mgr.request_load(h); // no-op: not New anymore
        mgr.update();
        assert_eq!(mgr.state(h), ResourceState::Loaded);
    }

    #[test]
    fn clear_drops_everything() {
        let mgr: ResourceManager<Doubler> = ResourceManager::new();
        let h = mgr.handle(3);
        mgr.request_load(h);
        mgr.update();
        mgr.clear();
        assert_eq!(mgr.state(h), ResourceState::New);
    }
}
