//! Frame engine (spec §4.6): orchestrates the double-buffered store, the
//! birth queue, the prototype resource manager, and the process
//! dispatcher through one frame's seven steps.
//!
//! Grounded on `ecs/world.rs`'s `World::step` pipeline (swap, compact,
//! dispatch) and on `rayon`, already a teacher dependency, for the
//! thread-assignment model spec §5 calls for ("each process is assigned
//! to exactly one thread for the duration of a frame... users may pin a
//! process to a logical thread index"): processes are partitioned into
//! `worker_threads` buckets (pinned processes land on their requested
//! index mod thread count; others round-robin by registration order),
//! and each bucket runs as one `rayon::Scope` task. This differs from
//! `ThreadPool::broadcast` (which would hand every OS thread the same
//! closure) because a bucket owns non-overlapping `&mut Column`
//! borrows that can't be reconstructed from inside a `Fn + Sync`
//! broadcast closure without extra interior mutability; scope tasks take
//! ownership of their bucket once, which is both simpler and safe.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::component::{ComponentId, ComponentRegistry, Life, LIFE_ID};
use crate::config::EngineConfig;
use crate::entity::{BirthQueue, EntityId, EntityList};
use crate::error::LoadError;
use crate::process::{Context, FutureSlot, Process, ProcessRegistry};
use crate::resource::{Prototype, ResourceHandle, ResourceKind, ResourceManager, ResourceState};
use crate::source::Source;
use crate::storage::{Column, ColumnStore, Generation};

/// Descriptor for the one resource kind the core ships: an entity
/// prototype parsed from a source. Carries its own registry handle
/// because [`ResourceKind::load`] has no other way to reach it.
#[derive(Clone)]
pub struct PrototypeDescriptor {
    pub source: Arc<dyn Source + Send + Sync>,
    registry: Arc<ComponentRegistry>,
}

pub struct PrototypeKind;

impl ResourceKind for PrototypeKind {
    type Descriptor = PrototypeDescriptor;
    type Payload = Prototype;

    fn load(descriptor: &PrototypeDescriptor) -> Result<Prototype, LoadError> {
        Prototype::from_source(descriptor.source.as_ref(), descriptor.registry.as_ref())
    }

    fn same_identity(a: &PrototypeDescriptor, b: &PrototypeDescriptor) -> bool {
        Arc::ptr_eq(&a.source, &b.source)
    }
}

/// Ties together every module in the core into one runnable simulation.
pub struct Engine {
    registry: Arc<ComponentRegistry>,
    processes: ProcessRegistry,
    storage: ColumnStore,
    past_entities: EntityList,
    future_entities: EntityList,
    births: BirthQueue<ResourceHandle>,
    prototypes: ResourceManager<PrototypeKind>,
    config: EngineConfig,
    pool: ThreadPool,
    frame_index: u64,
}

impl Engine {
    /// `registry` and `processes` must already be locked (spec §4.1 /
    /// §4.5 "required before constructing any engine instance").
    pub fn new(registry: ComponentRegistry, processes: ProcessRegistry, config: EngineConfig) -> Self {
        assert!(registry.is_locked(), "component registry must be locked");
        assert!(processes.len() <= config.max_processes as usize, "too many processes registered");

        let registry = Arc::new(registry);
        let storage = ColumnStore::new(&registry);
        let births = BirthQueue::new(config.max_new_entities_per_frame);
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .build()
            .expect("failed to build the frame engine's thread pool");

        Self {
            registry,
            processes,
            storage,
            past_entities: EntityList::new(),
            future_entities: EntityList::new(),
            births,
            prototypes: ResourceManager::new(),
            config,
            pool,
            frame_index: 0,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Currently-alive past entities, in ascending id order. Filters out
    /// entities whose `Life` already reads dead this frame, even though
    /// `compact_and_bloom` won't drop them from `past_entities` until the
    /// next frame's swap (spec §8 scenario 2: no-writer entities vanish
    /// from this list exactly two frames after birth).
    pub fn entities(&self) -> Vec<EntityId> {
        self.past_entities
            .ids()
            .iter()
            .enumerate()
            .filter(|&(row, _)| is_alive_at(self.storage.past(), row))
            .map(|(_, &id)| id)
            .collect()
    }

    /// Lookup of an arbitrary past entity's component, outside of process
    /// dispatch (spec §4.3 binary-search lookup).
    pub fn component(&self, entity: EntityId, component: ComponentId) -> Option<&[u8]> {
        let row = self.past_entities.position(entity)?;
        let col = self.storage.past().column(component)?;
        if col.count(row) == 0 {
            None
        } else {
            Some(col.entity_bytes(row))
        }
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.component(entity, LIFE_ID)
            .is_some_and(|bytes| Life::from_bytes(bytes).alive)
    }

    /// Mint a handle for a prototype source, or return the existing one
    /// if `source` is the same `Arc` as an already-recorded descriptor.
    /// Two distinct `Arc`s wrapping structurally-identical sources never
    /// collapse (spec's Open Question resolution, see `DESIGN.md`).
    pub fn request_prototype(&self, source: Arc<dyn Source + Send + Sync>) -> ResourceHandle {
        self.prototypes.handle(PrototypeDescriptor {
            source,
            registry: self.registry.clone(),
        })
    }

    pub fn request_prototype_load(&self, handle: ResourceHandle) {
        self.prototypes.request_load(handle);
    }

    pub fn prototype_state(&self, handle: ResourceHandle) -> ResourceState {
        self.prototypes.state(handle)
    }

    pub fn failed_prototypes(&self) -> Vec<PrototypeDescriptor> {
        self.prototypes.failed_descriptors()
    }

    /// Enqueue a birth for the next admission pass. Returns
    /// [`crate::entity::NONE`] under back-pressure (spec §4.3).
    pub fn add_entity(&self, prototype: ResourceHandle) -> EntityId {
        self.births.enqueue(prototype)
    }

    /// Run one complete frame: spec §4.6 steps 1-7, in order.
    pub fn run_frame(&mut self) {
        let born = self.births.len();
        let _span = tracing::debug_span!("frame", index = self.frame_index).entered();

        self.diagnostics();
        self.prototypes.update();
        self.storage.swap();
        // Old future becomes the new past, entity ids included; old past
        // becomes the new future, about to be overwritten by dispatch.
        self.past_entities = std::mem::take(&mut self.future_entities);
        self.storage.future_mut().reset_future();
        self.compact_and_bloom();
        self.admit_births();
        self.storage.future_mut().preallocate(&self.registry, &self.config);
        self.dispatch_processes();

        tracing::debug!(alive = self.past_entities.len(), born, "frame complete");
        self.frame_index += 1;
    }

    fn diagnostics(&self) {
        if self.processes.writerless_types(std::iter::once(LIFE_ID)).next().is_some() {
            tracing::warn!("no process declares Life as its future component; every entity will be pruned next frame");
        }
        let other_ids: Vec<ComponentId> = self.registry.iter().map(|t| t.id).filter(|&id| id != LIFE_ID).collect();
        for id in self.processes.writerless_types(other_ids.into_iter()) {
            tracing::warn!(component = id, "component type has no registered future writer");
        }
    }

    /// Spec §4.6 step 4: scan the new past generation, copying alive
    /// entities into the future entity array and sizing future buffers
    /// for `alive + pending_births`.
    fn compact_and_bloom(&mut self) {
        self.future_entities.clear();
        let mut alive_count = 0usize;
        for (row, &id) in self.past_entities.ids().to_vec().iter().enumerate() {
            if is_alive_at(self.storage.past(), row) {
                self.future_entities.push(id);
                alive_count += 1;
            }
        }
        let future_count = alive_count + self.births.len();
        self.storage.future_mut().grow_entity_count(future_count);
    }

    /// Spec §4.6 step 5: admit queued births directly into *past* (so
    /// this frame's dispatch sees them) and mirror the entity record into
    /// future.
    fn admit_births(&mut self) {
        let drained = self.births.drain();
        if drained.is_empty() {
            return;
        }
        let old_past_len = self.past_entities.len();
        self.storage.past_mut().grow_entity_count(old_past_len + drained.len());

        for (row_offset, (handle, id)) in drained.into_iter().enumerate() {
            let row = old_past_len + row_offset;
            let payload: Vec<(ComponentId, Vec<u8>)> = match self.prototypes.resource(handle) {
                Some(prototype) => prototype
                    .entries()
                    .iter()
                    .map(|entry| (entry.component, prototype.bytes(entry, &self.registry).to_vec()))
                    .collect(),
                None => {
                    tracing::warn!(entity = id, "prototype not loaded at birth admission; entity dropped");
                    continue;
                }
            };
            for (component, bytes) in payload {
                if let Some(col) = self.storage.past_mut().column_mut(component) {
                    let (count, offset) = col.append_entity(&bytes, self.config.reallocation_multiplier);
                    col.set_entity(row, count, offset);
                }
            }

            let life_bytes = Life { alive: true }.to_bytes();
            if let Some(life_col) = self.storage.past_mut().column_mut(LIFE_ID) {
                let (count, offset) = life_col.append_entity(&life_bytes, self.config.reallocation_multiplier);
                life_col.set_entity(row, count, offset);
            }

            self.past_entities.push(id);
            self.future_entities.push(id);
        }
    }

    /// Spec §4.6 step 7. Processes are partitioned into thread buckets;
    /// each bucket runs as one scoped task and dispatches its processes
    /// sequentially.
    fn dispatch_processes(&mut self) {
        let worker_threads = self.config.worker_threads.max(1);
        let (past_gen, future_gen) = self.storage.split_mut();
        let mut future_cols: Vec<Option<&mut Column>> =
            future_gen.columns_mut().iter_mut().map(|c| c.as_mut()).collect();

        let mut buckets: Vec<Vec<(&Process, Option<&mut Column>)>> =
            (0..worker_threads).map(|_| Vec::new()).collect();

        for (order, (_, process)) in self.processes.iter().enumerate() {
            let future_col = process
                .future_component()
                .and_then(|id| future_cols.get_mut(id as usize).and_then(Option::take));
            let thread_id = process.pinned_thread().unwrap_or(order) % worker_threads;
            buckets[thread_id].push((process, future_col));
        }

        let past_ids = self.past_entities.ids();
        let registry = self.registry.as_ref();
        let realloc = self.config.reallocation_multiplier;

        self.pool.scope(|s| {
            for bucket in buckets {
                s.spawn(move |_| {
                    for (process, future_col) in bucket {
                        dispatch_process(process, future_col, past_gen, past_ids, registry, realloc);
                    }
                });
            }
        });
    }
}

fn is_alive_at(past: &Generation, row: usize) -> bool {
    match past.column(LIFE_ID) {
        Some(col) if col.count(row) > 0 => Life::from_bytes(col.entity_bytes(row)).alive,
        _ => false,
    }
}

struct EngineContext<'a> {
    past: &'a Generation,
    ids: &'a [EntityId],
    current_row: usize,
    current_id: EntityId,
}

impl<'a> Context for EngineContext<'a> {
    fn get(&self, entity: EntityId, component: ComponentId) -> Option<&[u8]> {
        let row = if entity == self.current_id {
            self.current_row
        } else {
            self.ids.binary_search(&entity).ok()?
        };
        let col = self.past.column(component)?;
        if col.count(row) == 0 {
            None
        } else {
            Some(col.entity_bytes(row))
        }
    }

    fn current_entity(&self) -> EntityId {
        self.current_id
    }
}

/// Dispatch one process against every alive past entity, writing into
/// its single declared future column (spec §4.5 "Per-entity dispatch").
fn dispatch_process(
    process: &Process,
    mut future_col: Option<&mut Column>,
    past: &Generation,
    past_ids: &[EntityId],
    registry: &ComponentRegistry,
    reallocation_multiplier: f64,
) {
    let mut future_row = 0usize;
    for (row, &id) in past_ids.iter().enumerate() {
        if !is_alive_at(past, row) {
            continue;
        }

        let counts = |component: ComponentId| past.column(component).map_or(0, |c| c.count(row));
        let overload = process.overloads().iter().find(|o| o.matches(&counts));

        if let Some(overload) = overload {
            let past_slices: Vec<&[u8]> = overload
                .past_components()
                .iter()
                .map(|&cid| past.column(cid).map_or(&[][..], |c| c.entity_bytes(row)))
                .collect();

            let ctx = EngineContext {
                past,
                ids: past_ids,
                current_row: row,
                current_id: id,
            };

            let max_components = match overload.future_component() {
                Some((future_id, crate::process::FutureArity::Multi)) => {
                    registry.get(future_id).map_or(1, |t| t.max_per_entity as usize)
                }
                Some((_, crate::process::FutureArity::Single | crate::process::FutureArity::Optional)) => 1,
                Some((_, crate::process::FutureArity::None)) | None => 0,
            };

            if max_components > 0 {
                if let Some(col) = future_col.as_deref_mut() {
                    let elem_size = col.elem_size();
                    let offset_before = col.committed_components() as u32;
                    let (buf, grew) = col.uncommitted_space(max_components, reallocation_multiplier);
                    if grew {
                        tracing::warn!(process = process.name(), "future column reallocated mid-frame");
                    }
                    let window_len = (max_components * elem_size).min(buf.len());
                    let mut slot = FutureSlot::new(&mut buf[..window_len], elem_size);
                    let written = ((overload.dispatch)(&past_slices, &mut slot, &ctx) as usize).min(max_components);
                    col.commit(written);
                    if written > 0 {
                        col.set_entity(future_row, written as crate::storage::Count, offset_before);
                    }
                } else {
                    let mut empty: [u8; 0] = [];
                    let mut slot = FutureSlot::new(&mut empty, 0);
                    let _ = (overload.dispatch)(&past_slices, &mut slot, &ctx);
                }
            } else {
                let mut empty: [u8; 0] = [];
                let mut slot = FutureSlot::new(&mut empty, 0);
                let _ = (overload.dispatch)(&past_slices, &mut slot, &ctx);
            }
        }

        future_row += 1;
    }
}
