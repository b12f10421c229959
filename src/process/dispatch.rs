//! The dispatcher's call shapes (spec §4.5 "Per-entity dispatch").
//!
//! A `DispatchFn` receives the matched overload's past-component byte
//! slices (in the order the overload declared them — a plain slice works
//! for both single and multi-components; the overload's
//! [`crate::process::FutureArity`] and the registered type's
//! `max_per_entity` tell the caller how to interpret the byte count), a
//! [`FutureSlot`] to write into, and a [`Context`] for arbitrary past
//! lookups. It returns the number of future components written (`0` or
//! `1` for `Single`/`Optional`, `0..=max_per_entity` for `Multi`).

use crate::component::ComponentId;
use crate::entity::EntityId;

/// The reserved, uncommitted byte range a process writes its future
/// component(s) into.
pub struct FutureSlot<'a> {
    buf: &'a mut [u8],
    elem_size: usize,
}

impl<'a> FutureSlot<'a> {
    pub fn new(buf: &'a mut [u8], elem_size: usize) -> Self {
        Self { buf, elem_size }
    }

    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Capacity of this slot, in components.
    pub fn capacity(&self) -> usize {
        if self.elem_size == 0 {
            0
        } else {
            self.buf.len() / self.elem_size
        }
    }

    /// Write component `index` (0-based) worth of bytes.
    pub fn write(&mut self, index: usize, bytes: &[u8]) {
        assert_eq!(bytes.len(), self.elem_size, "component size mismatch");
        let start = index * self.elem_size;
        self.buf[start..start + self.elem_size].copy_from_slice(bytes);
    }

    pub fn raw(&mut self) -> &mut [u8] {
        self.buf
    }
}

/// Lookup of an arbitrary past entity's component, by id (spec §4.5
/// "context parameter... lookup of any past component of any past entity
/// by id"). The fast path ("if the entity being iterated is the current
/// one, skip the search") is implemented by the concrete type the engine
/// passes in, not by this trait.
pub trait Context {
    fn get(&self, entity: EntityId, component: ComponentId) -> Option<&[u8]>;
    fn current_entity(&self) -> EntityId;
}

/// The call shape every overload reduces to.
pub type DispatchFn = dyn Fn(&[&[u8]], &mut FutureSlot<'_>, &dyn Context) -> u16 + Send + Sync;
