//! Double-buffered columnar component store (spec §4.2).
//!
//! One [`Generation`] is a sparse `Vec` of [`Column`]s indexed by
//! [`crate::component::ComponentId`] (Design Notes: "replace module-global
//! arrays with owned arrays on the engine instance; indexed by small-int
//! ids; sparsely populated"). [`ColumnStore`] owns exactly two generations
//! and swaps which one is "past" by pointer, never by copy (spec §4.6 step
//! 3, §5 "generations are swapped by pointer, not copied").

mod column;

pub use column::{Column, SENTINEL_OFFSET};

use crate::component::{ComponentId, ComponentRegistry};
use crate::config::EngineConfig;

/// Per-entity component count width (spec §6 `component_count_type`,
/// resolved to a fixed type — see `DESIGN.md`).
pub type Count = u16;

/// All per-type columns for one buffer generation (either "past" or
/// "future" at any given moment; which is which flips at swap).
pub struct Generation {
    columns: Vec<Option<Column>>,
    entity_count: usize,
}

impl Generation {
    pub fn new(registry: &ComponentRegistry) -> Self {
        let columns = registry
            .types()
            .iter()
            .map(|desc| desc.as_ref().map(|d| Column::new(d.size)))
            .collect();
        Self {
            columns,
            entity_count: 0,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    pub fn column(&self, t: ComponentId) -> Option<&Column> {
        self.columns.get(t as usize).and_then(|c| c.as_ref())
    }

    pub fn column_mut(&mut self, t: ComponentId) -> Option<&mut Column> {
        self.columns.get_mut(t as usize).and_then(|c| c.as_mut())
    }

    pub fn registered_types(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|_| i as ComponentId))
    }

    /// Raw access to the column slots, keyed by [`ComponentId`] position.
    /// Used by the frame engine to split disjoint `&mut Column` borrows
    /// out to concurrently-dispatching processes (spec §5 "at most one
    /// writer" means this split is always safe).
    pub(crate) fn columns_mut(&mut self) -> &mut [Option<Column>] {
        &mut self.columns
    }

    /// Resize every column's `counts`/`offsets` arrays to `n` (spec §4.2
    /// `grow_entity_count`).
    pub fn grow_entity_count(&mut self, n: usize) {
        for col in self.columns.iter_mut().flatten() {
            col.grow_entity_count(n);
        }
        self.entity_count = n;
    }

    /// Zero every column's committed byte count; `counts`/`offsets` are
    /// cleared separately by the caller as entities are compacted in
    /// (spec §4.2 `reset_future`).
    pub fn reset_future(&mut self) {
        for col in self.columns.iter_mut().flatten() {
            col.reset();
        }
    }

    /// Preallocate every column per spec §4.2's formula, ahead of a
    /// frame's dispatch.
    pub fn preallocate(&mut self, registry: &ComponentRegistry, config: &EngineConfig) {
        let entities = self.entity_count;
        for (id, col) in self
            .columns
            .iter_mut()
            .enumerate()
            .filter_map(|(i, c)| c.as_mut().map(|c| (i as ComponentId, c)))
        {
            let desc = registry.get(id).expect("column without registered type");
            let target = config.prealloc_for(desc.min_prealloc, desc.min_prealloc_per_entity, entities);
            col.preallocate(target);
        }
    }
}

/// Owns exactly two generations and knows which is currently "past"
/// (readable by every process) and which is "future" (writable by each
/// process's single declared writer).
pub struct ColumnStore {
    generations: [Generation; 2],
    past_is_zero: bool,
}

impl ColumnStore {
    pub fn new(registry: &ComponentRegistry) -> Self {
        Self {
            generations: [Generation::new(registry), Generation::new(registry)],
            past_is_zero: true,
        }
    }

    pub fn past(&self) -> &Generation {
        &self.generations[self.past_index()]
    }

    pub fn future(&self) -> &Generation {
        &self.generations[self.future_index()]
    }

    pub fn future_mut(&mut self) -> &mut Generation {
        let idx = self.future_index();
        &mut self.generations[idx]
    }

    pub fn past_mut(&mut self) -> &mut Generation {
        let idx = self.past_index();
        &mut self.generations[idx]
    }

    fn past_index(&self) -> usize {
        if self.past_is_zero {
            0
        } else {
            1
        }
    }

    fn future_index(&self) -> usize {
        1 - self.past_index()
    }

    /// Past <- old future; future <- old past (spec §4.6 step 3). O(1):
    /// just flips which generation is which.
    pub fn swap(&mut self) {
        self.past_is_zero = !self.past_is_zero;
    }

    /// Borrow both generations at once: past read-only, future
    /// read-write. Safe without unsafe code because the two generations
    /// are distinct elements of `self.generations`, split via
    /// `split_at_mut`.
    pub fn split_mut(&mut self) -> (&Generation, &mut Generation) {
        let past_idx = self.past_index();
        let (left, right) = self.generations.split_at_mut(1);
        if past_idx == 0 {
            (&left[0], &mut right[0])
        } else {
            (&right[0], &mut left[0])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentTypeDesc;

    fn registry_with_one_type() -> ComponentRegistry {
        let mut reg = ComponentRegistry::new();
        reg.register(ComponentTypeDesc::new(17, 12));
        reg.lock();
        reg
    }

    #[test]
    fn swap_flips_which_generation_is_past() {
        let registry = registry_with_one_type();
        let mut store = ColumnStore::new(&registry);
        store.future_mut().grow_entity_count(3);
        assert_eq!(store.future().entity_count(), 3);
        assert_eq!(store.past().entity_count(), 0);
        store.swap();
        assert_eq!(store.past().entity_count(), 3);
        assert_eq!(store.future().entity_count(), 0);
    }
}
