//! A single component column: tightly packed bytes plus the parallel
//! `counts`/`offsets` arrays, doubled once per generation (past/future).
//!
//! Grounded on `ecs/storage/column.rs`'s double-buffered `Column` (`[Vec<u8>;
//! 2]`, `grow_one`, `write_row`) — generalized here from "one buffer per
//! archetype tick" to "one buffer per generation, shared across the whole
//! entity population," and split from a single packed-per-row layout into
//! the count/offset indirection spec §3 requires (components aren't one
//! per entity in general — multi-components need contiguous runs).

use crate::storage::Count;
use tracing::warn;

/// Sentinel offset meaning "this entity has zero components of this type."
pub const SENTINEL_OFFSET: u32 = u32::MAX;

/// One type's storage for one generation (past or future).
pub struct Column {
    elem_size: usize,
    data: Vec<u8>,
    /// Bytes actually committed; `committed <= data.len()`.
    committed_components: usize,
    counts: Vec<Count>,
    offsets: Vec<u32>,
}

impl Column {
    pub fn new(elem_size: usize) -> Self {
        Self {
            elem_size,
            data: Vec::new(),
            committed_components: 0,
            counts: Vec::new(),
            offsets: Vec::new(),
        }
    }

    #[inline]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    #[inline]
    pub fn entity_len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn committed_components(&self) -> usize {
        self.committed_components
    }

    #[inline]
    pub fn count(&self, i: usize) -> Count {
        self.counts[i]
    }

    #[inline]
    pub fn offset(&self, i: usize) -> u32 {
        self.offsets[i]
    }

    /// Committed bytes, tightly packed in entity order. Invariant: `len ==
    /// sum(counts) * elem_size`.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.committed_components * self.elem_size]
    }

    /// Bytes of a single entity's run, or `&[]` if it has none.
    pub fn entity_bytes(&self, i: usize) -> &[u8] {
        let count = self.counts[i] as usize;
        if count == 0 {
            return &[];
        }
        let start = self.offsets[i] as usize * self.elem_size;
        let end = start + count * self.elem_size;
        &self.data[start..end]
    }

    /// Capacity, in components, of the backing byte buffer.
    pub fn capacity_components(&self) -> usize {
        if self.elem_size == 0 {
            usize::MAX
        } else {
            self.data.len() / self.elem_size
        }
    }

    /// Grow (or leave alone) the backing buffer so it holds at least
    /// `min` more uncommitted components. Reports growth to the caller so
    /// it can log a warning with frame context (spec §4.2 "emit a warning
    /// on growth").
    pub fn reserve(&mut self, min_additional: usize, reallocation_multiplier: f64) -> bool {
        let needed = self.committed_components + min_additional;
        let have = self.capacity_components();
        if needed <= have {
            return false;
        }
        let grown = ((have.max(1) as f64) * reallocation_multiplier).ceil() as usize;
        let new_cap = grown.max(needed);
        self.data.resize(new_cap * self.elem_size, 0);
        true
    }

    /// Preallocate to at least `target` components without changing what
    /// is committed (spec §4.2 preallocation policy).
    pub fn preallocate(&mut self, target: usize) {
        if target > self.capacity_components() {
            self.data.resize(target * self.elem_size, 0);
        }
    }

    /// A writable slice of at least `min` uncommitted components,
    /// growing (and reporting growth) if necessary.
    pub fn uncommitted_space(&mut self, min: usize, reallocation_multiplier: f64) -> (&mut [u8], bool) {
        let grew = self.reserve(min, reallocation_multiplier);
        let start = self.committed_components * self.elem_size;
        (&mut self.data[start..], grew)
    }

    /// Mark `n` newly written components as committed.
    pub fn commit(&mut self, n: usize) {
        self.committed_components += n;
        debug_assert!(self.committed_components * self.elem_size <= self.data.len());
    }

    /// Zero committed counts; leaves allocation in place (spec §4.2
    /// `reset_future`).
    pub fn reset(&mut self) {
        self.committed_components = 0;
    }

    /// Resize `counts`/`offsets` to `n` entities, new slots `(0,
    /// SENTINEL)` (spec §4.2 `grow_entity_count`).
    pub fn grow_entity_count(&mut self, n: usize) {
        self.counts.resize(n, 0);
        self.offsets.resize(n, SENTINEL_OFFSET);
    }

    /// Set the `(count, offset)` pair for entity `i`, used while
    /// compacting/dispatching.
    pub fn set_entity(&mut self, i: usize, count: Count, offset: u32) {
        self.counts[i] = count;
        self.offsets[i] = offset;
    }

    /// Clear every entity's `(count, offset)` back to `(0, SENTINEL)`
    /// without touching the byte buffer's allocation.
    pub fn clear_entities(&mut self) {
        for c in self.counts.iter_mut() {
            *c = 0;
        }
        for o in self.offsets.iter_mut() {
            *o = SENTINEL_OFFSET;
        }
    }

    pub fn clear_entities_len(&mut self, n: usize) {
        self.counts.clear();
        self.offsets.clear();
        self.grow_entity_count(n);
    }

    /// Append raw bytes for one entity directly after the currently
    /// committed region, recording its `(count, offset)`. Used to admit
    /// births (spec §4.6 step 5) where the destination row is appended
    /// rather than produced by process dispatch.
    pub fn append_entity(&mut self, bytes: &[u8], reallocation_multiplier: f64) -> (Count, u32) {
        if bytes.is_empty() {
            return (0, SENTINEL_OFFSET);
        }
        let count = bytes.len() / self.elem_size;
        let (_dst, grew) = self.uncommitted_space(count, reallocation_multiplier);
        let start = self.committed_components * self.elem_size;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        let offset = self.committed_components as u32;
        self.commit(count);
        if grew {
            warn!(elem_size = self.elem_size, "column reallocated during birth admission");
        }
        (count as Count, offset)
    }

    /// Verifies the invariant `sum(counts) * elem_size == committed bytes`
    /// and that offsets form contiguous, monotonically non-decreasing
    /// runs (spec §8 quantified invariants). Debug/test use only.
    #[cfg(any(test, feature = "invariant-checks"))]
    pub fn check_invariants(&self) -> Result<(), String> {
        let total: usize = self.counts.iter().map(|&c| c as usize).sum();
        if total != self.committed_components {
            return Err(format!(
                "sum(counts)={total} != committed_components={}",
                self.committed_components
            ));
        }
        let mut expected_next = 0u32;
        for i in 0..self.counts.len() {
            let count = self.counts[i];
            if count == 0 {
                continue;
            }
            if self.offsets[i] != expected_next {
                return Err(format!(
                    "entity {i}: offset {} != expected {}",
                    self.offsets[i], expected_next
                ));
            }
            expected_next += count as u32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_commit_tracks_bytes() {
        let mut col = Column::new(4);
        col.grow_entity_count(2);
        let (count, offset) = col.append_entity(&[1, 2, 3, 4], 2.0);
        col.set_entity(0, count, offset);
        assert_eq!(col.bytes(), &[1, 2, 3, 4]);
        assert_eq!(col.check_invariants(), Ok(()));
    }

    #[test]
    fn reserve_grows_by_multiplier() {
        let mut col = Column::new(4);
        col.preallocate(4);
        assert_eq!(col.capacity_components(), 4);
        let grew = col.reserve(10, 2.0);
        assert!(grew);
        assert!(col.capacity_components() >= 10);
    }

    #[test]
    fn reset_future_keeps_allocation() {
        let mut col = Column::new(4);
        col.preallocate(8);
        let (_, _) = col.append_entity(&[9, 9, 9, 9], 2.0);
        assert_eq!(col.committed_components(), 1);
        col.reset();
        assert_eq!(col.committed_components(), 0);
        assert!(col.capacity_components() >= 8);
    }
}
