//! Entity table & birth queue (spec §4.3).
//!
//! Grounded on `ecs/entity.rs`'s sequential-allocator idiom, simplified:
//! spec's `Entity` carries no generation (ids are never reused — dead
//! entities are pruned by absence of `Life`, not by generation-tagged slot
//! reuse), so this module is a sorted id array plus a bounded, mutex-
//! guarded birth queue rather than a free-list pool. The mutex choice
//! follows `rodd-oss-rodengine/ecsdb`'s use of `parking_lot` for
//! rarely-written, often-read concurrent structures.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Opaque entity identifier. `0` is the sentinel "none" (spec §3).
pub type EntityId = u32;

/// Sentinel entity id.
pub const NONE: EntityId = 0;

/// Sorted-ascending, no-duplicates array of live entity ids for one
/// generation (past or future). Swapped in lockstep with
/// [`crate::storage::ColumnStore`] by the frame engine.
#[derive(Default, Clone)]
pub struct EntityList {
    ids: Vec<EntityId>,
}

impl EntityList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Append `id`; caller must uphold ascending order (the compaction
    /// pass in the frame engine does, by construction).
    pub fn push(&mut self, id: EntityId) {
        debug_assert!(
            self.ids.last().is_none_or(|&last| last < id),
            "entities must be appended in strictly ascending id order"
        );
        self.ids.push(id);
    }

    /// Binary search by id, returning the row index within this
    /// generation (spec §4.3 "lookup... proceeds by binary search on the
    /// past entity table by id").
    pub fn position(&self, id: EntityId) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }
}

/// Entities queued for birth during the current frame, plus the
/// monotonically increasing id counter they're minted from. Both are
/// guarded by the same lock, per spec §4.3 ("ids are minted... under the
/// birth-queue lock").
pub struct BirthQueue<P> {
    inner: Mutex<Inner<P>>,
    capacity: usize,
}

struct Inner<P> {
    pending: VecDeque<(P, EntityId)>,
    next_id: EntityId,
}

impl<P> BirthQueue<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                next_id: NONE + 1,
            }),
            capacity,
        }
    }

    /// Enqueue a birth. Returns [`NONE`] if the queue is already at
    /// capacity (spec §4.3 "back-pressure signal to the caller"); the
    /// counter is not advanced on that path.
    pub fn enqueue(&self, prototype: P) -> EntityId {
        let mut inner = self.inner.lock();
        if inner.pending.len() >= self.capacity {
            return NONE;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.pending.push_back((prototype, id));
        id
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain everything queued this frame, in enqueue order, clearing
    /// the queue (spec §4.6 step 5 "Clear the queue").
    pub fn drain(&self) -> Vec<(P, EntityId)> {
        let mut inner = self.inner.lock();
        inner.pending.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_finds_existing_entity() {
        let mut list = EntityList::new();
        list.push(3);
        list.push(7);
        list.push(9);
        assert_eq!(list.position(7), Some(1));
        assert_eq!(list.position(8), None);
    }

    #[test]
    fn birth_queue_backpressure_returns_none() {
        let queue: BirthQueue<()> = BirthQueue::new(2);
        assert_ne!(queue.enqueue(()), NONE);
        assert_ne!(queue.enqueue(()), NONE);
        assert_eq!(queue.enqueue(()), NONE, "third enqueue must back-pressure");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn birth_queue_ids_are_monotonic_and_drain_clears() {
        let queue: BirthQueue<()> = BirthQueue::new(8);
        let a = queue.enqueue(());
        let b = queue.enqueue(());
        assert!(b > a);
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }
}
