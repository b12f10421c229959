//! Overload descriptors (spec §4.5, Design Notes "overload sets... model
//! as an unordered collection of overload descriptors").
//!
//! Grounded on `ecs/system_descriptor.rs`'s `reads`/`writes`/sanitize
//! pattern (sorted, deduped component sets built by a small builder),
//! generalized from "one overload per system" to "N overloads per
//! process, one future type shared across all of them."

use crate::component::ComponentId;
use crate::process::dispatch::DispatchFn;

/// How a future write is reported back to the dispatcher (Design Notes
/// "collapse [parameter-kind polymorphism] to three explicit call
/// shapes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureArity {
    /// No future parameter at all.
    None,
    /// Exactly one write (`out-reference`): dispatcher always commits one
    /// component after the call.
    Single,
    /// Zero or one write (`reference-to-pointer`): the call reports
    /// whether it wrote, via the returned count (`0` or `1`).
    Optional,
    /// Zero to `max_per_entity` writes (`mutable slice`): the returned
    /// count is the number of components written, contiguously from the
    /// start of the reserved buffer.
    Multi,
}

/// One overload of a process's step function: which past components it
/// reads, which single future type (if any) it may write, and the
/// function pointer that performs the call.
pub struct OverloadDescriptor {
    /// Past component ids this overload requires, sorted + deduped.
    pub(crate) past: Vec<ComponentId>,
    pub(crate) future: Option<(ComponentId, FutureArity)>,
    pub(crate) wants_context: bool,
    pub(crate) dispatch: Box<DispatchFn>,
}

impl OverloadDescriptor {
    pub fn new(dispatch: Box<DispatchFn>) -> Self {
        Self {
            past: Vec::new(),
            future: None,
            wants_context: false,
            dispatch,
        }
    }

    pub fn reads<I: IntoIterator<Item = ComponentId>>(mut self, ids: I) -> Self {
        self.past = sanitize(ids);
        self
    }

    pub fn writes(mut self, id: ComponentId, arity: FutureArity) -> Self {
        self.future = Some((id, arity));
        self
    }

    pub fn with_context(mut self) -> Self {
        self.wants_context = true;
        self
    }

    pub fn past_components(&self) -> &[ComponentId] {
        &self.past
    }

    pub fn future_component(&self) -> Option<(ComponentId, FutureArity)> {
        self.future
    }

    /// Does the current past-entity's component counts satisfy this
    /// overload (spec §4.5 "the first whose required component counts
    /// are all non-zero... wins")?
    pub(crate) fn matches(&self, counts: &dyn Fn(ComponentId) -> u16) -> bool {
        self.past.iter().all(|&id| counts(id) > 0)
    }
}

fn sanitize<I: IntoIterator<Item = ComponentId>>(ids: I) -> Vec<ComponentId> {
    let mut v: Vec<ComponentId> = ids.into_iter().collect();
    v.sort_unstable();
    v.dedup();
    v
}

/// A process: a name plus one or more overloads, all agreeing on the
/// single future component type they may write (spec §4.5).
pub struct Process {
    pub(crate) name: String,
    pub(crate) overloads: Vec<OverloadDescriptor>,
    pub(crate) pinned_thread: Option<usize>,
}

impl Process {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
            pinned_thread: None,
        }
    }

    pub fn overload(mut self, overload: OverloadDescriptor) -> Self {
        self.overloads.push(overload);
        self
    }

    /// Pin this process to a logical thread index (modulo the live
    /// thread count), per spec §5.
    pub fn pin_to_thread(mut self, index: usize) -> Self {
        self.pinned_thread = Some(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn future_component(&self) -> Option<ComponentId> {
        self.overloads.first().and_then(|o| o.future.map(|(id, _)| id))
    }

    pub fn pinned_thread(&self) -> Option<usize> {
        self.pinned_thread
    }

    pub fn overloads(&self) -> &[OverloadDescriptor] {
        &self.overloads
    }
}
