//! Process registry (spec §4.5 "Registration validates...").
//!
//! Grounded on `ecs/system_registry.rs`'s `component_writers: HashMap<
//! ComponentId, SystemHandle>` single-writer enforcement and
//! `SystemRegistrationError` shape, generalized to validate across a
//! process's whole overload set (future-type agreement, pairwise-union
//! ambiguity) rather than a single descriptor.

use crate::component::ComponentId;
use crate::error::RegistrationError;
use crate::process::descriptor::Process;
use std::collections::HashMap;
use std::fmt;

/// Handle assigned to each registered process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcessHandle(u32);

impl ProcessHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct ProcessRegistry {
    processes: Vec<Process>,
    name_lookup: HashMap<String, ProcessHandle>,
    future_writers: HashMap<ComponentId, ProcessHandle>,
    locked: bool,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            name_lookup: HashMap::new(),
            future_writers: HashMap::new(),
            locked: false,
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn try_register(&mut self, mut process: Process) -> Result<ProcessHandle, RegistrationError> {
        if self.locked {
            return Err(RegistrationError::AlreadyLocked);
        }
        if process.overloads.is_empty() {
            return Err(RegistrationError::EmptyProcess { name: process.name });
        }
        if self.name_lookup.contains_key(&process.name) {
            return Err(RegistrationError::DuplicateProcessName { name: process.name });
        }

        let future_types: Vec<ComponentId> = process
            .overloads
            .iter()
            .filter_map(|o| o.future.map(|(id, _)| id))
            .collect();
        let mut distinct = future_types.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() > 1 {
            return Err(RegistrationError::InconsistentFutureType { name: process.name });
        }

        check_overload_coverage(&process)?;

        // Sort overloads by descending cardinality for dispatch-time
        // prioritization (spec §4.5 "tried in descending order of |past
        // set|"), computed once here rather than per-entity at dispatch.
        process
            .overloads
            .sort_by_key(|o| std::cmp::Reverse(o.past.len()));

        if let Some(&future_id) = distinct.first() {
            if let Some(&existing) = self.future_writers.get(&future_id) {
                let existing_name = self.processes[existing.index() as usize].name.clone();
                return Err(RegistrationError::DuplicateFutureWriter {
                    component: future_id,
                    existing: existing_name,
                    requested: process.name,
                    existing_handle: existing,
                });
            }
        }

        let handle = ProcessHandle::new(self.processes.len() as u32);
        if let Some(&future_id) = distinct.first() {
            self.future_writers.insert(future_id, handle);
        }
        self.name_lookup.insert(process.name.clone(), handle);
        self.processes.push(process);
        Ok(handle)
    }

    pub fn register(&mut self, process: Process) -> ProcessHandle {
        let name = process.name.clone();
        self.try_register(process)
            .unwrap_or_else(|e| panic!("process '{name}' registration failed: {e}"))
    }

    pub fn get(&self, handle: ProcessHandle) -> &Process {
        &self.processes[handle.index() as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProcessHandle, &Process)> {
        self.processes
            .iter()
            .enumerate()
            .map(|(i, p)| (ProcessHandle::new(i as u32), p))
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Components with no registered future writer at all (spec §4.5
    /// "warning is emitted for any non-null component type with no
    /// registered writer").
    pub fn writerless_types<'a>(
        &'a self,
        all_types: impl Iterator<Item = ComponentId> + 'a,
    ) -> impl Iterator<Item = ComponentId> + 'a {
        all_types.filter(|id| !self.future_writers.contains_key(id))
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Spec §4.5's ambiguity check: for every pair of overloads whose past
/// sets are mutual non-subsets, some overload (in this process) must
/// declare exactly their union.
fn check_overload_coverage(process: &Process) -> Result<(), RegistrationError> {
    let overloads = &process.overloads;
    for i in 0..overloads.len() {
        for j in (i + 1)..overloads.len() {
            let a = &overloads[i].past;
            let b = &overloads[j].past;
            if is_subset(a, b) || is_subset(b, a) {
                continue;
            }
            let union = sorted_union(a, b);
            let covered = overloads.iter().any(|o| o.past == union);
            if !covered {
                return Err(RegistrationError::AmbiguousOverloads {
                    name: process.name.clone(),
                    left: a.clone(),
                    right: b.clone(),
                    missing: union,
                });
            }
        }
    }
    Ok(())
}

fn is_subset(small: &[ComponentId], big: &[ComponentId]) -> bool {
    small.iter().all(|x| big.contains(x))
}

fn sorted_union(a: &[ComponentId], b: &[ComponentId]) -> Vec<ComponentId> {
    let mut v: Vec<ComponentId> = a.iter().chain(b.iter()).copied().collect();
    v.sort_unstable();
    v.dedup();
    v
}
