//! Error taxonomy.
//!
//! Programmer errors (registration-time misuse) fail fast and are never
//! surfaced to running frames; load failures park a resource in
//! `State::LoadFailed` instead of unwinding; capacity exhaustion returns a
//! sentinel (`Entity::NONE`, a `None` handle) rather than an error value.
//! This module only carries the two error enums that have a caller who
//! can usefully inspect them: registration and resource loading.

use crate::component::ComponentId;
use crate::process::ProcessHandle;
use thiserror::Error;

/// Raised by [`crate::component::ComponentRegistry::try_register`] and by
/// [`crate::process::ProcessRegistry::try_register`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("component id {id} is already registered")]
    DuplicateComponentId { id: ComponentId },

    #[error("component id {id} falls outside every reserved id range")]
    IdRangeViolation { id: ComponentId },

    #[error("component {id} requests max_per_entity={requested}, exceeding COMPONENT_COUNT_MAX={max}")]
    MaxPerEntityExceeded {
        id: ComponentId,
        requested: u32,
        max: u32,
    },

    #[error("the component registry is already locked")]
    AlreadyLocked,

    #[error("process '{name}' does not declare any overload")]
    EmptyProcess { name: String },

    #[error("a process named '{name}' is already registered")]
    DuplicateProcessName { name: String },

    #[error("process '{name}' overloads disagree on their future component type")]
    InconsistentFutureType { name: String },

    #[error(
        "component {component} already has a future writer registered by process '{existing}'"
    )]
    DuplicateFutureWriter {
        component: ComponentId,
        existing: String,
        requested: String,
        existing_handle: ProcessHandle,
    },

    #[error(
        "overloads {left:?} and {right:?} of process '{name}' are ambiguous: \
         register an overload covering the union {missing:?}"
    )]
    AmbiguousOverloads {
        name: String,
        left: Vec<ComponentId>,
        right: Vec<ComponentId>,
        missing: Vec<ComponentId>,
    },
}

/// Raised while loading a prototype resource; stored on the resource
/// record in `State::LoadFailed`, never propagated into frame dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("source for descriptor was null")]
    SourceNull,

    #[error("missing required property '{field}'")]
    MissingProperty { field: String },

    #[error("property '{field}': type mismatch, expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("component {component} has {count} instances, exceeding max_per_entity={max}")]
    PerEntityBoundExceeded {
        component: ComponentId,
        count: u32,
        max: u32,
    },

    #[error("multi-component {component} sequence was present but empty")]
    EmptyMultiSequence { component: ComponentId },
}
