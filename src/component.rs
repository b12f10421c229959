//! Component type registry (spec §4.1).
//!
//! Grounded on `ecs/component.rs`'s runtime `Registry { by_id, by_name,
//! next_id }`, generalized from a process-global `Lazy<RwLock<Registry>>`
//! singleton into an owned, per-engine-instance registry that is mutable
//! until `lock()` and immutable (and lock-free to query) afterwards — see
//! Design Notes "Global static tables... replace with owned arrays on the
//! engine instance."

use crate::error::RegistrationError;
use crate::source::Source;

/// Small integer id identifying a registered component type.
pub type ComponentId = u16;

/// The built-in `Life` component's fixed id.
pub const LIFE_ID: ComponentId = 0;

/// `0..BUILTIN_RANGE_END` is reserved for built-ins (just `Life` today).
pub const BUILTIN_RANGE_END: ComponentId = 1;
/// `BUILTIN_RANGE_END..DEFAULTS_RANGE_END` is reserved for framework
/// defaults shipped alongside the core.
pub const DEFAULTS_RANGE_END: ComponentId = 16;
/// Largest legal `max_per_entity` for any component type.
pub const COMPONENT_COUNT_MAX: u32 = u16::MAX as u32;

/// `Life{alive: bool}`, the one built-in component. Its presence in the
/// future generation keeps an entity alive across the swap; its absence
/// prunes the entity at the next frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Life {
    pub alive: bool,
}

impl Life {
    pub const SIZE: usize = std::mem::size_of::<Life>();

    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        [self.alive as u8]
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Life {
            alive: bytes[0] != 0,
        }
    }
}

/// A loader populates a raw byte buffer for one component instance from a
/// source fragment. Returns `false` (and leaves `out` untouched) on
/// failure; never panics on malformed input (spec §7: load failures never
/// throw into frame execution).
pub type ComponentLoader = fn(source: &dyn Source, out: &mut [u8]) -> bool;

fn default_loader(_source: &dyn Source, _out: &mut [u8]) -> bool {
    false
}

/// Per-type metadata, as registered by value (spec §4.1 / Design Notes
/// "replace with a builder API").
#[derive(Clone)]
pub struct ComponentTypeDesc {
    pub id: ComponentId,
    pub name: String,
    pub size: usize,
    pub max_per_entity: u32,
    pub min_prealloc: usize,
    pub min_prealloc_per_entity: f64,
    pub loader: ComponentLoader,
}

impl ComponentTypeDesc {
    pub fn new(id: ComponentId, size: usize) -> Self {
        Self {
            id,
            name: format!("component_{id}"),
            size,
            max_per_entity: 1,
            min_prealloc: 0,
            min_prealloc_per_entity: 0.0,
            loader: default_loader,
        }
    }

    /// Lower-case name used as the prototype mapping key (spec §6): the
    /// component-type name without the `Component` suffix.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn max_per_entity(mut self, n: u32) -> Self {
        self.max_per_entity = n;
        self
    }

    pub fn min_prealloc(mut self, n: usize) -> Self {
        self.min_prealloc = n;
        self
    }

    pub fn min_prealloc_per_entity(mut self, n: f64) -> Self {
        self.min_prealloc_per_entity = n;
        self
    }

    pub fn loader(mut self, loader: ComponentLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn is_multi(&self) -> bool {
        self.max_per_entity > 1
    }
}

fn life_desc() -> ComponentTypeDesc {
    ComponentTypeDesc::new(LIFE_ID, Life::SIZE)
        .max_per_entity(1)
        .name("life")
}

/// Component type registry. Mutable (via `try_register`) until
/// [`ComponentRegistry::lock`]; every other operation requires the lock
/// and is infallible and allocation-free thereafter.
pub struct ComponentRegistry {
    types: Vec<Option<ComponentTypeDesc>>,
    locked: bool,
}

impl ComponentRegistry {
    /// A fresh registry with only the built-in `Life` type registered.
    pub fn new() -> Self {
        let mut types = vec![None; DEFAULTS_RANGE_END as usize];
        types[LIFE_ID as usize] = Some(life_desc());
        Self {
            types,
            locked: false,
        }
    }

    /// Register a component type. Pre-lock only.
    pub fn try_register(&mut self, desc: ComponentTypeDesc) -> Result<(), RegistrationError> {
        if self.locked {
            return Err(RegistrationError::AlreadyLocked);
        }
        if desc.max_per_entity == 0 || desc.max_per_entity > COMPONENT_COUNT_MAX {
            return Err(RegistrationError::MaxPerEntityExceeded {
                id: desc.id,
                requested: desc.max_per_entity,
                max: COMPONENT_COUNT_MAX,
            });
        }
        // Id range validity: built-in range is reserved for Life only, and
        // any id is accepted into the defaults/user ranges as long as it
        // isn't 0 (Life) or already taken.
        if desc.id == LIFE_ID {
            return Err(RegistrationError::IdRangeViolation { id: desc.id });
        }
        if (desc.id as usize) >= self.types.len() {
            self.types.resize(desc.id as usize + 1, None);
        }
        if self.types[desc.id as usize].is_some() {
            return Err(RegistrationError::DuplicateComponentId { id: desc.id });
        }
        let id = desc.id as usize;
        self.types[id] = Some(desc);
        Ok(())
    }

    /// Convenience wrapper over [`try_register`](Self::try_register) for
    /// configuration-time call sites that treat a violation as a
    /// programmer error (spec §4.1 "Failure: ... fail fast").
    pub fn register(&mut self, desc: ComponentTypeDesc) {
        self.try_register(desc)
            .unwrap_or_else(|e| panic!("component registration failed: {e}"));
    }

    /// Make the registry immutable. Required before constructing an
    /// [`crate::engine::Engine`].
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Full metadata array indexed by id, sparse.
    pub fn types(&self) -> &[Option<ComponentTypeDesc>] {
        debug_assert!(self.locked, "types() is only meaningful post-lock");
        &self.types
    }

    pub fn get(&self, id: ComponentId) -> Option<&ComponentTypeDesc> {
        self.types.get(id as usize).and_then(|o| o.as_ref())
    }

    /// Lookup by the prototype-mapping name (spec §6).
    pub fn get_by_name(&self, name: &str) -> Option<&ComponentTypeDesc> {
        self.types.iter().flatten().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentTypeDesc> {
        self.types.iter().flatten()
    }

    pub fn capacity(&self) -> usize {
        self.types.len()
    }

    /// Sum of `size[t] * max_per_entity[t]` over every registered type.
    /// Valid only post-lock.
    pub fn max_entity_bytes(&self) -> usize {
        assert!(self.locked, "max_entity_bytes() is only valid post-lock");
        self.types
            .iter()
            .flatten()
            .map(|t| t.size * t.max_per_entity as usize)
            .sum()
    }

    /// Sum of `max_per_entity[t]` over every registered type. Valid only
    /// post-lock.
    pub fn max_entity_components(&self) -> usize {
        assert!(
            self.locked,
            "max_entity_components() is only valid post-lock"
        );
        self.types.iter().flatten().map(|t| t.max_per_entity as usize).sum()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn life_is_preregistered() {
        let reg = ComponentRegistry::new();
        assert!(reg.get(LIFE_ID).is_some());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut reg = ComponentRegistry::new();
        reg.register(ComponentTypeDesc::new(17, 12));
        let err = reg
            .try_register(ComponentTypeDesc::new(17, 4))
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateComponentId { id: 17 });
    }

    #[test]
    fn life_id_cannot_be_reregistered() {
        let mut reg = ComponentRegistry::new();
        let err = reg
            .try_register(ComponentTypeDesc::new(LIFE_ID, 4))
            .unwrap_err();
        assert_eq!(err, RegistrationError::IdRangeViolation { id: LIFE_ID });
    }

    #[test]
    fn register_after_lock_fails() {
        let mut reg = ComponentRegistry::new();
        reg.lock();
        let err = reg
            .try_register(ComponentTypeDesc::new(20, 4))
            .unwrap_err();
        assert_eq!(err, RegistrationError::AlreadyLocked);
    }

    #[test]
    fn max_per_entity_over_bound_rejected() {
        let mut reg = ComponentRegistry::new();
        let err = reg
            .try_register(ComponentTypeDesc::new(20, 4).max_per_entity(0))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::MaxPerEntityExceeded { .. }
        ));
    }

    #[test]
    fn sizing_helpers_sum_across_types() {
        let mut reg = ComponentRegistry::new();
        reg.register(ComponentTypeDesc::new(17, 12)); // P{x,y,z:f32}
        reg.register(ComponentTypeDesc::new(18, 4).max_per_entity(3));
        reg.lock();
        // Life (1 byte * 1) + P (12 * 1) + multi (4 * 3)
        assert_eq!(reg.max_entity_bytes(), 1 + 12 + 12);
        assert_eq!(reg.max_entity_components(), 1 + 1 + 3);
    }
}
