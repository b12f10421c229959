//! Compile-time "policy" surface, modeled as a plain configuration value
//! (spec §6) rather than an enum-of-knobs struct resolved by
//! metaprogramming — see `DESIGN.md` / Design Notes.

/// Per-instance policy surface. One field per row of the spec §6 table.
///
/// `component_count_type` is not a runtime field: the crate fixes the
/// per-entity count width to [`crate::storage::Count`] (`u16`) at compile
/// time (see `DESIGN.md`). `component_count_bits` is kept so the full
/// enumerated policy surface round-trips through this struct, and
/// `EngineConfig::validate` checks any configured `max_per_entity` against
/// it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on user-space component ids.
    pub max_user_component_types: u32,
    /// Upper bound on registered processes.
    pub max_processes: u32,
    /// Capacity of the birth queue.
    pub max_new_entities_per_frame: usize,
    /// Absolute preallocation floor per column (components).
    pub min_component_prealloc: usize,
    /// Relative preallocation floor per column (components per entity).
    pub min_component_per_entity_prealloc: f64,
    /// Growth factor on emergency reallocation. Must be `> 1.0`.
    pub reallocation_multiplier: f64,
    /// Multiplier applied to the preallocation formula itself (spec
    /// §4.2's `alloc_mult`).
    pub alloc_mult: f64,
    /// Bit width backing per-entity component counts (policy-surface
    /// completeness only, see module docs; must be `<= 16`).
    pub component_count_bits: u32,
    /// Number of worker threads the frame engine schedules processes
    /// across (spec §5 thread assignment).
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_user_component_types: 4096,
            max_processes: 1024,
            max_new_entities_per_frame: 1024,
            min_component_prealloc: 0,
            min_component_per_entity_prealloc: 0.0,
            reallocation_multiplier: 2.0,
            alloc_mult: 1.0,
            component_count_bits: 16,
            worker_threads: 4,
        }
    }
}

impl EngineConfig {
    pub fn max_user_component_types(mut self, v: u32) -> Self {
        self.max_user_component_types = v;
        self
    }

    pub fn max_processes(mut self, v: u32) -> Self {
        self.max_processes = v;
        self
    }

    pub fn max_new_entities_per_frame(mut self, v: usize) -> Self {
        self.max_new_entities_per_frame = v;
        self
    }

    pub fn min_component_prealloc(mut self, v: usize) -> Self {
        self.min_component_prealloc = v;
        self
    }

    pub fn min_component_per_entity_prealloc(mut self, v: f64) -> Self {
        self.min_component_per_entity_prealloc = v;
        self
    }

    pub fn reallocation_multiplier(mut self, v: f64) -> Self {
        assert!(v > 1.0, "reallocation_multiplier must be > 1.0, got {v}");
        self.reallocation_multiplier = v;
        self
    }

    pub fn alloc_mult(mut self, v: f64) -> Self {
        self.alloc_mult = v;
        self
    }

    pub fn worker_threads(mut self, v: usize) -> Self {
        assert!(v >= 1, "worker_threads must be at least 1");
        self.worker_threads = v;
        self
    }

    /// `prealloc` term of spec §4.2, evaluated for a given type and the
    /// current entity count `entities`.
    pub(crate) fn prealloc_for(
        &self,
        type_min_prealloc: usize,
        type_min_prealloc_per_entity: f64,
        entities: usize,
    ) -> usize {
        let absolute = self.min_component_prealloc.max(type_min_prealloc);
        let relative = (self
            .min_component_per_entity_prealloc
            .max(type_min_prealloc_per_entity)
            * entities as f64)
            .ceil() as usize;
        ((self.alloc_mult * absolute.max(relative) as f64).ceil() as usize).max(absolute.max(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sane() {
        let cfg = EngineConfig::default();
        assert!(cfg.reallocation_multiplier > 1.0);
        assert!(cfg.worker_threads >= 1);
    }

    #[test]
    fn prealloc_formula_takes_the_larger_floor() {
        let cfg = EngineConfig::default()
            .min_component_prealloc(16)
            .min_component_per_entity_prealloc(2.0);
        // 10 entities * 2.0/entity = 20, which beats the absolute floor of 16.
        assert_eq!(cfg.prealloc_for(0, 0.0, 10), 20);
        // 2 entities * 2.0/entity = 4, beaten by the absolute floor of 16.
        assert_eq!(cfg.prealloc_for(0, 0.0, 2), 16);
    }
}
