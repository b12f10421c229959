//! Entity prototypes (spec §3 "Entity prototype", §6 "Source
//! abstraction").
//!
//! A prototype is a contiguous block of packed component payloads plus,
//! for each present component type, the offset and count of its slice —
//! "a contiguous block owned by the prototype consisting of packed
//! component payloads followed by a packed list of their type ids in the
//! same order." Once built it never changes; `admit_births` (spec §4.6
//! step 5) copies straight out of it into the past columns.
//!
//! A component type missing from the source mapping entirely is not an
//! error (spec §6: "missing properties fall back to component-type
//! defaults" — here, simply absent from the entity). A key present but
//! holding an explicit null is reported as `LoadError::MissingProperty`;
//! a key present with a non-null value the loader still rejects is
//! `LoadError::TypeMismatch`.

use crate::component::{ComponentId, ComponentRegistry, LIFE_ID};
use crate::error::LoadError;
use crate::source::Source;

/// One component type's slice within [`Prototype::data`].
#[derive(Debug, Clone, Copy)]
pub struct PrototypeEntry {
    pub component: ComponentId,
    pub offset: u32,
    pub count: u32,
}

/// An immutable, pre-baked component bundle used to spawn an entity.
#[derive(Debug)]
pub struct Prototype {
    data: Vec<u8>,
    entries: Vec<PrototypeEntry>,
}

impl Prototype {
    pub fn entries(&self) -> &[PrototypeEntry] {
        &self.entries
    }

    /// The packed bytes for one entry (`entry.count` components back to
    /// back, `size` bytes each per `registry`).
    pub fn bytes(&self, entry: &PrototypeEntry, registry: &ComponentRegistry) -> &[u8] {
        let size = registry
            .get(entry.component)
            .expect("prototype entry references a registered component")
            .size;
        let start = entry.offset as usize;
        &self.data[start..start + size * entry.count as usize]
    }

    /// Parse a prototype from a source mapping keyed by lower-case
    /// component-type name (spec §6). `Life` is never part of a
    /// prototype; the engine synthesizes it on birth.
    pub fn from_source(source: &dyn Source, registry: &ComponentRegistry) -> Result<Self, LoadError> {
        if source.is_null() {
            return Err(LoadError::SourceNull);
        }

        let mut data = Vec::new();
        let mut entries = Vec::new();

        for t in registry.iter() {
            if t.id == LIFE_ID {
                continue;
            }
            let offset_start = data.len() as u32;
            let mut result: Result<(), LoadError> = Ok(());

            let found = source.get_mapping_value(&t.name, &mut |component_src| {
                if t.is_multi() {
                    let mut count: u32 = 0;
                    loop {
                        let mut buf = vec![0u8; t.size];
                        let mut loaded_ok = false;
                        let mut elem_is_null = false;
                        let mut elem_err = String::new();
                        let has_next = component_src.get_sequence_value(count as usize, &mut |elem| {
                            elem_is_null = elem.is_null();
                            loaded_ok = (t.loader)(elem, &mut buf);
                            if !loaded_ok {
                                elem_err = elem.error_log();
                            }
                        });
                        if !has_next {
                            break;
                        }
                        if !loaded_ok {
                            result = Err(if elem_is_null {
                                LoadError::MissingProperty { field: t.name.clone() }
                            } else {
                                type_mismatch(&t.name, &elem_err)
                            });
                            return;
                        }
                        if count + 1 > t.max_per_entity {
                            result = Err(LoadError::PerEntityBoundExceeded {
                                component: t.id,
                                count: count + 1,
                                max: t.max_per_entity,
                            });
                            return;
                        }
                        data.extend_from_slice(&buf);
                        count += 1;
                    }
                    if count == 0 {
                        result = Err(LoadError::EmptyMultiSequence { component: t.id });
                        return;
                    }
                    entries.push(PrototypeEntry {
                        component: t.id,
                        offset: offset_start,
                        count,
                    });
                } else {
                    let mut buf = vec![0u8; t.size];
                    if !(t.loader)(component_src, &mut buf) {
                        result = Err(if component_src.is_null() {
                            LoadError::MissingProperty { field: t.name.clone() }
                        } else {
                            type_mismatch(&t.name, &component_src.error_log())
                        });
                        return;
                    }
                    data.extend_from_slice(&buf);
                    entries.push(PrototypeEntry {
                        component: t.id,
                        offset: offset_start,
                        count: 1,
                    });
                }
            });

            result?;
            if !found {
                // Component simply absent from this entity; not an error.
                continue;
            }
        }

        Ok(Prototype { data, entries })
    }
}

/// A present, non-null component value that the loader still rejected
/// (wrong shape, not just absent). `got` is whatever the source's own
/// `error_log` reports, or a generic description if it reported nothing.
fn type_mismatch(field: &str, source_error: &str) -> LoadError {
    LoadError::TypeMismatch {
        field: field.to_string(),
        expected: "a value the registered loader accepts".to_string(),
        got: if source_error.is_empty() {
            "an unparseable value".to_string()
        } else {
            source_error.to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentTypeDesc;
    use crate::source::MapSource;

    fn f32_loader(src: &dyn Source, out: &mut [u8]) -> bool {
        let mut v = 0.0;
        if !src.read_to_f64(&mut v) {
            return false;
        }
        out.copy_from_slice(&(v as f32).to_le_bytes());
        true
    }

    fn registry_with_position_and_tag() -> ComponentRegistry {
        let mut reg = ComponentRegistry::new();
        reg.register(
            ComponentTypeDesc::new(17, 4)
                .name("position")
                .loader(f32_loader),
        );
        reg.register(
            ComponentTypeDesc::new(18, 4)
                .name("tag")
                .max_per_entity(3)
                .loader(f32_loader),
        );
        reg.lock();
        reg
    }

    #[test]
    fn single_component_parses_to_one_entry() {
        let reg = registry_with_position_and_tag();
        let src = MapSource::Mapping(vec![("position".into(), MapSource::F64(3.0))]);
        let proto = Prototype::from_source(&src, &reg).unwrap();
        assert_eq!(proto.entries().len(), 1);
        assert_eq!(proto.entries()[0].component, 17);
        assert_eq!(proto.entries()[0].count, 1);
    }

    #[test]
    fn multi_component_sequence_parses_all_entries() {
        let reg = registry_with_position_and_tag();
        let src = MapSource::Mapping(vec![(
            "tag".into(),
            MapSource::Sequence(vec![MapSource::F64(1.0), MapSource::F64(2.0), MapSource::F64(3.0)]),
        )]);
        let proto = Prototype::from_source(&src, &reg).unwrap();
        assert_eq!(proto.entries()[0].count, 3);
        assert_eq!(proto.bytes(&proto.entries()[0], &reg).len(), 12);
    }

    #[test]
    fn multi_component_over_bound_fails() {
        let reg = registry_with_position_and_tag();
        let src = MapSource::Mapping(vec![(
            "tag".into(),
            MapSource::Sequence(vec![
                MapSource::F64(1.0),
                MapSource::F64(2.0),
                MapSource::F64(3.0),
                MapSource::F64(4.0),
            ]),
        )]);
        let err = Prototype::from_source(&src, &reg).unwrap_err();
        assert!(matches!(err, LoadError::PerEntityBoundExceeded { .. }));
    }

    #[test]
    fn explicit_null_value_is_missing_property() {
        let reg = registry_with_position_and_tag();
        let src = MapSource::Mapping(vec![("position".into(), MapSource::Null)]);
        let err = Prototype::from_source(&src, &reg).unwrap_err();
        assert_eq!(err, LoadError::MissingProperty { field: "position".into() });
    }

    #[test]
    fn wrong_type_value_is_type_mismatch() {
        let reg = registry_with_position_and_tag();
        let src = MapSource::Mapping(vec![("position".into(), MapSource::String("nope".into()))]);
        let err = Prototype::from_source(&src, &reg).unwrap_err();
        assert!(matches!(err, LoadError::TypeMismatch { field, .. } if field == "position"));
    }

    #[test]
    fn empty_multi_sequence_fails() {
        let reg = registry_with_position_and_tag();
        let src = MapSource::Mapping(vec![("tag".into(), MapSource::Sequence(vec![]))]);
        let err = Prototype::from_source(&src, &reg).unwrap_err();
        assert!(matches!(err, LoadError::EmptyMultiSequence { .. }));
    }

    #[test]
    fn absent_component_is_not_an_error() {
        let reg = registry_with_position_and_tag();
        let src = MapSource::Mapping(vec![]);
        let proto = Prototype::from_source(&src, &reg).unwrap();
        assert!(proto.entries().is_empty());
    }

    #[test]
    fn null_source_fails() {
        let reg = registry_with_position_and_tag();
        let err = Prototype::from_source(&MapSource::Null, &reg).unwrap_err();
        assert_eq!(err, LoadError::SourceNull);
    }
}
