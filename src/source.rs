//! Source contract (spec §6) and a minimal in-memory fixture.
//!
//! The actual source-format reader is explicitly out of scope (spec §1);
//! this module only carries the trait pair every real reader would
//! implement, plus [`MapSource`], a tiny recursive value used by this
//! crate's own tests and by `prototype::Prototype::from_source`.

/// A polymorphic value parsed from a prototype file. Readers for real
/// formats (YAML, RON, a custom binary format, ...) implement this trait;
/// the core never assumes a concrete format.
pub trait Source {
    /// True if this value represents "no value" (e.g. a YAML `null`).
    fn is_null(&self) -> bool;

    /// A human-readable description of the last parse error, if any.
    fn error_log(&self) -> String {
        String::new()
    }

    /// Read a scalar leaf value into `out`. Returns `false` on a type
    /// mismatch or unreadable value; never panics.
    fn read_to_f64(&self, out: &mut f64) -> bool;
    fn read_to_u32(&self, out: &mut u32) -> bool;
    fn read_to_bool(&self, out: &mut bool) -> bool;
    fn read_to_string(&self, out: &mut String) -> bool;

    /// Index into a sequence value by position, handing the element to
    /// `visit`. Returns `false` if this value isn't a sequence or the
    /// index is out of range.
    fn get_sequence_value(&self, index: usize, visit: &mut dyn FnMut(&dyn Source)) -> bool;

    /// Index into a mapping value by key, handing the value to `visit`.
    /// Returns `false` if this value isn't a mapping or has no such key.
    fn get_mapping_value(&self, key: &str, visit: &mut dyn FnMut(&dyn Source)) -> bool;

    /// Number of entries if this value is a sequence or mapping.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads a named source (e.g. a file on disk, a network blob) into a
/// `Source` tree. `log_errors` controls whether parse diagnostics are
/// surfaced through [`Source::error_log`].
pub trait SourceLoader {
    type Output: Source;

    fn load_source(&self, name: &str, log_errors: bool) -> Option<Self::Output>;
}

/// A tiny in-memory `Source`: either null, a scalar, a sequence, or a
/// mapping keyed by string. Exists purely as a test fixture — not a
/// production reader (see module docs).
#[derive(Debug, Clone, PartialEq)]
pub enum MapSource {
    Null,
    F64(f64),
    U32(u32),
    Bool(bool),
    String(String),
    Sequence(Vec<MapSource>),
    Mapping(Vec<(String, MapSource)>),
}

impl Source for MapSource {
    fn is_null(&self) -> bool {
        matches!(self, MapSource::Null)
    }

    fn read_to_f64(&self, out: &mut f64) -> bool {
        match self {
            MapSource::F64(v) => {
                *out = *v;
                true
            }
            MapSource::U32(v) => {
                *out = *v as f64;
                true
            }
            _ => false,
        }
    }

    fn read_to_u32(&self, out: &mut u32) -> bool {
        match self {
            MapSource::U32(v) => {
                *out = *v;
                true
            }
            _ => false,
        }
    }

    fn read_to_bool(&self, out: &mut bool) -> bool {
        match self {
            MapSource::Bool(v) => {
                *out = *v;
                true
            }
            _ => false,
        }
    }

    fn read_to_string(&self, out: &mut String) -> bool {
        match self {
            MapSource::String(v) => {
                out.clear();
                out.push_str(v);
                true
            }
            _ => false,
        }
    }

    fn get_sequence_value(&self, index: usize, visit: &mut dyn FnMut(&dyn Source)) -> bool {
        match self {
            MapSource::Sequence(items) => match items.get(index) {
                Some(item) => {
                    visit(item);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn get_mapping_value(&self, key: &str, visit: &mut dyn FnMut(&dyn Source)) -> bool {
        match self {
            MapSource::Mapping(entries) => {
                match entries.iter().find(|(k, _)| k == key) {
                    Some((_, v)) => {
                        visit(v);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    fn len(&self) -> usize {
        match self {
            MapSource::Sequence(items) => items.len(),
            MapSource::Mapping(entries) => entries.len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_lookup_round_trips() {
        let src = MapSource::Mapping(vec![
            ("x".into(), MapSource::F64(1.0)),
            ("y".into(), MapSource::F64(2.0)),
        ]);
        let mut got = 0.0;
        assert!(src.get_mapping_value("x", &mut |v| {
            v.read_to_f64(&mut got);
        }));
        assert_eq!(got, 1.0);
        assert!(!src.get_mapping_value("z", &mut |_| {}));
    }

    #[test]
    fn sequence_indexing() {
        let src = MapSource::Sequence(vec![MapSource::U32(7), MapSource::U32(9)]);
        let mut got = 0u32;
        assert!(src.get_sequence_value(1, &mut |v| {
            v.read_to_u32(&mut got);
        }));
        assert_eq!(got, 9);
        assert!(!src.get_sequence_value(2, &mut |_| {}));
    }
}
