//! the shared window registry and its change detector

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::model::geometry::Shape;

/// Identity of one window process, allocated from the shared counter.
/// Positive, and unique across open processes absent a concurrent-init race.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct WindowId(u32);

impl WindowId {
    pub fn new(id: u32) -> Self {
        WindowId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One window's entry in the registry. `meta` is opaque application payload
/// carried verbatim; the core never interprets it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WindowRecord {
    pub id: WindowId,
    pub shape: Shape,
    #[serde(default, rename = "metaData")]
    pub meta: Value,
}

/// Ordered sequence of window records, mirrored between the shared store and
/// each process's in-memory copy.
///
/// Order is insertion order as observed by each writer. It is NOT guaranteed
/// identical across processes when updates interleave; mirrors are replaced
/// wholesale on every change notification, with no merge.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Registry(Vec<WindowRecord>);

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the serialized registry, treating malformed input as empty.
    /// Shared state written by a peer is never a hard failure.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(records) => Registry(records),
            Err(err) => {
                warn!("malformed registry in shared store, treating as empty: {err}");
                Registry::default()
            }
        }
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|err| {
            warn!("failed to serialize registry: {err}");
            "[]".to_string()
        })
    }

    pub fn records(&self) -> &[WindowRecord] {
        &self.0
    }

    pub fn shapes(&self) -> Vec<Shape> {
        self.0.iter().map(|record| record.shape).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, record: WindowRecord) {
        self.0.push(record);
    }

    pub fn position_of(&self, id: WindowId) -> Option<usize> {
        self.0.iter().position(|record| record.id == id)
    }

    /// Overwrites the shape of `id`'s record. Returns false when the record
    /// is no longer present, e.g. after an external mutation removed it.
    pub fn set_shape(&mut self, id: WindowId, shape: Shape) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.0[index].shape = shape;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: WindowId) -> Option<WindowRecord> {
        let index = self.position_of(id)?;
        Some(self.0.remove(index))
    }
}

/// Decides whether the window set plausibly changed between two snapshots.
///
/// Positional id comparison, not a set diff: consumers only need "count or
/// membership plausibly changed", so a same-position id sequence with
/// different shapes or metadata reads as unchanged. Accepted simplification.
pub fn registry_changed(prev: &Registry, next: &Registry) -> bool {
    if prev.len() != next.len() {
        return true;
    }
    prev.0
        .iter()
        .zip(next.0.iter())
        .any(|(p, n)| p.id != n.id)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn record(id: u32, x: f64) -> WindowRecord {
        WindowRecord {
            id: WindowId::new(id),
            shape: Shape::new(x, 0.0, 100.0, 100.0),
            meta: json!({"foo": "bar"}),
        }
    }

    #[test]
    fn test_length_difference_is_a_change() {
        let mut prev = Registry::new();
        prev.push(record(1, 0.0));
        let mut next = prev.clone();
        next.push(record(2, 50.0));

        assert!(registry_changed(&prev, &next));
        assert!(registry_changed(&next, &prev));
    }

    #[test]
    fn test_same_positional_ids_is_no_change() {
        let mut prev = Registry::new();
        prev.push(record(1, 0.0));
        prev.push(record(2, 50.0));

        // Shapes moved but ids kept their positions.
        let mut next = Registry::new();
        next.push(record(1, 300.0));
        next.push(record(2, 400.0));

        assert!(!registry_changed(&prev, &next));
    }

    #[test]
    fn test_positional_id_difference_is_a_change() {
        let mut prev = Registry::new();
        prev.push(record(1, 0.0));
        prev.push(record(2, 50.0));

        let mut next = Registry::new();
        next.push(record(2, 50.0));
        next.push(record(1, 0.0));

        assert!(registry_changed(&prev, &next));
    }

    #[test]
    fn test_empty_registries_are_unchanged() {
        assert!(!registry_changed(&Registry::new(), &Registry::new()));
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut registry = Registry::new();
        registry.push(record(1, 10.0));
        registry.push(WindowRecord {
            id: WindowId::new(7),
            shape: Shape::new(5.5, -20.0, 640.0, 480.0),
            meta: json!({"nested": {"n": 3}, "tag": null}),
        });

        let raw = registry.serialize();
        assert_eq!(Registry::parse(&raw), registry);
    }

    #[test]
    fn test_wire_format_uses_meta_data_key() {
        let mut registry = Registry::new();
        registry.push(record(1, 0.0));
        let raw = registry.serialize();
        assert!(raw.contains("\"metaData\""), "unexpected wire form: {raw}");
    }

    #[test]
    fn test_parse_malformed_is_empty() {
        assert!(Registry::parse("not json").is_empty());
        assert!(Registry::parse("{\"id\":1}").is_empty());
        assert!(Registry::parse("").is_empty());
    }

    #[test]
    fn test_remove_and_position() {
        let mut registry = Registry::new();
        registry.push(record(1, 0.0));
        registry.push(record(2, 50.0));

        assert_eq!(registry.position_of(WindowId::new(2)), Some(1));
        let removed = registry.remove(WindowId::new(1)).expect("record exists");
        assert_eq!(removed.id, WindowId::new(1));
        assert_eq!(registry.position_of(WindowId::new(1)), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_shape_missing_record() {
        let mut registry = Registry::new();
        registry.push(record(1, 0.0));

        assert!(registry.set_shape(WindowId::new(1), Shape::new(9.0, 9.0, 9.0, 9.0)));
        assert!(!registry.set_shape(WindowId::new(99), Shape::default()));
    }
}
