//! Nested configuration tree and insertion helpers

use serde_json::{Map, Value};

/// Configuration data produced by a provider: string keys mapping to
/// scalars or further nested objects.
pub type ConfigTree = Map<String, Value>;

/// Insert `value` into `tree` at the given path, creating intermediate
/// objects as needed.
///
/// If an intermediate segment already holds a non-object value, it is
/// overwritten with a fresh object and the walk continues (structural
/// last-write-wins). The final segment is set directly, replacing anything
/// previously there. An empty path is a no-op.
pub fn insert(tree: &mut ConfigTree, path: &[String], value: Value) {
    let Some((last, intermediate)) = path.split_last() else {
        return;
    };

    let mut current = tree;
    for segment in intermediate {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else { return };
        current = next;
    }

    current.insert(last.clone(), value);
}
