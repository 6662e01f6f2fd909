//! Structural diff between two JSON documents.

use serde_json::Value;

use super::{escape_pointer_segment, Operation};

/// Operations that turn `from` into `to`.
///
/// Objects and arrays of the same kind recurse; anything else that differs
/// is replaced. Keys are visited last-to-first so array removals run from
/// the end and leave earlier indexes valid. Additions follow removals.
pub fn compare(from: &Value, to: &Value) -> Vec<Operation> {
    let mut operations = Vec::new();
    diff(from, to, "", &mut operations);
    operations
}

fn diff(from: &Value, to: &Value, path: &str, out: &mut Vec<Operation>) {
    match (from, to) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old.iter().rev() {
                let child = format!("{path}/{}", escape_pointer_segment(key));
                match new.get(key) {
                    Some(new_value) => diff(old_value, new_value, &child, out),
                    None => out.push(Operation::remove(child)),
                }
            }
            for (key, new_value) in new {
                if !old.contains_key(key) {
                    let child = format!("{path}/{}", escape_pointer_segment(key));
                    out.push(Operation::add(child, new_value.clone()));
                }
            }
        }
        (Value::Array(old), Value::Array(new)) => {
            for (i, old_value) in old.iter().enumerate().rev() {
                let child = format!("{path}/{i}");
                match new.get(i) {
                    Some(new_value) => diff(old_value, new_value, &child, out),
                    None => out.push(Operation::remove(child)),
                }
            }
            for (i, new_value) in new.iter().enumerate().skip(old.len()) {
                out.push(Operation::add(format!("{path}/{i}"), new_value.clone()));
            }
        }
        (old, new) if old != new => out.push(Operation::replace(path, new.clone())),
        _ => {}
    }
}
