//! The opaque metadata bag carried by customers and carts.
//!
//! Upstream payloads are stored, never interpreted, so they live in a plain
//! JSON object rather than a typed struct.

use serde_json::{Map, Value};

/// Free-form JSON object stored alongside a record.
pub type Metadata = Map<String, Value>;

/// Merge `patch` into `target` key by key.
///
/// Top-level keys in `patch` overwrite those in `target`; keys absent from
/// `patch` are kept. A `null` in `patch` never erases a populated key.
pub fn merge(target: &mut Metadata, patch: Metadata) {
  for (key, value) in patch {
    if value.is_null() && target.contains_key(&key) {
      continue;
    }
    target.insert(key, value);
  }
}

/// Build a [`Metadata`] from a JSON value, wrapping non-objects under
/// `"value"`.
pub fn from_value(value: Value) -> Metadata {
  match value {
    Value::Object(map) => map,
    Value::Null => Metadata::new(),
    other => {
      let mut map = Metadata::new();
      map.insert("value".to_owned(), other);
      map
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn merge_overwrites_and_keeps() {
    let mut target = from_value(json!({ "source": "cart", "recovery": { "order_id": "1" } }));
    merge(&mut target, from_value(json!({ "source": "order", "payload": { "id": 7 } })));

    assert_eq!(target["source"], "order");
    assert_eq!(target["recovery"]["order_id"], "1");
    assert_eq!(target["payload"]["id"], 7);
  }

  #[test]
  fn merge_null_does_not_erase() {
    let mut target = from_value(json!({ "webhook_id": "abc" }));
    merge(&mut target, from_value(json!({ "webhook_id": null, "other": null })));

    assert_eq!(target["webhook_id"], "abc");
    assert!(target["other"].is_null());
  }

  #[test]
  fn non_object_is_wrapped() {
    let map = from_value(json!([1, 2]));
    assert_eq!(map["value"], json!([1, 2]));
    assert!(from_value(Value::Null).is_empty());
  }
}
