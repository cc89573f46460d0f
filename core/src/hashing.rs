//! Canonical JSON serialization and request hashing.
//!
//! Retried deliveries of the same idempotency key should carry the same
//! payload. The ledger stores a SHA-256 of the canonicalized request so
//! operators can spot semantic drift between retries; the hash is
//! informational and never gates execution.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialize a JSON value with recursively sorted object keys.
///
/// Array order is preserved (it is semantically meaningful); object key
/// order is not, so two spellings of the same object hash identically.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Object keys are plain strings; Value::String renders the
                // correct JSON escaping.
                write_canonical(&Value::String((*key).clone()), out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        },
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hex-encoded SHA-256 of the canonical serialization.
#[must_use]
pub fn request_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":3,"y":2},"b":1}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(request_hash(&a), request_hash(&b));
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(
            request_hash(&json!({"seats": [1, 2]})),
            request_hash(&json!({"seats": [2, 1]}))
        );
    }

    #[test]
    fn canonical_form_is_compact_and_sorted() {
        let v = json!({"z": 1, "a": [true, null, "s"]});
        assert_eq!(canonical_json(&v), r#"{"a":[true,null,"s"],"z":1}"#);
    }

    #[test]
    fn hash_is_stable() {
        // Pinned so a serializer change cannot silently invalidate stored
        // hashes.
        assert_eq!(
            request_hash(&json!({})),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }
}
