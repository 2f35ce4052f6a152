//! SHA-256 hashing and canonical serialization.
//!
//! Every digest in the chain is taken over the *canonical* JSON encoding of a
//! value: object keys sorted by name at every nesting level, no whitespace.
//! Two payloads with the same field values therefore hash identically no
//! matter how their fields were inserted.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// A named alias for a 32-byte(u8) array, used to represent a 256-bit hash.
pub type H256 = [u8; 32];

/// A SHA-256 digest. Serialized as a 64-character lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash(pub H256);

impl Hash {
    /// The zero hash (all zeros).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &H256 {
        &self.0
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Check whether the hex form of this digest starts with `prefix`.
    pub fn hex_starts_with(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(prefix)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<H256> for Hash {
    fn from(bytes: H256) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for H256 {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Hash arbitrary data using SHA-256.
pub fn sha256(data: &[u8]) -> Hash {
    Hash(Sha256::digest(data).into())
}

/// Encode a value as canonical JSON (keys sorted at every level).
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&sort_keys(value))
}

/// Digest of the canonical JSON encoding of `value`.
pub fn hash_canonical<T: Serialize + ?Sized>(value: &T) -> Hash {
    let encoded = canonical_bytes(value).expect("serialization should not fail");
    sha256(&encoded)
}

// Rebuilds objects in key order so the result does not depend on whether
// serde_json's map type preserves insertion order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256_known_vector() {
        let h = sha256(b"abc");
        assert_eq!(
            h.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_deterministic() {
        let data = b"hello world";
        assert_eq!(sha256(data), sha256(data));
    }

    #[test]
    fn test_hash_different_inputs() {
        assert_ne!(sha256(b"hello"), sha256(b"world"));
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = sha256(b"test data");
        let parsed = Hash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(Hash::from_hex("abcd").is_err());
        assert!(Hash::from_hex("zz").is_err());
    }

    #[test]
    fn test_hash_display() {
        let display = format!("{}", sha256(b"test"));
        assert_eq!(display.len(), 64);
        assert!(display.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_serializes_as_hex_string() {
        let h = sha256(b"x");
        let encoded = serde_json::to_value(h).unwrap();
        assert_eq!(encoded, json!(h.to_hex()));

        let decoded: Hash = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn test_zero_hash() {
        assert_eq!(Hash::ZERO.0, [0u8; 32]);
        assert_eq!(Hash::ZERO.to_hex(), "0".repeat(64));
    }

    #[derive(Serialize)]
    struct Reversed {
        zeta: u64,
        alpha: &'static str,
    }

    #[test]
    fn test_canonical_hash_ignores_field_order() {
        let from_struct = hash_canonical(&Reversed { zeta: 7, alpha: "a" });

        let mut forward = serde_json::Map::new();
        forward.insert("alpha".into(), json!("a"));
        forward.insert("zeta".into(), json!(7));

        let mut backward = serde_json::Map::new();
        backward.insert("zeta".into(), json!(7));
        backward.insert("alpha".into(), json!("a"));

        assert_eq!(from_struct, hash_canonical(&forward));
        assert_eq!(from_struct, hash_canonical(&backward));
    }

    #[test]
    fn test_canonical_bytes_sorted_and_compact() {
        let value = json!({"b": 1, "a": {"d": [1, 2], "c": null}});
        let bytes = canonical_bytes(&value).unwrap();
        assert_eq!(bytes, br#"{"a":{"c":null,"d":[1,2]},"b":1}"#.to_vec());
    }

    #[test]
    fn test_canonical_hash_stable() {
        let value = json!({"index": 1, "proof": 35293});
        assert_eq!(hash_canonical(&value), hash_canonical(&value));
    }
}
