//! Canonical CBOR encoding for fragments.
//!
//! Implements RFC 8949 Core Deterministic Encoding for the subset we emit:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! Signatures cover the canonical signed bytes, so the same fragment must
//! encode identically on every platform.

use bytes::Bytes;
use ciborium::value::Value;

use crate::crypto::{Ed25519PublicKey, Ed25519Signature, PublisherDigest};
use crate::error::CoreError;
use crate::fragment::{ContentType, Fragment, KeyLocator, SignedInfo};
use crate::name::{ContentName, NameComponent};

/// Fragment field keys (integer keys for compact encoding).
mod keys {
    pub const NAME: u64 = 0;
    pub const PUBLISHER: u64 = 1;
    pub const TIMESTAMP: u64 = 2;
    pub const CONTENT_TYPE: u64 = 3;
    pub const FINAL_SEGMENT: u64 = 4;
    pub const KEY_LOCATOR: u64 = 5;
    pub const FRESHNESS: u64 = 6;
    pub const CONTENT: u64 = 7;
    pub const SIGNATURE: u64 = 8;
}

const LOCATOR_KEY: u64 = 0;
const LOCATOR_KEY_NAME: u64 = 1;

/// The bytes a fragment signature covers: every field except the signature.
pub fn signed_bytes(name: &ContentName, info: &SignedInfo, content: &[u8]) -> Vec<u8> {
    let entries = signed_entries(name, info, content);
    to_canonical(&Value::Map(entries))
}

/// Encode a whole fragment, signature included.
pub fn encode_fragment(fragment: &Fragment) -> Vec<u8> {
    let mut entries = signed_entries(&fragment.name, &fragment.signed_info, &fragment.content);
    entries.push((
        Value::Integer(keys::SIGNATURE.into()),
        Value::Bytes(fragment.signature.0.to_vec()),
    ));
    to_canonical(&Value::Map(entries))
}

/// Decode a fragment produced by [`encode_fragment`].
pub fn decode_fragment(bytes: &[u8]) -> Result<Fragment, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedFragment("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| as_u64(k) == Some(key))
            .map(|(_, v)| v)
    };

    let name = match get(keys::NAME) {
        Some(v) => value_to_name(v)?,
        None => return Err(CoreError::MalformedFragment("missing name".into())),
    };

    let publisher = match get(keys::PUBLISHER).and_then(as_array32) {
        Some(arr) => PublisherDigest(arr),
        None => return Err(CoreError::MalformedFragment("invalid publisher".into())),
    };

    let timestamp = match get(keys::TIMESTAMP) {
        Some(Value::Integer(i)) => i64::try_from(*i)
            .map_err(|_| CoreError::MalformedFragment("timestamp out of range".into()))?,
        _ => return Err(CoreError::MalformedFragment("missing timestamp".into())),
    };

    let content_type = get(keys::CONTENT_TYPE)
        .and_then(as_u64)
        .and_then(|n| u8::try_from(n).ok())
        .and_then(ContentType::from_u8)
        .ok_or_else(|| CoreError::MalformedFragment("invalid content type".into()))?;

    let final_segment = match get(keys::FINAL_SEGMENT) {
        Some(Value::Null) | None => None,
        Some(v) => Some(
            as_u64(v).ok_or_else(|| CoreError::MalformedFragment("invalid final segment".into()))?,
        ),
    };

    let key_locator = match get(keys::KEY_LOCATOR) {
        Some(v) => value_to_key_locator(v)?,
        None => return Err(CoreError::MalformedFragment("missing key locator".into())),
    };

    let freshness_seconds = match get(keys::FRESHNESS) {
        Some(Value::Null) | None => None,
        Some(v) => Some(
            as_u64(v)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| CoreError::MalformedFragment("invalid freshness".into()))?,
        ),
    };

    let content = match get(keys::CONTENT) {
        Some(Value::Bytes(b)) => Bytes::copy_from_slice(b),
        _ => return Err(CoreError::MalformedFragment("missing content".into())),
    };

    let signature = match get(keys::SIGNATURE) {
        Some(Value::Bytes(b)) => {
            let arr: [u8; 64] = b
                .as_slice()
                .try_into()
                .map_err(|_| CoreError::MalformedFragment("invalid signature length".into()))?;
            Ed25519Signature(arr)
        }
        _ => return Err(CoreError::MalformedFragment("missing signature".into())),
    };

    Ok(Fragment {
        name,
        signed_info: SignedInfo {
            publisher,
            timestamp,
            content_type,
            final_segment,
            key_locator,
            freshness_seconds,
        },
        content,
        signature,
    })
}

fn signed_entries(name: &ContentName, info: &SignedInfo, content: &[u8]) -> Vec<(Value, Value)> {
    let optional = |v: Option<u64>| v.map_or(Value::Null, |n| Value::Integer(n.into()));

    vec![
        (Value::Integer(keys::NAME.into()), name_to_value(name)),
        (
            Value::Integer(keys::PUBLISHER.into()),
            Value::Bytes(info.publisher.0.to_vec()),
        ),
        (
            Value::Integer(keys::TIMESTAMP.into()),
            Value::Integer(info.timestamp.into()),
        ),
        (
            Value::Integer(keys::CONTENT_TYPE.into()),
            Value::Integer(info.content_type.to_u8().into()),
        ),
        (
            Value::Integer(keys::FINAL_SEGMENT.into()),
            optional(info.final_segment),
        ),
        (
            Value::Integer(keys::KEY_LOCATOR.into()),
            key_locator_to_value(&info.key_locator),
        ),
        (
            Value::Integer(keys::FRESHNESS.into()),
            optional(info.freshness_seconds.map(u64::from)),
        ),
        (Value::Integer(keys::CONTENT.into()), Value::Bytes(content.to_vec())),
    ]
}

fn name_to_value(name: &ContentName) -> Value {
    Value::Array(
        name.components()
            .iter()
            .map(|c| Value::Bytes(c.as_bytes().to_vec()))
            .collect(),
    )
}

fn value_to_name(value: &Value) -> Result<ContentName, CoreError> {
    let items = match value {
        Value::Array(items) => items,
        _ => return Err(CoreError::MalformedFragment("name must be an array".into())),
    };
    items
        .iter()
        .map(|item| match item {
            Value::Bytes(b) => Ok(NameComponent::from(b.clone())),
            _ => Err(CoreError::MalformedFragment("name component must be bytes".into())),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ContentName::from_components)
}

fn key_locator_to_value(locator: &KeyLocator) -> Value {
    match locator {
        KeyLocator::Key(key) => Value::Array(vec![
            Value::Integer(LOCATOR_KEY.into()),
            Value::Bytes(key.0.to_vec()),
        ]),
        KeyLocator::KeyName { name, publisher } => Value::Array(vec![
            Value::Integer(LOCATOR_KEY_NAME.into()),
            name_to_value(name),
            publisher.map_or(Value::Null, |p| Value::Bytes(p.0.to_vec())),
        ]),
    }
}

fn value_to_key_locator(value: &Value) -> Result<KeyLocator, CoreError> {
    let malformed = || CoreError::MalformedFragment("invalid key locator".into());
    let items = match value {
        Value::Array(items) => items,
        _ => return Err(malformed()),
    };
    match items.first().and_then(as_u64) {
        Some(LOCATOR_KEY) => {
            let key = items.get(1).and_then(as_array32).ok_or_else(malformed)?;
            Ok(KeyLocator::Key(Ed25519PublicKey(key)))
        }
        Some(LOCATOR_KEY_NAME) => {
            let name = value_to_name(items.get(1).ok_or_else(malformed)?)?;
            let publisher = match items.get(2) {
                Some(Value::Null) | None => None,
                Some(v) => Some(PublisherDigest(as_array32(v).ok_or_else(malformed)?)),
            };
            Ok(KeyLocator::KeyName { name, publisher })
        }
        _ => Err(malformed()),
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).ok(),
        _ => None,
    }
}

fn as_array32(value: &Value) -> Option<[u8; 32]> {
    match value {
        Value::Bytes(b) => b.as_slice().try_into().ok(),
        _ => None,
    }
}

const UNSIGNED: u8 = 0;
const NEGATIVE: u8 = 1;
const BYTES: u8 = 2;
const TEXT: u8 = 3;
const ARRAY: u8 = 4;
const MAP: u8 = 5;

fn to_canonical(value: &Value) -> Vec<u8> {
    let mut out = Canonical::default();
    out.value(value);
    out.0
}

/// Deterministic CBOR writer.
#[derive(Default)]
struct Canonical(Vec<u8>);

impl Canonical {
    /// Initial byte for `major` with `arg` in its shortest form.
    fn head(&mut self, major: u8, arg: u64) {
        let major = major << 5;
        match arg {
            0..=23 => self.0.push(major | arg as u8),
            24..=0xff => self.0.extend_from_slice(&[major | 24, arg as u8]),
            0x100..=0xffff => {
                self.0.push(major | 25);
                self.0.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.0.push(major | 26);
                self.0.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.0.push(major | 27);
                self.0.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }

    fn value(&mut self, value: &Value) {
        match value {
            Value::Integer(i) => {
                let n = i128::from(*i);
                if n < 0 {
                    self.head(NEGATIVE, (-1 - n) as u64);
                } else {
                    self.head(UNSIGNED, n as u64);
                }
            }
            Value::Bytes(bytes) => {
                self.head(BYTES, bytes.len() as u64);
                self.0.extend_from_slice(bytes);
            }
            Value::Text(text) => {
                self.head(TEXT, text.len() as u64);
                self.0.extend_from_slice(text.as_bytes());
            }
            Value::Array(items) => {
                self.head(ARRAY, items.len() as u64);
                items.iter().for_each(|item| self.value(item));
            }
            Value::Map(entries) => self.map(entries),
            Value::Bool(b) => self.0.push(if *b { 0xf5 } else { 0xf4 }),
            // Fragments carry no floats or tags.
            _ => self.0.push(0xf6),
        }
    }

    /// Entries go out ordered by their encoded keys.
    fn map(&mut self, entries: &[(Value, Value)]) {
        let mut sorted: Vec<(Vec<u8>, &Value)> =
            entries.iter().map(|(k, v)| (to_canonical(k), v)).collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        self.head(MAP, sorted.len() as u64);
        for (key, value) in sorted {
            self.0.extend_from_slice(&key);
            self.value(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::fragment::FragmentBuilder;

    fn sample(keypair: &Keypair) -> Fragment {
        FragmentBuilder::new(ContentName::parse("/parc/doc/%FD%01%02/%00").unwrap())
            .timestamp(1736870400000)
            .final_segment(3)
            .freshness_seconds(Some(30))
            .content(b"hello".to_vec())
            .sign(keypair)
    }

    #[test]
    fn test_signed_bytes_deterministic() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let fragment = sample(&keypair);
        assert_eq!(fragment.signed_bytes(), fragment.signed_bytes());
        assert_eq!(encode_fragment(&fragment), encode_fragment(&fragment));
    }

    #[test]
    fn test_shortest_heads() {
        let head = |arg: u64| {
            let mut out = Canonical::default();
            out.head(UNSIGNED, arg);
            out.0
        };
        assert_eq!(head(23), vec![0x17]);
        assert_eq!(head(24), vec![0x18, 24]);
        assert_eq!(head(256), vec![0x19, 0x01, 0x00]);
        assert_eq!(head(1 << 32), vec![0x1b, 0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(to_canonical(&Value::Integer((-1i64).into())), vec![0x20]);
    }

    #[test]
    fn test_fragment_roundtrip_with_key_name_locator() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let fragment = FragmentBuilder::new(ContentName::parse("/a/%FD%05/%00").unwrap())
            .timestamp(5)
            .content_type(ContentType::Gone)
            .final_segment(0)
            .key_locator(KeyLocator::KeyName {
                name: ContentName::parse("/keys/alice").unwrap(),
                publisher: Some(keypair.publisher()),
            })
            .sign(&keypair);

        let decoded = decode_fragment(&encode_fragment(&fragment)).unwrap();
        assert_eq!(decoded, fragment);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_fragment(&[0x01, 0x02]).is_err());

        let buf = to_canonical(&Value::Map(vec![(Value::Integer(0.into()), Value::Null)]));
        assert!(matches!(
            decode_fragment(&buf),
            Err(CoreError::MalformedFragment(_))
        ));
    }

    #[test]
    fn test_map_keys_sorted_by_encoding() {
        let buf = to_canonical(&Value::Map(vec![
            (Value::Integer(8.into()), Value::Integer(80.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
        ]));
        assert_eq!(buf, vec![0xa2, 0x00, 0x00, 0x08, 0x18, 80]);
    }
}
