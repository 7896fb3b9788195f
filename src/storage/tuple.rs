//! Fixed-width tuple records and their slot codec.
//!
//! Every tuple occupies exactly [`TUPLE_SIZE`] bytes on a page:
//!
//! ```text
//! byte 0:  occupancy flag (1 = occupied, 0 = empty)
//! byte 1.. repeated { u8 key_len, key, u8 type_tag, u8 value_len, value }
//!          zero padded to TUPLE_SIZE; a zero key_len ends the record
//! ```
//!
//! Attributes are written whole or not at all. The first attribute that does not fit
//! in the remaining budget ends the encoding, so oversized records lose their trailing
//! attributes but never carry a partially written field.

use crate::storage::error::{StorageError, StorageResult};
use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

/// Size of one encoded tuple slot in bytes.
pub const TUPLE_SIZE: usize = 50;

const SLOT_EMPTY: u8 = 0;
const SLOT_OCCUPIED: u8 = 1;

// key_len + type_tag + value_len
const ATTRIBUTE_OVERHEAD: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    String,
    Int,
}

impl AttributeType {
    pub fn tag(self) -> u8 {
        match self {
            AttributeType::String => 1,
            AttributeType::Int => 2,
        }
    }

    /// Maps a declared column type (`"int"`, `"string"`, ...) to an attribute type.
    /// Anything that is not an integer type is stored as a string.
    pub fn from_declared(declared: &str) -> Self {
        match declared.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "bigint" | "smallint" => AttributeType::Int,
            _ => AttributeType::String,
        }
    }
}

impl TryFrom<u8> for AttributeType {
    type Error = StorageError;

    fn try_from(tag: u8) -> StorageResult<Self> {
        match tag {
            1 => Ok(AttributeType::String),
            2 => Ok(AttributeType::Int),
            other => Err(StorageError::MalformedTuple(format!(
                "unknown attribute type tag {}",
                other
            ))),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::String => write!(f, "STRING"),
            AttributeType::Int => write!(f, "INT"),
        }
    }
}

/// One `(key, type, value)` triple of a tuple. Values are kept in their textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub attr_type: AttributeType,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, attr_type: AttributeType, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attr_type,
            value: value.into(),
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, AttributeType::String, value)
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, AttributeType::Int, value.to_string())
    }

    fn encoded_len(&self) -> usize {
        ATTRIBUTE_OVERHEAD + self.key.len() + self.value.len()
    }
}

/// An ordered list of attributes. Keys are not required to be unique; lookups return
/// the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuple {
    attributes: Vec<Attribute>,
}

impl Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }

    /// Overwrites every assigned key that already exists, type included, and appends
    /// the ones that do not.
    pub fn update_attributes(&mut self, assignments: &[Attribute]) {
        for assignment in assignments {
            match self.attributes.iter_mut().find(|attr| attr.key == assignment.key) {
                Some(existing) => {
                    existing.attr_type = assignment.attr_type;
                    existing.value.clone_from(&assignment.value);
                }
                None => self.attributes.push(assignment.clone()),
            }
        }
    }

    /// Number of bytes the tuple would need without truncation, occupancy flag included.
    pub fn encoded_len(&self) -> usize {
        1 + self
            .attributes
            .iter()
            .filter(|attr| !attr.key.is_empty())
            .map(Attribute::encoded_len)
            .sum::<usize>()
    }

    pub fn fits(&self) -> bool {
        self.encoded_len() <= TUPLE_SIZE
    }

    pub fn encode(&self) -> [u8; TUPLE_SIZE] {
        let mut buf = BytesMut::with_capacity(TUPLE_SIZE);
        buf.put_u8(SLOT_OCCUPIED);

        for attr in &self.attributes {
            // A zero key length terminates the record on decode.
            if attr.key.is_empty() {
                continue;
            }
            if buf.len() + attr.encoded_len() > TUPLE_SIZE {
                break;
            }
            buf.put_u8(attr.key.len() as u8);
            buf.put_slice(attr.key.as_bytes());
            buf.put_u8(attr.attr_type.tag());
            buf.put_u8(attr.value.len() as u8);
            buf.put_slice(attr.value.as_bytes());
        }

        let mut slot = [0u8; TUPLE_SIZE];
        slot[..buf.len()].copy_from_slice(&buf);
        slot
    }

    /// Decodes one slot. Returns `None` for an empty slot.
    pub fn decode(slot: &[u8]) -> StorageResult<Option<Self>> {
        if slot.len() != TUPLE_SIZE {
            return Err(StorageError::MalformedTuple(format!(
                "slot must be {} bytes, got {}",
                TUPLE_SIZE,
                slot.len()
            )));
        }

        let mut buf = slot;
        match buf.get_u8() {
            SLOT_EMPTY => return Ok(None),
            SLOT_OCCUPIED => {}
            flag => {
                return Err(StorageError::MalformedTuple(format!(
                    "invalid occupancy flag {:#04x}",
                    flag
                )))
            }
        }

        let mut attributes = Vec::new();
        while buf.remaining() >= ATTRIBUTE_OVERHEAD {
            let key_len = buf.get_u8() as usize;
            if key_len == 0 || key_len > buf.remaining() {
                break;
            }
            let key = take_string(&mut buf, key_len)?;

            if buf.remaining() < 2 {
                break;
            }
            let tag = buf.get_u8();
            let value_len = buf.get_u8() as usize;
            if value_len > buf.remaining() {
                break;
            }
            let value = take_string(&mut buf, value_len)?;

            attributes.push(Attribute::new(key, AttributeType::try_from(tag)?, value));
        }

        Ok(Some(Self { attributes }))
    }
}

fn take_string(buf: &mut &[u8], len: usize) -> StorageResult<String> {
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| StorageError::MalformedTuple(format!("field is not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_occupied(slot: &[u8]) -> Tuple {
        Tuple::decode(slot).unwrap().unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let tuple = Tuple::from_attributes(vec![Attribute::string("ab", "xyz")]);
        let slot = tuple.encode();

        assert_eq!(slot[0], SLOT_OCCUPIED);
        assert_eq!(slot[1], 2);
        assert_eq!(&slot[2..4], b"ab");
        assert_eq!(slot[4], AttributeType::String.tag());
        assert_eq!(slot[5], 3);
        assert_eq!(&slot[6..9], b"xyz");
        assert!(slot[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_decode_preserves_types() {
        let tuple = Tuple::from_attributes(vec![
            Attribute::string("name", "Alice"),
            Attribute::int("age", 30),
        ]);

        let decoded = decode_occupied(&tuple.encode());
        assert_eq!(decoded, tuple);
        assert_eq!(decoded.attributes()[1].attr_type, AttributeType::Int);
    }

    #[test]
    fn test_padding_is_not_an_attribute() {
        let tuple = Tuple::from_attributes(vec![Attribute::string("k", "v")]);
        let decoded = decode_occupied(&tuple.encode());
        assert_eq!(decoded.attributes().len(), 1);
    }

    #[test]
    fn test_empty_slot() {
        let slot = [0u8; TUPLE_SIZE];
        assert!(Tuple::decode(&slot).unwrap().is_none());
    }

    #[test]
    fn test_oversized_attributes_are_omitted() {
        // 1 + (3 + 4 + 20) = 28 bytes used, the second attribute needs 3 + 5 + 20 = 28.
        let tuple = Tuple::from_attributes(vec![
            Attribute::string("name", "a".repeat(20)),
            Attribute::string("email", "b".repeat(20)),
            Attribute::string("x", "y"),
        ]);
        assert!(!tuple.fits());

        let decoded = decode_occupied(&tuple.encode());
        assert_eq!(decoded.attributes(), &tuple.attributes()[..1]);
    }

    #[test]
    fn test_exact_fit() {
        // 1 + 3 + 1 + 45 = 50
        let tuple = Tuple::from_attributes(vec![Attribute::string("k", "v".repeat(45))]);
        assert_eq!(tuple.encoded_len(), TUPLE_SIZE);
        assert!(tuple.fits());
        assert_eq!(decode_occupied(&tuple.encode()), tuple);
    }

    #[test]
    fn test_empty_keys_are_skipped() {
        let tuple = Tuple::from_attributes(vec![
            Attribute::string("", "ignored"),
            Attribute::string("k", "v"),
        ]);
        let decoded = decode_occupied(&tuple.encode());
        assert_eq!(decoded.get_attribute("k"), Some("v"));
        assert_eq!(decoded.attributes().len(), 1);
    }

    #[test]
    fn test_length_past_boundary_stops_decoding() {
        let mut slot = Tuple::from_attributes(vec![Attribute::string("k", "v")]).encode();
        // Second attribute claims a key longer than the rest of the slot.
        slot[6] = 200;
        let decoded = decode_occupied(&slot);
        assert_eq!(decoded.attributes().len(), 1);
    }

    #[test]
    fn test_malformed_slots() {
        let mut slot = [0u8; TUPLE_SIZE];
        slot[0] = 7;
        assert!(matches!(
            Tuple::decode(&slot),
            Err(StorageError::MalformedTuple(_))
        ));

        let mut slot = Tuple::from_attributes(vec![Attribute::string("k", "v")]).encode();
        slot[3] = 9;
        assert!(matches!(
            Tuple::decode(&slot),
            Err(StorageError::MalformedTuple(_))
        ));

        assert!(Tuple::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_update_attributes() {
        let mut tuple = Tuple::from_attributes(vec![
            Attribute::string("name", "Alice"),
            Attribute::string("zip", "01234"),
        ]);
        tuple.update_attributes(&[
            Attribute::string("name", "Bob"),
            Attribute::int("age", 5),
            Attribute::int("zip", 1234),
        ]);

        assert_eq!(tuple.get_attribute("name"), Some("Bob"));
        assert_eq!(tuple.get_attribute("missing"), None);

        let attrs = tuple.attributes();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[1], Attribute::int("zip", 1234));
        assert_eq!(attrs[2], Attribute::int("age", 5));
    }

    #[test]
    fn test_declared_types() {
        assert_eq!(AttributeType::from_declared("INT"), AttributeType::Int);
        assert_eq!(AttributeType::from_declared(" integer "), AttributeType::Int);
        assert_eq!(AttributeType::from_declared("string"), AttributeType::String);
        assert_eq!(AttributeType::from_declared("varchar"), AttributeType::String);
    }
}
