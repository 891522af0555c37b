//! Typed field schema stored in OBJECT registers.
//!
//! An object payload is a flat sequence of fields:
//!
//! ```text
//! [name: varint len + utf8] [0xfe if mutable] [type: u8] [value]
//! ```
//!
//! Integers are fixed width big-endian. STRING and BYTES are varint length-prefixed and keep
//! the length they were created with for the lifetime of the register.

use crate::{
    address::{self, Address},
    codec::{read_string, string_encode_size, write_string},
    constants::{
        ACCOUNT_FEE, DATA_FEE, GLOBAL_NAMESPACE, GLOBAL_NAME_FEE, MAX_REGISTER_SIZE, MIN_DATA_FEE,
        NAMESPACE_FEE, NAME_FEE, TOKEN_FEE,
    },
};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, ReadExt, ReadRangeExt, Write};
use thiserror::Error;

/// Marks the following field as mutable.
pub const MUTABLE: u8 = 0xfe;

/// Longest field name accepted.
pub const MAX_FIELD_NAME: usize = 255;

/// Field names only the specialized opcodes may change.
pub const RESERVED_FIELDS: [&str; 8] = [
    "balance",
    "stake",
    "trust",
    "token",
    "identifier",
    "supply",
    "digits",
    "require",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("malformed object: {0}")]
    Decode(#[from] Error),
    #[error("register is not an object")]
    NotObject,
    #[error("empty field name")]
    EmptyName,
    #[error("duplicate field `{0}`")]
    Duplicate(String),
    #[error("field `{0}` not found")]
    Missing(String),
    #[error("field `{name}` is {actual:?} (expected {expected:?})")]
    TypeMismatch {
        name: String,
        expected: FieldType,
        actual: FieldType,
    },
    #[error("field `{0}` is immutable")]
    Immutable(String),
    #[error("field `{0}` is reserved")]
    Reserved(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    U8,
    U16,
    U32,
    U64,
    U256,
    U512,
    U1024,
    String,
    Bytes,
}

impl FieldType {
    pub const fn tag(self) -> u8 {
        match self {
            Self::U8 => 0x01,
            Self::U16 => 0x02,
            Self::U32 => 0x03,
            Self::U64 => 0x04,
            Self::U256 => 0x05,
            Self::U512 => 0x06,
            Self::U1024 => 0x07,
            Self::String => 0x08,
            Self::Bytes => 0x09,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => Self::U8,
            0x02 => Self::U16,
            0x03 => Self::U32,
            0x04 => Self::U64,
            0x05 => Self::U256,
            0x06 => Self::U512,
            0x07 => Self::U1024,
            0x08 => Self::String,
            0x09 => Self::Bytes,
            _ => return None,
        })
    }

    /// Byte width of integer types; `None` for STRING and BYTES.
    pub const fn width(self) -> Option<usize> {
        match self {
            Self::U8 => Some(1),
            Self::U16 => Some(2),
            Self::U32 => Some(4),
            Self::U64 => Some(8),
            Self::U256 => Some(32),
            Self::U512 => Some(64),
            Self::U1024 => Some(128),
            Self::String | Self::Bytes => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Big-endian 256-bit integer. Addresses and token identifiers are stored this way.
    U256([u8; 32]),
    U512([u8; 64]),
    U1024([u8; 128]),
    String(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::U8(_) => FieldType::U8,
            Self::U16(_) => FieldType::U16,
            Self::U32(_) => FieldType::U32,
            Self::U64(_) => FieldType::U64,
            Self::U256(_) => FieldType::U256,
            Self::U512(_) => FieldType::U512,
            Self::U1024(_) => FieldType::U1024,
            Self::String(_) => FieldType::String,
            Self::Bytes(_) => FieldType::Bytes,
        }
    }

    pub fn address(address: &Address) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(address.as_ref());
        Self::U256(bytes)
    }

    /// Big-endian value bytes (the content of STRING/BYTES).
    pub fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            Self::U8(v) => vec![*v],
            Self::U16(v) => v.to_be_bytes().to_vec(),
            Self::U32(v) => v.to_be_bytes().to_vec(),
            Self::U64(v) => v.to_be_bytes().to_vec(),
            Self::U256(v) => v.to_vec(),
            Self::U512(v) => v.to_vec(),
            Self::U1024(v) => v.to_vec(),
            Self::String(v) => v.as_bytes().to_vec(),
            Self::Bytes(v) => v.clone(),
        }
    }

    fn read_typed(reader: &mut impl Buf, ty: FieldType) -> Result<Self, Error> {
        Ok(match ty {
            FieldType::U8 => Self::U8(u8::read(reader)?),
            FieldType::U16 => Self::U16(u16::read(reader)?),
            FieldType::U32 => Self::U32(u32::read(reader)?),
            FieldType::U64 => Self::U64(u64::read(reader)?),
            FieldType::U256 => Self::U256(<[u8; 32]>::read(reader)?),
            FieldType::U512 => Self::U512(<[u8; 64]>::read(reader)?),
            FieldType::U1024 => Self::U1024(<[u8; 128]>::read(reader)?),
            FieldType::String => Self::String(read_string(reader, MAX_REGISTER_SIZE)?),
            FieldType::Bytes => Self::Bytes(Vec::<u8>::read_range(reader, 0..=MAX_REGISTER_SIZE)?),
        })
    }
}

impl Write for FieldValue {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::U8(v) => v.write(writer),
            Self::U16(v) => v.write(writer),
            Self::U32(v) => v.write(writer),
            Self::U64(v) => v.write(writer),
            Self::U256(v) => v.write(writer),
            Self::U512(v) => v.write(writer),
            Self::U1024(v) => v.write(writer),
            Self::String(v) => write_string(v, writer),
            Self::Bytes(v) => v.write(writer),
        }
    }
}

impl EncodeSize for FieldValue {
    fn encode_size(&self) -> usize {
        match self {
            Self::String(v) => string_encode_size(v),
            Self::Bytes(v) => v.encode_size(),
            other => other.field_type().width().unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub mutable: bool,
    pub value: FieldValue,
}

impl Field {
    fn read(reader: &mut impl Buf) -> Result<Self, Error> {
        let name = read_string(reader, MAX_FIELD_NAME)?;
        let mut tag = u8::read(reader)?;
        let mutable = tag == MUTABLE;
        if mutable {
            tag = u8::read(reader)?;
        }
        let ty = FieldType::from_tag(tag).ok_or(Error::InvalidEnum(tag))?;
        let value = FieldValue::read_typed(reader, ty)?;
        Ok(Self {
            name,
            mutable,
            value,
        })
    }
}

impl Write for Field {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.name, writer);
        if self.mutable {
            MUTABLE.write(writer);
        }
        self.value.field_type().tag().write(writer);
        self.value.write(writer);
    }
}

impl EncodeSize for Field {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.name)
            + usize::from(self.mutable)
            + 1
            + self.value.encode_size()
    }
}

/// Shape of an object, derived from which fields it carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Standard {
    Object,
    Account,
    Token,
    Trust,
    Name,
    Namespace,
}

impl Standard {
    /// Address tag an object of this standard must be created under.
    pub const fn tag(self) -> u8 {
        match self {
            Self::Object => address::OBJECT,
            Self::Account => address::ACCOUNT,
            Self::Token => address::TOKEN,
            Self::Trust => address::TRUST,
            Self::Name => address::NAME,
            Self::Namespace => address::NAMESPACE,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Object {
    fields: Vec<Field>,
}

impl Object {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Decode an object payload. Parsing is all-or-nothing.
    pub fn parse(mut data: &[u8]) -> Result<Self, ObjectError> {
        let mut fields: Vec<Field> = Vec::new();
        while data.has_remaining() {
            let field = Field::read(&mut data)?;
            if field.name.is_empty() {
                return Err(ObjectError::EmptyName);
            }
            if fields.iter().any(|f| f.name == field.name) {
                return Err(ObjectError::Duplicate(field.name));
            }
            fields.push(field);
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn get(&self, name: &str) -> Result<&FieldValue, ObjectError> {
        self.field(name)
            .map(|f| &f.value)
            .ok_or_else(|| ObjectError::Missing(name.to_string()))
    }

    pub fn get_u8(&self, name: &str) -> Result<u8, ObjectError> {
        match self.get(name)? {
            FieldValue::U8(v) => Ok(*v),
            other => Err(mismatch(name, FieldType::U8, other)),
        }
    }

    pub fn get_u64(&self, name: &str) -> Result<u64, ObjectError> {
        match self.get(name)? {
            FieldValue::U64(v) => Ok(*v),
            other => Err(mismatch(name, FieldType::U64, other)),
        }
    }

    /// Read a U256 field as an address (token identifiers, name targets).
    pub fn get_address(&self, name: &str) -> Result<Address, ObjectError> {
        match self.get(name)? {
            FieldValue::U256(v) => Ok(Address::from_bytes(*v)),
            other => Err(mismatch(name, FieldType::U256, other)),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<&str, ObjectError> {
        match self.get(name)? {
            FieldValue::String(v) => Ok(v),
            other => Err(mismatch(name, FieldType::String, other)),
        }
    }

    pub fn get_bytes(&self, name: &str) -> Result<&[u8], ObjectError> {
        match self.get(name)? {
            FieldValue::Bytes(v) => Ok(v),
            other => Err(mismatch(name, FieldType::Bytes, other)),
        }
    }

    /// True if `name` exists with the given type and mutability.
    pub fn check(&self, name: &str, ty: FieldType, mutable: bool) -> bool {
        self.field(name)
            .is_some_and(|f| f.value.field_type() == ty && f.mutable == mutable)
    }

    /// Generic field write: reserved names are refused.
    pub fn write_field(&mut self, name: &str, value: FieldValue) -> Result<(), ObjectError> {
        if is_reserved(name) {
            return Err(ObjectError::Reserved(name.to_string()));
        }
        self.set(name, value)
    }

    /// Field write used by the specialized opcodes. The field must exist, be mutable and keep
    /// its type. STRING and BYTES values are padded with zeros or truncated to the existing
    /// allocation.
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<(), ObjectError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| ObjectError::Missing(name.to_string()))?;
        if !field.mutable {
            return Err(ObjectError::Immutable(name.to_string()));
        }
        let expected = field.value.field_type();
        if value.field_type() != expected {
            return Err(ObjectError::TypeMismatch {
                name: name.to_string(),
                expected,
                actual: value.field_type(),
            });
        }

        field.value = match (&field.value, value) {
            (FieldValue::String(old), FieldValue::String(new)) => {
                let mut bytes = new.into_bytes();
                bytes.resize(old.len(), 0);
                // Truncation may split a code point.
                FieldValue::String(String::from_utf8(bytes).map_err(|_| {
                    ObjectError::Decode(Error::Invalid("Object", "truncated string is not UTF-8"))
                })?)
            }
            (FieldValue::Bytes(old), FieldValue::Bytes(mut new)) => {
                new.resize(old.len(), 0);
                FieldValue::Bytes(new)
            }
            (_, value) => value,
        };
        Ok(())
    }

    pub fn set_u64(&mut self, name: &str, value: u64) -> Result<(), ObjectError> {
        self.set(name, FieldValue::U64(value))
    }

    pub fn standard(&self) -> Standard {
        let has = |name: &str| self.contains(name);
        if has("balance") && has("token") {
            if has("supply") && has("digits") {
                return Standard::Token;
            }
            if has("trust") && has("stake") {
                return Standard::Trust;
            }
            return Standard::Account;
        }
        if has("namespace") && has("name") && has("address") {
            return Standard::Name;
        }
        if has("namespace") && self.fields.len() == 1 {
            return Standard::Namespace;
        }
        Standard::Object
    }

    /// Standard with TOKEN and TRUST folded into ACCOUNT.
    pub fn base(&self) -> Standard {
        match self.standard() {
            Standard::Token | Standard::Trust => Standard::Account,
            other => other,
        }
    }

    /// Fee for creating this object.
    pub fn cost(&self) -> u64 {
        match self.standard() {
            Standard::Account | Standard::Trust => ACCOUNT_FEE,
            Standard::Token => TOKEN_FEE,
            Standard::Name => {
                if self.get_string("namespace").ok() == Some(GLOBAL_NAMESPACE) {
                    GLOBAL_NAME_FEE
                } else {
                    NAME_FEE
                }
            }
            Standard::Namespace => NAMESPACE_FEE,
            Standard::Object => {
                let size = self.encode_size() as u64;
                size.saturating_mul(DATA_FEE).max(MIN_DATA_FEE)
            }
        }
    }
}

fn mismatch(name: &str, expected: FieldType, actual: &FieldValue) -> ObjectError {
    ObjectError::TypeMismatch {
        name: name.to_string(),
        expected,
        actual: actual.field_type(),
    }
}

impl Write for Object {
    fn write(&self, writer: &mut impl BufMut) {
        for field in &self.fields {
            field.write(writer);
        }
    }
}

impl EncodeSize for Object {
    fn encode_size(&self) -> usize {
        self.fields.iter().map(EncodeSize::encode_size).sum()
    }
}

/// Assembles an [Object] field by field.
#[derive(Clone, Debug, Default)]
pub struct Builder {
    fields: Vec<Field>,
}

impl Builder {
    pub fn field(mut self, name: impl Into<String>, value: FieldValue, mutable: bool) -> Self {
        self.fields.push(Field {
            name: name.into(),
            mutable,
            value,
        });
        self
    }

    pub fn build(self) -> Result<Object, ObjectError> {
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(ObjectError::EmptyName);
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ObjectError::Duplicate(field.name.clone()));
            }
        }
        Ok(Object {
            fields: self.fields,
        })
    }
}

/// Standard account holding `token` (the null address for the native token).
pub fn account(token: &Address) -> Result<Object, ObjectError> {
    Object::builder()
        .field("balance", FieldValue::U64(0), true)
        .field("token", FieldValue::address(token), false)
        .build()
}

/// Standard trust account for an identity.
pub fn trust() -> Result<Object, ObjectError> {
    Object::builder()
        .field("balance", FieldValue::U64(0), true)
        .field("trust", FieldValue::U64(0), true)
        .field("stake", FieldValue::U64(0), true)
        .field("token", FieldValue::address(&Address::NULL), false)
        .build()
}

/// Standard token whose whole supply starts in its own balance.
pub fn token(identifier: &Address, supply: u64, digits: u8) -> Result<Object, ObjectError> {
    Object::builder()
        .field("balance", FieldValue::U64(supply), true)
        .field("token", FieldValue::address(identifier), false)
        .field("supply", FieldValue::U64(supply), false)
        .field("digits", FieldValue::U8(digits), false)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::Encode;
    use proptest::prelude::*;

    fn sample() -> Object {
        Object::builder()
            .field("counter", FieldValue::U32(7), true)
            .field("label", FieldValue::String("hello".into()), true)
            .field("blob", FieldValue::Bytes(vec![1, 2, 3]), true)
            .field("wide", FieldValue::U512([9u8; 64]), false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_round_trip() {
        let object = sample();
        let encoded = object.encode();
        assert_eq!(encoded.len(), object.encode_size());
        assert_eq!(Object::parse(&encoded).unwrap(), object);
    }

    #[test]
    fn test_parse_rejects_duplicates() {
        let mut data = Vec::new();
        for _ in 0..2 {
            Field {
                name: "x".into(),
                mutable: false,
                value: FieldValue::U8(1),
            }
            .write(&mut data);
        }
        match Object::parse(&data) {
            Err(ObjectError::Duplicate(name)) => assert_eq!(name, "x"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_type_and_truncation() {
        let mut data = Vec::new();
        write_string("x", &mut data);
        data.push(0x42);
        assert!(matches!(
            Object::parse(&data),
            Err(ObjectError::Decode(Error::InvalidEnum(0x42)))
        ));

        let encoded = sample().encode();
        assert!(Object::parse(&encoded[..encoded.len() - 1]).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        let mut data = Vec::new();
        write_string("", &mut data);
        data.extend_from_slice(&[FieldType::U8.tag(), 0]);
        assert!(matches!(Object::parse(&data), Err(ObjectError::EmptyName)));
    }

    #[test]
    fn test_write_rules() {
        let mut object = sample();
        object.write_field("counter", FieldValue::U32(8)).unwrap();
        assert_eq!(object.get("counter").unwrap(), &FieldValue::U32(8));

        assert!(matches!(
            object.write_field("wide", FieldValue::U512([0u8; 64])),
            Err(ObjectError::Immutable(_))
        ));
        assert!(matches!(
            object.write_field("counter", FieldValue::U64(1)),
            Err(ObjectError::TypeMismatch { .. })
        ));
        assert!(matches!(
            object.write_field("missing", FieldValue::U8(1)),
            Err(ObjectError::Missing(_))
        ));

        let mut account = account(&Address::NULL).unwrap();
        assert!(matches!(
            account.write_field("balance", FieldValue::U64(5)),
            Err(ObjectError::Reserved(_))
        ));
        account.set_u64("balance", 5).unwrap();
        assert_eq!(account.get_u64("balance").unwrap(), 5);
    }

    #[test]
    fn test_variable_fields_keep_allocation() {
        let mut object = sample();
        object.write_field("label", FieldValue::String("hi".into())).unwrap();
        assert_eq!(object.get_string("label").unwrap(), "hi\0\0\0");
        object.write_field("blob", FieldValue::Bytes(vec![7, 7, 7, 7, 7])).unwrap();
        assert_eq!(object.get_bytes("blob").unwrap(), &[7, 7, 7]);
    }

    #[test]
    fn test_standards() {
        let token_id = Address::from_name("coin", address::TOKEN);
        assert_eq!(account(&Address::NULL).unwrap().standard(), Standard::Account);
        assert_eq!(trust().unwrap().standard(), Standard::Trust);
        assert_eq!(trust().unwrap().base(), Standard::Account);
        assert_eq!(token(&token_id, 100, 2).unwrap().standard(), Standard::Token);
        assert_eq!(token(&token_id, 100, 2).unwrap().base(), Standard::Account);
        assert_eq!(sample().standard(), Standard::Object);

        let namespace = Object::builder()
            .field("namespace", FieldValue::String("acme".into()), false)
            .build()
            .unwrap();
        assert_eq!(namespace.standard(), Standard::Namespace);

        let name = Object::builder()
            .field("namespace", FieldValue::String(GLOBAL_NAMESPACE.into()), false)
            .field("name", FieldValue::String("alice".into()), false)
            .field("address", FieldValue::address(&token_id), true)
            .build()
            .unwrap();
        assert_eq!(name.standard(), Standard::Name);
        assert_eq!(name.cost(), GLOBAL_NAME_FEE);
    }

    #[test]
    fn test_costs() {
        assert_eq!(account(&Address::NULL).unwrap().cost(), ACCOUNT_FEE);
        let token_id = Address::from_name("coin", address::TOKEN);
        assert_eq!(token(&token_id, 1, 0).unwrap().cost(), TOKEN_FEE);
        assert_eq!(sample().cost(), MIN_DATA_FEE);

        let large = Object::builder()
            .field("blob", FieldValue::Bytes(vec![0u8; 500]), false)
            .build()
            .unwrap();
        assert_eq!(large.cost(), large.encode_size() as u64 * DATA_FEE);
    }

    fn arb_value() -> impl Strategy<Value = FieldValue> {
        prop_oneof![
            any::<u8>().prop_map(FieldValue::U8),
            any::<u16>().prop_map(FieldValue::U16),
            any::<u32>().prop_map(FieldValue::U32),
            any::<u64>().prop_map(FieldValue::U64),
            any::<[u8; 32]>().prop_map(FieldValue::U256),
            proptest::collection::vec(any::<u8>(), 64)
                .prop_map(|v| FieldValue::U512(v.try_into().unwrap())),
            proptest::collection::vec(any::<u8>(), 128)
                .prop_map(|v| FieldValue::U1024(v.try_into().unwrap())),
            "[a-z]{0,24}".prop_map(FieldValue::String),
            proptest::collection::vec(any::<u8>(), 0..48).prop_map(FieldValue::Bytes),
        ]
    }

    proptest! {
        #[test]
        fn prop_object_round_trip(
            entries in proptest::collection::btree_map("[a-z]{1,12}", (arb_value(), any::<bool>()), 0..12)
        ) {
            let mut builder = Object::builder();
            for (name, (value, mutable)) in entries {
                builder = builder.field(name, value, mutable);
            }
            let object = builder.build().unwrap();
            let encoded = object.encode();
            prop_assert_eq!(Object::parse(&encoded).unwrap(), object);
        }
    }
}
