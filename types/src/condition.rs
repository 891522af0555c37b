//! Condition program tokens.
//!
//! A condition program is a flat byte stream of tokens. Typed pushes are followed by their
//! value: integers fixed width big-endian, STRING and BYTES varint length-prefixed, BOOL one
//! byte. `CALLER_PRESTATE_VALUE` and `REGISTER_VALUE` are followed by a field name (varint
//! length-prefixed).
//!
//! `REGISTER_*` tokens are postfix: they replace the 256-bit address on the left with a part of
//! the register stored at it.

use crate::codec::write_string;
use commonware_codec::{varint::UInt, Write};

/// Byte that matches anything inside a CONTAINS needle.
pub const WILDCARD_BYTE: u8 = 0xff;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Token {
    Group = 0x01,
    Ungroup = 0x02,
    And = 0x03,
    Or = 0x04,

    Equals = 0x10,
    LessThan = 0x11,
    GreaterThan = 0x12,
    LessEquals = 0x13,
    GreaterEquals = 0x14,
    NotEquals = 0x15,
    Contains = 0x16,

    Add = 0x20,
    Sub = 0x21,
    Inc = 0x22,
    Dec = 0x23,
    Div = 0x24,
    Mul = 0x25,
    Mod = 0x26,
    Exp = 0x27,
    Subdata = 0x28,
    Cat = 0x29,

    Uint8 = 0x31,
    Uint16 = 0x32,
    Uint32 = 0x33,
    Uint64 = 0x34,
    Uint256 = 0x35,
    Uint512 = 0x36,
    Uint1024 = 0x37,
    String = 0x38,
    Bytes = 0x39,
    Bool = 0x3a,

    RegisterCreated = 0x40,
    RegisterModified = 0x41,
    RegisterOwner = 0x42,
    RegisterKind = 0x43,
    RegisterData = 0x44,
    RegisterValue = 0x45,

    CallerGenesis = 0x50,
    CallerTimestamp = 0x51,
    CallerOperations = 0x52,
    CallerPrestateCreated = 0x53,
    CallerPrestateModified = 0x54,
    CallerPrestateOwner = 0x55,
    CallerPrestateKind = 0x56,
    CallerPrestateData = 0x57,
    CallerPrestateValue = 0x58,

    ThisGenesis = 0x60,
    ThisTimestamp = 0x61,
    ThisOperations = 0x62,

    Sha256 = 0x70,
    Blake3 = 0x71,
    Sha512 = 0x72,
}

impl Token {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Token::*;
        Some(match byte {
            0x01 => Group,
            0x02 => Ungroup,
            0x03 => And,
            0x04 => Or,
            0x10 => Equals,
            0x11 => LessThan,
            0x12 => GreaterThan,
            0x13 => LessEquals,
            0x14 => GreaterEquals,
            0x15 => NotEquals,
            0x16 => Contains,
            0x20 => Add,
            0x21 => Sub,
            0x22 => Inc,
            0x23 => Dec,
            0x24 => Div,
            0x25 => Mul,
            0x26 => Mod,
            0x27 => Exp,
            0x28 => Subdata,
            0x29 => Cat,
            0x31 => Uint8,
            0x32 => Uint16,
            0x33 => Uint32,
            0x34 => Uint64,
            0x35 => Uint256,
            0x36 => Uint512,
            0x37 => Uint1024,
            0x38 => String,
            0x39 => Bytes,
            0x3a => Bool,
            0x40 => RegisterCreated,
            0x41 => RegisterModified,
            0x42 => RegisterOwner,
            0x43 => RegisterKind,
            0x44 => RegisterData,
            0x45 => RegisterValue,
            0x50 => CallerGenesis,
            0x51 => CallerTimestamp,
            0x52 => CallerOperations,
            0x53 => CallerPrestateCreated,
            0x54 => CallerPrestateModified,
            0x55 => CallerPrestateOwner,
            0x56 => CallerPrestateKind,
            0x57 => CallerPrestateData,
            0x58 => CallerPrestateValue,
            0x60 => ThisGenesis,
            0x61 => ThisTimestamp,
            0x62 => ThisOperations,
            0x70 => Sha256,
            0x71 => Blake3,
            0x72 => Sha512,
            _ => return None,
        })
    }

    pub const fn byte(self) -> u8 {
        self as u8
    }

    pub const fn is_comparator(self) -> bool {
        matches!(
            self,
            Self::Equals
                | Self::LessThan
                | Self::GreaterThan
                | Self::LessEquals
                | Self::GreaterEquals
                | Self::NotEquals
                | Self::Contains
        )
    }
}

/// Assembles a condition program.
///
/// ```
/// use nexus_types::condition::{Program, Token};
///
/// // CALLER_TIMESTAMP > 1000
/// let program = Program::new()
///     .token(Token::CallerTimestamp)
///     .token(Token::GreaterThan)
///     .uint64(1000)
///     .build();
/// assert_eq!(program[0], Token::CallerTimestamp.byte());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Program {
    bytes: Vec<u8>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(mut self, token: Token) -> Self {
        self.bytes.push(token.byte());
        self
    }

    pub fn uint8(mut self, value: u8) -> Self {
        self.bytes.push(Token::Uint8.byte());
        self.bytes.push(value);
        self
    }

    pub fn uint16(mut self, value: u16) -> Self {
        self.bytes.push(Token::Uint16.byte());
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn uint32(mut self, value: u32) -> Self {
        self.bytes.push(Token::Uint32.byte());
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn uint64(mut self, value: u64) -> Self {
        self.bytes.push(Token::Uint64.byte());
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Push a big-endian 256-bit value (an address, for instance).
    pub fn uint256(mut self, value: &[u8; 32]) -> Self {
        self.bytes.push(Token::Uint256.byte());
        self.bytes.extend_from_slice(value);
        self
    }

    pub fn string(mut self, value: &str) -> Self {
        self.bytes.push(Token::String.byte());
        write_string(value, &mut self.bytes);
        self
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.bytes.push(Token::Bytes.byte());
        UInt(value.len() as u32).write(&mut self.bytes);
        self.bytes.extend_from_slice(value);
        self
    }

    pub fn boolean(mut self, value: bool) -> Self {
        self.bytes.push(Token::Bool.byte());
        self.bytes.push(u8::from(value));
        self
    }

    /// `CALLER_PRESTATE_VALUE` of the named field.
    pub fn prestate_value(mut self, field: &str) -> Self {
        self.bytes.push(Token::CallerPrestateValue.byte());
        write_string(field, &mut self.bytes);
        self
    }

    /// `REGISTER_VALUE` of the named field, applied to the address pushed before it.
    pub fn register_value(mut self, field: &str) -> Self {
        self.bytes.push(Token::RegisterValue.byte());
        write_string(field, &mut self.bytes);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
