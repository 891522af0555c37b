//! Value types and wire formats of the Nexus register ledger.
//!
//! Everything in this crate is a pure value: encoding, decoding, checksums and classification.
//! Storage access and state transitions live in `nexus-execution`.
//!
//! ## Wire stability
//!
//! Address tags, register kinds, field types, opcodes and condition tokens are part of the
//! consensus format:
//! - Integers are big-endian.
//! - Variable-length payloads use a varint length prefix.
//! - Unknown tags fail to decode with [commonware_codec::Error::InvalidEnum].

pub mod address;
pub mod codec;
pub mod condition;
pub mod constants;
pub mod contract;
pub mod execution;
pub mod object;
pub mod register;

pub use address::{Address, AddressError};
pub use contract::{Contract, Operation, Primitive};
pub use execution::{Key, Transaction, Value, NAMESPACE};
pub use object::{FieldType, FieldValue, Object, ObjectError, Standard};
pub use register::{Kind, Register};
