//! Register addresses.
//!
//! An [Address] is a 256-bit identifier whose most significant byte is a type tag. The tag
//! is fixed at creation: every constructor writes it and nothing ever rewrites it.

use bytes::{Buf, BufMut};
use commonware_codec::{Error, FixedSize, Read, ReadExt, Write};
use commonware_cryptography::{sha256::Sha256, Hasher};
use rand::RngCore;
use std::fmt;
use thiserror::Error;

/// Genesis (signature chain) identities on mainnet.
pub const RESERVED: u8 = 0xa1;
/// Genesis (signature chain) identities on testnet.
pub const RESERVED2: u8 = 0xa2;

pub const READONLY: u8 = 0xd0;
pub const APPEND: u8 = 0xd1;
pub const RAW: u8 = 0xd2;
pub const OBJECT: u8 = 0xd3;
pub const ACCOUNT: u8 = 0xd4;
pub const TOKEN: u8 = 0xd5;
pub const TRUST: u8 = 0xd6;
pub const NAME: u8 = 0xd7;
pub const NAMESPACE: u8 = 0xd8;

pub const WILDCARD: u8 = 0xff;

/// Length of the checksum appended to the base58 form.
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58: {0}")]
    Base58(String),
    #[error("address must be {expected} bytes (got {got})")]
    Length { expected: usize, got: usize },
    #[error("address checksum mismatch")]
    Checksum,
    #[error("unknown address type 0x{0:02x}")]
    Type(u8),
}

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 32]);

impl Address {
    pub const NULL: Self = Self([0u8; 32]);
    pub const WILDCARD: Self = Self([WILDCARD; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Random address with the given tag.
    pub fn from_type<R: RngCore>(rng: &mut R, tag: u8) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        bytes[0] = tag;
        Self(bytes)
    }

    /// Deterministic address of a well-known name.
    pub fn from_name(name: &str, tag: u8) -> Self {
        Self::tagged(Sha256::hash(name.as_bytes()).as_ref(), tag)
    }

    /// Deterministic address of a name scoped to a namespace (or owner).
    pub fn from_namespace(name: &str, namespace: &Address, tag: u8) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(namespace.as_ref());
        Self::tagged(hasher.finalize().as_ref(), tag)
    }

    /// Signature chain identity for a public key.
    pub fn genesis(public: &[u8], tag: u8) -> Self {
        Self::tagged(Sha256::hash(public).as_ref(), tag)
    }

    /// The trust account of a genesis identity.
    pub fn trust(genesis: &Address) -> Self {
        Self::from_namespace("trust", genesis, TRUST)
    }

    /// Parse the base58 form produced by [Address::to_base58].
    pub fn from_string(value: &str) -> Result<Self, AddressError> {
        let raw = bs58::decode(value)
            .into_vec()
            .map_err(|err| AddressError::Base58(err.to_string()))?;
        if raw.len() != Self::SIZE + CHECKSUM_LEN {
            return Err(AddressError::Length {
                expected: Self::SIZE + CHECKSUM_LEN,
                got: raw.len(),
            });
        }
        let (body, checksum) = raw.split_at(Self::SIZE);
        if checksum != Self::checksum(body) {
            return Err(AddressError::Checksum);
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(body);
        let address = Self(bytes);
        if !address.is_valid() && !address.is_genesis() && !address.is_wildcard() {
            return Err(AddressError::Type(address.tag()));
        }
        Ok(address)
    }

    pub fn to_base58(&self) -> String {
        let mut raw = Vec::with_capacity(Self::SIZE + CHECKSUM_LEN);
        raw.extend_from_slice(&self.0);
        raw.extend_from_slice(&Self::checksum(&self.0));
        bs58::encode(raw).into_string()
    }

    pub fn tag(&self) -> u8 {
        self.0[0]
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Tag is one of the register types (READONLY..=NAMESPACE).
    pub fn is_valid(&self) -> bool {
        (READONLY..=NAMESPACE).contains(&self.tag())
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.tag(), RESERVED | RESERVED2)
    }

    /// System and identity addresses: never a CREATE/GENESIS/TRANSFER/DEBIT target.
    pub fn is_reserved(&self) -> bool {
        self.is_null() || self.is_genesis()
    }

    pub fn is_wildcard(&self) -> bool {
        *self == Self::WILDCARD
    }

    pub fn is_readonly(&self) -> bool {
        self.tag() == READONLY
    }

    pub fn is_append(&self) -> bool {
        self.tag() == APPEND
    }

    pub fn is_raw(&self) -> bool {
        self.tag() == RAW
    }

    pub fn is_object(&self) -> bool {
        self.tag() == OBJECT
    }

    pub fn is_account(&self) -> bool {
        self.tag() == ACCOUNT
    }

    pub fn is_token(&self) -> bool {
        self.tag() == TOKEN
    }

    pub fn is_trust(&self) -> bool {
        self.tag() == TRUST
    }

    pub fn is_name(&self) -> bool {
        self.tag() == NAME
    }

    pub fn is_namespace(&self) -> bool {
        self.tag() == NAMESPACE
    }

    fn tagged(digest: &[u8], tag: u8) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest[..32]);
        bytes[0] = tag;
        Self(bytes)
    }

    fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
        let first = Sha256::hash(body);
        let second = Sha256::hash(first.as_ref());
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&second.as_ref()[..CHECKSUM_LEN]);
        out
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", commonware_utils::hex(&self.0))
    }
}

impl Write for Address {
    fn write(&self, writer: &mut impl BufMut) {
        writer.put_slice(&self.0);
    }
}

impl Read for Address {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self(<[u8; 32]>::read(reader)?))
    }
}

impl FixedSize for Address {
    const SIZE: usize = 32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_tag_survives_construction() {
        let mut rng = StdRng::seed_from_u64(7);
        for tag in [READONLY, APPEND, RAW, OBJECT, ACCOUNT, TOKEN, TRUST, NAME, NAMESPACE] {
            let address = Address::from_type(&mut rng, tag);
            assert_eq!(address.tag(), tag);
            assert!(address.is_valid());
            assert!(!address.is_reserved());
        }
        assert!(Address::from_name("alice", NAME).is_name());
        assert!(Address::genesis(b"key", RESERVED).is_reserved());
        assert!(Address::NULL.is_reserved());
    }

    #[test]
    fn test_names_are_deterministic() {
        let owner = Address::genesis(b"owner", RESERVED);
        assert_eq!(
            Address::from_namespace("savings", &owner, ACCOUNT),
            Address::from_namespace("savings", &owner, ACCOUNT)
        );
        assert_ne!(
            Address::from_namespace("savings", &owner, ACCOUNT),
            Address::from_namespace("checking", &owner, ACCOUNT)
        );
        assert_eq!(Address::trust(&owner).tag(), TRUST);
    }

    #[test]
    fn test_base58_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        let address = Address::from_type(&mut rng, ACCOUNT);
        let encoded = address.to_base58();
        assert_eq!(Address::from_string(&encoded), Ok(address));
    }

    #[test]
    fn test_base58_rejects_corruption() {
        let mut rng = StdRng::seed_from_u64(12);
        let address = Address::from_type(&mut rng, TOKEN);
        let mut raw = bs58::decode(address.to_base58()).into_vec().unwrap();
        raw[5] ^= 0x01;
        let corrupted = bs58::encode(raw).into_string();
        assert_eq!(Address::from_string(&corrupted), Err(AddressError::Checksum));
        assert!(matches!(
            Address::from_string("0OIl"),
            Err(AddressError::Base58(_))
        ));
        assert!(matches!(
            Address::from_string(&bs58::encode([1u8; 8]).into_string()),
            Err(AddressError::Length { .. })
        ));
    }

    #[test]
    fn test_codec() {
        let address = Address::from_name("codec", OBJECT);
        let encoded = address.encode();
        assert_eq!(encoded.len(), Address::SIZE);
        assert_eq!(Address::decode(encoded).unwrap(), address);
    }
}
