use crate::{
    address::Address,
    constants::{MAX_APPEND_SIZE, REGISTER_VERSION},
    object::{Object, ObjectError},
};
use bytes::{Buf, BufMut};
use commonware_codec::{Encode, EncodeSize, Error, Read, ReadExt, ReadRangeExt, Write};
use commonware_cryptography::{sha256::Sha256, Hasher};

/// Register kinds as stored in [Register::kind].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Readonly,
    Append,
    Raw,
    Object,
    /// Engine-owned; never created through CREATE.
    System,
}

impl Kind {
    pub const fn tag(self) -> u8 {
        match self {
            Self::Readonly => 0x01,
            Self::Append => 0x02,
            Self::Raw => 0x03,
            Self::Object => 0x04,
            Self::System => 0x05,
        }
    }
}

impl Write for Kind {
    fn write(&self, writer: &mut impl BufMut) {
        self.tag().write(writer);
    }
}

impl Read for Kind {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0x01 => Ok(Self::Readonly),
            0x02 => Ok(Self::Append),
            0x03 => Ok(Self::Raw),
            0x04 => Ok(Self::Object),
            0x05 => Ok(Self::System),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl commonware_codec::FixedSize for Kind {
    const SIZE: usize = 1;
}

/// Persisted state value.
///
/// Binary: [version:u8] [kind:u8] [owner:32] [created:u64] [modified:u64] [data:varint len + bytes] [checksum:u64]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Register {
    pub version: u8,
    pub kind: Kind,
    pub owner: Address,
    pub created: u64,
    pub modified: u64,
    pub data: Vec<u8>,
    pub checksum: u64,
}

impl Register {
    /// New register with a valid checksum.
    pub fn new(kind: Kind, owner: Address, timestamp: u64, data: Vec<u8>) -> Self {
        let mut register = Self {
            version: REGISTER_VERSION,
            kind,
            owner,
            created: timestamp,
            modified: timestamp,
            data,
            checksum: 0,
        };
        register.set_checksum();
        register
    }

    pub fn from_object(owner: Address, timestamp: u64, object: &Object) -> Self {
        Self::new(Kind::Object, owner, timestamp, object.encode().to_vec())
    }

    fn write_body(&self, writer: &mut impl BufMut) {
        self.version.write(writer);
        self.kind.write(writer);
        self.owner.write(writer);
        self.created.write(writer);
        self.modified.write(writer);
        self.data.write(writer);
    }

    /// First 8 bytes of the sha256 of everything but the checksum.
    pub fn compute_checksum(&self) -> u64 {
        let mut body = Vec::with_capacity(self.encode_size());
        self.write_body(&mut body);
        let digest = Sha256::hash(&body);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_ref()[..8]);
        u64::from_be_bytes(prefix)
    }

    pub fn set_checksum(&mut self) {
        self.checksum = self.compute_checksum();
    }

    /// The gate every post-state must pass.
    pub fn is_valid(&self) -> bool {
        self.checksum == self.compute_checksum()
    }

    pub fn is_object(&self) -> bool {
        self.kind == Kind::Object
    }

    /// Parse the payload as an [Object].
    pub fn object(&self) -> Result<Object, ObjectError> {
        if !self.is_object() {
            return Err(ObjectError::NotObject);
        }
        Object::parse(&self.data)
    }

    /// Replace the payload with `object`. The checksum is left for the caller to refresh.
    pub fn set_object(&mut self, object: &Object) {
        self.data = object.encode().to_vec();
    }
}

impl Write for Register {
    fn write(&self, writer: &mut impl BufMut) {
        self.write_body(writer);
        self.checksum.write(writer);
    }
}

impl Read for Register {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let version = u8::read(reader)?;
        if version != REGISTER_VERSION {
            return Err(Error::Invalid("Register", "unsupported version"));
        }
        Ok(Self {
            version,
            kind: Kind::read(reader)?,
            owner: Address::read(reader)?,
            created: u64::read(reader)?,
            modified: u64::read(reader)?,
            data: Vec::<u8>::read_range(reader, 0..=MAX_APPEND_SIZE)?,
            checksum: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Register {
    fn encode_size(&self) -> usize {
        self.version.encode_size()
            + self.kind.encode_size()
            + self.owner.encode_size()
            + self.created.encode_size()
            + self.modified.encode_size()
            + self.data.encode_size()
            + self.checksum.encode_size()
    }
}
