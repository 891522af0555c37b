//! Contracts: one operation, an optional condition program and the captured pre/post-state.

use crate::{
    address::Address,
    constants::{MAX_APPEND_SIZE, MAX_CONDITION_SIZE},
    register::{Kind, Register},
};
use bytes::{Buf, BufMut};
use commonware_codec::{Encode, EncodeSize, Error, Read, ReadExt, ReadRangeExt, Write};
use commonware_cryptography::sha256::Digest;

/// Operation opcodes (first byte of the operation stream).
pub mod opcode {
    pub const WRITE: u8 = 0x01;
    pub const APPEND: u8 = 0x02;
    pub const CREATE: u8 = 0x03;
    pub const TRANSFER: u8 = 0x04;
    pub const CLAIM: u8 = 0x05;
    pub const TRUST: u8 = 0x07;
    pub const GENESIS: u8 = 0x08;
    pub const DEBIT: u8 = 0x09;
    pub const CREDIT: u8 = 0x0a;
    pub const FEE: u8 = 0x0c;
    pub const STAKE: u8 = 0x0e;
    pub const UNSTAKE: u8 = 0x0f;
    pub const VALIDATE: u8 = 0xd1;
    pub const CONDITION: u8 = 0xd2;
}

/// Bytes preceding the primitive inside a VALIDATE operation.
pub const VALIDATE_HEADER: usize = 1 + 32 + 4;

/// Bytes preceding the primitive inside a CONDITION operation.
pub const CONDITION_HEADER: usize = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    /// Update fields of an object, or replace the payload of a RAW register.
    /// Binary: [0x01] [address:32] [data:varint bytes]
    Write { address: Address, data: Vec<u8> },

    /// Binary: [0x02] [address:32] [data:varint bytes]
    Append { address: Address, data: Vec<u8> },

    /// Binary: [0x03] [address:32] [kind:u8] [data:varint bytes]
    Create {
        address: Address,
        kind: Kind,
        data: Vec<u8>,
    },

    /// Binary: [0x04] [address:32] [recipient:32]
    Transfer { address: Address, recipient: Address },

    /// Accept a register transferred by `(txid, contract)`.
    /// Binary: [0x05] [txid:32] [contract:u32] [address:32]
    Claim {
        txid: Digest,
        contract: u32,
        address: Address,
    },

    /// Binary: [0x07] [reward:u64]
    Trust { reward: u64 },

    /// Binary: [0x08] [address:32]
    Genesis { address: Address },

    /// Binary: [0x09] [from:32] [to:32] [amount:u64]
    Debit {
        from: Address,
        to: Address,
        amount: u64,
    },

    /// Binary: [0x0a] [txid:32] [contract:u32] [to:32] [proof:32] [amount:u64]
    Credit {
        txid: Digest,
        contract: u32,
        to: Address,
        proof: Address,
        amount: u64,
    },

    /// Binary: [0x0c] [account:32] [amount:u64]
    Fee { account: Address, amount: u64 },

    /// Binary: [0x0e] [amount:u64]
    Stake { amount: u64 },

    /// Binary: [0x0f] [amount:u64]
    Unstake { amount: u64 },
}

impl Primitive {
    pub const fn opcode(&self) -> u8 {
        match self {
            Self::Write { .. } => opcode::WRITE,
            Self::Append { .. } => opcode::APPEND,
            Self::Create { .. } => opcode::CREATE,
            Self::Transfer { .. } => opcode::TRANSFER,
            Self::Claim { .. } => opcode::CLAIM,
            Self::Trust { .. } => opcode::TRUST,
            Self::Genesis { .. } => opcode::GENESIS,
            Self::Debit { .. } => opcode::DEBIT,
            Self::Credit { .. } => opcode::CREDIT,
            Self::Fee { .. } => opcode::FEE,
            Self::Stake { .. } => opcode::STAKE,
            Self::Unstake { .. } => opcode::UNSTAKE,
        }
    }

    /// Primitives that may carry a condition program for a later CLAIM or CREDIT.
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::Transfer { .. } | Self::Debit { .. })
    }

    /// Primitives that capture a pre-state and post-checksum.
    pub const fn is_stateful(&self) -> bool {
        !matches!(self, Self::Create { .. })
    }
}

impl Write for Primitive {
    fn write(&self, writer: &mut impl BufMut) {
        self.opcode().write(writer);
        match self {
            Self::Write { address, data } | Self::Append { address, data } => {
                address.write(writer);
                data.write(writer);
            }
            Self::Create {
                address,
                kind,
                data,
            } => {
                address.write(writer);
                kind.write(writer);
                data.write(writer);
            }
            Self::Transfer { address, recipient } => {
                address.write(writer);
                recipient.write(writer);
            }
            Self::Claim {
                txid,
                contract,
                address,
            } => {
                txid.write(writer);
                contract.write(writer);
                address.write(writer);
            }
            Self::Trust { reward } => reward.write(writer),
            Self::Genesis { address } => address.write(writer),
            Self::Debit { from, to, amount } => {
                from.write(writer);
                to.write(writer);
                amount.write(writer);
            }
            Self::Credit {
                txid,
                contract,
                to,
                proof,
                amount,
            } => {
                txid.write(writer);
                contract.write(writer);
                to.write(writer);
                proof.write(writer);
                amount.write(writer);
            }
            Self::Fee { account, amount } => {
                account.write(writer);
                amount.write(writer);
            }
            Self::Stake { amount } | Self::Unstake { amount } => amount.write(writer),
        }
    }
}

impl Read for Primitive {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let primitive = match u8::read(reader)? {
            opcode::WRITE => Self::Write {
                address: Address::read(reader)?,
                data: Vec::<u8>::read_range(reader, 0..=MAX_APPEND_SIZE)?,
            },
            opcode::APPEND => Self::Append {
                address: Address::read(reader)?,
                data: Vec::<u8>::read_range(reader, 0..=MAX_APPEND_SIZE)?,
            },
            opcode::CREATE => Self::Create {
                address: Address::read(reader)?,
                kind: Kind::read(reader)?,
                data: Vec::<u8>::read_range(reader, 0..=MAX_APPEND_SIZE)?,
            },
            opcode::TRANSFER => Self::Transfer {
                address: Address::read(reader)?,
                recipient: Address::read(reader)?,
            },
            opcode::CLAIM => Self::Claim {
                txid: Digest::read(reader)?,
                contract: u32::read(reader)?,
                address: Address::read(reader)?,
            },
            opcode::TRUST => Self::Trust {
                reward: u64::read(reader)?,
            },
            opcode::GENESIS => Self::Genesis {
                address: Address::read(reader)?,
            },
            opcode::DEBIT => Self::Debit {
                from: Address::read(reader)?,
                to: Address::read(reader)?,
                amount: u64::read(reader)?,
            },
            opcode::CREDIT => Self::Credit {
                txid: Digest::read(reader)?,
                contract: u32::read(reader)?,
                to: Address::read(reader)?,
                proof: Address::read(reader)?,
                amount: u64::read(reader)?,
            },
            opcode::FEE => Self::Fee {
                account: Address::read(reader)?,
                amount: u64::read(reader)?,
            },
            opcode::STAKE => Self::Stake {
                amount: u64::read(reader)?,
            },
            opcode::UNSTAKE => Self::Unstake {
                amount: u64::read(reader)?,
            },
            i => return Err(Error::InvalidEnum(i)),
        };
        Ok(primitive)
    }
}

impl EncodeSize for Primitive {
    fn encode_size(&self) -> usize {
        1 + match self {
            Self::Write { address, data } | Self::Append { address, data } => {
                address.encode_size() + data.encode_size()
            }
            Self::Create {
                address,
                kind,
                data,
            } => address.encode_size() + kind.encode_size() + data.encode_size(),
            Self::Transfer { .. } => 32 + 32,
            Self::Claim { .. } => 32 + 4 + 32,
            Self::Trust { .. } | Self::Stake { .. } | Self::Unstake { .. } => 8,
            Self::Genesis { .. } => 32,
            Self::Debit { .. } => 32 + 32 + 8,
            Self::Credit { .. } => 32 + 4 + 32 + 32 + 8,
            Self::Fee { .. } => 32 + 8,
        }
    }
}

/// The operation stream of a contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// A bare primitive.
    /// Binary: [primitive]
    Primitive(Primitive),

    /// A TRANSFER or DEBIT whose contract carries a condition program.
    /// Binary: [0xd2] [primitive]
    Condition(Primitive),

    /// A primitive that only runs if the condition of `(txid, contract)` holds.
    /// Binary: [0xd1] [txid:32] [contract:u32] [primitive]
    Validate {
        txid: Digest,
        contract: u32,
        primitive: Primitive,
    },
}

impl Operation {
    pub fn primitive(&self) -> &Primitive {
        match self {
            Self::Primitive(primitive)
            | Self::Condition(primitive)
            | Self::Validate { primitive, .. } => primitive,
        }
    }

    pub fn primitive_mut(&mut self) -> &mut Primitive {
        match self {
            Self::Primitive(primitive)
            | Self::Condition(primitive)
            | Self::Validate { primitive, .. } => primitive,
        }
    }

    /// Length of the wrapper preceding the primitive.
    pub const fn header_len(&self) -> usize {
        match self {
            Self::Primitive(_) => 0,
            Self::Condition(_) => CONDITION_HEADER,
            Self::Validate { .. } => VALIDATE_HEADER,
        }
    }
}

impl Write for Operation {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Primitive(primitive) => primitive.write(writer),
            Self::Condition(primitive) => {
                opcode::CONDITION.write(writer);
                primitive.write(writer);
            }
            Self::Validate {
                txid,
                contract,
                primitive,
            } => {
                opcode::VALIDATE.write(writer);
                txid.write(writer);
                contract.write(writer);
                primitive.write(writer);
            }
        }
    }
}

impl Read for Operation {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        if !reader.has_remaining() {
            return Err(Error::EndOfBuffer);
        }
        match reader.chunk()[0] {
            opcode::CONDITION => {
                reader.advance(1);
                let primitive = Primitive::read(reader)?;
                if !primitive.is_conditional() {
                    return Err(Error::Invalid(
                        "Operation",
                        "condition must wrap TRANSFER or DEBIT",
                    ));
                }
                Ok(Self::Condition(primitive))
            }
            opcode::VALIDATE => {
                reader.advance(1);
                Ok(Self::Validate {
                    txid: Digest::read(reader)?,
                    contract: u32::read(reader)?,
                    primitive: Primitive::read(reader)?,
                })
            }
            _ => Ok(Self::Primitive(Primitive::read(reader)?)),
        }
    }
}

impl EncodeSize for Operation {
    fn encode_size(&self) -> usize {
        self.header_len() + self.primitive().encode_size()
    }
}

/// One executable unit of a transaction.
///
/// Binary: [operation] [conditions:varint bytes] [prestate:option register] [postcheck:option u64]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contract {
    pub operation: Operation,
    /// Condition program evaluated by a later CLAIM or CREDIT. Empty when absent.
    pub conditions: Vec<u8>,
    /// Register captured when the contract was built.
    pub prestate: Option<Register>,
    /// Checksum the post-state must reproduce.
    pub postcheck: Option<u64>,
}

impl Contract {
    pub fn new(primitive: Primitive) -> Self {
        Self::from_operation(Operation::Primitive(primitive))
    }

    /// A TRANSFER or DEBIT guarded by `conditions`.
    pub fn conditional(primitive: Primitive, conditions: Vec<u8>) -> Self {
        Self {
            conditions,
            ..Self::from_operation(Operation::Condition(primitive))
        }
    }

    pub fn validate(txid: Digest, contract: u32, primitive: Primitive) -> Self {
        Self::from_operation(Operation::Validate {
            txid,
            contract,
            primitive,
        })
    }

    pub fn from_operation(operation: Operation) -> Self {
        Self {
            operation,
            conditions: Vec::new(),
            prestate: None,
            postcheck: None,
        }
    }

    pub fn primitive(&self) -> &Primitive {
        self.operation.primitive()
    }

    /// The raw operation stream, as seen by `OPERATIONS` resolvers.
    pub fn operations(&self) -> Vec<u8> {
        self.operation.encode().to_vec()
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }
}

impl Write for Contract {
    fn write(&self, writer: &mut impl BufMut) {
        self.operation.write(writer);
        self.conditions.write(writer);
        match &self.prestate {
            Some(register) => {
                true.write(writer);
                register.write(writer);
            }
            None => false.write(writer),
        }
        match &self.postcheck {
            Some(checksum) => {
                true.write(writer);
                checksum.write(writer);
            }
            None => false.write(writer),
        }
    }
}

impl Read for Contract {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let operation = Operation::read(reader)?;
        let conditions = Vec::<u8>::read_range(reader, 0..=MAX_CONDITION_SIZE)?;
        let prestate = if bool::read(reader)? {
            Some(Register::read(reader)?)
        } else {
            None
        };
        let postcheck = if bool::read(reader)? {
            Some(u64::read(reader)?)
        } else {
            None
        };
        Ok(Self {
            operation,
            conditions,
            prestate,
            postcheck,
        })
    }
}

impl EncodeSize for Contract {
    fn encode_size(&self) -> usize {
        self.operation.encode_size()
            + self.conditions.encode_size()
            + 1
            + self.prestate.as_ref().map_or(0, EncodeSize::encode_size)
            + 1
            + self.postcheck.map_or(0, |_| 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{self, Address};
    use commonware_codec::DecodeExt;
    use commonware_cryptography::{sha256::Sha256, Hasher};

    fn account(name: &str) -> Address {
        Address::from_name(name, address::ACCOUNT)
    }

    #[test]
    fn test_operation_headers() {
        let debit = Primitive::Debit {
            from: account("a"),
            to: account("b"),
            amount: 40,
        };
        let plain = Operation::Primitive(debit.clone()).encode();
        let wrapped = Operation::Condition(debit.clone()).encode();
        assert_eq!(wrapped[0], opcode::CONDITION);
        assert_eq!(&wrapped[CONDITION_HEADER..], plain.as_ref());

        let validated = Operation::Validate {
            txid: Sha256::hash(b"tx"),
            contract: 3,
            primitive: debit,
        }
        .encode();
        assert_eq!(validated[0], opcode::VALIDATE);
        assert_eq!(&validated[VALIDATE_HEADER..], plain.as_ref());
    }

    #[test]
    fn test_condition_wraps_only_transfer_or_debit() {
        let mut bytes = vec![opcode::CONDITION];
        Primitive::Stake { amount: 1 }.write(&mut bytes);
        match Operation::decode(bytes.as_slice()) {
            Err(Error::Invalid("Operation", _)) => {}
            other => panic!("expected invalid operation, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_opcode_and_trailing_bytes() {
        assert!(matches!(
            Operation::decode([0x06u8, 0, 0].as_slice()),
            Err(Error::InvalidEnum(0x06))
        ));

        let mut bytes = Operation::Primitive(Primitive::Stake { amount: 9 })
            .encode()
            .to_vec();
        bytes.push(0);
        assert!(Operation::decode(bytes.as_slice()).is_err());
    }

    #[test]
    fn test_contract_codec() {
        let owner = Address::genesis(b"k", address::RESERVED);
        let mut contract = Contract::conditional(
            Primitive::Transfer {
                address: Address::from_name("asset", address::RAW),
                recipient: Address::WILDCARD,
            },
            vec![0x3a, 1],
        );
        contract.prestate = Some(Register::new(Kind::Raw, owner, 9, vec![4, 5]));
        contract.postcheck = Some(77);

        let encoded = contract.encode();
        assert_eq!(encoded.len(), contract.encode_size());
        assert_eq!(Contract::decode(encoded).unwrap(), contract);
    }
}
