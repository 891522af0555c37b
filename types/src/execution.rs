use crate::{
    address::Address,
    constants::MAX_TRANSACTION_CONTRACTS,
    contract::Contract,
    register::Register,
};
use bytes::{Buf, BufMut};
use commonware_codec::{Encode, EncodeSize, Error, Read, ReadExt, ReadRangeExt, Write};
use commonware_cryptography::{
    ed25519,
    sha256::{Digest, Sha256},
    Digestible, Hasher, Signer, Verifier,
};
use commonware_utils::union;

pub const NAMESPACE: &[u8] = b"_NEXUS";
pub const TRANSACTION_SUFFIX: &[u8] = b"_TX";

#[inline]
pub fn transaction_namespace(namespace: &[u8]) -> Vec<u8> {
    union(namespace, TRANSACTION_SUFFIX)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub timestamp: u64,
    pub nonce: u64,
    pub contracts: Vec<Contract>,

    pub public: ed25519::PublicKey,
    pub signature: ed25519::Signature,
}

impl Transaction {
    fn payload(timestamp: &u64, nonce: &u64, contracts: &[Contract]) -> Vec<u8> {
        let mut payload = Vec::new();
        timestamp.write(&mut payload);
        nonce.write(&mut payload);
        for contract in contracts {
            contract.write(&mut payload);
        }

        payload
    }

    pub fn sign(
        private: &ed25519::PrivateKey,
        timestamp: u64,
        nonce: u64,
        contracts: Vec<Contract>,
    ) -> Self {
        let signature = private.sign(
            &transaction_namespace(NAMESPACE),
            &Self::payload(&timestamp, &nonce, &contracts),
        );

        Self {
            timestamp,
            nonce,
            contracts,
            public: private.public_key(),
            signature,
        }
    }

    pub fn verify(&self) -> bool {
        self.public.verify(
            &transaction_namespace(NAMESPACE),
            &Self::payload(&self.timestamp, &self.nonce, &self.contracts),
            &self.signature,
        )
    }

    /// Signature chain identity of the signer under the given genesis tag.
    pub fn genesis(&self, tag: u8) -> Address {
        Address::genesis(self.public.as_ref(), tag)
    }
}

impl Write for Transaction {
    fn write(&self, writer: &mut impl BufMut) {
        self.timestamp.write(writer);
        self.nonce.write(writer);
        self.contracts.write(writer);
        self.public.write(writer);
        self.signature.write(writer);
    }
}

impl Read for Transaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let timestamp = u64::read(reader)?;
        let nonce = u64::read(reader)?;
        let contracts = Vec::<Contract>::read_range(reader, 1..=MAX_TRANSACTION_CONTRACTS)?;
        let public = ed25519::PublicKey::read(reader)?;
        let signature = ed25519::Signature::read(reader)?;

        Ok(Self {
            timestamp,
            nonce,
            contracts,
            public,
            signature,
        })
    }
}

impl EncodeSize for Transaction {
    fn encode_size(&self) -> usize {
        self.timestamp.encode_size()
            + self.nonce.encode_size()
            + self.contracts.encode_size()
            + self.public.encode_size()
            + self.signature.encode_size()
    }
}

impl Digestible for Transaction {
    type Digest = Digest;

    fn digest(&self) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(self.timestamp.to_be_bytes().as_ref());
        hasher.update(self.nonce.to_be_bytes().as_ref());
        for contract in &self.contracts {
            hasher.update(contract.encode().as_ref());
        }
        hasher.update(self.public.as_ref());
        // The signature is excluded: any valid signature authorizes the same transaction.
        hasher.finalize()
    }
}

#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Debug)]
pub enum Key {
    /// Register by address (tag 0)
    Register(Address),
    /// Executed transaction by txid (tag 1)
    Transaction(Digest),
    /// Trust account indexed for a genesis identity (tag 2)
    Trust(Address),
    /// Spent marker for `(proof, txid, contract)` (tag 3)
    Proof {
        proof: Address,
        txid: Digest,
        contract: u32,
    },
    /// Number of events indexed for a genesis identity (tag 4)
    EventCount(Address),
    /// Next expected nonce of a signer (tag 5)
    Nonce(ed25519::PublicKey),
    /// Transfer or debit addressed to a genesis identity, in arrival order (tag 6)
    Event { recipient: Address, index: u64 },
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Register(address) => {
                0u8.write(writer);
                address.write(writer);
            }
            Self::Transaction(txid) => {
                1u8.write(writer);
                txid.write(writer);
            }
            Self::Trust(genesis) => {
                2u8.write(writer);
                genesis.write(writer);
            }
            Self::Proof {
                proof,
                txid,
                contract,
            } => {
                3u8.write(writer);
                proof.write(writer);
                txid.write(writer);
                contract.write(writer);
            }
            Self::EventCount(genesis) => {
                4u8.write(writer);
                genesis.write(writer);
            }
            Self::Nonce(public) => {
                5u8.write(writer);
                public.write(writer);
            }
            Self::Event { recipient, index } => {
                6u8.write(writer);
                recipient.write(writer);
                index.write(writer);
            }
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let key = match u8::read(reader)? {
            0 => Self::Register(Address::read(reader)?),
            1 => Self::Transaction(Digest::read(reader)?),
            2 => Self::Trust(Address::read(reader)?),
            3 => Self::Proof {
                proof: Address::read(reader)?,
                txid: Digest::read(reader)?,
                contract: u32::read(reader)?,
            },
            4 => Self::EventCount(Address::read(reader)?),
            5 => Self::Nonce(ed25519::PublicKey::read(reader)?),
            6 => Self::Event {
                recipient: Address::read(reader)?,
                index: u64::read(reader)?,
            },
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(key)
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        1 + match self {
            Self::Register(_) | Self::Transaction(_) | Self::Trust(_) | Self::EventCount(_) => 32,
            Self::Proof { .. } => 32 + 32 + 4,
            Self::Event { .. } => 32 + 8,
            Self::Nonce(public) => public.encode_size(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    Register(Register),
    Transaction(Transaction),
    /// Address of the indexed trust account.
    Trust(Address),
    Proof,
    /// Events indexed so far for a recipient.
    Count(u64),
    Nonce(u64),
    /// Transaction that emitted an event.
    Event(Digest),
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Register(register) => {
                0u8.write(writer);
                register.write(writer);
            }
            Self::Transaction(transaction) => {
                1u8.write(writer);
                transaction.write(writer);
            }
            Self::Trust(address) => {
                2u8.write(writer);
                address.write(writer);
            }
            Self::Proof => 3u8.write(writer),
            Self::Count(count) => {
                4u8.write(writer);
                count.write(writer);
            }
            Self::Nonce(nonce) => {
                5u8.write(writer);
                nonce.write(writer);
            }
            Self::Event(txid) => {
                6u8.write(writer);
                txid.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = match u8::read(reader)? {
            0 => Self::Register(Register::read(reader)?),
            1 => Self::Transaction(Transaction::read(reader)?),
            2 => Self::Trust(Address::read(reader)?),
            3 => Self::Proof,
            4 => Self::Count(u64::read(reader)?),
            5 => Self::Nonce(u64::read(reader)?),
            6 => Self::Event(Digest::read(reader)?),
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(value)
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        1 + match self {
            Self::Register(register) => register.encode_size(),
            Self::Transaction(transaction) => transaction.encode_size(),
            Self::Trust(address) => address.encode_size(),
            Self::Proof => 0,
            Self::Count(count) => count.encode_size(),
            Self::Nonce(nonce) => nonce.encode_size(),
            Self::Event(txid) => txid.encode_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address,
        contract::{Contract, Primitive},
    };
    use commonware_codec::DecodeExt;
    use commonware_math::algebra::Random;
    use rand::{rngs::StdRng, SeedableRng};

    fn keypair(seed: u64) -> ed25519::PrivateKey {
        let mut rng = StdRng::seed_from_u64(seed);
        ed25519::PrivateKey::random(&mut rng)
    }

    fn debit() -> Contract {
        Contract::new(Primitive::Debit {
            from: Address::from_name("a", address::ACCOUNT),
            to: Address::from_name("b", address::ACCOUNT),
            amount: 40,
        })
    }

    #[test]
    fn test_sign_and_verify() {
        let private = keypair(1);
        let tx = Transaction::sign(&private, 100, 0, vec![debit()]);
        assert!(tx.verify());

        let mut tampered = tx.clone();
        tampered.timestamp = 101;
        assert!(!tampered.verify());

        let decoded = Transaction::decode(tx.encode()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.digest(), tx.digest());
    }

    #[test]
    fn test_digest_ignores_signature() {
        let private = keypair(2);
        let tx = Transaction::sign(&private, 5, 1, vec![debit()]);
        let other = Transaction::sign(&private, 5, 2, vec![debit()]);
        assert_ne!(tx.digest(), other.digest());

        let mut resigned = tx.clone();
        resigned.signature = other.signature.clone();
        assert_eq!(resigned.digest(), tx.digest());
    }

    #[test]
    fn test_genesis_tag() {
        let tx = Transaction::sign(&keypair(3), 5, 0, vec![debit()]);
        assert_eq!(tx.genesis(address::RESERVED).tag(), address::RESERVED);
        assert_eq!(tx.genesis(address::RESERVED2).tag(), address::RESERVED2);
    }

    #[test]
    fn test_rejects_empty_transaction() {
        let tx = Transaction::sign(&keypair(4), 5, 0, vec![debit()]);
        let mut empty = tx.clone();
        empty.contracts.clear();
        assert!(Transaction::decode(empty.encode()).is_err());
    }

    #[test]
    fn test_key_codec() {
        let key = Key::Proof {
            proof: Address::from_name("p", address::ACCOUNT),
            txid: Sha256::hash(b"tx"),
            contract: 2,
        };
        let event = Key::Event {
            recipient: Address::genesis(b"bob", address::RESERVED),
            index: 7,
        };
        for key in [key, event] {
            let encoded = key.encode();
            assert_eq!(encoded.len(), key.encode_size());
            assert_eq!(Key::decode(encoded).unwrap(), key);
        }
        assert!(matches!(
            Key::decode([9u8].as_slice()),
            Err(Error::InvalidEnum(9))
        ));
    }
}
