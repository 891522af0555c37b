//! Condition VM.
//!
//! Evaluates a condition program attached to a TRANSFER or DEBIT against two contexts: `THIS`
//! (the contract carrying the program) and `CALLER` (the CLAIM, CREDIT or VALIDATE asking for
//! authorization).
//!
//! Grammar:
//!
//! ```text
//! program    := expression
//! expression := item ((AND | OR) item)*        // one combinator per level
//! item       := GROUP expression UNGROUP | comparison
//! comparison := value COMPARATOR value
//! value      := term postfix* [(ADD | SUB | ... | CAT) value]
//! postfix    := INC | DEC | SHA256 | BLAKE3 | SHA512 | SUBDATA off len | REGISTER_*
//! ```
//!
//! Values are little-endian byte strings viewed as 64-bit words. Arithmetic is single word and
//! wraps, recording a [Warning] instead of failing. Evaluation never short-circuits, so the cost
//! of a program depends only on its bytes and the resolved context.
//!
//! `REGISTER_*` resolvers read live registers through [Registers]. They are priced well above
//! the other resolvers since each one is a storage read.

use crate::error::EngineError;
use commonware_codec::{varint::UInt, ReadExt};
use commonware_cryptography::{blake3::Blake3, sha256::Sha256, Hasher};
use nexus_types::{
    codec::read_string,
    condition::{Token, WILDCARD_BYTE},
    constants::MAX_CONDITION_COST,
    contract::Contract,
    object::{FieldValue, MAX_FIELD_NAME},
    Address, Kind, Object, Register,
};
use sha2::{Digest as _, Sha512};
use std::cmp::Ordering;
use thiserror::Error;

/// Words a single comparison may allocate.
pub const MEMORY_WORDS: usize = 512;

const GROUP_COST: u64 = 128;
const ADD_COST: u64 = 64;
const MUL_COST: u64 = 128;
const EXP_COST: u64 = 256;
const GENESIS_COST: u64 = 32;
const TIMESTAMP_COST: u64 = 8;
const SHA256_COST: u64 = 2048;
const REGISTER_COST: u64 = 4096;
const REGISTER_KIND_COST: u64 = 4097;
const REGISTER_OWNER_COST: u64 = 4128;
const REGISTER_TIMESTAMP_COST: u64 = 5004;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("malformed condition at byte {position}: {reason}")]
pub struct ConditionError {
    pub position: usize,
    pub reason: &'static str,
}

fn fail<T>(position: usize, reason: &'static str) -> Result<T, ConditionError> {
    Err(ConditionError { position, reason })
}

/// Non-fatal events surfaced to the contract builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Warning {
    AddOverflow,
    SubOverflow,
    IncOverflow,
    DecOverflow,
    MulOverflow,
    ExpOverflow,
    DivByZero,
    ModDivZero,
}

/// Register lookups backing the `REGISTER_*` resolvers.
pub trait Registers {
    fn register(&self, address: &Address) -> Result<Option<Register>, EngineError>;
}

/// A contract bound to the identity and time of the transaction that carried it.
#[derive(Clone, Debug)]
pub struct Bound {
    pub genesis: Address,
    pub timestamp: u64,
    /// Operation stream without its CONDITION/VALIDATE header.
    pub operations: Vec<u8>,
    pub prestate: Option<Register>,
}

impl Bound {
    pub fn new(contract: &Contract, genesis: Address, timestamp: u64) -> Self {
        let operations = contract.operations();
        let header = contract.operation.header_len().min(operations.len());
        Self {
            genesis,
            timestamp,
            operations: operations[header..].to_vec(),
            prestate: contract.prestate.clone(),
        }
    }

    /// Stand-in caller used to check a program before any caller exists.
    fn dummy() -> Self {
        Self {
            genesis: Address::NULL,
            timestamp: 0,
            operations: vec![0x02; 1024],
            prestate: Some(Register::new(Kind::Object, Address::NULL, 0, Vec::new())),
        }
    }
}

/// Outcome of [verify].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub cost: u64,
    pub warnings: Vec<(usize, Warning)>,
}

/// Check that `program` is well formed without live data.
pub fn verify(program: &[u8], this: &Bound) -> Result<Report, ConditionError> {
    let caller = Bound::dummy();
    let mut condition = Condition::new(program, this, &caller);
    condition.dry_run = true;
    condition.execute()?;
    Ok(Report {
        cost: condition.cost,
        warnings: condition.warnings,
    })
}

#[derive(Clone, Debug)]
struct Operand {
    bytes: Vec<u8>,
}

impl Operand {
    fn raw(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    fn from_u64(value: u64) -> Self {
        Self {
            bytes: value.to_le_bytes().to_vec(),
        }
    }

    /// Big-endian integer (or address) to little-endian operand.
    fn from_be(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().rev().copied().collect(),
        }
    }

    fn words(&self) -> usize {
        self.bytes.len().div_ceil(8).max(1)
    }

    fn word(&self, index: usize) -> u64 {
        let mut word = [0u8; 8];
        let start = index * 8;
        if start < self.bytes.len() {
            let end = (start + 8).min(self.bytes.len());
            word[..end - start].copy_from_slice(&self.bytes[start..end]);
        }
        u64::from_le_bytes(word)
    }

    fn as_u64(&self) -> Option<u64> {
        (self.bytes.len() <= 8).then(|| self.word(0))
    }

    /// Numeric ordering over zero-extended words, most significant first.
    fn compare(&self, other: &Self) -> Ordering {
        let words = self.words().max(other.words());
        for index in (0..words).rev() {
            match self.word(index).cmp(&other.word(index)) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }

    fn contains(&self, needle: &Self) -> bool {
        let needle = &needle.bytes;
        if needle.is_empty() {
            return true;
        }
        if needle.len() > self.bytes.len() {
            return false;
        }
        self.bytes.windows(needle.len()).any(|window| {
            window
                .iter()
                .zip(needle)
                .all(|(byte, pattern)| *pattern == WILDCARD_BYTE || byte == pattern)
        })
    }
}

struct Cursor<'p> {
    bytes: &'p [u8],
    pos: usize,
}

impl<'p> Cursor<'p> {
    fn new(bytes: &'p [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<Token> {
        self.bytes.get(self.pos).copied().and_then(Token::from_byte)
    }

    fn token(&mut self) -> Result<Token, ConditionError> {
        let position = self.pos;
        let Some(&byte) = self.bytes.get(position) else {
            return fail(position, "unexpected end of program");
        };
        self.pos += 1;
        Token::from_byte(byte).map_or_else(|| fail(position, "unknown token"), Ok)
    }

    fn take(&mut self, len: usize) -> Result<&'p [u8], ConditionError> {
        let Some(slice) = self.bytes.get(self.pos..self.pos + len) else {
            return fail(self.pos, "truncated operand");
        };
        self.pos += len;
        Ok(slice)
    }

    fn length(&mut self) -> Result<usize, ConditionError> {
        let mut rest = &self.bytes[self.pos..];
        let before = rest.len();
        let len: u32 = match UInt::<u32>::read(&mut rest) {
            Ok(len) => len.into(),
            Err(_) => return fail(self.pos, "invalid length"),
        };
        self.pos += before - rest.len();
        Ok(len as usize)
    }

    fn string(&mut self) -> Result<String, ConditionError> {
        let mut rest = &self.bytes[self.pos..];
        let before = rest.len();
        let value = match read_string(&mut rest, MAX_FIELD_NAME) {
            Ok(value) => value,
            Err(_) => return fail(self.pos, "invalid field name"),
        };
        self.pos += before - rest.len();
        Ok(value)
    }

    fn u16(&mut self) -> Result<u16, ConditionError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

#[derive(Default)]
struct Frame {
    value: bool,
    seen: bool,
    combinator: Option<Token>,
    pending: bool,
}

impl Frame {
    fn combine(&mut self, token: Token, position: usize) -> Result<(), ConditionError> {
        if !self.seen || self.pending {
            return fail(position, "AND/OR must follow an expression");
        }
        if self.combinator.is_some_and(|existing| existing != token) {
            return fail(position, "AND and OR mixed without GROUP");
        }
        self.combinator = Some(token);
        self.pending = true;
        Ok(())
    }

    fn fold(&mut self, value: bool, position: usize) -> Result<(), ConditionError> {
        if !self.seen {
            self.value = value;
            self.seen = true;
            return Ok(());
        }
        if !self.pending {
            return fail(position, "expected AND or OR");
        }
        self.pending = false;
        self.value = match self.combinator {
            Some(Token::And) => self.value && value,
            _ => self.value || value,
        };
        Ok(())
    }

    fn finish(self, position: usize) -> Result<bool, ConditionError> {
        if !self.seen || self.pending {
            return fail(position, "incomplete expression");
        }
        Ok(self.value)
    }
}

pub struct Condition<'a> {
    program: &'a [u8],
    this: &'a Bound,
    caller: &'a Bound,
    dry_run: bool,
    registers: Option<&'a dyn Registers>,

    cost: u64,
    memory: usize,
    warnings: Vec<(usize, Warning)>,
    /// Failed register read of the last run.
    fault: Option<EngineError>,
}

impl<'a> Condition<'a> {
    pub fn new(program: &'a [u8], this: &'a Bound, caller: &'a Bound) -> Self {
        Self {
            program,
            this,
            caller,
            dry_run: false,
            registers: None,
            cost: 0,
            memory: 0,
            warnings: Vec::new(),
            fault: None,
        }
    }

    /// Resolve `REGISTER_*` tokens through `registers`.
    pub fn with_registers(mut self, registers: &'a dyn Registers) -> Self {
        self.registers = Some(registers);
        self
    }

    /// Cost of the last [Condition::execute].
    pub fn cost(&self) -> u64 {
        self.cost
    }

    pub fn warnings(&self) -> &[(usize, Warning)] {
        &self.warnings
    }

    /// Run [Condition::execute], reporting a failed register read as the storage error it is.
    pub fn evaluate(&mut self) -> Result<bool, EngineError> {
        let result = self.execute();
        if let Some(err) = self.fault.take() {
            return Err(err);
        }
        Ok(result?)
    }

    pub fn execute(&mut self) -> Result<bool, ConditionError> {
        self.cost = 0;
        self.memory = 0;
        self.warnings.clear();
        self.fault = None;

        let mut cursor = Cursor::new(self.program);
        if cursor.is_empty() {
            return fail(0, "empty program");
        }

        let mut stack = vec![Frame::default()];
        while !cursor.is_empty() {
            let position = cursor.pos;
            match cursor.peek() {
                Some(Token::Group) => {
                    cursor.pos += 1;
                    self.charge(GROUP_COST, position)?;
                    stack.push(Frame::default());
                }
                Some(Token::Ungroup) => {
                    cursor.pos += 1;
                    if stack.len() < 2 {
                        return fail(position, "UNGROUP without GROUP");
                    }
                    let Some(frame) = stack.pop() else {
                        return fail(position, "empty stack");
                    };
                    let value = frame.finish(position)?;
                    top(&mut stack, position)?.fold(value, position)?;
                }
                Some(token @ (Token::And | Token::Or)) => {
                    cursor.pos += 1;
                    top(&mut stack, position)?.combine(token, position)?;
                }
                _ => {
                    let value = self.comparison(&mut cursor)?;
                    top(&mut stack, position)?.fold(value, position)?;
                }
            }
        }

        let end = cursor.pos;
        if stack.len() != 1 {
            return fail(end, "GROUP without UNGROUP");
        }
        match stack.pop() {
            Some(frame) => frame.finish(end),
            None => fail(end, "empty stack"),
        }
    }

    fn charge(&mut self, amount: u64, position: usize) -> Result<(), ConditionError> {
        self.cost = self.cost.saturating_add(amount);
        if self.cost > MAX_CONDITION_COST {
            return fail(position, "cost limit exceeded");
        }
        Ok(())
    }

    fn allocate(&mut self, words: usize, position: usize) -> Result<(), ConditionError> {
        self.memory += words;
        if self.memory > MEMORY_WORDS {
            return fail(position, "memory limit exceeded");
        }
        Ok(())
    }

    fn warn(&mut self, position: usize, warning: Warning) {
        self.warnings.push((position, warning));
    }

    fn comparison(&mut self, cursor: &mut Cursor<'_>) -> Result<bool, ConditionError> {
        self.memory = 0;
        let lhs = self.value(cursor)?;
        let position = cursor.pos;
        let comparator = cursor.token()?;
        if !comparator.is_comparator() {
            return fail(position, "expected comparator");
        }
        let rhs = self.value(cursor)?;

        let ordering = lhs.compare(&rhs);
        Ok(match comparator {
            Token::Equals => ordering == Ordering::Equal,
            Token::NotEquals => ordering != Ordering::Equal,
            Token::LessThan => ordering == Ordering::Less,
            Token::GreaterThan => ordering == Ordering::Greater,
            Token::LessEquals => ordering != Ordering::Greater,
            Token::GreaterEquals => ordering != Ordering::Less,
            _ => lhs.contains(&rhs),
        })
    }

    fn value(&mut self, cursor: &mut Cursor<'_>) -> Result<Operand, ConditionError> {
        let mut operand = self.term(cursor)?;
        loop {
            let position = cursor.pos;
            let Some(token) = cursor.peek() else {
                return Ok(operand);
            };
            match token {
                Token::Inc | Token::Dec => {
                    cursor.pos += 1;
                    self.charge(ADD_COST, position)?;
                    let Some(value) = operand.as_u64() else {
                        return fail(position, "arithmetic on multi-word value");
                    };
                    let (result, overflow) = if token == Token::Inc {
                        value.overflowing_add(1)
                    } else {
                        value.overflowing_sub(1)
                    };
                    if overflow {
                        let warning = if token == Token::Inc {
                            Warning::IncOverflow
                        } else {
                            Warning::DecOverflow
                        };
                        self.warn(position, warning);
                    }
                    operand = Operand::from_u64(result);
                }
                Token::Sha256 | Token::Blake3 | Token::Sha512 => {
                    cursor.pos += 1;
                    self.charge(SHA256_COST, position)?;
                    operand = match token {
                        Token::Sha256 => Operand::raw(Sha256::hash(&operand.bytes).as_ref()),
                        Token::Blake3 => Operand::raw(Blake3::hash(&operand.bytes).as_ref()),
                        _ => Operand::raw(&Sha512::digest(&operand.bytes)),
                    };
                }
                Token::RegisterCreated
                | Token::RegisterModified
                | Token::RegisterOwner
                | Token::RegisterKind
                | Token::RegisterData
                | Token::RegisterValue => {
                    cursor.pos += 1;
                    operand = self.register(token, &operand, cursor, position)?;
                    self.allocate(operand.words(), position)?;
                }
                Token::Subdata => {
                    cursor.pos += 1;
                    let offset = cursor.u16()? as usize;
                    let len = cursor.u16()? as usize;
                    self.charge(len as u64, position)?;
                    let Some(slice) = operand.bytes.get(offset..offset + len) else {
                        return fail(position, "SUBDATA out of range");
                    };
                    operand = Operand::raw(slice);
                }
                Token::Add
                | Token::Sub
                | Token::Mul
                | Token::Div
                | Token::Mod
                | Token::Exp
                | Token::Cat => {
                    cursor.pos += 1;
                    let rhs = self.value(cursor)?;
                    return self.binary(token, operand, rhs, position);
                }
                _ => return Ok(operand),
            }
        }
    }

    fn binary(
        &mut self,
        token: Token,
        lhs: Operand,
        rhs: Operand,
        position: usize,
    ) -> Result<Operand, ConditionError> {
        if token == Token::Cat {
            self.charge((lhs.bytes.len() + rhs.bytes.len()) as u64, position)?;
            let mut bytes = lhs.bytes;
            bytes.extend_from_slice(&rhs.bytes);
            return Ok(Operand { bytes });
        }

        let cost = match token {
            Token::Add | Token::Sub => ADD_COST,
            Token::Exp => EXP_COST,
            _ => MUL_COST,
        };
        self.charge(cost, position)?;
        let (Some(a), Some(b)) = (lhs.as_u64(), rhs.as_u64()) else {
            return fail(position, "arithmetic on multi-word value");
        };

        let (result, warning) = match token {
            Token::Add => flag(a.overflowing_add(b), Warning::AddOverflow),
            Token::Sub => flag(a.overflowing_sub(b), Warning::SubOverflow),
            Token::Mul => flag(a.overflowing_mul(b), Warning::MulOverflow),
            Token::Exp => flag(
                a.overflowing_pow(u32::try_from(b).unwrap_or(u32::MAX)),
                Warning::ExpOverflow,
            ),
            Token::Div => match a.checked_div(b) {
                Some(v) => (v, None),
                None => (0, Some(Warning::DivByZero)),
            },
            _ => match a.checked_rem(b) {
                Some(v) => (v, None),
                None => (0, Some(Warning::ModDivZero)),
            },
        };
        if let Some(warning) = warning {
            self.warn(position, warning);
        }
        Ok(Operand::from_u64(result))
    }

    fn term(&mut self, cursor: &mut Cursor<'_>) -> Result<Operand, ConditionError> {
        let position = cursor.pos;
        let token = cursor.token()?;
        let operand = match token {
            Token::Uint8
            | Token::Uint16
            | Token::Uint32
            | Token::Uint64
            | Token::Uint256
            | Token::Uint512
            | Token::Uint1024 => {
                let width = match token {
                    Token::Uint8 => 1,
                    Token::Uint16 => 2,
                    Token::Uint32 => 4,
                    Token::Uint64 => 8,
                    Token::Uint256 => 32,
                    Token::Uint512 => 64,
                    _ => 128,
                };
                let bytes = cursor.take(width)?;
                self.charge(width as u64, position)?;
                Operand::from_be(bytes)
            }
            Token::String | Token::Bytes => {
                let len = cursor.length()?;
                if len == 0 {
                    return fail(position, "empty push");
                }
                let bytes = cursor.take(len)?;
                self.charge(len as u64, position)?;
                Operand::raw(bytes)
            }
            Token::Bool => {
                let byte = cursor.take(1)?[0];
                if byte > 1 {
                    return fail(position, "invalid bool");
                }
                self.charge(1, position)?;
                Operand::from_u64(byte as u64)
            }
            Token::CallerGenesis | Token::ThisGenesis => {
                let bound = self.context(token);
                self.charge(GENESIS_COST, position)?;
                Operand::from_be(bound.genesis.as_ref())
            }
            Token::CallerTimestamp | Token::ThisTimestamp => {
                let bound = self.context(token);
                self.charge(TIMESTAMP_COST, position)?;
                Operand::from_u64(bound.timestamp)
            }
            Token::CallerOperations | Token::ThisOperations => {
                let bound = self.context(token);
                self.charge(bound.operations.len() as u64, position)?;
                Operand::raw(&bound.operations)
            }
            Token::CallerPrestateCreated
            | Token::CallerPrestateModified
            | Token::CallerPrestateOwner
            | Token::CallerPrestateKind
            | Token::CallerPrestateData
            | Token::CallerPrestateValue => self.prestate(token, cursor, position)?,
            _ => return fail(position, "expected value"),
        };
        self.allocate(operand.words(), position)?;
        Ok(operand)
    }

    fn context(&self, token: Token) -> &'a Bound {
        match token {
            Token::ThisGenesis | Token::ThisTimestamp | Token::ThisOperations => self.this,
            _ => self.caller,
        }
    }

    fn prestate(
        &mut self,
        token: Token,
        cursor: &mut Cursor<'_>,
        position: usize,
    ) -> Result<Operand, ConditionError> {
        let field = match token {
            Token::CallerPrestateValue => Some(cursor.string()?),
            _ => None,
        };
        let Some(prestate) = self.caller.prestate.as_ref() else {
            return fail(position, "caller has no pre-state");
        };

        let operand = match token {
            Token::CallerPrestateCreated => Operand::from_u64(prestate.created),
            Token::CallerPrestateModified => Operand::from_u64(prestate.modified),
            Token::CallerPrestateOwner => Operand::from_be(prestate.owner.as_ref()),
            Token::CallerPrestateKind => Operand::from_u64(prestate.kind.tag() as u64),
            Token::CallerPrestateData => Operand::raw(&prestate.data),
            _ => {
                let Ok(object) = prestate.object() else {
                    return fail(position, "caller pre-state is not an object");
                };
                match field_operand(&object, &field.unwrap_or_default()) {
                    Some(operand) => operand,
                    None if self.dry_run => Operand::from_u64(0),
                    None => return fail(position, "field not found in caller pre-state"),
                }
            }
        };

        let width = match token {
            Token::CallerPrestateCreated | Token::CallerPrestateModified => 8,
            Token::CallerPrestateOwner => 32,
            Token::CallerPrestateKind => 1,
            _ => operand.bytes.len() as u64,
        };
        self.charge(width, position)?;
        Ok(operand)
    }

    /// Resolve a `REGISTER_*` token against the register addressed by `address`.
    fn register(
        &mut self,
        token: Token,
        address: &Operand,
        cursor: &mut Cursor<'_>,
        position: usize,
    ) -> Result<Operand, ConditionError> {
        let field = match token {
            Token::RegisterValue => Some(cursor.string()?),
            _ => None,
        };
        let cost = match token {
            Token::RegisterCreated | Token::RegisterModified => REGISTER_TIMESTAMP_COST,
            Token::RegisterOwner => REGISTER_OWNER_COST,
            Token::RegisterKind => REGISTER_KIND_COST,
            _ => REGISTER_COST,
        };
        self.charge(cost, position)?;

        let Ok(mut bytes) = <[u8; 32]>::try_from(address.bytes.as_slice()) else {
            return fail(position, "register address must be 256 bits");
        };
        bytes.reverse();
        let address = Address::from_bytes(bytes);

        let register = if self.dry_run {
            Register::new(Kind::Object, Address::NULL, 0, Vec::new())
        } else {
            let Some(registers) = self.registers else {
                return fail(position, "register reads unavailable");
            };
            match registers.register(&address) {
                Ok(Some(register)) => register,
                Ok(None) => return fail(position, "register not found"),
                Err(err) => {
                    self.fault = Some(err);
                    return fail(position, "register read failed");
                }
            }
        };

        let operand = match token {
            Token::RegisterCreated => Operand::from_u64(register.created),
            Token::RegisterModified => Operand::from_u64(register.modified),
            Token::RegisterOwner => Operand::from_be(register.owner.as_ref()),
            Token::RegisterKind => Operand::from_u64(register.kind.tag() as u64),
            Token::RegisterData => {
                self.charge(register.data.len() as u64, position)?;
                Operand::raw(&register.data)
            }
            _ => {
                let Ok(object) = register.object() else {
                    return fail(position, "register is not an object");
                };
                match field_operand(&object, &field.unwrap_or_default()) {
                    Some(operand) => operand,
                    None if self.dry_run => Operand::from_u64(0),
                    None => return fail(position, "field not found in register"),
                }
            }
        };
        Ok(operand)
    }
}

/// Numeric fields resolve big-endian, strings and bytes raw.
fn field_operand(object: &Object, name: &str) -> Option<Operand> {
    match object.get(name).ok()? {
        FieldValue::String(value) => Some(Operand::raw(value.as_bytes())),
        FieldValue::Bytes(value) => Some(Operand::raw(value)),
        value => Some(Operand::from_be(&value.to_be_bytes())),
    }
}

fn top(stack: &mut [Frame], position: usize) -> Result<&mut Frame, ConditionError> {
    match stack.last_mut() {
        Some(frame) => Ok(frame),
        None => fail(position, "empty stack"),
    }
}

fn flag((value, overflow): (u64, bool), warning: Warning) -> (u64, Option<Warning>) {
    (value, overflow.then_some(warning))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_types::{
        address,
        condition::Program,
        contract::{opcode, Primitive},
        object, Register,
    };
    use proptest::prelude::*;
    use sha2::Digest as _;

    fn this() -> Bound {
        let contract = Contract::conditional(
            Primitive::Debit {
                from: Address::from_name("from", address::ACCOUNT),
                to: Address::WILDCARD,
                amount: 40,
            },
            vec![],
        );
        Bound::new(&contract, Address::genesis(b"alice", address::RESERVED), 1_000)
    }

    fn caller() -> Bound {
        let mut account = object::account(&Address::NULL).unwrap();
        account.set_u64("balance", 75).unwrap();
        let owner = Address::genesis(b"bob", address::RESERVED);
        let mut contract = Contract::new(Primitive::Credit {
            txid: Sha256::hash(b"debit"),
            contract: 0,
            to: Address::from_name("to", address::ACCOUNT),
            proof: Address::from_name("from", address::ACCOUNT),
            amount: 40,
        });
        contract.prestate = Some(Register::from_object(owner, 900, &account));
        Bound::new(&contract, owner, 2_000)
    }

    fn run(program: &[u8]) -> (Result<bool, ConditionError>, u64, Vec<(usize, Warning)>) {
        let (this, caller) = (this(), caller());
        let mut condition = Condition::new(program, &this, &caller);
        let result = condition.execute();
        (result, condition.cost(), condition.warnings().to_vec())
    }

    #[test]
    fn test_mixed_width_equality() {
        let program = Program::new()
            .uint64(5)
            .token(Token::Equals)
            .uint8(5)
            .build();
        let (result, cost, warnings) = run(&program);
        assert_eq!(result, Ok(true));
        assert_eq!(cost, 9);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_groups_and_combinators() {
        // GROUP (1 == 1 AND 2 < 1) UNGROUP OR 3 >= 3
        let program = Program::new()
            .token(Token::Group)
            .uint8(1)
            .token(Token::Equals)
            .uint8(1)
            .token(Token::And)
            .uint8(2)
            .token(Token::LessThan)
            .uint8(1)
            .token(Token::Ungroup)
            .token(Token::Or)
            .uint8(3)
            .token(Token::GreaterEquals)
            .uint8(3)
            .build();
        assert_eq!(run(&program).0, Ok(true));

        // Same program with AND at the outer level is false.
        let mut program = program;
        let or = program
            .iter()
            .position(|b| *b == Token::Or.byte())
            .unwrap();
        program[or] = Token::And.byte();
        assert_eq!(run(&program).0, Ok(false));
    }

    #[test]
    fn test_mixed_combinators_are_malformed() {
        let program = Program::new()
            .uint8(1)
            .token(Token::Equals)
            .uint8(1)
            .token(Token::And)
            .uint8(1)
            .token(Token::Equals)
            .uint8(1)
            .token(Token::Or)
            .uint8(1)
            .token(Token::Equals)
            .uint8(2)
            .build();
        assert_eq!(
            run(&program).0.unwrap_err().reason,
            "AND and OR mixed without GROUP"
        );
    }

    #[test]
    fn test_unbalanced_groups() {
        let open = Program::new()
            .token(Token::Group)
            .uint8(1)
            .token(Token::Equals)
            .uint8(1)
            .build();
        assert_eq!(run(&open).0.unwrap_err().reason, "GROUP without UNGROUP");

        let close = Program::new()
            .uint8(1)
            .token(Token::Equals)
            .uint8(1)
            .token(Token::Ungroup)
            .build();
        assert_eq!(run(&close).0.unwrap_err().reason, "UNGROUP without GROUP");

        let dangling = Program::new()
            .uint8(1)
            .token(Token::Equals)
            .uint8(1)
            .token(Token::And)
            .build();
        assert!(run(&dangling).0.is_err());
        assert!(run(&[]).0.is_err());
    }

    #[test]
    fn test_arithmetic_is_right_associative() {
        // 2 + 3 * 4 == 14
        let program = Program::new()
            .uint64(2)
            .token(Token::Add)
            .uint64(3)
            .token(Token::Mul)
            .uint64(4)
            .token(Token::Equals)
            .uint64(14)
            .build();
        let (result, cost, _) = run(&program);
        assert_eq!(result, Ok(true));
        assert_eq!(cost, 8 * 4 + ADD_COST + MUL_COST);

        // 10 - 4 - 3 == 10 - (4 - 3)
        let program = Program::new()
            .uint64(10)
            .token(Token::Sub)
            .uint64(4)
            .token(Token::Sub)
            .uint64(3)
            .token(Token::Equals)
            .uint64(9)
            .build();
        assert_eq!(run(&program).0, Ok(true));
    }

    #[test]
    fn test_overflow_warns_and_wraps() {
        let program = Program::new()
            .uint64(u64::MAX)
            .token(Token::Add)
            .uint64(1)
            .token(Token::Equals)
            .uint64(0)
            .build();
        let (result, _, warnings) = run(&program);
        assert_eq!(result, Ok(true));
        assert_eq!(warnings, vec![(9, Warning::AddOverflow)]);

        let program = Program::new()
            .uint64(7)
            .token(Token::Div)
            .uint64(0)
            .token(Token::Equals)
            .uint64(0)
            .build();
        let (result, _, warnings) = run(&program);
        assert_eq!(result, Ok(true));
        assert_eq!(warnings[0].1, Warning::DivByZero);

        let program = Program::new()
            .uint8(0)
            .token(Token::Dec)
            .token(Token::Equals)
            .uint64(u64::MAX)
            .build();
        let (result, _, warnings) = run(&program);
        assert_eq!(result, Ok(true));
        assert_eq!(warnings[0].1, Warning::DecOverflow);
    }

    #[test]
    fn test_multi_word_arithmetic_is_malformed() {
        let program = Program::new()
            .uint256(&[1u8; 32])
            .token(Token::Add)
            .uint8(1)
            .token(Token::Equals)
            .uint8(1)
            .build();
        assert_eq!(
            run(&program).0.unwrap_err().reason,
            "arithmetic on multi-word value"
        );
    }

    #[test]
    fn test_contains_with_wildcard() {
        let program = Program::new()
            .bytes(&[1, 2, 3, 4])
            .token(Token::Contains)
            .bytes(&[2, WILDCARD_BYTE, 4])
            .build();
        assert_eq!(run(&program).0, Ok(true));

        let program = Program::new()
            .bytes(&[1, 2, 3, 4])
            .token(Token::Contains)
            .bytes(&[3, 2])
            .build();
        assert_eq!(run(&program).0, Ok(false));
    }

    #[test]
    fn test_context_resolvers() {
        let alice = Address::genesis(b"alice", address::RESERVED);
        let mut genesis = [0u8; 32];
        genesis.copy_from_slice(alice.as_ref());
        let program = Program::new()
            .token(Token::ThisGenesis)
            .token(Token::Equals)
            .uint256(&genesis)
            .token(Token::And)
            .token(Token::CallerTimestamp)
            .token(Token::GreaterThan)
            .token(Token::ThisTimestamp)
            .token(Token::And)
            .prestate_value("balance")
            .token(Token::GreaterEquals)
            .uint64(75)
            .token(Token::And)
            .token(Token::CallerOperations)
            .token(Token::Contains)
            .bytes(&[opcode::CREDIT])
            .build();
        assert_eq!(run(&program).0, Ok(true));

        let missing = Program::new()
            .prestate_value("missing")
            .token(Token::Equals)
            .uint8(0)
            .build();
        assert_eq!(
            run(&missing).0.unwrap_err().reason,
            "field not found in caller pre-state"
        );
    }

    #[test]
    fn test_this_operations_skip_header() {
        let program = Program::new()
            .token(Token::ThisOperations)
            .token(Token::Contains)
            .bytes(&[opcode::DEBIT])
            .build();
        assert_eq!(run(&program).0, Ok(true));
        assert_eq!(this().operations[0], opcode::DEBIT);
    }

    #[test]
    fn test_sha256_and_subdata() {
        let digest = Sha256::hash(b"secret");
        let program = Program::new()
            .bytes(b"secret")
            .token(Token::Sha256)
            .token(Token::Equals)
            .bytes(digest.as_ref())
            .build();
        assert_eq!(run(&program).0, Ok(true));

        let program = Program::new()
            .bytes(b"abcdef")
            .token(Token::Subdata)
            .raw(&[0, 2, 0, 3])
            .token(Token::Equals)
            .string("cde")
            .build();
        assert_eq!(run(&program).0, Ok(true));
    }

    #[test]
    fn test_cost_limit() {
        let mut builder = Program::new().bytes(&[1]);
        for _ in 0..500 {
            builder = builder.token(Token::Sha256);
        }
        let program = builder.token(Token::Equals).bytes(&[1]).build();
        assert_eq!(run(&program).0.unwrap_err().reason, "cost limit exceeded");
    }

    #[test]
    fn test_memory_limit() {
        let mut builder = Program::new().uint8(1);
        for _ in 0..MEMORY_WORDS {
            builder = builder.token(Token::Add).uint8(1);
        }
        let program = builder.token(Token::Equals).uint8(1).build();
        assert_eq!(run(&program).0.unwrap_err().reason, "memory limit exceeded");
    }

    #[test]
    fn test_verify_uses_placeholder_caller() {
        let program = Program::new()
            .prestate_value("balance")
            .token(Token::GreaterThan)
            .uint64(10)
            .token(Token::And)
            .token(Token::CallerOperations)
            .token(Token::Contains)
            .bytes(&[0x02, 0x02])
            .build();
        let report = verify(&program, &this()).unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(report.cost, 8 + 8 + 1024 + 2);

        let broken = Program::new().uint8(1).token(Token::Equals).build();
        assert!(verify(&broken, &this()).is_err());
    }

    struct Fixed(Vec<(Address, Register)>);

    impl Registers for Fixed {
        fn register(&self, address: &Address) -> Result<Option<Register>, EngineError> {
            Ok(self
                .0
                .iter()
                .find(|(candidate, _)| candidate == address)
                .map(|(_, register)| register.clone()))
        }
    }

    struct Broken;

    impl Registers for Broken {
        fn register(&self, _: &Address) -> Result<Option<Register>, EngineError> {
            Err(anyhow::anyhow!("disk unavailable").into())
        }
    }

    fn be(address: &Address) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(address.as_ref());
        bytes
    }

    fn registers() -> (Address, Address, Fixed) {
        let address = Address::from_name("vault", address::ACCOUNT);
        let owner = Address::genesis(b"carol", address::RESERVED);
        let mut account = object::account(&Address::NULL).unwrap();
        account.set_u64("balance", 75).unwrap();
        let register = Register::from_object(owner, 900, &account);
        (address, owner, Fixed(vec![(address, register)]))
    }

    fn run_with(
        program: &[u8],
        registers: &dyn Registers,
    ) -> (Result<bool, EngineError>, u64) {
        let (this, caller) = (this(), caller());
        let mut condition = Condition::new(program, &this, &caller).with_registers(registers);
        let result = condition.evaluate();
        (result, condition.cost())
    }

    #[test]
    fn test_register_value() {
        let (address, _, registers) = registers();
        let program = Program::new()
            .uint256(&be(&address))
            .register_value("balance")
            .token(Token::Equals)
            .uint64(75)
            .build();
        let (result, cost) = run_with(&program, &registers);
        assert!(result.unwrap());
        assert_eq!(cost, 32 + REGISTER_COST + 8);
    }

    #[test]
    fn test_register_metadata() {
        let (address, owner, registers) = registers();
        let program = Program::new()
            .uint256(&be(&address))
            .token(Token::RegisterOwner)
            .token(Token::Equals)
            .uint256(&be(&owner))
            .token(Token::And)
            .uint256(&be(&address))
            .token(Token::RegisterCreated)
            .token(Token::Equals)
            .uint64(900)
            .token(Token::And)
            .uint256(&be(&address))
            .token(Token::RegisterModified)
            .token(Token::LessEquals)
            .token(Token::CallerTimestamp)
            .token(Token::And)
            .uint256(&be(&address))
            .token(Token::RegisterKind)
            .token(Token::Equals)
            .uint8(Kind::Object.tag())
            .build();
        let (result, cost) = run_with(&program, &registers);
        assert!(result.unwrap());
        let pushes = 32 * 5 + 8 + TIMESTAMP_COST + 1;
        let resolvers = REGISTER_OWNER_COST + 2 * REGISTER_TIMESTAMP_COST + REGISTER_KIND_COST;
        assert_eq!(cost, pushes + resolvers);

        let data = Program::new()
            .uint256(&be(&address))
            .token(Token::RegisterData)
            .token(Token::NotEquals)
            .uint8(0)
            .build();
        let length = registers.0[0].1.data.len() as u64;
        let (result, cost) = run_with(&data, &registers);
        assert!(result.unwrap());
        assert_eq!(cost, 32 + REGISTER_COST + length + 1);
    }

    #[test]
    fn test_register_lookup_failures() {
        let (_, _, registers) = registers();
        let unknown = Address::from_name("nowhere", address::ACCOUNT);
        let program = Program::new()
            .uint256(&be(&unknown))
            .token(Token::RegisterOwner)
            .token(Token::Equals)
            .uint8(0)
            .build();
        let err = run_with(&program, &registers).0.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Malformed);
        assert!(err.to_string().contains("register not found"));

        // Without a register source the resolvers are unavailable.
        assert_eq!(
            run(&program).0.unwrap_err().reason,
            "register reads unavailable"
        );

        // Storage failures surface as storage errors.
        let err = run_with(&program, &Broken).0.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);

        let short = Program::new()
            .uint64(1)
            .token(Token::RegisterKind)
            .token(Token::Equals)
            .uint8(0)
            .build();
        assert_eq!(
            run(&short).0.unwrap_err().reason,
            "register address must be 256 bits"
        );
    }

    #[test]
    fn test_register_value_requires_object() {
        let address = Address::from_name("raw", address::RAW);
        let raw = Register::new(Kind::Raw, Address::NULL, 1, b"plain".to_vec());
        let registers = Fixed(vec![(address, raw)]);
        let program = Program::new()
            .uint256(&be(&address))
            .register_value("balance")
            .token(Token::Equals)
            .uint8(0)
            .build();
        let err = run_with(&program, &registers).0.unwrap_err();
        assert!(err.to_string().contains("register is not an object"));
    }

    #[test]
    fn test_verify_register_placeholder() {
        let address = Address::from_name("anything", address::ACCOUNT);
        let program = Program::new()
            .uint256(&be(&address))
            .register_value("balance")
            .token(Token::GreaterThan)
            .uint64(0)
            .build();
        let report = verify(&program, &this()).unwrap();
        assert_eq!(report.cost, 32 + REGISTER_COST + 8);
    }

    #[test]
    fn test_blake3_and_sha512() {
        let program = Program::new()
            .bytes(b"secret")
            .token(Token::Blake3)
            .token(Token::Equals)
            .bytes(Blake3::hash(b"secret").as_ref())
            .build();
        let (result, cost, _) = run(&program);
        assert_eq!(result, Ok(true));
        assert_eq!(cost, 6 + SHA256_COST + 32);

        let program = Program::new()
            .bytes(b"secret")
            .token(Token::Sha512)
            .token(Token::Equals)
            .bytes(&Sha512::digest(b"secret"))
            .build();
        assert_eq!(run(&program).0, Ok(true));
    }

    proptest! {
        #[test]
        fn prop_execution_is_deterministic(program in proptest::collection::vec(any::<u8>(), 0..128)) {
            let (this, caller) = (this(), caller());
            let mut condition = Condition::new(&program, &this, &caller);
            let first = condition.execute();
            let first_cost = condition.cost();
            let first_warnings = condition.warnings().to_vec();
            let second = condition.execute();
            prop_assert_eq!(first, second);
            prop_assert_eq!(first_cost, condition.cost());
            prop_assert_eq!(first_warnings, condition.warnings().to_vec());
        }
    }
}
