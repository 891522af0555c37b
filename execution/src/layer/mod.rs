use anyhow::{anyhow, Context as _, Result};
use commonware_cryptography::{sha256::Digest, Digestible};
use nexus_types::{
    constants::{MAX_APPEND_SIZE, MAX_REGISTER_SIZE},
    contract::{Contract, Operation, Primitive},
    execution::{Key, Transaction, Value},
    object::Standard,
    Address, Kind, Object, Register,
};
use std::{collections::BTreeMap, ops::BitOr};
use tracing::{debug, trace, warn};

use crate::{
    condition::{self, Bound, Condition, Registers},
    cost,
    error::{consistency, invariant, malformed, unauthorized, EngineError, ErrorKind},
    state::{validate_and_increment_nonce, PrepareError, State, Status},
    EngineConfig,
};

mod handlers;


/// Execution mode bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    /// Capture the live register into the contract.
    pub const PRESTATE: Self = Self(1 << 0);
    /// Record the post-state checksum into the contract.
    pub const POSTSTATE: Self = Self(1 << 1);
    pub const WRITE: Self = Self(1 << 2);
    pub const MEMPOOL: Self = Self(1 << 3);
    pub const BLOCK: Self = Self(1 << 4);

    /// Transaction building: capture without verifying.
    pub const BUILD: Self = Self(Self::PRESTATE.0 | Self::POSTSTATE.0);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Replay modes verify the captured pre-state and post-state checksum.
    pub const fn is_write(self) -> bool {
        self.0 & (Self::WRITE.0 | Self::MEMPOOL.0 | Self::BLOCK.0) != 0
    }
}

impl BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Result of executing one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    Accepted {
        txid: Digest,
        cost: u64,
    },
    /// First failing contract of the transaction. Nothing but the nonce was kept.
    Rejected {
        txid: Digest,
        contract: u32,
        kind: ErrorKind,
        reason: String,
    },
}

/// A contract being executed, with the identity and time of its transaction.
pub(crate) struct Context<'c> {
    caller: Address,
    timestamp: u64,
    txid: Digest,
    index: u32,
    contract: &'c mut Contract,
}

/// A contract of an executed transaction.
pub(crate) struct Referenced {
    contract: Contract,
    caller: Address,
    timestamp: u64,
}

pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,
    /// Changes of the transaction being executed.
    staged: BTreeMap<Key, Status>,

    config: EngineConfig,
    flags: Flags,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(state: &'a S, config: EngineConfig, flags: Flags) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),
            staged: BTreeMap::new(),

            config,
            flags,
        }
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    fn get(&self, key: &Key) -> Result<Option<Value>> {
        for overlay in [&self.staged, &self.pending] {
            match overlay.get(key) {
                Some(Status::Update(value)) => return Ok(Some(value.clone())),
                Some(Status::Delete) => return Ok(None),
                None => {}
            }
        }
        self.state.get(key)
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.staged.insert(key, Status::Update(value));
    }

    fn delete(&mut self, key: Key) {
        self.staged.insert(key, Status::Delete);
    }

    fn prepare(&mut self, transaction: &Transaction) -> Result<(), PrepareError> {
        let key = Key::Nonce(transaction.public.clone());
        let current = match self.get(&key).map_err(PrepareError::State)? {
            Some(Value::Nonce(nonce)) => nonce,
            _ => 0,
        };
        let next = validate_and_increment_nonce(current, transaction.nonce)?;

        // Consumed even if a contract is rejected.
        self.pending.insert(key, Status::Update(Value::Nonce(next)));
        Ok(())
    }

    /// Execute `transactions` in order.
    ///
    /// Transactions with a stale or future nonce are dropped without output. Every other
    /// transaction yields an [Output]; only a storage failure aborts the batch.
    pub fn execute(&mut self, transactions: Vec<Transaction>) -> Result<Vec<Output>> {
        let mut outputs = Vec::with_capacity(transactions.len());

        for tx in transactions {
            match self.prepare(&tx) {
                Ok(()) => {}
                Err(PrepareError::NonceMismatch { expected, got }) => {
                    debug!(
                        public = ?tx.public,
                        expected,
                        got,
                        "nonce mismatch; dropping transaction"
                    );
                    continue;
                }
                Err(PrepareError::State(err)) => {
                    return Err(err).context("state error during prepare");
                }
            }

            let txid = tx.digest();
            let caller = tx.genesis(self.config.network.genesis_tag());
            let mut contracts = tx.contracts.clone();
            match self.apply(caller, tx.timestamp, txid, &mut contracts) {
                Ok(cost) => {
                    self.pending.append(&mut self.staged);
                    self.pending
                        .insert(Key::Transaction(txid), Status::Update(Value::Transaction(tx)));
                    trace!(?txid, cost, "transaction accepted");
                    outputs.push(Output::Accepted { txid, cost });
                }
                Err((index, err)) => {
                    self.staged.clear();
                    let kind = err.kind();
                    match err {
                        EngineError::Storage(err) => {
                            return Err(err.context(format!("storage failure in contract {index}")));
                        }
                        err if kind == ErrorKind::Consistency => {
                            warn!(?txid, contract = index, reason = %err, "consistency failure");
                            outputs.push(rejected(txid, index, kind, err));
                        }
                        err => {
                            debug!(?txid, contract = index, %kind, reason = %err, "contract rejected");
                            outputs.push(rejected(txid, index, kind, err));
                        }
                    }
                }
            }
        }

        Ok(outputs)
    }

    /// Fill the pre-state and post-state checksum of each contract, as a transaction author does
    /// before signing. Nothing is kept in the layer.
    pub fn build(
        &mut self,
        caller: Address,
        timestamp: u64,
        mut contracts: Vec<Contract>,
    ) -> Result<Vec<Contract>, EngineError> {
        if !self.flags.contains(Flags::BUILD) {
            return Err(malformed("layer is not in build mode"));
        }
        // The transaction id is unknown until the contracts are final.
        let placeholder = Digest::from([0u8; 32]);
        let result = self.apply(caller, timestamp, placeholder, &mut contracts);
        self.staged.clear();
        result.map(|_| contracts).map_err(|(_, err)| err)
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }

    /// Run every contract in order, stopping at the first failure.
    fn apply(
        &mut self,
        caller: Address,
        timestamp: u64,
        txid: Digest,
        contracts: &mut [Contract],
    ) -> Result<u64, (u32, EngineError)> {
        let mut total = 0u64;
        for (index, contract) in contracts.iter_mut().enumerate() {
            let index = index as u32;
            let fail = move |err| (index, err);

            let mut ctx = Context {
                caller,
                timestamp,
                txid,
                index,
                contract,
            };
            self.verify(&ctx).map_err(fail)?;
            self.execute_contract(&mut ctx).map_err(fail)?;

            let cost = self.cost(&caller, timestamp, &*ctx.contract).map_err(fail)?;
            total = total.saturating_add(cost);
        }
        Ok(total)
    }

    /// Checks that need no storage.
    fn verify(&self, ctx: &Context<'_>) -> Result<(), EngineError> {
        let contract = &*ctx.contract;
        let conditional = matches!(contract.operation, Operation::Condition(_));
        if conditional != contract.has_conditions() {
            return Err(malformed(
                "conditions must accompany a CONDITION operation",
            ));
        }
        if conditional {
            let this = Bound::new(contract, ctx.caller, ctx.timestamp);
            condition::verify(&contract.conditions, &this)?;
        }

        if self.flags.is_write() {
            if contract.primitive().is_stateful() != contract.prestate.is_some() {
                return Err(malformed("pre-state does not match operation"));
            }
            if contract.postcheck.is_none() {
                return Err(malformed("missing post-state checksum"));
            }
        }
        Ok(())
    }

    fn execute_contract(&mut self, ctx: &mut Context<'_>) -> Result<(), EngineError> {
        match ctx.contract.primitive().clone() {
            Primitive::Write { address, data } => self.handle_write(ctx, address, &data)?,
            Primitive::Append { address, data } => self.handle_append(ctx, address, &data)?,
            Primitive::Create {
                address,
                kind,
                data,
            } => self.handle_create(ctx, address, kind, &data)?,
            Primitive::Transfer { address, recipient } => {
                self.handle_transfer(ctx, address, recipient)?
            }
            Primitive::Claim {
                txid,
                contract,
                address,
            } => self.handle_claim(ctx, txid, contract, address)?,
            Primitive::Trust { reward } => self.handle_trust(ctx, reward)?,
            Primitive::Genesis { address } => self.handle_genesis(ctx, address)?,
            Primitive::Debit { from, to, amount } => self.handle_debit(ctx, from, to, amount)?,
            Primitive::Credit {
                txid,
                contract,
                to,
                proof,
                amount,
            } => self.handle_credit(ctx, txid, contract, to, proof, amount)?,
            Primitive::Fee { account, amount } => self.handle_fee(ctx, account, amount)?,
            Primitive::Stake { amount } => self.handle_stake(ctx, amount)?,
            Primitive::Unstake { amount } => self.handle_unstake(ctx, amount)?,
        }

        // Evaluated last so the caller pre-state is available.
        if let Operation::Validate { txid, contract, .. } = ctx.contract.operation {
            let referenced = self.read_contract(&txid, contract)?;
            match self.evaluate(&referenced, ctx)? {
                Some(true) => {}
                Some(false) => return Err(unauthorized("validated condition does not hold")),
                None => return Err(invariant("validated contract has no conditions")),
            }
        }
        Ok(())
    }

    /// Fee input of `contract`: its flat fee, the creation fee and the conditions it evaluates.
    ///
    /// A CONDITION wrapper is free; its program is paid for by whoever evaluates it.
    pub fn cost(
        &self,
        caller: &Address,
        timestamp: u64,
        contract: &Contract,
    ) -> Result<u64, EngineError> {
        let mut total = cost::tx_cost(contract);
        if let Operation::Validate {
            txid,
            contract: index,
            ..
        } = &contract.operation
        {
            let cost = self.referenced_cost(txid, *index, caller, timestamp, contract)?;
            total = total.saturating_add(cost);
        }

        match contract.primitive() {
            Primitive::Create { kind, data, .. } => {
                total = total.saturating_add(cost::create_cost(*kind, data)?);
            }
            Primitive::Claim {
                txid,
                contract: index,
                ..
            }
            | Primitive::Credit {
                txid,
                contract: index,
                ..
            } => {
                let cost = self.referenced_cost(txid, *index, caller, timestamp, contract)?;
                total = total.saturating_add(cost);
            }
            _ => {}
        }
        Ok(total)
    }

    fn referenced_cost(
        &self,
        txid: &Digest,
        index: u32,
        caller: &Address,
        timestamp: u64,
        contract: &Contract,
    ) -> Result<u64, EngineError> {
        let referenced = self.read_contract(txid, index)?;
        if !referenced.contract.has_conditions() {
            return Ok(0);
        }
        let this = Bound::new(&referenced.contract, referenced.caller, referenced.timestamp);
        let bound = Bound::new(contract, *caller, timestamp);
        let mut condition =
            Condition::new(&referenced.contract.conditions, &this, &bound).with_registers(self);
        condition.evaluate()?;
        Ok(cost::condition_cost(condition.cost()))
    }

    /// Evaluate the condition of `referenced` with the current contract as caller.
    fn evaluate(
        &self,
        referenced: &Referenced,
        ctx: &Context<'_>,
    ) -> Result<Option<bool>, EngineError> {
        if !referenced.contract.has_conditions() {
            return Ok(None);
        }
        let this = Bound::new(&referenced.contract, referenced.caller, referenced.timestamp);
        let caller = Bound::new(&*ctx.contract, ctx.caller, ctx.timestamp);
        let mut condition =
            Condition::new(&referenced.contract.conditions, &this, &caller).with_registers(self);
        Ok(Some(condition.evaluate()?))
    }

    /// Load the register a stateful contract operates on.
    fn load_prestate(
        &mut self,
        ctx: &mut Context<'_>,
        address: &Address,
    ) -> Result<Register, EngineError> {
        let register = self
            .read_register(address)?
            .ok_or_else(|| invariant(format!("register {address} does not exist")))?;

        if self.flags.contains(Flags::PRESTATE) {
            ctx.contract.prestate = Some(register.clone());
        } else if self.flags.is_write() {
            match &ctx.contract.prestate {
                Some(prestate) if *prestate == register => {}
                Some(_) => {
                    warn!(txid = ?ctx.txid, contract = ctx.index, %address, "pre-state mismatch");
                    return Err(consistency(format!("pre-state of {address} is stale")));
                }
                None => return Err(malformed("missing pre-state")),
            }
        }
        Ok(register)
    }

    /// Seal and write the post-state of the current contract.
    fn commit_poststate(
        &mut self,
        ctx: &mut Context<'_>,
        address: &Address,
        mut register: Register,
    ) -> Result<(), EngineError> {
        register.modified = ctx.timestamp;
        register.set_checksum();

        let limit = match register.kind {
            Kind::Append => MAX_APPEND_SIZE,
            _ => MAX_REGISTER_SIZE,
        };
        if register.data.len() > limit {
            return Err(invariant(format!("register data exceeds {limit} bytes")));
        }
        if register.is_object() {
            register.object()?;
        }
        if !register.is_valid() {
            return Err(invariant("post-state failed validation"));
        }

        if self.flags.contains(Flags::POSTSTATE) {
            ctx.contract.postcheck = Some(register.checksum);
        } else if self.flags.is_write() {
            match ctx.contract.postcheck {
                Some(checksum) if checksum == register.checksum => {}
                Some(checksum) => {
                    warn!(
                        txid = ?ctx.txid,
                        contract = ctx.index,
                        %address,
                        claimed = checksum,
                        computed = register.checksum,
                        "post-state checksum mismatch"
                    );
                    return Err(consistency(format!(
                        "post-state checksum of {address} does not match"
                    )));
                }
                None => return Err(malformed("missing post-state checksum")),
            }
        }

        self.write_register(address, register);
        Ok(())
    }

    fn read_register(&self, address: &Address) -> Result<Option<Register>, EngineError> {
        match self.get(&Key::Register(*address))? {
            Some(Value::Register(register)) => {
                if !register.is_valid() {
                    warn!(%address, "stored register failed checksum");
                    return Err(consistency(format!("stored register {address} is corrupt")));
                }
                Ok(Some(register))
            }
            Some(_) => Err(anyhow!("unexpected value stored for register {address}").into()),
            None => Ok(None),
        }
    }

    fn exists(&self, address: &Address) -> Result<bool, EngineError> {
        Ok(self.get(&Key::Register(*address))?.is_some())
    }

    fn write_register(&mut self, address: &Address, register: Register) {
        self.insert(Key::Register(*address), Value::Register(register));
    }

    fn read_contract(&self, txid: &Digest, index: u32) -> Result<Referenced, EngineError> {
        let Some(Value::Transaction(tx)) = self.get(&Key::Transaction(*txid))? else {
            return Err(invariant(format!("transaction {txid:?} not found")));
        };
        let caller = tx.genesis(self.config.network.genesis_tag());
        let timestamp = tx.timestamp;
        let contract = tx
            .contracts
            .into_iter()
            .nth(index as usize)
            .ok_or_else(|| invariant(format!("contract {index} of {txid:?} not found")))?;
        Ok(Referenced {
            contract,
            caller,
            timestamp,
        })
    }

    fn has_trust(&self, genesis: &Address) -> Result<bool, EngineError> {
        Ok(self.get(&Key::Trust(*genesis))?.is_some())
    }

    fn index_trust(&mut self, genesis: &Address, account: &Address) {
        self.insert(Key::Trust(*genesis), Value::Trust(*account));
    }

    fn has_proof(&self, proof: &Address, txid: &Digest, contract: u32) -> Result<bool, EngineError> {
        let key = Key::Proof {
            proof: *proof,
            txid: *txid,
            contract,
        };
        Ok(self.get(&key)?.is_some())
    }

    fn write_proof(&mut self, proof: &Address, txid: &Digest, contract: u32) {
        let key = Key::Proof {
            proof: *proof,
            txid: *txid,
            contract,
        };
        self.insert(key, Value::Proof);
    }

    fn event_count(&self, recipient: &Address) -> Result<u64, EngineError> {
        match self.get(&Key::EventCount(*recipient))? {
            Some(Value::Count(count)) => Ok(count),
            Some(_) => Err(anyhow!("unexpected value stored for events of {recipient}").into()),
            None => Ok(0),
        }
    }

    /// Index `txid` for `recipient` to discover.
    fn write_event(&mut self, recipient: &Address, txid: Digest) -> Result<(), EngineError> {
        if self.config.client_mode {
            return Ok(());
        }
        let count = self.event_count(recipient)?;
        self.insert(
            Key::Event {
                recipient: *recipient,
                index: count,
            },
            Value::Event(txid),
        );
        self.insert(Key::EventCount(*recipient), Value::Count(count + 1));
        Ok(())
    }

    /// Drop the latest event of `recipient`, which must be `txid`.
    fn remove_event(&mut self, recipient: &Address, txid: &Digest) -> Result<(), EngineError> {
        if self.config.client_mode {
            return Ok(());
        }
        let count = self.event_count(recipient)?;
        let Some(index) = count.checked_sub(1) else {
            return Err(consistency(format!("no events indexed for {recipient}")));
        };
        let key = Key::Event {
            recipient: *recipient,
            index,
        };
        match self.get(&key)? {
            Some(Value::Event(latest)) if latest == *txid => {}
            _ => {
                return Err(consistency(format!(
                    "latest event of {recipient} is not {txid:?}"
                )))
            }
        }
        self.delete(key);
        match index {
            0 => self.delete(Key::EventCount(*recipient)),
            _ => self.insert(Key::EventCount(*recipient), Value::Count(index)),
        }
        Ok(())
    }
}

impl<S: State> Registers for Layer<'_, S> {
    fn register(&self, address: &Address) -> Result<Option<Register>, EngineError> {
        self.read_register(address)
    }
}

fn rejected(txid: Digest, contract: u32, kind: ErrorKind, err: EngineError) -> Output {
    Output::Rejected {
        txid,
        contract,
        kind,
        reason: err.to_string(),
    }
}

fn require_owner(register: &Register, caller: &Address) -> Result<(), EngineError> {
    if register.owner != *caller {
        return Err(unauthorized(format!(
            "{caller} does not own register (owner {})",
            register.owner
        )));
    }
    Ok(())
}

/// Parse an account (or token or trust account) payload.
fn as_account(register: &Register) -> Result<Object, EngineError> {
    let object = register.object()?;
    if object.base() != Standard::Account {
        return Err(invariant("register is not an account"));
    }
    Ok(object)
}
