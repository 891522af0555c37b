use crate::{nonce, EngineConfig, EngineError, Flags, Layer, Memory, Network, Output, State};
use anyhow::Result;
use commonware_cryptography::{
    ed25519::{PrivateKey, PublicKey},
    Signer,
};
use commonware_math::algebra::Random;
use nexus_types::{
    contract::Contract,
    execution::{Key, Transaction, Value},
    Address, Object, Register,
};
use rand::{rngs::StdRng, SeedableRng};

/// Creates an account keypair for Ed25519 signatures used by users
pub fn create_account_keypair(seed: u64) -> (PrivateKey, PublicKey) {
    let mut rng = StdRng::seed_from_u64(seed);
    let private = PrivateKey::random(&mut rng);
    let public = private.public_key();
    (private, public)
}

/// Signature chain identity of `public` on `network`.
pub fn genesis(public: &PublicKey, network: Network) -> Address {
    Address::genesis(public.as_ref(), network.genesis_tag())
}

/// Writes a register directly into storage, bypassing CREATE.
pub fn seed_register(state: &mut Memory, address: Address, register: Register) -> Result<()> {
    state.insert(Key::Register(address), Value::Register(register))
}

/// Seeds an object register owned by `owner`.
pub fn seed_object(
    state: &mut Memory,
    address: Address,
    owner: Address,
    timestamp: u64,
    object: &Object,
) -> Result<()> {
    seed_register(state, address, Register::from_object(owner, timestamp, object))
}

/// Builds `contracts` against `state` and signs them with the signer's next nonce.
pub fn transaction<S: State>(
    state: &S,
    config: EngineConfig,
    private: &PrivateKey,
    timestamp: u64,
    contracts: Vec<Contract>,
) -> Result<Transaction, EngineError> {
    let public = private.public_key();
    let nonce = nonce(state, &public)?;
    let caller = genesis(&public, config.network);

    let mut layer = Layer::new(state, config, Flags::BUILD);
    let contracts = layer.build(caller, timestamp, contracts)?;
    Ok(Transaction::sign(private, timestamp, nonce, contracts))
}

/// Executes `transactions` as a block and applies the result to `state`.
pub fn execute(
    state: &mut Memory,
    config: EngineConfig,
    transactions: Vec<Transaction>,
) -> Result<Vec<Output>> {
    let (outputs, changes) = {
        let mut layer = Layer::new(&*state, config, Flags::BLOCK);
        let outputs = layer.execute(transactions)?;
        (outputs, layer.commit())
    };
    state.apply(changes)?;
    Ok(outputs)
}
