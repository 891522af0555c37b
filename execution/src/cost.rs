//! Fee inputs of a contract.
//!
//! The engine only computes costs; charging them belongs to the fee policy of the caller.

use nexus_types::{
    constants::{CONDITION_LIMIT_FREE, DATA_FEE, MIN_DATA_FEE, TX_FEE},
    contract::{Contract, Primitive},
    Kind, Object, ObjectError,
};

/// Flat per-contract fee. Settlement contracts are free.
pub fn tx_cost(contract: &Contract) -> u64 {
    match contract.primitive() {
        Primitive::Claim { .. } | Primitive::Credit { .. } | Primitive::Fee { .. } => 0,
        _ => TX_FEE,
    }
}

/// Fee for creating a register of `kind` holding `data`.
pub fn create_cost(kind: Kind, data: &[u8]) -> Result<u64, ObjectError> {
    if kind == Kind::Object {
        return Ok(Object::parse(data)?.cost());
    }
    Ok((data.len() as u64)
        .saturating_mul(DATA_FEE)
        .max(MIN_DATA_FEE))
}

/// Portion of a condition's evaluation cost above the free tier.
pub fn condition_cost(cost: u64) -> u64 {
    cost.saturating_sub(CONDITION_LIMIT_FREE)
}
