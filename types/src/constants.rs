//! Network-wide constants. Changing any value here is a consensus change.

/// Current register encoding version.
pub const REGISTER_VERSION: u8 = 1;

/// Largest payload accepted by CREATE.
pub const MAX_REGISTER_SIZE: usize = 1024;

/// Largest total payload an APPEND register may grow to.
pub const MAX_APPEND_SIZE: usize = 4096;

/// Maximum contracts in a single transaction.
pub const MAX_TRANSACTION_CONTRACTS: usize = 100;

/// Maximum encoded length of a condition program.
pub const MAX_CONDITION_SIZE: usize = 4096;

/// Name of the global namespace for NAME registers.
pub const GLOBAL_NAMESPACE: &str = "global";

// Fees
pub const TX_FEE: u64 = 10_000;
pub const MIN_DATA_FEE: u64 = 10_000;
pub const DATA_FEE: u64 = 100;
pub const ACCOUNT_FEE: u64 = 0;
pub const TOKEN_FEE: u64 = 1_000_000;
pub const NAME_FEE: u64 = 1_000_000;
pub const GLOBAL_NAME_FEE: u64 = 2_000_000_000;
pub const NAMESPACE_FEE: u64 = 1_000_000_000;

/// Condition cost below this threshold is not charged.
pub const CONDITION_LIMIT_FREE: u64 = 512;

/// Evaluation is aborted once a condition exceeds this cost.
pub const MAX_CONDITION_COST: u64 = 1_000_000;

// Trust
pub const TRUST_KEY_TIMESPAN: u64 = 60 * 60 * 24 * 3;
pub const TRUST_KEY_TIMESPAN_TESTNET: u64 = 60 * 60 * 3;
pub const TRUST_SCORE_MAX: u64 = 60 * 60 * 24 * 28 * 13;
pub const TRUST_SCORE_MAX_TESTNET: u64 = 60 * 60 * 28 * 13;
