//! Nexus execution engine.
//!
//! This crate contains the deterministic contract execution logic (`Layer`), the Condition VM
//! that authorizes CLAIM, CREDIT and VALIDATE, and the cost accounting that feeds fee policy.
//!
//! ## Determinism requirements
//! - Do not use wall-clock time inside execution; the transaction timestamp is the only clock.
//! - Avoid iteration order of hash-based collections influencing outputs.
//! - A contract built under [`Flags::BUILD`] and replayed under [`Flags::WRITE`],
//!   [`Flags::MEMPOOL`] or [`Flags::BLOCK`] must reproduce the same post-state checksum.
//!
//! ## Storage invariants
//! The engine assumes the [`State`] it reads is not written concurrently for the same key.
//! Changes are buffered in the [`Layer`] until [`Layer::commit`].
//!
//! ## Minimal execution pipeline (example)
//! ```rust,ignore
//! use nexus_execution::{mocks, EngineConfig, Flags, Layer, Memory, State};
//!
//! let mut state = Memory::default();
//! let config = EngineConfig::default();
//! let transaction = mocks::transaction(&state, config, &private, 1_000, vec![contract])?;
//!
//! let mut layer = Layer::new(&state, config, Flags::BLOCK);
//! let outputs = layer.execute(vec![transaction])?;
//! let changes = layer.commit();
//! state.apply(changes)?;
//! ```

use nexus_types::{
    address,
    constants::{
        TRUST_KEY_TIMESPAN, TRUST_KEY_TIMESPAN_TESTNET, TRUST_SCORE_MAX, TRUST_SCORE_MAX_TESTNET,
    },
};

pub mod condition;
pub mod cost;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod error;
mod layer;
mod state;

pub use error::{EngineError, ErrorKind};
pub use layer::{Flags, Layer, Output};
pub use state::{nonce, PrepareError, State, Status};

#[cfg(any(test, feature = "mocks"))]
pub use state::Memory;

/// Network a node participates in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Tag of the genesis identities signing on this network.
    pub const fn genesis_tag(self) -> u8 {
        match self {
            Self::Mainnet => address::RESERVED,
            Self::Testnet => address::RESERVED2,
        }
    }

    /// Interval after which trust starts to decay.
    pub const fn trust_timespan(self) -> u64 {
        match self {
            Self::Mainnet => TRUST_KEY_TIMESPAN,
            Self::Testnet => TRUST_KEY_TIMESPAN_TESTNET,
        }
    }

    pub const fn trust_max(self) -> u64 {
        match self {
            Self::Mainnet => TRUST_SCORE_MAX,
            Self::Testnet => TRUST_SCORE_MAX_TESTNET,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub network: Network,
    /// Light clients do not index events for recipients.
    pub client_mode: bool,
}
