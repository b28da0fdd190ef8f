// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Ferron.

// Ferron is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Ferron is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Ferron.  If not, see <http://www.gnu.org/licenses/>.

//! The state machine surrounding transaction execution.
//!
//! The EVM proper is an external collaborator; it enters through the
//! [`Executive`] trait. The `Machine` carries the chain parameters and the
//! cheap validity checks that do not need state.

use std::{error, fmt};

use ethereum_types::{Address, U256};
use types::{
    log_entry::LogEntry,
    transaction::{self, SignedTransaction, TypedTxId, UnverifiedTransaction},
    BlockNumber,
};

use spec::CommonParams;
use state::StateDb;

/// Information concerning the execution environment for a transaction.
#[derive(Debug, Clone, Default)]
pub struct EnvInfo {
    /// The block number.
    pub number: BlockNumber,
    /// The block author.
    pub author: Address,
    /// The block timestamp.
    pub timestamp: u64,
    /// The block difficulty.
    pub difficulty: U256,
    /// The block gas limit.
    pub gas_limit: U256,
    /// The block base fee, post London.
    pub base_fee: Option<U256>,
}

/// The result the VM reports for one applied transaction.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Gas used by this transaction alone.
    pub gas_used: U256,
    /// Whether execution succeeded (EIP658 status).
    pub success: bool,
    /// Logs produced.
    pub logs: Vec<LogEntry>,
    /// Accounts touched, candidates for EIP158 cleanup.
    pub touched: Vec<Address>,
}

/// Transaction execution errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// The sender cannot afford the transaction.
    NotEnoughCash {
        /// The required amount.
        required: U256,
        /// The available amount.
        got: U256,
    },
    /// The transaction nonce does not match the account.
    InvalidNonce {
        /// The account nonce.
        expected: U256,
        /// The transaction nonce.
        got: U256,
    },
    /// The block has no room for the transaction.
    BlockGasLimitReached {
        /// The block gas limit.
        gas_limit: U256,
        /// Gas already used.
        gas_used: U256,
        /// The transaction gas requirement.
        gas: U256,
    },
    /// The VM failed internally; the node cannot continue.
    Internal(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ExecutionError::*;
        let msg = match *self {
            NotEnoughCash { required, got } => format!(
                "Cost of transaction exceeds sender balance. {} is required but the sender only has {}",
                required, got
            ),
            InvalidNonce { expected, got } => {
                format!("Invalid transaction nonce: expected {}, found {}", expected, got)
            }
            BlockGasLimitReached {
                gas_limit,
                gas_used,
                gas,
            } => format!(
                "Block gas limit reached. The limit is {}, {} has already been used, and {} more is required",
                gas_limit, gas_used, gas
            ),
            Internal(ref msg) => format!("Internal execution error: {}", msg),
        };

        f.write_fmt(format_args!("Transaction execution error ({})", msg))
    }
}

impl error::Error for ExecutionError {
    fn description(&self) -> &str {
        "Transaction execution error"
    }
}

/// The external VM: applies one transaction to the state.
///
/// Implementations transfer value, charge gas, bump the sender nonce and
/// report touched accounts; the pipeline owns receipts, rewards and cleanup.
pub trait Executive: Send + Sync {
    /// Apply `tx` to `state` in the environment `env`.
    fn apply(
        &self,
        state: &mut StateDb,
        env: &EnvInfo,
        tx: &SignedTransaction,
    ) -> Result<ApplyOutcome, ExecutionError>;
}

/// An ethereum-like state machine.
#[derive(Debug, Clone)]
pub struct Machine {
    params: CommonParams,
}

impl Machine {
    /// Create a machine with the given chain parameters.
    pub fn new(params: CommonParams) -> Self {
        Machine { params }
    }

    /// The chain parameters.
    pub fn params(&self) -> &CommonParams {
        &self.params
    }

    /// The base fee of the block following `parent`.
    pub fn calc_base_fee(&self, parent: &types::header::Header) -> Option<U256> {
        self.params.calc_base_fee(parent)
    }

    /// Cheap transaction checks that need no state: replay protection,
    /// type-for-fork, fee-cap sanity and intrinsic gas.
    pub fn verify_transaction_basic(
        &self,
        t: &UnverifiedTransaction,
        at_block: BlockNumber,
    ) -> Result<(), transaction::Error> {
        t.verify_basic(Some(self.params.chain_id))?;

        if t.tx_type() != TypedTxId::Legacy && !self.params.is_london(at_block) {
            return Err(transaction::Error::TransactionTypeNotEnabled);
        }

        if t.max_fee_per_gas() < t.max_priority_fee_per_gas() {
            return Err(transaction::Error::PriorityFeeExceedsMaxFee {
                max_fee: t.max_fee_per_gas(),
                priority_fee: t.max_priority_fee_per_gas(),
            });
        }

        let intrinsic = U256::from(t.intrinsic_gas(self.params.is_istanbul(at_block)));
        if intrinsic > t.tx().gas {
            return Err(transaction::Error::InsufficientGas {
                minimal: intrinsic,
                got: t.tx().gas,
            });
        }

        Ok(())
    }
}
