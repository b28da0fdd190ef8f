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

//! Chain access used by the transaction pool.
//!
//! The pool holds a read-only handle to the chain; the chain never calls back
//! into the pool. Candidate block assembly additionally needs a VM context
//! that can execute transactions atop a forked state with savepoints.

use ethereum_types::{Address, U256};
use types::{
    receipt::TypedReceipt,
    transaction::SignedTransaction,
};

/// Read-only chain state queried during admission and classification.
pub trait ChainClient: Sync + Send {
    /// The nonce of the account at the current chain head.
    fn account_nonce(&self, address: &Address) -> U256;

    /// The balance of the account at the current chain head.
    fn account_balance(&self, address: &Address) -> U256;

    /// The base fee the next block will charge, `None` before the London fork.
    fn next_base_fee(&self) -> Option<U256>;

    /// The gas target of the next candidate block.
    fn target_gas_limit(&self) -> U256;

    /// The hard gas cap of the next candidate block.
    fn max_gas_limit(&self) -> U256;

    /// The id transactions must be replay protected with, if any.
    fn chain_id(&self) -> Option<u64>;

    /// Whether Istanbul gas costs apply at the next block.
    fn is_istanbul(&self) -> bool;

    /// Whether typed (EIP1559) transactions are accepted at the next block.
    fn is_london(&self) -> bool;
}

/// Outcome of executing one transaction while packing.
#[derive(Debug, Clone)]
pub struct PackedOutcome {
    /// Gas used by this transaction alone.
    pub gas_used: U256,
    /// The receipt, with the cumulative gas the context tracked.
    pub receipt: TypedReceipt,
}

/// Error raised by the packing context for an inexecutable transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum PackError {
    /// The transaction cannot be executed in the current state.
    Inexecutable(String),
    /// Internal VM failure; packing is aborted.
    Vm(String),
}

/// A VM execution context atop a forked state, used to build the `Packed`
/// bucket. Implementations execute the transaction, credit the author the
/// effective tip and apply self-destruct/EIP-158 cleanup before returning.
pub trait PackingContext {
    /// Open a savepoint covering the next `execute` call.
    fn checkpoint(&mut self);

    /// Roll the state back to the last savepoint.
    fn revert_checkpoint(&mut self);

    /// Merge the last savepoint into its parent.
    fn discard_checkpoint(&mut self);

    /// Execute the transaction against the forked state.
    fn execute(&mut self, tx: &SignedTransaction) -> Result<PackedOutcome, PackError>;
}
