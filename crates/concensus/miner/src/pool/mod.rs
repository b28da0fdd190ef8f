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

//! Transaction Pool
//!
//! Candidate transactions live in one of three buckets plus a waste basket
//! of recently rejected or dropped items:
//!
//! - `Pending`: known but blocked, by a nonce gap or by unaffordable fees;
//! - `Staged`: ready for inclusion, nonce-contiguous and affordable;
//! - `Packed`: chosen for the next candidate block by the packer.
//!
//! Every head movement, admission or option change triggers a bucket reorg
//! which re-classifies items without a full rescan.

use std::{sync::Arc, time::Instant};

use ethereum_types::{Address, H256, U256};
use types::transaction::{self, SignedTransaction};

mod listener;
mod packer;
mod queue;

pub mod client;

#[cfg(test)]
mod tests;

pub use self::{
    listener::{Listener, Logger, NoopListener},
    packer::{PackedBlock, PackerOptions},
    queue::{QueueStatus, TransactionQueue},
};

/// The bucket a live pool item is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Blocked: nonce gap or presently unaffordable.
    Pending,
    /// Ready: nonce-contiguous from the account nonce and affordable.
    Staged,
    /// Selected for the next candidate block.
    Packed,
}

/// Why an item left the live buckets for the waste basket.
#[derive(Debug, Clone, PartialEq)]
pub enum RemovalReason {
    /// Rejected at admission.
    Rejected(transaction::Error),
    /// Replaced by a same-sender same-nonce item with a bumped price.
    Replaced(H256),
    /// Outlived the configured lifetime.
    Expired,
    /// Nonce already used on chain.
    Stale,
    /// Included in a newly enacted block.
    Mined,
    /// Pushed out by a better transaction when the pool was full.
    Crowded,
}

/// Options for the transaction pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Maximal number of live items.
    pub max_count: usize,
    /// Maximal number of entries kept in the waste basket.
    pub max_waste: usize,
    /// Required price bump (percent) to replace a same-nonce transaction.
    pub price_bump: u32,
    /// How long an item may sit in the pool before expiry, in seconds.
    pub lifetime: u64,
    /// Whether expiry may also evict `Packed` items.
    pub auto_evict_packed: bool,
    /// Minimal gas price of a legacy transaction before the London fork.
    pub pre_london_min_price: U256,
    /// Minimal effective tip of a dynamic-fee transaction.
    pub min_tip_1559: U256,
    /// Minimal fee cap of a dynamic-fee transaction.
    pub min_fee_1559: U256,
    /// Packing policy.
    pub packer: PackerOptions,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_count: 8_192,
            max_waste: 1_024,
            price_bump: 10,
            lifetime: 30 * 60,
            auto_evict_packed: false,
            pre_london_min_price: U256::zero(),
            min_tip_1559: U256::zero(),
            min_fee_1559: U256::zero(),
            packer: PackerOptions::default(),
        }
    }
}

/// A transaction verified at admission and kept by the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    transaction: SignedTransaction,
    hash: H256,
    sender: Address,
    received_at: Instant,
    insertion_id: u64,
}

impl VerifiedTransaction {
    pub(crate) fn new(transaction: SignedTransaction, insertion_id: u64) -> Self {
        let hash = transaction.hash();
        let sender = transaction.sender();
        VerifiedTransaction {
            transaction,
            hash,
            sender,
            received_at: Instant::now(),
            insertion_id,
        }
    }

    /// The pool id of this item (transaction hash).
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Recovered sender.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Transaction nonce.
    pub fn nonce(&self) -> U256 {
        self.transaction.tx().nonce
    }

    /// The wrapped signed transaction.
    pub fn signed(&self) -> &SignedTransaction {
        &self.transaction
    }

    /// When the item entered the pool.
    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    pub(crate) fn insertion_id(&self) -> u64 {
        self.insertion_id
    }

    /// Maximal amount the sender may be charged:
    /// `gas_limit * fee cap + value`.
    pub fn worst_case_cost(&self) -> U256 {
        let tx = self.transaction.tx();
        tx.gas
            .saturating_mul(self.transaction.max_fee_per_gas())
            .saturating_add(tx.value)
    }

    /// The tip per gas this item pays the author given the next base fee.
    pub fn effective_tip(&self, base_fee: Option<U256>) -> U256 {
        self.transaction.effective_priority_fee(base_fee)
    }
}

/// Shared handle to a pool item.
pub type SharedTransaction = Arc<VerifiedTransaction>;
