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

//! The packer rebuilds the `Packed` bucket by executing staged candidates
//! through the VM atop a forked state.

use ethereum_types::{H256, U256};
use types::{
    receipt::TypedReceipt,
    transaction::TX_GAS,
    trie_root::ordered_trie_root,
};

use pool::{
    client::{PackError, PackingContext},
    SharedTransaction,
};

/// Packing policy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackerOptions {
    /// Keep trying other senders after an item did not fit the remaining gas.
    pub try_harder: bool,
    /// Tolerate items up to the hard block gas cap instead of treating the
    /// gas target as the limit.
    pub trg_gas_limit_max: bool,
}

impl Default for PackerOptions {
    fn default() -> Self {
        PackerOptions {
            try_harder: false,
            trg_gas_limit_max: false,
        }
    }
}

/// The product of a packing run: the candidate block content.
#[derive(Debug, Clone, Default)]
pub struct PackedBlock {
    /// Selected transactions, in execution order.
    pub transactions: Vec<SharedTransaction>,
    /// Receipts of the selected transactions.
    pub receipts: Vec<TypedReceipt>,
    /// Total gas used by the selection.
    pub gas_used: U256,
    /// Root of the ordered transactions trie.
    pub transactions_root: H256,
    /// Root of the ordered receipts trie.
    pub receipts_root: H256,
    /// Total author reward from effective tips.
    pub reward: U256,
}

pub(crate) struct PackingPolicy {
    options: PackerOptions,
    target: U256,
    max: U256,
}

impl PackingPolicy {
    pub(crate) fn new(options: PackerOptions, target: U256, max: U256) -> Self {
        PackingPolicy {
            options,
            target,
            max,
        }
    }

    fn cap(&self) -> U256 {
        if self.options.trg_gas_limit_max {
            self.max
        } else {
            self.target
        }
    }

    /// Whether a block at `total_gas` may grow by an item using `used` gas.
    pub(crate) fn should_pack(&self, total_gas: U256, used: U256) -> bool {
        total_gas.saturating_add(used) <= self.cap()
    }

    /// Whether packing should move on to the next sender after an item did
    /// not fit.
    pub(crate) fn should_continue(&self, total_gas: U256, _used: U256) -> bool {
        self.options.try_harder && total_gas.saturating_add(TX_GAS.into()) <= self.cap()
    }
}

/// Sweep the staged items (already ordered descending by account, ascending
/// by nonce), executing each through the context. Returns the packed block
/// content and the ids that made it in.
pub(crate) fn pack_transactions(
    staged: &[SharedTransaction],
    ctx: &mut dyn PackingContext,
    policy: &PackingPolicy,
    base_fee: Option<U256>,
) -> (PackedBlock, Vec<H256>) {
    let mut packed = PackedBlock::default();
    let mut packed_ids = Vec::new();
    let mut skip_sender = None;

    for item in staged {
        if skip_sender == Some(item.sender()) {
            continue;
        }
        skip_sender = None;

        ctx.checkpoint();
        let outcome = match ctx.execute(item.signed()) {
            Ok(outcome) => outcome,
            Err(PackError::Inexecutable(err)) => {
                trace!(
                    target: "txqueue",
                    "[{:?}] not packing, inexecutable: {}",
                    item.hash(), err
                );
                ctx.revert_checkpoint();
                // Higher nonces of this sender depend on the failed item.
                skip_sender = Some(item.sender());
                continue;
            }
            Err(PackError::Vm(err)) => {
                warn!(target: "txqueue", "packing aborted on VM failure: {}", err);
                ctx.revert_checkpoint();
                break;
            }
        };

        if !policy.should_pack(packed.gas_used, outcome.gas_used) {
            ctx.revert_checkpoint();
            if policy.should_continue(packed.gas_used, outcome.gas_used) {
                skip_sender = Some(item.sender());
                continue;
            }
            break;
        }

        ctx.discard_checkpoint();
        packed.gas_used = packed.gas_used.saturating_add(outcome.gas_used);
        packed.reward = packed
            .reward
            .saturating_add(outcome.gas_used.saturating_mul(item.effective_tip(base_fee)));
        packed.receipts.push(outcome.receipt);
        packed_ids.push(item.hash());
        packed.transactions.push(item.clone());
    }

    packed.transactions_root =
        ordered_trie_root(packed.transactions.iter().map(|tx| tx.signed().encode()));
    packed.receipts_root = ordered_trie_root(packed.receipts.iter().map(|r| r.encode()));

    trace!(
        target: "txqueue",
        "packed {} transactions, gas used {}",
        packed.transactions.len(), packed.gas_used
    );

    (packed, packed_ids)
}
