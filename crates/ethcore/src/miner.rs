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

//! Wires the transaction pool to the chain: admission context, head-change
//! subscription and candidate block assembly.
//!
//! The pool holds a read-only view of the chain; the chain never calls back
//! into the pool. Head movements arrive over a channel as
//! [`ChainHeadEvent`]s and are drained cooperatively.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use ethereum_types::{Address, H256, U256};
use types::transaction::{self, SignedTransaction, UnverifiedTransaction};

use client::BlockChainClient;
use engines::Engine;
use error::Error;
use ethcore_miner::pool::{
    client::ChainClient as PoolChainClient, Options as PoolOptions, PackedBlock, QueueStatus,
    TransactionQueue,
};
use block::OpenBlock;
use machine::Executive;

/// A head movement: the blocks that left the canonical chain and the blocks
/// that joined it, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ChainHeadEvent {
    /// Hashes of blocks retracted from the canonical chain.
    pub retracted: Vec<H256>,
    /// Hashes of blocks newly enacted on the canonical chain.
    pub enacted: Vec<H256>,
}

/// The pool-side view of the chain at its current head.
pub struct PoolClient<'a> {
    chain: &'a dyn BlockChainClient,
    engine: &'a dyn Engine,
}

impl<'a> PoolClient<'a> {
    /// A view over the given chain and engine.
    pub fn new(chain: &'a dyn BlockChainClient, engine: &'a dyn Engine) -> Self {
        PoolClient { chain, engine }
    }
}

impl<'a> PoolChainClient for PoolClient<'a> {
    fn account_nonce(&self, address: &Address) -> U256 {
        self.chain.account_nonce(address)
    }

    fn account_balance(&self, address: &Address) -> U256 {
        self.chain.account_balance(address)
    }

    fn next_base_fee(&self) -> Option<U256> {
        self.engine
            .machine()
            .calc_base_fee(&self.chain.best_header())
    }

    fn target_gas_limit(&self) -> U256 {
        let best = self.chain.best_header();
        let params = self.engine.machine().params();
        if params.is_london(best.number() + 1) {
            *best.gas_limit() / params.elasticity_multiplier
        } else {
            *best.gas_limit()
        }
    }

    fn max_gas_limit(&self) -> U256 {
        *self.chain.best_header().gas_limit()
    }

    fn chain_id(&self) -> Option<u64> {
        Some(self.engine.machine().params().chain_id)
    }

    fn is_istanbul(&self) -> bool {
        let params = self.engine.machine().params();
        params.is_istanbul(self.chain.best_block_number() + 1)
    }

    fn is_london(&self) -> bool {
        let params = self.engine.machine().params();
        params.is_london(self.chain.best_block_number() + 1)
    }
}

/// Keeps the transaction queue in step with the chain and assembles
/// candidate blocks.
pub struct Miner {
    queue: Arc<TransactionQueue>,
    engine: Arc<dyn Engine>,
    author: Address,
    head_tx: Sender<ChainHeadEvent>,
    head_rx: Receiver<ChainHeadEvent>,
}

impl Miner {
    /// Create a miner around a fresh queue.
    pub fn new(options: PoolOptions, engine: Arc<dyn Engine>, author: Address) -> Self {
        let (head_tx, head_rx) = unbounded();
        Miner {
            queue: Arc::new(TransactionQueue::new(options)),
            engine,
            author,
            head_tx,
            head_rx,
        }
    }

    /// The underlying transaction queue.
    pub fn queue(&self) -> &Arc<TransactionQueue> {
        &self.queue
    }

    /// The channel head movements are announced on.
    pub fn head_channel(&self) -> Sender<ChainHeadEvent> {
        self.head_tx.clone()
    }

    /// Queue content counters.
    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Import transactions received from peers or RPC.
    pub fn import_transactions(
        &self,
        chain: &dyn BlockChainClient,
        transactions: Vec<UnverifiedTransaction>,
    ) -> Vec<Result<H256, transaction::Error>> {
        let client = PoolClient::new(chain, &*self.engine);
        transactions
            .into_iter()
            .map(|tx| self.queue.import(&client, tx))
            .collect()
    }

    /// Drain pending head events and adjust the pool: transactions only on
    /// the old branch are re-injected, transactions on the new branch are
    /// dropped, then the buckets reorganise.
    pub fn service_head_events(&self, chain: &dyn BlockChainClient) {
        while let Ok(event) = self.head_rx.try_recv() {
            self.chain_new_blocks(chain, &event);
        }
    }

    /// Apply one head movement to the pool.
    pub fn chain_new_blocks(&self, chain: &dyn BlockChainClient, event: &ChainHeadEvent) {
        let mut retracted: Vec<SignedTransaction> = Vec::new();
        for hash in &event.retracted {
            if let Some(body) = chain.block_body(hash) {
                for tx in body.transactions {
                    match SignedTransaction::new(tx) {
                        Ok(tx) => retracted.push(tx),
                        Err(err) => {
                            debug!(target: "miner", "skipping retracted tx: {}", err);
                        }
                    }
                }
            }
        }

        let mut enacted: Vec<H256> = Vec::new();
        for hash in &event.enacted {
            if let Some(body) = chain.block_body(hash) {
                enacted.extend(body.transactions.iter().map(|tx| tx.hash()));
            }
        }

        trace!(
            target: "miner",
            "head moved: {} retracted txs, {} enacted txs",
            retracted.len(), enacted.len()
        );
        let client = PoolClient::new(chain, &*self.engine);
        self.queue.on_head_changed(&client, retracted, enacted);
    }

    /// Rebuild the `Packed` bucket atop a fork of the current state and
    /// return the candidate block content.
    pub fn prepare_candidate(
        &self,
        chain: &dyn BlockChainClient,
        executive: &dyn Executive,
    ) -> Result<PackedBlock, Error> {
        let parent = chain.best_header();
        let mut state = chain.fork_state();
        let mut open = OpenBlock::new(&*self.engine, executive, &mut state, &parent, self.author);

        let client = PoolClient::new(chain, &*self.engine);
        Ok(self.queue.pack(&client, &mut open))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto::publickey::{public_to_address, Generator, KeyPair, Random};
    use engines::NullEngine;
    use ethcore_miner::pool::RemovalReason;
    use machine::Machine;
    use spec::CommonParams;
    use test_helpers::{TestBlockChainClient, TestExecutive};
    use types::{
        block::{Block, BlockBody},
        transaction::{Action, Transaction, TypedTransaction},
    };

    fn miner() -> Miner {
        let engine = Arc::new(NullEngine::new(Machine::new(CommonParams::test_pow())));
        Miner::new(Default::default(), engine, Address::from_low_u64_be(0xa))
    }

    fn transfer(keypair: &KeyPair, nonce: u64) -> SignedTransaction {
        TypedTransaction::Legacy(Transaction {
            action: Action::Call(Address::from_low_u64_be(0xca11)),
            value: 1.into(),
            data: vec![],
            gas: 21_000.into(),
            gas_price: 7.into(),
            nonce: nonce.into(),
        })
        .sign(keypair.secret(), None)
    }

    #[test]
    fn imports_and_packs_a_candidate() {
        let chain = TestBlockChainClient::new();
        let keypair = Random.generate();
        let sender = public_to_address(keypair.public());
        chain.set_balance(sender, U256::from(10_000_000_000u64));
        let miner = miner();

        let results =
            miner.import_transactions(&chain, vec![transfer(&keypair, 0).into()]);
        assert!(results[0].is_ok());
        assert_eq!(miner.status().staged, 1);

        let block = miner.prepare_candidate(&chain, &TestExecutive).unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.gas_used, U256::from(21_000));
        // No base fee: the full gas price tips the author.
        assert_eq!(block.reward, U256::from(21_000u64 * 7));
        assert_eq!(miner.status().packed, 1);
    }

    #[test]
    fn head_events_cull_mined_transactions() {
        let chain = TestBlockChainClient::new();
        let keypair = Random.generate();
        let sender = public_to_address(keypair.public());
        chain.set_balance(sender, U256::from(10_000_000_000u64));
        let miner = miner();

        let tx = transfer(&keypair, 0);
        let tx_hash = tx.hash();
        miner
            .import_transactions(&chain, vec![tx.clone().into()])
            .into_iter()
            .for_each(|result| assert!(result.is_ok()));

        // The transaction gets mined into the next block.
        let parent = chain.best_header();
        let body = BlockBody {
            transactions: vec![tx.into()],
            uncles: vec![],
        };
        let mut header = types::header::Header::new();
        header.set_parent_hash(parent.hash());
        header.set_number(parent.number() + 1);
        header.set_gas_limit(*parent.gas_limit());
        header.set_gas_used(21_000.into());
        header.set_transactions_root(body.transactions_root());
        header.set_uncles_hash(body.uncles_hash());
        let block_hash = header.hash();
        chain
            .persist_blocks(vec![Block {
                header,
                transactions: body.transactions,
                uncles: body.uncles,
            }])
            .unwrap();

        miner
            .head_channel()
            .send(ChainHeadEvent {
                retracted: vec![],
                enacted: vec![block_hash],
            })
            .unwrap();
        miner.service_head_events(&chain);

        assert!(miner.queue().find(&tx_hash).is_none());
        assert_eq!(
            miner.queue().removal_reason(&tx_hash),
            Some(RemovalReason::Mined)
        );
    }
}
