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

//! Test client and a stub VM, shared by the crate tests and by dependent
//! crates through the `test-helpers` feature.

use std::collections::HashMap;

use crypto::publickey::{Generator, Random};
use ethereum_types::{Address, H256, U256};
use parking_lot::RwLock;
use types::{
    block::{Block, BlockBody},
    header::Header,
    transaction::{Action, SignedTransaction, Transaction, TypedTransaction},
    BlockNumber,
};

use client::BlockChainClient;
use error::{BlockError, Error};
use machine::{ApplyOutcome, EnvInfo, Executive, ExecutionError};
use state::StateDb;

/// What to fill generated test blocks with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EachBlockWith {
    /// A block with no content.
    Nothing,
    /// A block carrying one uncle.
    Uncle,
    /// A block carrying one transaction.
    Transaction,
}

/// An in-memory store with helpers for generating chains. Persisting does
/// not execute anything; wrap it in an `Importer` to test the pipeline.
pub struct TestBlockChainClient {
    /// All known blocks by hash.
    pub blocks: RwLock<HashMap<H256, Block>>,
    /// Canonical hash per number.
    pub numbers: RwLock<HashMap<BlockNumber, H256>>,
    /// Hash of the best block.
    pub best: RwLock<H256>,
    /// The genesis header.
    pub genesis: Header,
    /// Stored uncle headers.
    pub uncles: RwLock<Vec<Header>>,
    /// Account state at the best block.
    pub state: RwLock<StateDb>,
    // Snapshots taken by open transactions, innermost last.
    saved: RwLock<Vec<(HashMap<H256, Block>, HashMap<BlockNumber, H256>, H256)>>,
}

impl Default for TestBlockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBlockChainClient {
    /// A store holding only a default genesis.
    pub fn new() -> Self {
        let mut genesis = Header::new();
        genesis.set_gas_limit(1_000_000.into());
        genesis.set_difficulty(0x20000.into());
        let hash = genesis.hash();

        let client = TestBlockChainClient {
            blocks: RwLock::new(HashMap::new()),
            numbers: RwLock::new(HashMap::new()),
            best: RwLock::new(hash),
            genesis: genesis.clone(),
            uncles: RwLock::new(Vec::new()),
            state: RwLock::new(StateDb::new()),
            saved: RwLock::new(Vec::new()),
        };
        client.blocks.write().insert(
            hash,
            Block {
                header: genesis,
                transactions: vec![],
                uncles: vec![],
            },
        );
        client.numbers.write().insert(0, hash);
        client
    }

    /// Extend the chain by `count` generated blocks.
    pub fn add_blocks(&self, count: usize, with: EachBlockWith) {
        for _ in 0..count {
            let parent = self.best_header();
            let mut header = Header::new();
            header.set_parent_hash(parent.hash());
            header.set_number(parent.number() + 1);
            header.set_gas_limit(*parent.gas_limit());
            header.set_difficulty(*parent.difficulty());
            header.set_timestamp(parent.timestamp() + 10);

            let (transactions, uncles) = match with {
                EachBlockWith::Nothing => (vec![], vec![]),
                EachBlockWith::Uncle => {
                    let mut uncle = Header::new();
                    uncle.set_parent_hash(parent.hash());
                    uncle.set_number(parent.number() + 1);
                    uncle.set_timestamp(parent.timestamp() + 9);
                    uncle.set_extra_data(b"uncle".to_vec());
                    (vec![], vec![uncle])
                }
                EachBlockWith::Transaction => {
                    let keypair = Random.generate();
                    let tx = TypedTransaction::Legacy(Transaction {
                        action: Action::Call(Address::from_low_u64_be(0xca11)),
                        value: 0.into(),
                        data: vec![],
                        gas: 21_000.into(),
                        gas_price: 1.into(),
                        nonce: 0.into(),
                    })
                    .sign(keypair.secret(), None);
                    (vec![tx.into()], vec![])
                }
            };

            let body = BlockBody {
                transactions,
                uncles,
            };
            header.set_transactions_root(body.transactions_root());
            header.set_uncles_hash(body.uncles_hash());

            let block = Block {
                header,
                transactions: body.transactions,
                uncles: body.uncles,
            };
            self.persist_blocks(vec![block])
                .expect("generated block extends the best chain; qed");
        }
    }

    /// Fund an account in the test state.
    pub fn set_balance(&self, address: Address, balance: U256) {
        let mut state = self.state.write();
        let existing = state.balance(&address);
        if balance > existing {
            state.add_balance(address, balance - existing);
        }
    }
}

impl BlockChainClient for TestBlockChainClient {
    fn best_header(&self) -> Header {
        let best = *self.best.read();
        self.blocks.read()[&best].header.clone()
    }

    fn header_by_hash(&self, hash: &H256) -> Option<Header> {
        self.blocks.read().get(hash).map(|b| b.header.clone())
    }

    fn header_by_number(&self, number: BlockNumber) -> Option<Header> {
        let hash = *self.numbers.read().get(&number)?;
        self.header_by_hash(&hash)
    }

    fn block_body(&self, hash: &H256) -> Option<BlockBody> {
        self.blocks.read().get(hash).map(|b| b.body())
    }

    fn account_nonce(&self, address: &Address) -> U256 {
        self.state.read().nonce(address)
    }

    fn account_balance(&self, address: &Address) -> U256 {
        self.state.read().balance(address)
    }

    fn fork_state(&self) -> StateDb {
        self.state.read().clone()
    }

    fn persist_blocks(&self, blocks: Vec<Block>) -> Result<(), Error> {
        for block in blocks {
            let hash = block.header.hash();
            if self.blocks.read().contains_key(&hash) {
                continue;
            }
            let best = *self.best.read();
            if *block.header.parent_hash() != best {
                return Err(BlockError::UnknownParent(*block.header.parent_hash()).into());
            }
            let number = block.header.number();
            self.blocks.write().insert(hash, block);
            self.numbers.write().insert(number, hash);
            *self.best.write() = hash;
        }
        Ok(())
    }

    fn persist_uncles(&self, uncles: &[Header]) -> H256 {
        self.uncles.write().extend(uncles.iter().cloned());
        let mut stream = ::rlp::RlpStream::new();
        stream.append_list(uncles);
        ::hash::keccak(stream.as_raw())
    }

    fn begin_transaction(&self, _apply_deletes: bool) {
        self.saved.write().push((
            self.blocks.read().clone(),
            self.numbers.read().clone(),
            *self.best.read(),
        ));
    }

    fn commit_transaction(&self) {
        self.saved
            .write()
            .pop()
            .expect("commit without an open transaction; qed");
    }

    fn rollback_transaction(&self) {
        let (blocks, numbers, best) = self
            .saved
            .write()
            .pop()
            .expect("rollback without an open transaction; qed");
        *self.blocks.write() = blocks;
        *self.numbers.write() = numbers;
        *self.best.write() = best;
    }
}

/// A stand-in VM: charges intrinsic gas at the effective price, transfers
/// the value and bumps the nonce. Enough to exercise the pipeline without
/// an interpreter.
pub struct TestExecutive;

impl Executive for TestExecutive {
    fn apply(
        &self,
        state: &mut StateDb,
        env: &EnvInfo,
        tx: &SignedTransaction,
    ) -> Result<ApplyOutcome, ExecutionError> {
        let sender = tx.sender();
        let t = tx.tx();

        let nonce = state.nonce(&sender);
        if t.nonce != nonce {
            return Err(ExecutionError::InvalidNonce {
                expected: nonce,
                got: t.nonce,
            });
        }

        let gas_used = U256::from(tx.intrinsic_gas(true));
        let gas_price = tx.effective_gas_price(env.base_fee);
        let cost = gas_used.saturating_mul(gas_price).saturating_add(t.value);

        let balance = state.balance(&sender);
        if balance < cost {
            return Err(ExecutionError::NotEnoughCash {
                required: cost,
                got: balance,
            });
        }

        state.sub_balance(sender, cost)?;
        state.inc_nonce(sender);

        let mut touched = vec![sender];
        if let Action::Call(to) = t.action {
            state.add_balance(to, t.value);
            touched.push(to);
        }

        Ok(ApplyOutcome {
            gas_used,
            success: true,
            logs: vec![],
            touched,
        })
    }
}
