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

//! The block importer: verification, execution and in-order persistence.
//!
//! Wraps a bare store so that `persist_blocks` runs the whole pipeline:
//! verify the header family and seal, execute the transactions, compare the
//! header commitments and only then commit. Any failure rolls the scoped
//! transaction back and leaves the store untouched.

use std::sync::Arc;

use ethereum_types::{Address, H256, U256};
use parking_lot::RwLock;
use types::{
    block::{Block, BlockBody},
    header::Header,
    BlockNumber,
};

use block::enact;
use client::BlockChainClient;
use engines::Engine;
use error::{BlockError, Error};
use machine::Executive;
use state::StateDb;
use verification;

/// A `BlockChainClient` that executes what it persists.
pub struct Importer<C> {
    client: Arc<C>,
    engine: Arc<dyn Engine>,
    executive: Arc<dyn Executive>,
    state: RwLock<StateDb>,
}

impl<C: BlockChainClient> Importer<C> {
    /// Wrap a store. `genesis_state` is the state at the store's best block.
    pub fn new(
        client: Arc<C>,
        engine: Arc<dyn Engine>,
        executive: Arc<dyn Executive>,
        genesis_state: StateDb,
    ) -> Self {
        Importer {
            client,
            engine,
            executive,
            state: RwLock::new(genesis_state),
        }
    }

    /// The wrapped store.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// The engine driving verification.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    fn import(&self, block: Block) -> Result<(), Error> {
        let hash = block.header.hash();
        if self.client.header_by_hash(&hash).is_some() {
            trace!(target: "client", "#{} already known, skipping", block.header.number());
            return Ok(());
        }

        let parent = self
            .client
            .header_by_hash(block.header.parent_hash())
            .ok_or(BlockError::UnknownParent(*block.header.parent_hash()))?;

        verification::verify_block_basic(&block, &*self.engine)?;
        verification::verify_block_family(&block.header, &parent, &*self.engine)?;
        verification::verify_uncles(&block, &*self.client, &*self.engine)?;
        // The seal is the most expensive check; it comes last.
        self.engine.verify_block_unordered(&block.header)?;

        let mut state = self.state.write();
        self.client.begin_transaction(true);
        state.checkpoint();

        let result = enact(&block, &mut state, &*self.engine, &*self.executive)
            .and_then(|_| self.client.persist_blocks(vec![block]));

        match result {
            Ok(()) => {
                state.discard_checkpoint();
                self.client.commit_transaction();
                Ok(())
            }
            Err(err) => {
                state.revert_to_checkpoint();
                self.client.rollback_transaction();
                Err(err)
            }
        }
    }
}

impl<C: BlockChainClient + 'static> BlockChainClient for Importer<C> {
    fn best_header(&self) -> Header {
        self.client.best_header()
    }

    fn header_by_hash(&self, hash: &H256) -> Option<Header> {
        self.client.header_by_hash(hash)
    }

    fn header_by_number(&self, number: BlockNumber) -> Option<Header> {
        self.client.header_by_number(number)
    }

    fn block_body(&self, hash: &H256) -> Option<BlockBody> {
        self.client.block_body(hash)
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
            self.import(block)?;
        }
        Ok(())
    }

    fn persist_uncles(&self, uncles: &[Header]) -> H256 {
        self.client.persist_uncles(uncles)
    }

    fn begin_transaction(&self, apply_deletes: bool) {
        self.client.begin_transaction(apply_deletes)
    }

    fn commit_transaction(&self) {
        self.client.commit_transaction()
    }

    fn rollback_transaction(&self) {
        self.client.rollback_transaction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block::OpenBlock;
    use crypto::publickey::{public_to_address, Generator, KeyPair, Random};
    use engines::NullEngine;
    use ethereum_types::Address;
    use machine::Machine;
    use spec::CommonParams;
    use test_helpers::{TestBlockChainClient, TestExecutive};
    use types::transaction::{Action, Transaction, TypedTransaction};

    fn importer_with_funds(
        keypair: &KeyPair,
    ) -> (Importer<TestBlockChainClient>, Address) {
        let sender = public_to_address(keypair.public());
        let store = Arc::new(TestBlockChainClient::new());
        let mut state = StateDb::new();
        state.add_balance(sender, U256::from(1_000_000_000u64));

        let engine = Arc::new(NullEngine::new(Machine::new(CommonParams::test_pow())));
        let importer = Importer::new(store, engine, Arc::new(TestExecutive), state);
        (importer, sender)
    }

    fn valid_child(importer: &Importer<TestBlockChainClient>, keypair: &KeyPair) -> Block {
        let parent = importer.best_header();
        let executive = TestExecutive;
        let mut state = importer.fork_state();
        let mut open = OpenBlock::new(
            &**importer.engine(),
            &executive,
            &mut state,
            &parent,
            Address::from_low_u64_be(0xa),
        );
        let tx = TypedTransaction::Legacy(Transaction {
            action: Action::Call(Address::from_low_u64_be(0xca11)),
            value: 1.into(),
            data: vec![],
            gas: 21_000.into(),
            gas_price: 1.into(),
            nonce: 0.into(),
        })
        .sign(keypair.secret(), None);
        open.push_transaction(tx.clone()).unwrap();
        let executed = open.close();
        Block {
            header: executed.header,
            transactions: vec![tx.into()],
            uncles: vec![],
        }
    }

    #[test]
    fn import_executes_and_persists() {
        let keypair = Random.generate();
        let (importer, sender) = importer_with_funds(&keypair);
        let block = valid_child(&importer, &keypair);

        importer.persist_blocks(vec![block.clone()]).unwrap();
        assert_eq!(importer.best_block_number(), 1);
        assert_eq!(importer.account_nonce(&sender), 1.into());

        // Re-applying a committed range has no effect and succeeds.
        importer.persist_blocks(vec![block]).unwrap();
        assert_eq!(importer.best_block_number(), 1);
        assert_eq!(importer.account_nonce(&sender), 1.into());
    }

    #[test]
    fn import_rolls_back_on_bad_commitment() {
        let keypair = Random.generate();
        let (importer, sender) = importer_with_funds(&keypair);
        let mut block = valid_child(&importer, &keypair);
        block
            .header
            .set_state_root(H256::repeat_byte(0xbd));

        assert!(importer.persist_blocks(vec![block]).is_err());
        // Nothing stuck: neither the store nor the state moved.
        assert_eq!(importer.best_block_number(), 0);
        assert_eq!(importer.account_nonce(&sender), 0.into());
    }

    #[test]
    fn import_rejects_unknown_parent() {
        let keypair = Random.generate();
        let (importer, _) = importer_with_funds(&keypair);
        let mut block = valid_child(&importer, &keypair);
        block.header.set_parent_hash(H256::repeat_byte(0x77));

        match importer.persist_blocks(vec![block]) {
            Err(Error::Block(BlockError::UnknownParent(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
