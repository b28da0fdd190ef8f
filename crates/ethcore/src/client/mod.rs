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

//! Blockchain database capability traits.
//!
//! The persistent store is an external collaborator; the core consumes it
//! through this interface. `persist_blocks` must be idempotent over ranges
//! that were already committed.

mod importer;

pub use self::importer::Importer;

use ethereum_types::{Address, H256, U256};
use types::{
    block::{Block, BlockBody},
    header::Header,
    ids::BlockId,
    BlockNumber,
};

use error::Error;
use state::StateDb;

/// Read and write access to the chain database.
pub trait BlockChainClient: Send + Sync {
    /// The header of the best (heaviest known) block.
    fn best_header(&self) -> Header;

    /// The number of the best block.
    fn best_block_number(&self) -> BlockNumber {
        self.best_header().number()
    }

    /// A header by hash, canonical or not.
    fn header_by_hash(&self, hash: &H256) -> Option<Header>;

    /// A canonical header by number.
    fn header_by_number(&self, number: BlockNumber) -> Option<Header>;

    /// A header by id.
    fn header(&self, id: BlockId) -> Option<Header> {
        match id {
            BlockId::Hash(hash) => self.header_by_hash(&hash),
            BlockId::Number(number) => self.header_by_number(number),
            BlockId::Earliest => self.header_by_number(0),
            BlockId::Latest => Some(self.best_header()),
        }
    }

    /// The body of a known block.
    fn block_body(&self, hash: &H256) -> Option<BlockBody>;

    /// A whole block, when both header and body are known.
    fn block(&self, hash: &H256) -> Option<Block> {
        let header = self.header_by_hash(hash)?;
        let body = self.block_body(hash)?;
        Some(Block {
            header,
            transactions: body.transactions,
            uncles: body.uncles,
        })
    }

    /// Up to `count` ancestor hashes of the given block, nearest first.
    fn ancestor_hashes(&self, hash: &H256, count: usize) -> Vec<H256> {
        let mut ancestors = Vec::with_capacity(count);
        let mut cursor = match self.header_by_hash(hash) {
            Some(header) => header,
            None => return ancestors,
        };
        while ancestors.len() < count {
            let parent_hash = *cursor.parent_hash();
            match self.header_by_hash(&parent_hash) {
                Some(parent) => {
                    ancestors.push(parent_hash);
                    if parent.number() == 0 {
                        break;
                    }
                    cursor = parent;
                }
                None => break,
            }
        }
        ancestors
    }

    /// The nonce of an account at the best block.
    fn account_nonce(&self, address: &Address) -> U256;

    /// The balance of an account at the best block.
    fn account_balance(&self, address: &Address) -> U256;

    /// A copy of the state at the best block, for speculative execution.
    fn fork_state(&self) -> StateDb;

    /// Append the given blocks, in order. Blocks already known are skipped;
    /// re-applying a committed range has no effect and succeeds.
    fn persist_blocks(&self, blocks: Vec<Block>) -> Result<(), Error>;

    /// Store uncle headers, returning the hash of the encoded list.
    fn persist_uncles(&self, uncles: &[Header]) -> H256;

    /// Open a scoped transaction over the store.
    fn begin_transaction(&self, apply_deletes: bool);

    /// Commit the innermost open transaction.
    fn commit_transaction(&self);

    /// Discard the innermost open transaction.
    fn rollback_transaction(&self);
}
