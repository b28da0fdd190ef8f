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

//! Base data structure of this module is `Block`.

use ethereum_types::H256;
use parity_bytes::Bytes;
use rlp::{DecoderError, Rlp, RlpStream};

use crate::{
    hash::keccak,
    header::Header,
    transaction::UnverifiedTransaction,
    trie_root::ordered_trie_root,
    BlockNumber,
};

/// A block, encoded as it is on the block chain.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Block {
    /// The header of this block.
    pub header: Header,
    /// The transactions in this block.
    pub transactions: Vec<UnverifiedTransaction>,
    /// The uncles of this block.
    pub uncles: Vec<Header>,
}

impl Block {
    /// Get the RLP-encoding of the block with the seal.
    pub fn rlp_bytes(&self) -> Bytes {
        let mut block_rlp = RlpStream::new_list(3);
        block_rlp.append(&self.header);
        block_rlp.append_list(&self.transactions);
        block_rlp.append_list(&self.uncles);
        block_rlp.out()
    }

    /// Decode a block. The transition block number governs the header format.
    pub fn decode_rlp(rlp: &Rlp, eip1559_transition: BlockNumber) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Block {
            header: Header::decode_rlp(&rlp.at(0)?, eip1559_transition)?,
            transactions: UnverifiedTransaction::decode_rlp_list(&rlp.at(1)?)?,
            uncles: Header::decode_rlp_list(&rlp.at(2)?, eip1559_transition)?,
        })
    }

    /// Take the body (transactions and uncles) out of this block.
    pub fn body(&self) -> BlockBody {
        BlockBody {
            transactions: self.transactions.clone(),
            uncles: self.uncles.clone(),
        }
    }
}

/// A block body: the block content without the header.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct BlockBody {
    /// The transactions in this block.
    pub transactions: Vec<UnverifiedTransaction>,
    /// The uncles of this block.
    pub uncles: Vec<Header>,
}

impl BlockBody {
    /// Get the RLP-encoding of the body.
    pub fn rlp_bytes(&self) -> Bytes {
        let mut body_rlp = RlpStream::new_list(2);
        body_rlp.append_list(&self.transactions);
        body_rlp.append_list(&self.uncles);
        body_rlp.out()
    }

    /// Decode a block body.
    pub fn decode_rlp(rlp: &Rlp, eip1559_transition: BlockNumber) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(BlockBody {
            transactions: UnverifiedTransaction::decode_rlp_list(&rlp.at(0)?)?,
            uncles: Header::decode_rlp_list(&rlp.at(1)?, eip1559_transition)?,
        })
    }

    /// The root of the ordered transactions trie, as committed to by the
    /// header `transactions_root` field.
    pub fn transactions_root(&self) -> H256 {
        ordered_trie_root(self.transactions.iter().map(|tx| tx.encode()))
    }

    /// The hash of the uncle list, as committed to by the header
    /// `uncles_hash` field.
    pub fn uncles_hash(&self) -> H256 {
        let mut s = RlpStream::new();
        s.append_list(&self.uncles);
        keccak(s.as_raw())
    }
}
