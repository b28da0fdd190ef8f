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

//! Block verification: standalone checks, family checks against the parent
//! and uncle validation. The order of the checks is fixed so a rejection
//! reason is deterministic.

use std::collections::HashSet;

use ethereum_types::H256;
use types::{block::Block, header::Header};
use unexpected::{Mismatch, OutOfBounds};

use client::BlockChainClient;
use engines::Engine;
use error::{BlockError, Error};
use spec::{DAO_EXTRA_DATA, DAO_EXTRA_RANGE};

/// The number of generations back that uncles can be.
pub const MAX_UNCLE_AGE: u64 = 6;

/// Phase 1 verification: everything that needs only the block itself.
pub fn verify_block_basic(block: &Block, engine: &dyn Engine) -> Result<(), Error> {
    let header = &block.header;

    // Engine shape rules first: extra-data bounds for proof-of-work,
    // vanity/signature/vote layout for proof-of-authority.
    engine.verify_block_basic(header)?;

    if header.gas_used().is_zero() && !block.transactions.is_empty() {
        return Err(BlockError::TransactionsWithZeroGasUsed.into());
    }
    if header.gas_used() > header.gas_limit() {
        return Err(BlockError::TooMuchGasUsed(OutOfBounds {
            min: None,
            max: Some(*header.gas_limit()),
            found: *header.gas_used(),
        })
        .into());
    }

    // The body must be the one the header commits to.
    let body = block.body();
    let transactions_root = body.transactions_root();
    if &transactions_root != header.transactions_root() {
        return Err(BlockError::InvalidTransactionsRoot(Mismatch {
            expected: *header.transactions_root(),
            found: transactions_root,
        })
        .into());
    }
    let uncles_hash = body.uncles_hash();
    if &uncles_hash != header.uncles_hash() {
        return Err(BlockError::InvalidUnclesHash(Mismatch {
            expected: *header.uncles_hash(),
            found: uncles_hash,
        })
        .into());
    }

    let max_uncles = engine.maximum_uncle_count(header.number());
    if block.uncles.len() > max_uncles {
        return Err(BlockError::TooManyUncles(OutOfBounds {
            min: None,
            max: Some(max_uncles),
            found: block.uncles.len(),
        })
        .into());
    }
    for uncle in &block.uncles {
        engine.verify_block_basic(uncle)?;
    }

    Ok(())
}

/// Phase 3 verification: checks of the header against its parent.
/// The seal itself is verified separately (and last).
pub fn verify_block_family(
    header: &Header,
    parent: &Header,
    engine: &dyn Engine,
) -> Result<(), Error> {
    let params = engine.machine().params();

    if header.number() != parent.number() + 1 {
        return Err(BlockError::InvalidNumber(Mismatch {
            expected: parent.number() + 1,
            found: header.number(),
        })
        .into());
    }
    if parent.hash() != *header.parent_hash() {
        return Err(BlockError::UnknownParent(*header.parent_hash()).into());
    }

    if !engine.is_timestamp_valid(header.timestamp(), parent.timestamp()) {
        return Err(BlockError::InvalidTimestamp(OutOfBounds {
            min: Some(parent.timestamp() + 1),
            max: None,
            found: header.timestamp(),
        })
        .into());
    }

    if let Some(dao_block) = params.dao_fork_block {
        if params.dao_fork_support
            && header.number() >= dao_block
            && header.number() < dao_block + DAO_EXTRA_RANGE
            && header.extra_data().as_slice() != DAO_EXTRA_DATA
        {
            return Err(BlockError::InvalidDaoExtraData.into());
        }
    }

    // Engine rules: expected difficulty under proof-of-work, the authority
    // snapshot under clique.
    engine.verify_block_family(header, parent)?;

    params.verify_gas_limit(header, parent)?;

    let expected_base_fee = params.calc_base_fee(parent);
    match (expected_base_fee, header.base_fee()) {
        (Some(_), None) => return Err(BlockError::MissingBaseFee.into()),
        (expected, found) if expected != found => {
            return Err(BlockError::IncorrectBaseFee(Mismatch {
                expected: expected.unwrap_or_default(),
                found: found.unwrap_or_default(),
            })
            .into());
        }
        _ => {}
    }

    Ok(())
}

/// Verify the uncles of a block against the chain.
pub fn verify_uncles(
    block: &Block,
    chain: &dyn BlockChainClient,
    engine: &dyn Engine,
) -> Result<(), Error> {
    if block.uncles.is_empty() {
        return Ok(());
    }
    let header = &block.header;

    // Everything an uncle may not be: the block itself, an ancestor, or an
    // uncle already included by an ancestor.
    let mut excluded = HashSet::new();
    excluded.insert(header.hash());
    let mut ancestors = Vec::new();
    ancestors.push(*header.parent_hash());
    ancestors.extend(chain.ancestor_hashes(header.parent_hash(), MAX_UNCLE_AGE as usize));
    for ancestor in &ancestors {
        excluded.insert(*ancestor);
        if let Some(body) = chain.block_body(ancestor) {
            for uncle in body.uncles {
                excluded.insert(uncle.hash());
            }
        }
    }
    let ancestry: HashSet<H256> = ancestors.iter().cloned().collect();

    let mut seen = HashSet::new();
    for uncle in &block.uncles {
        let uncle_hash = uncle.hash();
        if !seen.insert(uncle_hash) {
            return Err(BlockError::DuplicateUncle(uncle_hash).into());
        }

        if uncle.number() >= header.number() {
            return Err(BlockError::UncleIsBrother(OutOfBounds {
                min: None,
                max: Some(header.number() - 1),
                found: uncle.number(),
            })
            .into());
        }
        let depth = header.number() - uncle.number();
        if depth > MAX_UNCLE_AGE {
            return Err(BlockError::UncleTooOld(OutOfBounds {
                min: Some(header.number() - MAX_UNCLE_AGE),
                max: Some(header.number() - 1),
                found: uncle.number(),
            })
            .into());
        }

        if excluded.contains(&uncle_hash) {
            return Err(BlockError::UncleInChain(uncle_hash).into());
        }

        // The uncle's parent must be a canonical ancestor within reach,
        // which makes the uncle itself a non-ancestor fork block.
        let uncle_parent_hash = *uncle.parent_hash();
        if !ancestry.contains(&uncle_parent_hash) {
            return Err(BlockError::UncleParentNotInChain(uncle_parent_hash).into());
        }
        let uncle_parent = chain
            .header_by_hash(&uncle_parent_hash)
            .ok_or(BlockError::UncleParentNotInChain(uncle_parent_hash))?;

        verify_block_family(uncle, &uncle_parent, engine)?;
        engine.verify_block_unordered(uncle)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engines::NullEngine;
    use ethereum_types::Address;
    use machine::Machine;
    use spec::CommonParams;
    use test_helpers::{EachBlockWith, TestBlockChainClient};
    use types::{
        block::{Block, BlockBody},
        transaction::{Action, Transaction, TypedTransaction},
    };

    fn engine() -> NullEngine {
        NullEngine::new(Machine::new(CommonParams::test_pow()))
    }

    fn header_pair() -> (Header, Header) {
        let mut parent = Header::new();
        parent.set_number(10);
        parent.set_timestamp(1_000);
        parent.set_gas_limit(1_000_000.into());

        let mut header = Header::new();
        header.set_parent_hash(parent.hash());
        header.set_number(11);
        header.set_timestamp(1_010);
        header.set_gas_limit(1_000_000.into());
        (parent, header)
    }

    #[test]
    fn family_check_order_is_deterministic() {
        let engine = engine();
        let (parent, mut header) = header_pair();
        verify_block_family(&header, &parent, &engine).unwrap();

        // Both number and timestamp are wrong: the number rule fires first.
        header.set_number(13);
        header.set_timestamp(parent.timestamp());
        match verify_block_family(&header, &parent, &engine) {
            Err(Error::Block(BlockError::InvalidNumber(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        header.set_number(11);
        match verify_block_family(&header, &parent, &engine) {
            Err(Error::Block(BlockError::InvalidTimestamp(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        header.set_timestamp(1_010);
        header.set_gas_limit(2_000_000.into());
        match verify_block_family(&header, &parent, &engine) {
            Err(Error::Block(BlockError::InvalidGasLimit(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn base_fee_is_checked_against_the_parent() {
        let mut params = CommonParams::test_pow();
        params.london_transition = 0;
        let engine = NullEngine::new(Machine::new(params));

        let (mut parent, mut header) = header_pair();
        parent.set_base_fee(Some(1_000_000_000u64.into()));
        parent.set_gas_used(500_000.into());
        header.set_parent_hash(parent.hash());

        match verify_block_family(&header, &parent, &engine) {
            Err(Error::Block(BlockError::MissingBaseFee)) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        header.set_base_fee(Some(123.into()));
        match verify_block_family(&header, &parent, &engine) {
            Err(Error::Block(BlockError::IncorrectBaseFee(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        let expected = engine.machine().params().calc_base_fee(&parent);
        header.set_base_fee(expected);
        verify_block_family(&header, &parent, &engine).unwrap();
    }

    #[test]
    fn transactions_require_gas_used() {
        let engine = engine();
        let tx = TypedTransaction::Legacy(Transaction {
            action: Action::Create,
            value: 0.into(),
            data: vec![],
            gas: 21_000.into(),
            gas_price: 1.into(),
            nonce: 0.into(),
        })
        .fake_sign(Address::from_low_u64_be(1));

        let body = BlockBody {
            transactions: vec![tx.into()],
            uncles: vec![],
        };
        let mut header = Header::new();
        header.set_transactions_root(body.transactions_root());
        header.set_uncles_hash(body.uncles_hash());
        let block = Block {
            header,
            transactions: body.transactions,
            uncles: body.uncles,
        };

        match verify_block_basic(&block, &engine) {
            Err(Error::Block(BlockError::TransactionsWithZeroGasUsed)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn body_must_match_header_commitments() {
        let engine = engine();
        let mut header = Header::new();
        header.set_transactions_root(ethereum_types::H256::repeat_byte(1));
        let block = Block {
            header,
            transactions: vec![],
            uncles: vec![],
        };
        match verify_block_basic(&block, &engine) {
            Err(Error::Block(BlockError::InvalidTransactionsRoot(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn uncle_rules() {
        let engine = engine();
        let chain = TestBlockChainClient::new();
        chain.add_blocks(2, EachBlockWith::Nothing);

        let parent = chain.best_header();
        let mut uncle = Header::new();
        uncle.set_parent_hash(chain.genesis.hash());
        uncle.set_number(1);
        uncle.set_timestamp(9);
        uncle.set_gas_limit(1_000_000.into());
        uncle.set_extra_data(b"u".to_vec());

        let mut header = Header::new();
        header.set_parent_hash(parent.hash());
        header.set_number(parent.number() + 1);

        // A fork block of generation one is acceptable.
        let body = BlockBody {
            transactions: vec![],
            uncles: vec![uncle.clone()],
        };
        let mut block = Block {
            header: header.clone(),
            transactions: vec![],
            uncles: body.uncles.clone(),
        };
        block.header.set_uncles_hash(body.uncles_hash());
        verify_uncles(&block, &chain, &engine).unwrap();

        // The same uncle twice is a duplicate.
        block.uncles = vec![uncle.clone(), uncle.clone()];
        match verify_uncles(&block, &chain, &engine) {
            Err(Error::Block(BlockError::DuplicateUncle(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        // An uncle from the block's own generation is a sibling.
        let mut brother = uncle.clone();
        brother.set_number(block.header.number());
        block.uncles = vec![brother];
        match verify_uncles(&block, &chain, &engine) {
            Err(Error::Block(BlockError::UncleIsBrother(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        // A canonical ancestor may not be re-included as an uncle.
        let ancestor = chain.header_by_number(1).unwrap();
        block.uncles = vec![ancestor];
        match verify_uncles(&block, &chain, &engine) {
            Err(Error::Block(BlockError::UncleInChain(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
