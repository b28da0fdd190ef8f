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

//! Block assembly and enactment.
//!
//! An `OpenBlock` applies transactions through the external VM against a
//! borrowed state, accumulating receipts; `close` settles rewards and fills
//! the computed header fields. `enact` re-runs a complete block and checks
//! the header commitments against the outcome.

use ethereum_types::{Address, Bloom, U256};
use types::{
    block::Block,
    header::Header,
    receipt::{Receipt, TransactionOutcome, TypedReceipt},
    transaction::SignedTransaction,
    trie_root::ordered_trie_root,
};
use unexpected::{Mismatch, OutOfBounds};

use engines::Engine;
use error::{BlockError, Error};
use ethcore_miner::pool::client::{PackError, PackedOutcome, PackingContext};
use machine::{EnvInfo, Executive, ExecutionError};
use state::StateDb;

/// Denominator of the per-uncle author bonus.
const UNCLE_BONUS_DIVISOR: u64 = 32;
/// An uncle reward decays per generation in eighths.
const UNCLE_DECAY_DIVISOR: u64 = 8;

/// A block fully applied to a state, with the computed header.
#[derive(Debug, Clone)]
pub struct ExecutedBlock {
    /// The completed header.
    pub header: Header,
    /// Applied transactions.
    pub transactions: Vec<SignedTransaction>,
    /// Receipts of the applied transactions.
    pub receipts: Vec<TypedReceipt>,
    /// Included uncle headers.
    pub uncles: Vec<Header>,
    /// Total gas used.
    pub gas_used: U256,
}

/// A block in assembly.
pub struct OpenBlock<'x> {
    engine: &'x dyn Engine,
    executive: &'x dyn Executive,
    state: &'x mut StateDb,
    env: EnvInfo,
    header: Header,
    transactions: Vec<SignedTransaction>,
    receipts: Vec<TypedReceipt>,
    uncles: Vec<Header>,
    cumulative_gas: U256,
    // Transaction-count marks matching the open state savepoints.
    checkpoints: Vec<usize>,
}

impl<'x> OpenBlock<'x> {
    /// Open a fresh block on top of `parent`, authored by `author`.
    pub fn new(
        engine: &'x dyn Engine,
        executive: &'x dyn Executive,
        state: &'x mut StateDb,
        parent: &Header,
        author: Address,
    ) -> Self {
        let mut header = Header::new();
        header.set_parent_hash(parent.hash());
        header.set_number(parent.number() + 1);
        header.set_author(author);
        header.set_gas_limit(*parent.gas_limit());
        header.set_timestamp(engine.open_block_header_timestamp(parent.timestamp()));
        header.set_base_fee(engine.machine().calc_base_fee(parent));
        engine.populate_from_parent(&mut header, parent);

        Self::with_header(engine, executive, state, header)
    }

    /// Open a block whose header fields are dictated, e.g. when re-running a
    /// block received from a peer.
    pub fn with_header(
        engine: &'x dyn Engine,
        executive: &'x dyn Executive,
        state: &'x mut StateDb,
        header: Header,
    ) -> Self {
        let env = EnvInfo {
            number: header.number(),
            author: *header.author(),
            timestamp: header.timestamp(),
            difficulty: *header.difficulty(),
            gas_limit: *header.gas_limit(),
            base_fee: header.base_fee(),
        };
        OpenBlock {
            engine,
            executive,
            state,
            env,
            header,
            transactions: Vec::new(),
            receipts: Vec::new(),
            uncles: Vec::new(),
            cumulative_gas: U256::zero(),
            checkpoints: Vec::new(),
        }
    }

    /// The environment transactions run in.
    pub fn env(&self) -> &EnvInfo {
        &self.env
    }

    /// Gas used so far.
    pub fn gas_used(&self) -> U256 {
        self.cumulative_gas
    }

    /// Apply one transaction: run it through the VM, credit the author the
    /// effective tip, apply EIP158 cleanup and record the receipt.
    pub fn push_transaction(&mut self, tx: SignedTransaction) -> Result<&TypedReceipt, Error> {
        let params = self.engine.machine().params();
        self.engine
            .machine()
            .verify_transaction_basic(&tx, self.env.number)?;

        if self.cumulative_gas.saturating_add(tx.tx().gas) > self.env.gas_limit {
            return Err(ExecutionError::BlockGasLimitReached {
                gas_limit: self.env.gas_limit,
                gas_used: self.cumulative_gas,
                gas: tx.tx().gas,
            }
            .into());
        }

        let outcome = self.executive.apply(self.state, &self.env, &tx)?;

        let tip = tx
            .effective_priority_fee(self.env.base_fee)
            .saturating_mul(outcome.gas_used);
        self.state.add_balance(self.env.author, tip);

        if params.is_spurious(self.env.number) {
            self.state.kill_empty_accounts(outcome.touched.iter());
        }

        self.cumulative_gas = self.cumulative_gas.saturating_add(outcome.gas_used);
        let outcome_field = if params.is_byzantium(self.env.number) {
            TransactionOutcome::StatusCode(if outcome.success { 1 } else { 0 })
        } else {
            TransactionOutcome::StateRoot(self.state.root())
        };
        let receipt = TypedReceipt::new(
            tx.tx_type(),
            Receipt::new(outcome_field, self.cumulative_gas, outcome.logs),
        );
        self.transactions.push(tx);
        self.receipts.push(receipt);
        Ok(self
            .receipts
            .last()
            .expect("a receipt was just pushed; qed"))
    }

    /// Include an uncle header.
    pub fn push_uncle(&mut self, uncle: Header) -> Result<(), Error> {
        let max = self.engine.maximum_uncle_count(self.env.number);
        if self.uncles.len() >= max {
            return Err(BlockError::TooManyUncles(OutOfBounds {
                min: None,
                max: Some(max),
                found: self.uncles.len() + 1,
            })
            .into());
        }
        self.uncles.push(uncle);
        Ok(())
    }

    /// Settle rewards and produce the executed block with a completed header.
    pub fn close(mut self) -> ExecutedBlock {
        let number = self.env.number;
        let reward = self.engine.block_reward(number);
        if !reward.is_zero() {
            let bonus = reward / U256::from(UNCLE_BONUS_DIVISOR)
                * U256::from(self.uncles.len() as u64);
            self.state
                .add_balance(self.env.author, reward.saturating_add(bonus));

            for uncle in &self.uncles {
                let depth = number.saturating_sub(uncle.number());
                if depth >= UNCLE_DECAY_DIVISOR {
                    continue;
                }
                let uncle_reward = reward
                    * U256::from(UNCLE_DECAY_DIVISOR - depth)
                    / U256::from(UNCLE_DECAY_DIVISOR);
                self.state.add_balance(*uncle.author(), uncle_reward);
            }
        }

        let log_bloom = self
            .receipts
            .iter()
            .fold(Bloom::default(), |mut bloom, receipt| {
                bloom.accrue_bloom(&receipt.receipt.log_bloom);
                bloom
            });

        self.header.set_transactions_root(ordered_trie_root(
            self.transactions.iter().map(|tx| tx.encode()),
        ));
        self.header
            .set_receipts_root(ordered_trie_root(self.receipts.iter().map(|r| r.encode())));
        self.header.set_log_bloom(log_bloom);
        self.header.set_gas_used(self.cumulative_gas);
        self.header.set_uncles_hash({
            let mut stream = ::rlp::RlpStream::new();
            stream.append_list(&self.uncles);
            ::hash::keccak(stream.as_raw())
        });
        self.header.set_state_root(self.state.root());

        ExecutedBlock {
            header: self.header,
            transactions: self.transactions,
            receipts: self.receipts,
            uncles: self.uncles,
            gas_used: self.cumulative_gas,
        }
    }
}

impl<'x> PackingContext for OpenBlock<'x> {
    fn checkpoint(&mut self) {
        self.state.checkpoint();
        self.checkpoints.push(self.transactions.len());
    }

    fn discard_checkpoint(&mut self) {
        self.state.discard_checkpoint();
        self.checkpoints.pop();
    }

    fn revert_checkpoint(&mut self) {
        self.state.revert_to_checkpoint();
        let mark = self
            .checkpoints
            .pop()
            .expect("revert called without a checkpoint; qed");
        self.transactions.truncate(mark);
        self.receipts.truncate(mark);
        self.cumulative_gas = self
            .receipts
            .last()
            .map(|r| r.receipt.gas_used)
            .unwrap_or_default();
    }

    fn execute(&mut self, tx: &SignedTransaction) -> Result<PackedOutcome, PackError> {
        let before = self.cumulative_gas;
        match self.push_transaction(tx.clone()) {
            Ok(receipt) => {
                let receipt = receipt.clone();
                Ok(PackedOutcome {
                    gas_used: receipt.receipt.gas_used - before,
                    receipt,
                })
            }
            Err(Error::Execution(ExecutionError::Internal(err))) => Err(PackError::Vm(err)),
            Err(err) => Err(PackError::Inexecutable(err.to_string())),
        }
    }
}

/// Re-run a complete block against the parent state and require the header
/// commitments to match the outcome.
pub fn enact(
    block: &Block,
    state: &mut StateDb,
    engine: &dyn Engine,
    executive: &dyn Executive,
) -> Result<ExecutedBlock, Error> {
    let mut open = OpenBlock::with_header(engine, executive, state, block.header.clone());
    for tx in &block.transactions {
        let signed = SignedTransaction::new(tx.clone())
            .map_err(|err| Error::Transaction(err.into()))?;
        open.push_transaction(signed)?;
    }
    for uncle in &block.uncles {
        open.push_uncle(uncle.clone())?;
    }
    let executed = open.close();

    let header = &block.header;
    if executed.gas_used != *header.gas_used() {
        return Err(BlockError::InvalidGasUsed(Mismatch {
            expected: *header.gas_used(),
            found: executed.gas_used,
        })
        .into());
    }
    if executed.header.receipts_root() != header.receipts_root() {
        return Err(BlockError::InvalidReceiptsRoot(Mismatch {
            expected: *header.receipts_root(),
            found: *executed.header.receipts_root(),
        })
        .into());
    }
    if executed.header.log_bloom() != header.log_bloom() {
        return Err(BlockError::InvalidLogBloom(Box::new(Mismatch {
            expected: *header.log_bloom(),
            found: *executed.header.log_bloom(),
        }))
        .into());
    }
    if executed.header.state_root() != header.state_root() {
        return Err(BlockError::InvalidStateRoot(Mismatch {
            expected: *header.state_root(),
            found: *executed.header.state_root(),
        })
        .into());
    }

    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto::publickey::{Generator, KeyPair, Random};
    use engines::NullEngine;
    use machine::Machine;
    use spec::CommonParams;
    use test_helpers::TestExecutive;
    use types::transaction::{Action, Transaction, TypedTransaction};

    fn engine() -> NullEngine {
        NullEngine::new(Machine::new(CommonParams::test_pow()))
    }

    fn parent_header() -> Header {
        let mut parent = Header::new();
        parent.set_gas_limit(1_000_000.into());
        parent
    }

    fn transfer(keypair: &KeyPair, nonce: u64, value: u64) -> SignedTransaction {
        TypedTransaction::Legacy(Transaction {
            action: Action::Call(Address::from_low_u64_be(0xca11)),
            value: value.into(),
            data: vec![],
            gas: 21_000.into(),
            gas_price: 1.into(),
            nonce: nonce.into(),
        })
        .sign(keypair.secret(), None)
    }

    fn funded_state(keypair: &KeyPair) -> (StateDb, Address) {
        let sender = ::crypto::publickey::public_to_address(keypair.public());
        let mut state = StateDb::new();
        state.add_balance(sender, U256::from(1_000_000_000u64));
        (state, sender)
    }

    #[test]
    fn open_close_enact_round_trip() {
        let engine = engine();
        let executive = TestExecutive;
        let keypair = Random.generate();
        let (state, sender) = funded_state(&keypair);
        let author = Address::from_low_u64_be(0xa);
        let tx = transfer(&keypair, 0, 5);

        let mut work = state.clone();
        let mut open = OpenBlock::new(&engine, &executive, &mut work, &parent_header(), author);
        open.push_transaction(tx.clone()).unwrap();
        let executed = open.close();

        assert_eq!(executed.gas_used, U256::from(21_000));
        assert_eq!(executed.header.gas_used(), &U256::from(21_000));
        assert_eq!(executed.receipts.len(), 1);
        assert_eq!(work.nonce(&sender), 1.into());

        // Re-running the block from the parent state reproduces the header.
        let block = Block {
            header: executed.header.clone(),
            transactions: vec![tx.into()],
            uncles: vec![],
        };
        let mut fresh = state.clone();
        let replayed = enact(&block, &mut fresh, &engine, &executive).unwrap();
        assert_eq!(replayed.header.state_root(), executed.header.state_root());
        assert_eq!(replayed.header.receipts_root(), executed.header.receipts_root());
    }

    #[test]
    fn enact_rejects_tampered_commitments() {
        let engine = engine();
        let executive = TestExecutive;
        let keypair = Random.generate();
        let (state, _) = funded_state(&keypair);
        let tx = transfer(&keypair, 0, 5);

        let mut work = state.clone();
        let mut open = OpenBlock::new(
            &engine,
            &executive,
            &mut work,
            &parent_header(),
            Address::zero(),
        );
        open.push_transaction(tx.clone()).unwrap();
        let executed = open.close();

        let mut block = Block {
            header: executed.header.clone(),
            transactions: vec![tx.into()],
            uncles: vec![],
        };

        block.header.set_gas_used(42.into());
        let mut fresh = state.clone();
        match enact(&block, &mut fresh, &engine, &executive) {
            Err(Error::Block(BlockError::InvalidGasUsed(_))) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        block.header.set_gas_used(executed.gas_used);
        block.header.set_state_root(ethereum_types::H256::repeat_byte(3));
        let mut fresh = state.clone();
        match enact(&block, &mut fresh, &engine, &executive) {
            Err(Error::Block(BlockError::InvalidStateRoot(_))) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn packing_context_savepoints_are_clean() {
        use ethcore_miner::pool::client::PackingContext;

        let engine = engine();
        let executive = TestExecutive;
        let keypair = Random.generate();
        let (state, sender) = funded_state(&keypair);
        let balance_before = state.balance(&sender);

        let mut work = state.clone();
        let mut open = OpenBlock::new(
            &engine,
            &executive,
            &mut work,
            &parent_header(),
            Address::zero(),
        );

        open.checkpoint();
        let outcome = open.execute(&transfer(&keypair, 0, 5)).unwrap();
        assert_eq!(outcome.gas_used, U256::from(21_000));
        open.revert_checkpoint();

        assert_eq!(open.gas_used(), U256::zero());
        let executed = open.close();
        assert!(executed.transactions.is_empty());
        assert_eq!(work.balance(&sender), balance_before);
        assert_eq!(work.nonce(&sender), U256::zero());
    }

    #[test]
    fn rewards_settle_on_close() {
        use engines::Ethash;

        let engine = Ethash::with_cached_epochs(Machine::new(CommonParams::test_pow()), 1);
        let executive = TestExecutive;
        let author = Address::from_low_u64_be(0xa);
        let mut state = StateDb::new();

        let open = OpenBlock::new(&engine, &executive, &mut state, &parent_header(), author);
        let executed = open.close();
        let _ = executed;

        // Constantinople is live from genesis in the test params.
        assert_eq!(
            state.balance(&author),
            U256::from(2_000_000_000_000_000_000u64)
        );
    }
}
