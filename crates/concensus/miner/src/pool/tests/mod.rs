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


use std::collections::HashMap;

use ethereum_types::{Address, H256, U256};
use parity_crypto::publickey::{Generator, KeyPair, Random};
use parking_lot::RwLock;
use types::{
    receipt::{Receipt, TransactionOutcome, TypedReceipt},
    transaction::{self, SignedTransaction},
};

use self::tx::Tx;
use pool::{
    client::{ChainClient, PackError, PackedOutcome, PackingContext},
    Bucket, Options, PackerOptions, RemovalReason, TransactionQueue,
};

/// Chain state stub: programmable nonces, balances and fork switches.
#[derive(Default)]
struct TestClient {
    nonces: RwLock<HashMap<Address, U256>>,
    balances: RwLock<HashMap<Address, U256>>,
    base_fee: Option<U256>,
    target_gas_limit: U256,
    max_gas_limit: U256,
    istanbul: bool,
    london: bool,
    chain_id: Option<u64>,
}

impl TestClient {
    fn new() -> Self {
        TestClient {
            target_gas_limit: 10_000_000.into(),
            max_gas_limit: 20_000_000.into(),
            istanbul: true,
            london: false,
            ..Default::default()
        }
    }

    fn london(mut self, base_fee: u64) -> Self {
        self.london = true;
        self.chain_id = Some(1);
        self.base_fee = Some(base_fee.into());
        self
    }

    fn with_target(mut self, target: u64) -> Self {
        self.target_gas_limit = target.into();
        self
    }

    fn with_max(mut self, max: u64) -> Self {
        self.max_gas_limit = max.into();
        self
    }

    fn set_nonce(&self, address: Address, nonce: u64) {
        self.nonces.write().insert(address, nonce.into());
    }

    fn set_balance(&self, address: Address, balance: u64) {
        self.balances.write().insert(address, balance.into());
    }

    fn fund(&self, keypair: &KeyPair, nonce: u64) -> Address {
        let address = parity_crypto::publickey::public_to_address(keypair.public());
        self.set_nonce(address, nonce);
        self.balances
            .write()
            .insert(address, U256::from(u64::max_value()));
        address
    }
}

impl ChainClient for TestClient {
    fn account_nonce(&self, address: &Address) -> U256 {
        self.nonces
            .read()
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    fn account_balance(&self, address: &Address) -> U256 {
        self.balances
            .read()
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    fn next_base_fee(&self) -> Option<U256> {
        self.base_fee
    }

    fn target_gas_limit(&self) -> U256 {
        self.target_gas_limit
    }

    fn max_gas_limit(&self) -> U256 {
        self.max_gas_limit
    }

    fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    fn is_istanbul(&self) -> bool {
        self.istanbul
    }

    fn is_london(&self) -> bool {
        self.london
    }
}

/// VM stub: every transaction uses its gas limit; failures are programmable.
#[derive(Default)]
struct TestVm {
    cumulative: U256,
    checkpoints: usize,
    inexecutable: Vec<H256>,
    executed: Vec<H256>,
}

impl PackingContext for TestVm {
    fn checkpoint(&mut self) {
        self.checkpoints += 1;
    }

    fn revert_checkpoint(&mut self) {
        assert!(self.checkpoints > 0, "unbalanced revert");
        self.checkpoints -= 1;
    }

    fn discard_checkpoint(&mut self) {
        assert!(self.checkpoints > 0, "unbalanced discard");
        self.checkpoints -= 1;
    }

    fn execute(&mut self, tx: &SignedTransaction) -> Result<PackedOutcome, PackError> {
        if self.inexecutable.contains(&tx.hash()) {
            return Err(PackError::Inexecutable("programmed failure".into()));
        }
        let gas_used = tx.tx().gas;
        self.cumulative = self.cumulative + gas_used;
        self.executed.push(tx.hash());
        Ok(PackedOutcome {
            gas_used,
            receipt: TypedReceipt::new(
                tx.tx_type(),
                Receipt::new(TransactionOutcome::StatusCode(1), self.cumulative, vec![]),
            ),
        })
    }
}

fn new_queue() -> TransactionQueue {
    TransactionQueue::new(Options::default())
}

#[test]
fn nonce_gap_keeps_item_pending() {
    let _ = ::env_logger::try_init();
    let client = TestClient::new();
    let queue = new_queue();
    let keypair = Random.generate();
    let sender = client.fund(&keypair, 5);

    for nonce in &[5u64, 6, 8] {
        queue
            .import(&client, Tx::default().nonce(*nonce).signed(&keypair).into())
            .unwrap();
    }

    assert_eq!(
        queue.bucket_nonces(&sender, Bucket::Staged),
        vec![U256::from(5), 6.into()]
    );
    assert_eq!(
        queue.bucket_nonces(&sender, Bucket::Pending),
        vec![U256::from(8)]
    );

    // Filling the gap promotes the whole tail.
    queue
        .import(&client, Tx::default().nonce(7).signed(&keypair).into())
        .unwrap();
    assert_eq!(
        queue.bucket_nonces(&sender, Bucket::Staged),
        vec![U256::from(5), 6.into(), 7.into(), 8.into()]
    );
    assert!(queue.bucket_nonces(&sender, Bucket::Pending).is_empty());
}

#[test]
fn replacement_requires_price_bump() {
    let client = TestClient::new();
    let queue = new_queue();
    let keypair = Random.generate();
    client.fund(&keypair, 3);

    let old = Tx::default().nonce(3).gas_price(100).signed(&keypair);
    let old_hash = old.hash();
    queue.import(&client, old.into()).unwrap();

    // Default bump is 10%: 109 is not enough.
    let cheap = Tx::default().nonce(3).gas_price(109).signed(&keypair);
    match queue.import(&client, cheap.into()) {
        Err(transaction::Error::TooCheapToReplace { prev, new }) => {
            assert_eq!(prev, Some(100.into()));
            assert_eq!(new, Some(109.into()));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(queue.find(&old_hash).is_some());

    // 110 replaces; the old item lands in the waste basket.
    let replacement = Tx::default().nonce(3).gas_price(110).signed(&keypair);
    let replacement_hash = replacement.hash();
    queue.import(&client, replacement.into()).unwrap();
    assert!(queue.find(&old_hash).is_none());
    assert!(queue.find(&replacement_hash).is_some());
    assert_eq!(
        queue.removal_reason(&old_hash),
        Some(RemovalReason::Replaced(replacement_hash))
    );
}

#[test]
fn admission_rejects_stale_nonce() {
    let client = TestClient::new();
    let queue = new_queue();
    let keypair = Random.generate();
    client.fund(&keypair, 10);

    let result = queue.import(&client, Tx::default().nonce(9).signed(&keypair).into());
    assert_eq!(result, Err(transaction::Error::Old));
}

#[test]
fn admission_rejects_insufficient_intrinsic_gas() {
    let client = TestClient::new();
    let queue = new_queue();
    let keypair = Random.generate();
    client.fund(&keypair, 0);

    let result = queue.import(&client, Tx::default().gas(20_000).signed(&keypair).into());
    match result {
        Err(transaction::Error::InsufficientGas { minimal, got }) => {
            assert_eq!(minimal, 21_000.into());
            assert_eq!(got, 20_000.into());
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn admission_rejects_unaffordable() {
    let client = TestClient::new();
    let queue = new_queue();
    let keypair = Random.generate();
    let sender = parity_crypto::publickey::public_to_address(keypair.public());
    client.set_nonce(sender, 0);
    // Not enough for 21000 * 10 + 100.
    client.set_balance(sender, 1_000);

    let result = queue.import(&client, Tx::default().signed(&keypair).into());
    match result {
        Err(transaction::Error::InsufficientBalance { balance, cost }) => {
            assert_eq!(balance, 1_000.into());
            assert_eq!(cost, U256::from(21_000u64 * 10 + 100));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn typed_transactions_need_london() {
    let mut pre_london = TestClient::new();
    pre_london.chain_id = Some(1);
    let queue = new_queue();
    let keypair = Random.generate();
    pre_london.fund(&keypair, 0);

    let tx = Tx::default().gas_price(100).signed_1559(&keypair, 5);
    assert_eq!(
        queue.import(&pre_london, tx.clone().into()),
        Err(transaction::Error::TransactionTypeNotEnabled)
    );

    let london = TestClient::new().london(10);
    let queue = new_queue();
    london.fund(&keypair, 0);
    queue.import(&london, tx.into()).unwrap();
}

#[test]
fn unaffordable_tail_stays_pending() {
    let client = TestClient::new();
    let queue = new_queue();
    let keypair = Random.generate();
    let sender = parity_crypto::publickey::public_to_address(keypair.public());
    client.set_nonce(sender, 0);
    // Covers exactly one 21000 * 10 + 100 transaction, not two.
    client.set_balance(sender, 215_000);

    queue
        .import(&client, Tx::default().nonce(0).signed(&keypair).into())
        .unwrap();
    queue
        .import(&client, Tx::default().nonce(1).signed(&keypair).into())
        .unwrap();

    assert_eq!(
        queue.bucket_nonces(&sender, Bucket::Staged),
        vec![U256::zero()]
    );
    assert_eq!(
        queue.bucket_nonces(&sender, Bucket::Pending),
        vec![U256::one()]
    );
}

#[test]
fn fee_cap_below_base_fee_blocks_staging() {
    let client = TestClient::new().london(100);
    let queue = new_queue();
    let keypair = Random.generate();
    let sender = client.fund(&keypair, 0);

    // Fee cap 50 < base fee 100: admitted but not staged.
    let tx = Tx::default().gas_price(50).signed_1559(&keypair, 5);
    queue.import(&client, tx.into()).unwrap();
    assert_eq!(
        queue.bucket_nonces(&sender, Bucket::Pending),
        vec![U256::zero()]
    );
    assert!(queue.bucket_nonces(&sender, Bucket::Staged).is_empty());
}

#[test]
fn head_movement_reinjects_and_discards() {
    let client = TestClient::new();
    let queue = new_queue();
    let keypair = Random.generate();
    let sender = client.fund(&keypair, 0);

    let mined = Tx::default().nonce(0).signed(&keypair);
    let mined_hash = mined.hash();
    queue.import(&client, mined.into()).unwrap();

    // The old branch carried a transaction we never saw.
    let retracted = Tx::default().nonce(1).signed(&keypair);
    let retracted_hash = retracted.hash();

    queue.on_head_changed(&client, vec![retracted], vec![mined_hash]);
    client.set_nonce(sender, 1);
    queue.cull_and_reorg(&client);

    assert!(queue.find(&mined_hash).is_none());
    assert_eq!(queue.removal_reason(&mined_hash), Some(RemovalReason::Mined));
    assert!(queue.find(&retracted_hash).is_some());
    assert_eq!(
        queue.bucket_nonces(&sender, Bucket::Staged),
        vec![U256::one()]
    );
}

#[test]
fn packer_fills_up_to_the_target() {
    let client = TestClient::new().with_target(50_000).with_max(100_000);
    let queue = new_queue();
    let (kp1, kp2) = (Random.generate(), Random.generate());
    client.fund(&kp1, 0);
    client.fund(&kp2, 0);

    queue
        .import(&client, Tx::default().nonce(0).signed(&kp1).into())
        .unwrap();
    queue
        .import(&client, Tx::default().nonce(1).signed(&kp1).into())
        .unwrap();
    queue
        .import(&client, Tx::default().nonce(0).signed(&kp2).into())
        .unwrap();

    let mut vm = TestVm::default();
    let block = queue.pack(&client, &mut vm);

    // Target fits two 21k transactions, not three.
    assert_eq!(block.transactions.len(), 2);
    assert_eq!(block.gas_used, U256::from(42_000));
    assert_eq!(block.receipts.len(), 2);
    assert_eq!(vm.checkpoints, 0);
    assert_eq!(queue.status().packed, 2);
}

#[test]
fn packer_tolerates_max_when_configured() {
    let client = TestClient::new().with_target(30_000).with_max(100_000);
    let mut options = Options::default();
    options.packer = PackerOptions {
        try_harder: false,
        trg_gas_limit_max: true,
    };
    let queue = TransactionQueue::new(options);
    let keypair = Random.generate();
    client.fund(&keypair, 0);

    for nonce in 0..3 {
        queue
            .import(&client, Tx::default().nonce(nonce).signed(&keypair).into())
            .unwrap();
    }

    let mut vm = TestVm::default();
    let block = queue.pack(&client, &mut vm);
    // The hard cap, not the target, limits the block now.
    assert_eq!(block.transactions.len(), 3);
}

#[test]
fn packer_skips_sender_on_inexecutable_item() {
    let client = TestClient::new();
    let queue = new_queue();
    let (kp1, kp2) = (Random.generate(), Random.generate());
    client.fund(&kp1, 0);
    client.fund(&kp2, 0);

    let failing = Tx::default().nonce(0).signed(&kp1);
    let dependent = Tx::default().nonce(1).signed(&kp1);
    let ok = Tx::default().nonce(0).signed(&kp2);
    let failing_hash = failing.hash();
    let ok_hash = ok.hash();

    for tx in vec![failing, dependent, ok] {
        queue.import(&client, tx.into()).unwrap();
    }

    let mut vm = TestVm::default();
    vm.inexecutable.push(failing_hash);
    let block = queue.pack(&client, &mut vm);

    assert_eq!(block.transactions.len(), 1);
    assert_eq!(block.transactions[0].hash(), ok_hash);
    // Savepoints balanced: the failed item was rolled back.
    assert_eq!(vm.checkpoints, 0);
}

#[test]
fn packed_block_commits_to_roots_and_reward() {
    let client = TestClient::new();
    let queue = new_queue();
    let keypair = Random.generate();
    client.fund(&keypair, 0);

    queue
        .import(
            &client,
            Tx::default().nonce(0).gas_price(7).signed(&keypair).into(),
        )
        .unwrap();

    let mut vm = TestVm::default();
    let block = queue.pack(&client, &mut vm);
    assert_eq!(block.transactions.len(), 1);
    // No base fee: the whole gas price tips the author.
    assert_eq!(block.reward, U256::from(21_000u64 * 7));
    assert!(!block.transactions_root.is_zero());
    assert!(!block.receipts_root.is_zero());
    assert_eq!(queue.packed_block().gas_used, block.gas_used);
}

#[test]
fn expiry_moves_tail_to_waste_and_spares_packed() {
    let client = TestClient::new();
    let mut options = Options::default();
    options.lifetime = 0;
    let queue = TransactionQueue::new(options);
    let keypair = Random.generate();
    let sender = client.fund(&keypair, 0);

    let first = Tx::default().nonce(0).signed(&keypair);
    let second = Tx::default().nonce(1).signed(&keypair);
    let first_hash = first.hash();
    let second_hash = second.hash();
    queue.import(&client, first.into()).unwrap();
    queue.import(&client, second.into()).unwrap();

    // Pack the first item; it is spared from expiry by default.
    let client_small = TestClient::new().with_target(21_000).with_max(21_000);
    client_small.fund(&keypair, 0);
    let mut vm = TestVm::default();
    queue.pack(&client_small, &mut vm);
    assert_eq!(queue.bucket_of(&first_hash), Some(Bucket::Packed));

    std::thread::sleep(std::time::Duration::from_millis(20));
    queue.evict_expired(&client);

    assert_eq!(queue.bucket_of(&first_hash), Some(Bucket::Packed));
    assert!(queue.find(&second_hash).is_none());
    assert_eq!(
        queue.removal_reason(&second_hash),
        Some(RemovalReason::Expired)
    );

    // With auto eviction, packed items expire too.
    let mut options = queue.options();
    options.auto_evict_packed = true;
    queue.set_options(&client, options);
    queue.evict_expired(&client);
    assert!(queue.find(&first_hash).is_none());
    let _ = sender;
}

#[test]
fn pool_limit_evicts_cheapest_or_rejects() {
    let client = TestClient::new();
    let mut options = Options::default();
    options.max_count = 1;
    let queue = TransactionQueue::new(options);
    let (kp1, kp2) = (Random.generate(), Random.generate());
    client.fund(&kp1, 0);
    client.fund(&kp2, 0);

    // A staged item is not evictable; use a gapped (pending) one.
    let cheap = Tx::default().nonce(1).gas_price(5).signed(&kp1);
    let cheap_hash = cheap.hash();
    queue.import(&client, cheap.into()).unwrap();

    // An even cheaper newcomer is turned away.
    let cheaper = Tx::default().nonce(1).gas_price(2).signed(&kp2);
    assert_eq!(
        queue.import(&client, cheaper.into()),
        Err(transaction::Error::LimitReached)
    );

    // A better-paying one pushes the cheap item out.
    let rich = Tx::default().nonce(1).gas_price(50).signed(&kp2);
    let rich_hash = rich.hash();
    queue.import(&client, rich.into()).unwrap();
    assert!(queue.find(&cheap_hash).is_none());
    assert_eq!(
        queue.removal_reason(&cheap_hash),
        Some(RemovalReason::Crowded)
    );
    assert!(queue.find(&rich_hash).is_some());
}

#[test]
fn status_counts_buckets() {
    let client = TestClient::new();
    let queue = new_queue();
    let keypair = Random.generate();
    client.fund(&keypair, 0);

    queue
        .import(&client, Tx::default().nonce(0).signed(&keypair).into())
        .unwrap();
    queue
        .import(&client, Tx::default().nonce(2).signed(&keypair).into())
        .unwrap();

    let status = queue.status();
    assert_eq!(status.staged, 1);
    assert_eq!(status.pending, 1);
    assert_eq!(status.packed, 0);
    assert_eq!(status.senders, 1);
}
