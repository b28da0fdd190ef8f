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

//! The transaction queue: admission, bucket bookkeeping and reorg.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use ethereum_types::{Address, H256, U256};
use linked_hash_map::LinkedHashMap;
use parking_lot::{Mutex, RwLock};
use types::transaction::{self, SignedTransaction, TypedTxId, UnverifiedTransaction};

use pool::{
    client::{ChainClient, PackingContext},
    listener::{Listener, NoopListener},
    packer::{pack_transactions, PackedBlock, PackingPolicy},
    Bucket, Options, RemovalReason, SharedTransaction, VerifiedTransaction,
};

/// Counters describing the pool content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStatus {
    /// Items in the `Pending` bucket.
    pub pending: usize,
    /// Items in the `Staged` bucket.
    pub staged: usize,
    /// Items in the `Packed` bucket.
    pub packed: usize,
    /// Entries in the waste basket.
    pub waste: usize,
    /// Distinct senders with live items.
    pub senders: usize,
}

struct PoolItem {
    tx: SharedTransaction,
    bucket: Bucket,
}

struct WasteEntry {
    #[allow(dead_code)]
    tx: Option<SharedTransaction>,
    reason: RemovalReason,
}

#[derive(Default)]
struct Inner {
    by_sender: HashMap<Address, BTreeMap<U256, PoolItem>>,
    by_hash: HashMap<H256, (Address, U256)>,
    // (effective tip, insertion id, id); the front is the cheapest item.
    by_tip: BTreeSet<(U256, u64, H256)>,
    waste: LinkedHashMap<H256, WasteEntry>,
    // The base fee the tip index was last computed with.
    indexed_base_fee: Option<U256>,
    insertion_seq: u64,
    packed_block: PackedBlock,
}

impl Inner {
    fn live_count(&self) -> usize {
        self.by_hash.len()
    }

    fn find(&self, hash: &H256) -> Option<&PoolItem> {
        let (sender, nonce) = self.by_hash.get(hash)?;
        self.by_sender.get(sender)?.get(nonce)
    }

    fn insert(&mut self, tx: SharedTransaction, bucket: Bucket) {
        // Key by the base fee the index was built with; a fee change
        // triggers a full reindex during reorg.
        let key = (
            tx.effective_tip(self.indexed_base_fee),
            tx.insertion_id(),
            tx.hash(),
        );
        self.by_tip.insert(key);
        self.by_hash.insert(tx.hash(), (tx.sender(), tx.nonce()));
        self.by_sender
            .entry(tx.sender())
            .or_insert_with(BTreeMap::new)
            .insert(tx.nonce(), PoolItem { tx, bucket });
    }

    fn remove(&mut self, hash: &H256) -> Option<SharedTransaction> {
        let (sender, nonce) = self.by_hash.remove(hash)?;
        let item = {
            let per_sender = self.by_sender.get_mut(&sender)?;
            let item = per_sender.remove(&nonce)?;
            if per_sender.is_empty() {
                self.by_sender.remove(&sender);
            }
            item
        };
        let key = (
            item.tx.effective_tip(self.indexed_base_fee),
            item.tx.insertion_id(),
            *hash,
        );
        self.by_tip.remove(&key);
        Some(item.tx)
    }

    fn to_waste(&mut self, tx: SharedTransaction, reason: RemovalReason, max_waste: usize) {
        self.waste.insert(
            tx.hash(),
            WasteEntry {
                tx: Some(tx),
                reason,
            },
        );
        while self.waste.len() > max_waste {
            self.waste.pop_front();
        }
    }

    fn waste_rejected(&mut self, hash: H256, reason: transaction::Error, max_waste: usize) {
        self.waste.insert(
            hash,
            WasteEntry {
                tx: None,
                reason: RemovalReason::Rejected(reason),
            },
        );
        while self.waste.len() > max_waste {
            self.waste.pop_front();
        }
    }

    fn reindex_tips(&mut self, base_fee: Option<U256>) {
        if self.indexed_base_fee == base_fee {
            return;
        }
        self.by_tip.clear();
        for per_sender in self.by_sender.values() {
            for item in per_sender.values() {
                self.by_tip.insert((
                    item.tx.effective_tip(base_fee),
                    item.tx.insertion_id(),
                    item.tx.hash(),
                ));
            }
        }
        self.indexed_base_fee = base_fee;
    }

    fn set_bucket(&mut self, sender: &Address, nonce: &U256, bucket: Bucket) {
        if let Some(item) = self
            .by_sender
            .get_mut(sender)
            .and_then(|map| map.get_mut(nonce))
        {
            item.bucket = bucket;
        }
    }

    fn status(&self) -> QueueStatus {
        let mut status = QueueStatus::default();
        for per_sender in self.by_sender.values() {
            for item in per_sender.values() {
                match item.bucket {
                    Bucket::Pending => status.pending += 1,
                    Bucket::Staged => status.staged += 1,
                    Bucket::Packed => status.packed += 1,
                }
            }
        }
        status.waste = self.waste.len();
        status.senders = self.by_sender.len();
        status
    }
}

/// The transaction queue.
pub struct TransactionQueue {
    inner: RwLock<Inner>,
    options: RwLock<Options>,
    listener: Mutex<Box<dyn Listener>>,
}

impl TransactionQueue {
    /// Create a new queue with the given options and no listener.
    pub fn new(options: Options) -> Self {
        Self::with_listener(options, Box::new(NoopListener))
    }

    /// Create a new queue notifying the given listener.
    pub fn with_listener(options: Options, listener: Box<dyn Listener>) -> Self {
        TransactionQueue {
            inner: RwLock::new(Inner::default()),
            options: RwLock::new(options),
            listener: Mutex::new(listener),
        }
    }

    /// Replace the queue options and re-classify all items.
    pub fn set_options(&self, client: &dyn ChainClient, options: Options) {
        *self.options.write() = options;
        self.cull_and_reorg(client);
    }

    /// Current queue options.
    pub fn options(&self) -> Options {
        self.options.read().clone()
    }

    /// Import a new transaction into the pool. On success the item enters at
    /// `Pending` and a bucket reorg runs. On rejection the reason is recorded
    /// in the waste basket.
    pub fn import(
        &self,
        client: &dyn ChainClient,
        tx: UnverifiedTransaction,
    ) -> Result<H256, transaction::Error> {
        let hash = tx.hash();
        let result = self.admit(client, tx);
        if let Err(ref reason) = result {
            let max_waste = self.options.read().max_waste;
            let mut inner = self.inner.write();
            // Known items are not waste; everything else is recorded.
            if *reason != transaction::Error::AlreadyImported {
                inner.waste_rejected(hash, reason.clone(), max_waste);
            }
            self.listener.lock().rejected(&hash, reason);
        }
        result
    }

    fn admit(
        &self,
        client: &dyn ChainClient,
        tx: UnverifiedTransaction,
    ) -> Result<H256, transaction::Error> {
        let hash = tx.hash();
        let options = self.options.read().clone();

        {
            let inner = self.inner.read();
            if inner.by_hash.contains_key(&hash) || inner.waste.contains_key(&hash) {
                return Err(transaction::Error::AlreadyImported);
            }
        }

        tx.verify_basic(client.chain_id())?;

        if tx.tx_type() != TypedTxId::Legacy && !client.is_london() {
            return Err(transaction::Error::TransactionTypeNotEnabled);
        }

        let intrinsic = U256::from(tx.intrinsic_gas(client.is_istanbul()));
        if intrinsic > tx.tx().gas {
            return Err(transaction::Error::InsufficientGas {
                minimal: intrinsic,
                got: tx.tx().gas,
            });
        }

        if tx.max_fee_per_gas() < tx.max_priority_fee_per_gas() {
            return Err(transaction::Error::PriorityFeeExceedsMaxFee {
                max_fee: tx.max_fee_per_gas(),
                priority_fee: tx.max_priority_fee_per_gas(),
            });
        }

        let signed = SignedTransaction::new(tx)?;
        let sender = signed.sender();
        let nonce = signed.tx().nonce;

        let account_nonce = client.account_nonce(&sender);
        if nonce < account_nonce {
            return Err(transaction::Error::Old);
        }

        let balance = client.account_balance(&sender);
        let cost = signed
            .tx()
            .gas
            .saturating_mul(signed.max_fee_per_gas())
            .saturating_add(signed.tx().value);
        if balance < cost {
            return Err(transaction::Error::InsufficientBalance { balance, cost });
        }

        let base_fee = client.next_base_fee();
        let mut inner = self.inner.write();
        let mut listener = self.listener.lock();

        // Price-bump replacement of a same-(sender, nonce) item.
        let old = inner
            .by_sender
            .get(&sender)
            .and_then(|map| map.get(&nonce))
            .map(|item| item.tx.clone());
        if let Some(old) = old {
            let old_price = old.signed().max_fee_per_gas();
            let required = old_price.saturating_mul((100 + options.price_bump).into())
                / U256::from(100);
            if signed.max_fee_per_gas() < required {
                return Err(transaction::Error::TooCheapToReplace {
                    prev: Some(old_price),
                    new: Some(signed.max_fee_per_gas()),
                });
            }
            inner.remove(&old.hash());
            inner.to_waste(old.clone(), RemovalReason::Replaced(hash), options.max_waste);
            listener.dropped(&old, &RemovalReason::Replaced(hash));

            let item = self.make_item(&mut inner, signed);
            inner.insert(item.clone(), Bucket::Pending);
            listener.added(&item, Some(&old));
            drop(listener);
            drop(inner);
            self.cull_and_reorg(client);
            return Ok(hash);
        }

        // Pool capacity: push out the cheapest pending item, or give up.
        if inner.live_count() >= options.max_count {
            let new_tip = signed.effective_priority_fee(base_fee);
            let cheapest = inner
                .by_tip
                .iter()
                .find(|(_, _, h)| {
                    inner
                        .find(h)
                        .map_or(false, |item| item.bucket == Bucket::Pending)
                })
                .cloned();
            match cheapest {
                Some((tip, _, cheap_hash)) if tip < new_tip => {
                    if let Some(evicted) = inner.remove(&cheap_hash) {
                        inner.to_waste(
                            evicted.clone(),
                            RemovalReason::Crowded,
                            options.max_waste,
                        );
                        listener.dropped(&evicted, &RemovalReason::Crowded);
                    }
                }
                _ => return Err(transaction::Error::LimitReached),
            }
        }

        let item = self.make_item(&mut inner, signed);
        inner.insert(item.clone(), Bucket::Pending);
        listener.added(&item, None);
        drop(listener);
        drop(inner);
        self.cull_and_reorg(client);
        Ok(hash)
    }

    fn make_item(&self, inner: &mut Inner, signed: SignedTransaction) -> SharedTransaction {
        inner.insertion_seq += 1;
        Arc::new(VerifiedTransaction::new(signed, inner.insertion_seq))
    }

    /// Whether an item is currently allowed in the active (`Staged`) set.
    /// The caller guarantees nonce contiguity; `spent` is the worst-case cost
    /// of all lower-nonce live items of the same sender.
    fn classify_active(
        options: &Options,
        client: &dyn ChainClient,
        base_fee: Option<U256>,
        balance: U256,
        spent: U256,
        item: &VerifiedTransaction,
    ) -> bool {
        let signed = item.signed();

        if item.effective_tip(base_fee).is_zero() {
            return false;
        }
        if signed.tx().gas > client.target_gas_limit() {
            return false;
        }
        if let Some(base_fee) = base_fee {
            if signed.max_fee_per_gas() < base_fee {
                return false;
            }
        }
        if balance < spent.saturating_add(item.worst_case_cost()) {
            return false;
        }

        // Configured floors.
        match signed.tx_type() {
            TypedTxId::Legacy => {
                if !client.is_london() && signed.tx().gas_price < options.pre_london_min_price {
                    return false;
                }
            }
            TypedTxId::EIP1559 => {
                if signed.max_priority_fee_per_gas() < options.min_tip_1559
                    || signed.max_fee_per_gas() < options.min_fee_1559
                {
                    return false;
                }
            }
        }

        true
    }

    /// Re-classify every item. Runs after admission, head movement or an
    /// option change; equivalent to a full rescan.
    pub fn cull_and_reorg(&self, client: &dyn ChainClient) {
        let options = self.options.read().clone();
        let base_fee = client.next_base_fee();
        let mut inner = self.inner.write();
        let mut listener = self.listener.lock();

        inner.reindex_tips(base_fee);

        let senders: Vec<Address> = inner.by_sender.keys().cloned().collect();
        for sender in senders {
            let account_nonce = client.account_nonce(&sender);
            let balance = client.account_balance(&sender);

            // Drop items whose nonce the chain already consumed.
            let stale: Vec<H256> = inner
                .by_sender
                .get(&sender)
                .map(|map| {
                    map.range(..account_nonce)
                        .map(|(_, item)| item.tx.hash())
                        .collect()
                })
                .unwrap_or_default();
            for hash in stale {
                if let Some(tx) = inner.remove(&hash) {
                    inner.to_waste(tx.clone(), RemovalReason::Stale, options.max_waste);
                    listener.dropped(&tx, &RemovalReason::Stale);
                }
            }

            let nonces: Vec<(U256, Bucket)> = inner
                .by_sender
                .get(&sender)
                .map(|map| {
                    map.iter()
                        .map(|(nonce, item)| (*nonce, item.bucket))
                        .collect()
                })
                .unwrap_or_default();
            if nonces.is_empty() {
                continue;
            }

            // Step 1: stash the Pending items; the live prefix remains.
            let stash: Vec<U256> = nonces
                .iter()
                .filter(|(_, bucket)| *bucket == Bucket::Pending)
                .map(|(nonce, _)| *nonce)
                .collect();
            let live: Vec<(U256, Bucket)> = nonces
                .into_iter()
                .filter(|(_, bucket)| *bucket != Bucket::Pending)
                .collect();

            // Steps 2 and 3: find the first live item that no longer
            // classifies as active, walking in nonce order so the cumulative
            // balance is exact. A failing Packed item additionally pulls the
            // whole Staged queue down with it, which the "demote everything
            // from the failure onwards" rule already covers since packed
            // nonces sit below staged ones.
            let mut spent = U256::zero();
            let mut expected = account_nonce;
            let mut demote_from = None;
            for (nonce, _) in &live {
                let item = match inner.by_sender.get(&sender).and_then(|m| m.get(nonce)) {
                    Some(item) => item.tx.clone(),
                    None => continue,
                };
                if *nonce != expected
                    || !Self::classify_active(&options, client, base_fee, balance, spent, &item)
                {
                    demote_from = Some(*nonce);
                    break;
                }
                spent = spent.saturating_add(item.worst_case_cost());
                expected = nonce.saturating_add(U256::one());
            }

            if let Some(from) = demote_from {
                for (nonce, _) in live.iter().filter(|(nonce, _)| *nonce >= from) {
                    inner.set_bucket(&sender, nonce, Bucket::Pending);
                }
                // The stash is purged: its nonces are above the demoted ones,
                // so none of it can become active this round.
                continue;
            }

            // Step 4: re-insert the stash, promoting while the classifier
            // holds in nonce order.
            let mut promoting = true;
            for nonce in stash {
                if !promoting {
                    break;
                }
                let item = match inner.by_sender.get(&sender).and_then(|m| m.get(&nonce)) {
                    Some(item) => item.tx.clone(),
                    None => continue,
                };
                if nonce == expected
                    && Self::classify_active(&options, client, base_fee, balance, spent, &item)
                {
                    inner.set_bucket(&sender, &nonce, Bucket::Staged);
                    spent = spent.saturating_add(item.worst_case_cost());
                    expected = nonce.saturating_add(U256::one());
                } else {
                    promoting = false;
                }
            }
        }
    }

    /// Rebuild the `Packed` bucket by executing staged candidates through the
    /// given VM context. Returns the candidate block content.
    pub fn pack(&self, client: &dyn ChainClient, ctx: &mut dyn PackingContext) -> PackedBlock {
        let options = self.options.read().clone();
        let base_fee = client.next_base_fee();
        let policy = PackingPolicy::new(
            options.packer,
            client.target_gas_limit(),
            client.max_gas_limit(),
        );

        let mut inner = self.inner.write();

        // Previously packed items are candidates again.
        let packed: Vec<(Address, U256)> = inner
            .by_sender
            .iter()
            .flat_map(|(sender, map)| {
                map.iter()
                    .filter(|(_, item)| item.bucket == Bucket::Packed)
                    .map(move |(nonce, _)| (*sender, *nonce))
            })
            .collect();
        for (sender, nonce) in packed {
            inner.set_bucket(&sender, &nonce, Bucket::Staged);
        }

        // Sweep order: descending account, ascending nonce.
        let mut senders: Vec<Address> = inner.by_sender.keys().cloned().collect();
        senders.sort();
        senders.reverse();
        let staged: Vec<SharedTransaction> = senders
            .iter()
            .flat_map(|sender| {
                inner.by_sender[sender]
                    .values()
                    .filter(|item| item.bucket == Bucket::Staged)
                    .map(|item| item.tx.clone())
                    .collect::<Vec<_>>()
            })
            .collect();

        let (block, packed_ids) = pack_transactions(&staged, ctx, &policy, base_fee);

        let mut listener = self.listener.lock();
        for hash in &packed_ids {
            if let Some((sender, nonce)) = inner.by_hash.get(hash).cloned() {
                inner.set_bucket(&sender, &nonce, Bucket::Packed);
            }
            if let Some(item) = inner.find(hash).map(|item| item.tx.clone()) {
                listener.packed(&item);
            }
        }

        inner.packed_block = block.clone();
        block
    }

    /// The most recent packer output.
    pub fn packed_block(&self) -> PackedBlock {
        self.inner.read().packed_block.clone()
    }

    /// Adjust the pool to a head movement: transactions only on the old
    /// branch are re-injected as `Pending`, transactions on the new branch
    /// are discarded, then a reorg runs.
    pub fn on_head_changed(
        &self,
        client: &dyn ChainClient,
        retracted: Vec<SignedTransaction>,
        enacted: Vec<H256>,
    ) {
        let options = self.options.read().clone();
        let base_fee = client.next_base_fee();
        {
            let mut inner = self.inner.write();
            let mut listener = self.listener.lock();
            let enacted: HashSet<H256> = enacted.into_iter().collect();

            // Anything mined on the new branch leaves the pool.
            for hash in &enacted {
                if let Some(tx) = inner.remove(hash) {
                    inner.to_waste(tx.clone(), RemovalReason::Mined, options.max_waste);
                    listener.culled(&tx);
                }
            }

            // Transactions only on the old branch become candidates again.
            for tx in retracted {
                let hash = tx.hash();
                if enacted.contains(&hash) || inner.by_hash.contains_key(&hash) {
                    continue;
                }
                // Items may come back from the waste basket after a reorg.
                inner.waste.remove(&hash);
                let item = self.make_item(&mut inner, tx);
                inner.insert(item.clone(), Bucket::Pending);
                listener.added(&item, None);
            }
        }
        self.cull_and_reorg(client);
    }

    /// Move items older than the configured lifetime to the waste basket,
    /// along with their higher-nonce siblings. `Packed` items are spared
    /// unless `auto_evict_packed` is set.
    pub fn evict_expired(&self, client: &dyn ChainClient) {
        let options = self.options.read().clone();
        let lifetime = Duration::from_secs(options.lifetime);
        let now = Instant::now();
        let mut any_expired = false;
        {
            let mut inner = self.inner.write();
            let mut listener = self.listener.lock();

            let senders: Vec<Address> = inner.by_sender.keys().cloned().collect();
            for sender in senders {
                let expired_from: Option<U256> = inner.by_sender.get(&sender).and_then(|map| {
                    map.values()
                        .find(|item| {
                            let is_old =
                                now.duration_since(item.tx.received_at()) > lifetime;
                            let spared = item.bucket == Bucket::Packed
                                && !options.auto_evict_packed;
                            is_old && !spared
                        })
                        .map(|item| item.tx.nonce())
                });
                let from = match expired_from {
                    Some(from) => from,
                    None => continue,
                };
                let victims: Vec<H256> = inner
                    .by_sender
                    .get(&sender)
                    .map(|map| {
                        map.range(from..)
                            .map(|(_, item)| item.tx.hash())
                            .collect()
                    })
                    .unwrap_or_default();
                for hash in victims {
                    if let Some(tx) = inner.remove(&hash) {
                        any_expired = true;
                        inner.to_waste(tx.clone(), RemovalReason::Expired, options.max_waste);
                        listener.dropped(&tx, &RemovalReason::Expired);
                    }
                }
            }
        }
        if any_expired {
            self.cull_and_reorg(client);
        }
    }

    /// Find a live item by id.
    pub fn find(&self, hash: &H256) -> Option<SharedTransaction> {
        self.inner.read().find(hash).map(|item| item.tx.clone())
    }

    /// The bucket a live item is in, if any.
    pub fn bucket_of(&self, hash: &H256) -> Option<Bucket> {
        self.inner.read().find(hash).map(|item| item.bucket)
    }

    /// The waste-basket reason for an item, if it was wasted.
    pub fn removal_reason(&self, hash: &H256) -> Option<RemovalReason> {
        self.inner
            .read()
            .waste
            .get(hash)
            .map(|entry| entry.reason.clone())
    }

    /// The nonces of a sender's items in the given bucket, ascending.
    pub fn bucket_nonces(&self, sender: &Address, bucket: Bucket) -> Vec<U256> {
        self.inner
            .read()
            .by_sender
            .get(sender)
            .map(|map| {
                map.values()
                    .filter(|item| item.bucket == bucket)
                    .map(|item| item.tx.nonce())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Pool content counters.
    pub fn status(&self) -> QueueStatus {
        self.inner.read().status()
    }
}
