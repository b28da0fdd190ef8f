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

//! Ethash proof-of-work: light caches per epoch and nonce verification.

extern crate ethereum_types;
extern crate parking_lot;
extern crate tiny_keccak;
#[macro_use]
extern crate log;

mod cache;
mod compute;

use std::{
    collections::{HashMap, VecDeque},
    convert::TryFrom,
    sync::Arc,
};

use ethereum_types::{BigEndianHash, H256, U256, U512};
use parking_lot::Mutex;

pub use cache::{cache_size, dataset_size, epoch, make_cache, seed_hash, EPOCH_LENGTH};
pub use compute::{hashimoto_light, Node, ProofOfWork};

/// Default number of epoch caches kept in memory.
pub const DEFAULT_CACHED_EPOCHS: usize = 10;

/// An immutable light cache for one epoch.
pub struct LightCache {
    /// The epoch this cache belongs to.
    pub epoch: u64,
    /// The full dataset size, needed by hashimoto-light.
    pub full_size: u64,
    /// The cache nodes.
    pub nodes: Vec<Node>,
}

impl LightCache {
    fn generate(epoch: u64) -> Self {
        debug!(target: "ethash", "generating light cache for epoch {}", epoch);
        LightCache {
            epoch,
            full_size: dataset_size(epoch),
            nodes: make_cache(epoch),
        }
    }

    /// Evaluate the proof-of-work function for a nonce attempt.
    pub fn compute(&self, header_hash: &H256, nonce: u64) -> ProofOfWork {
        hashimoto_light(self.full_size, &self.nodes, header_hash, nonce)
    }
}

struct CacheStore {
    caches: HashMap<u64, Arc<LightCache>>,
    // Insertion order; the front is the first to be evicted.
    order: VecDeque<u64>,
}

/// Keeps epoch caches, generating them on demand and evicting the oldest
/// inserted once more than the configured number is held.
pub struct EthashManager {
    cache_cap: usize,
    store: Mutex<CacheStore>,
}

impl EthashManager {
    /// Create a manager holding at most `cache_cap` epoch caches.
    pub fn new(cache_cap: usize) -> Self {
        EthashManager {
            cache_cap,
            store: Mutex::new(CacheStore {
                caches: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// The light cache for the epoch of `block_number`, generated on miss.
    pub fn light(&self, block_number: u64) -> Arc<LightCache> {
        let epoch = epoch(block_number);
        let mut store = self.store.lock();
        if let Some(cache) = store.caches.get(&epoch) {
            return cache.clone();
        }

        let cache = Arc::new(LightCache::generate(epoch));
        store.caches.insert(epoch, cache.clone());
        store.order.push_back(epoch);
        while store.order.len() > self.cache_cap {
            if let Some(evicted) = store.order.pop_front() {
                trace!(target: "ethash", "evicting light cache for epoch {}", evicted);
                store.caches.remove(&evicted);
            }
        }
        cache
    }

    /// Evaluate the proof-of-work function for the given block.
    pub fn compute_light(&self, block_number: u64, header_hash: &H256, nonce: u64) -> ProofOfWork {
        self.light(block_number).compute(header_hash, nonce)
    }

    /// Number of epoch caches currently held.
    pub fn cached_epochs(&self) -> usize {
        self.store.lock().caches.len()
    }
}

/// Convert an ethash boundary to its difficulty.
pub fn boundary_to_difficulty(boundary: &H256) -> U256 {
    difficulty_to_boundary_aux(&boundary.into_uint())
}

/// Convert a difficulty to the target boundary a work value must stay under.
pub fn difficulty_to_boundary(difficulty: &U256) -> H256 {
    BigEndianHash::from_uint(&difficulty_to_boundary_aux(difficulty))
}

fn difficulty_to_boundary_aux<T: Into<U512>>(difficulty: T) -> U256 {
    let difficulty = difficulty.into();

    assert!(!difficulty.is_zero());

    if difficulty == U512::one() {
        U256::max_value()
    } else {
        const PROOF: &str = "difficulty > 1, so the quotient fits 256 bits; qed";
        U256::try_from((U512::one() << 256) / difficulty).expect(PROOF)
    }
}
