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

//! Epoch parameters and light cache generation.

use compute::{keccak_256_in_place, keccak_512, keccak_512_node, Node, NODE_BYTES, NODE_WORDS};
use ethereum_types::H256;

/// Blocks per ethash epoch.
pub const EPOCH_LENGTH: u64 = 30_000;

const CACHE_BYTES_INIT: u64 = 1 << 24;
const CACHE_BYTES_GROWTH: u64 = 1 << 17;
const DATASET_BYTES_INIT: u64 = 1 << 30;
const DATASET_BYTES_GROWTH: u64 = 1 << 23;
const ETHASH_CACHE_ROUNDS: usize = 3;
const MIX_BYTES: u64 = 128;

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// The epoch a block number belongs to.
pub fn epoch(block_number: u64) -> u64 {
    block_number / EPOCH_LENGTH
}

/// Size in bytes of the light cache for the given epoch.
pub fn cache_size(epoch: u64) -> u64 {
    let mut sz = CACHE_BYTES_INIT + CACHE_BYTES_GROWTH * epoch - NODE_BYTES as u64;
    while !is_prime(sz / NODE_BYTES as u64) {
        sz -= 2 * NODE_BYTES as u64;
    }
    sz
}

/// Size in bytes of the full dataset for the given epoch. Only the size is
/// needed for light verification; the dataset itself is never materialized.
pub fn dataset_size(epoch: u64) -> u64 {
    let mut sz = DATASET_BYTES_INIT + DATASET_BYTES_GROWTH * epoch - MIX_BYTES;
    while !is_prime(sz / MIX_BYTES) {
        sz -= 2 * MIX_BYTES;
    }
    sz
}

/// The seed the cache of the given epoch is derived from: keccak-256 iterated
/// epoch times over the zero hash.
pub fn seed_hash(epoch: u64) -> H256 {
    let mut seed = [0u8; 32];
    for _ in 0..epoch {
        keccak_256_in_place(&mut seed);
    }
    H256(seed)
}

/// Generate the light cache for an epoch: a keccak-512 chain over the seed
/// followed by `ETHASH_CACHE_ROUNDS` rounds of the RandMemoHash mixing.
pub fn make_cache(epoch: u64) -> Vec<Node> {
    let num_nodes = (cache_size(epoch) / NODE_BYTES as u64) as usize;
    let seed = seed_hash(epoch);

    let mut nodes: Vec<Node> = Vec::with_capacity(num_nodes);
    nodes.push(keccak_512(seed.as_bytes()));
    for i in 1..num_nodes {
        let prev = nodes[i - 1];
        nodes.push(keccak_512_node(&prev));
    }

    for _ in 0..ETHASH_CACHE_ROUNDS {
        for i in 0..num_nodes {
            let v = nodes[i].word(0) as usize % num_nodes;
            let idx = (i + num_nodes - 1) % num_nodes;

            let mut data = nodes[idx];
            for w in 0..NODE_WORDS {
                data.set_word(w, data.word(w) ^ nodes[v].word(w));
            }
            nodes[i] = keccak_512_node(&data);
        }
    }

    nodes
}
