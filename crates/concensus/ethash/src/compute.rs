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

//! Hashimoto-light: proof-of-work evaluation against an epoch cache.

use ethereum_types::H256;
use tiny_keccak::{Hasher, Keccak};

/// Bytes per cache/dataset node.
pub const NODE_BYTES: usize = 64;
/// Little-endian u32 words per node.
pub const NODE_WORDS: usize = NODE_BYTES / 4;

const MIX_WORDS: usize = 32;
const MIX_NODES: usize = 2;
const ETHASH_ACCESSES: u32 = 64;
const ETHASH_DATASET_PARENTS: u32 = 256;
const FNV_PRIME: u32 = 0x0100_0193;

/// A 512-bit cache node.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    /// Raw node bytes; words are read little-endian.
    pub bytes: [u8; NODE_BYTES],
}

impl Node {
    /// Read the i-th little-endian u32 word.
    #[inline]
    pub fn word(&self, i: usize) -> u32 {
        let o = i * 4;
        u32::from_le_bytes([
            self.bytes[o],
            self.bytes[o + 1],
            self.bytes[o + 2],
            self.bytes[o + 3],
        ])
    }

    /// Write the i-th little-endian u32 word.
    #[inline]
    pub fn set_word(&mut self, i: usize, value: u32) {
        self.bytes[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for Node {
    fn default() -> Self {
        Node {
            bytes: [0u8; NODE_BYTES],
        }
    }
}

#[inline]
fn fnv(x: u32, y: u32) -> u32 {
    x.wrapping_mul(FNV_PRIME) ^ y
}

/// keccak-512 of arbitrary input into a node.
pub fn keccak_512(input: &[u8]) -> Node {
    let mut node = Node::default();
    let mut keccak = Keccak::v512();
    keccak.update(input);
    keccak.finalize(&mut node.bytes);
    node
}

/// keccak-512 of a node.
pub fn keccak_512_node(input: &Node) -> Node {
    keccak_512(&input.bytes)
}

/// keccak-256 over a 32-byte buffer, in place.
pub fn keccak_256_in_place(buf: &mut [u8; 32]) {
    let mut out = [0u8; 32];
    let mut keccak = Keccak::v256();
    keccak.update(&buf[..]);
    keccak.finalize(&mut out);
    *buf = out;
}

fn keccak_256(input: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut keccak = Keccak::v256();
    keccak.update(input);
    keccak.finalize(&mut out);
    out
}

/// The mix digest and work value of one nonce attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    /// Mix digest the header seal must repeat.
    pub mix_digest: H256,
    /// The work value compared against the boundary.
    pub value: H256,
}

/// Compute one 64-byte dataset item from the light cache.
fn calc_dataset_item(cache: &[Node], i: u32) -> Node {
    let num_nodes = cache.len();

    let mut mix = cache[i as usize % num_nodes];
    mix.set_word(0, mix.word(0) ^ i);
    let mut mix = keccak_512_node(&mix);

    for j in 0..ETHASH_DATASET_PARENTS {
        let parent = fnv(i ^ j, mix.word(j as usize % NODE_WORDS)) as usize % num_nodes;
        for w in 0..NODE_WORDS {
            mix.set_word(w, fnv(mix.word(w), cache[parent].word(w)));
        }
    }

    keccak_512_node(&mix)
}

/// Evaluate the proof-of-work function for the given mining hash and nonce
/// using only the light cache of the epoch.
pub fn hashimoto_light(
    full_size: u64,
    cache: &[Node],
    header_hash: &H256,
    nonce: u64,
) -> ProofOfWork {
    // Seed node: keccak-512 over the mining hash and the little-endian nonce.
    let mut seed_input = [0u8; 40];
    seed_input[..32].copy_from_slice(header_hash.as_bytes());
    seed_input[32..].copy_from_slice(&nonce.to_le_bytes());
    let seed = keccak_512(&seed_input);

    // 128-byte mix, initialized as the seed repeated.
    let mut mix = [0u32; MIX_WORDS];
    for (i, word) in mix.iter_mut().enumerate() {
        *word = seed.word(i % NODE_WORDS);
    }

    let num_full_pages = (full_size / (NODE_BYTES as u64 * MIX_NODES as u64)) as u32;
    let first_word = seed.word(0);

    for i in 0..ETHASH_ACCESSES {
        let index = fnv(first_word ^ i, mix[i as usize % MIX_WORDS]) % num_full_pages;
        for n in 0..MIX_NODES as u32 {
            let item = calc_dataset_item(cache, index * MIX_NODES as u32 + n);
            for w in 0..NODE_WORDS {
                let m = n as usize * NODE_WORDS + w;
                mix[m] = fnv(mix[m], item.word(w));
            }
        }
    }

    // Compress the mix down to 32 bytes.
    let mut compressed = [0u8; 32];
    for i in 0..MIX_WORDS / 4 {
        let w = i * 4;
        let reduced = fnv(fnv(fnv(mix[w], mix[w + 1]), mix[w + 2]), mix[w + 3]);
        compressed[i * 4..i * 4 + 4].copy_from_slice(&reduced.to_le_bytes());
    }

    let mut value_input = [0u8; 96];
    value_input[..64].copy_from_slice(&seed.bytes);
    value_input[64..].copy_from_slice(&compressed);

    ProofOfWork {
        mix_digest: H256(compressed),
        value: H256(keccak_256(&value_input)),
    }
}
