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

//! Keccak-flavoured trie roots.

use crate::hash::keccak;
use ethereum_types::H256;
use hash_db::Hasher;
use plain_hasher::PlainHasher;

/// Concrete `Hasher` impl for the Keccak-256 hash.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct KeccakHasher;

impl Hasher for KeccakHasher {
    type Out = H256;
    type StdHasher = PlainHasher;
    const LENGTH: usize = 32;

    fn hash(x: &[u8]) -> Self::Out {
        keccak(x)
    }
}

/// The root of the trie formed by indexing the input values 0, 1, 2, ...
/// Used for transaction and receipt roots.
pub fn ordered_trie_root<I>(input: I) -> H256
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    triehash::ordered_trie_root::<KeccakHasher, I>(input)
}

/// The root of the trie formed by the given key/value pairs.
pub fn trie_root<I, A, B>(input: I) -> H256
where
    I: IntoIterator<Item = (A, B)>,
    A: AsRef<[u8]> + Ord,
    B: AsRef<[u8]>,
{
    triehash::trie_root::<KeccakHasher, I, A, B>(input)
}

/// The root of the "secure" trie: keys are hashed before insertion.
/// This is the shape of the Ethereum state trie.
pub fn sec_trie_root<I, A, B>(input: I) -> H256
where
    I: IntoIterator<Item = (A, B)>,
    A: AsRef<[u8]>,
    B: AsRef<[u8]>,
{
    triehash::sec_trie_root::<KeccakHasher, I, A, B>(input)
}
