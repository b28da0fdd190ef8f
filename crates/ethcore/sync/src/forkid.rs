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

//! EIP2124 fork identifier: a CRC32 over the genesis hash and every past
//! fork block, used to reject incompatible peers at handshake.

use crc::crc32::{self, Hasher32};
use ethereum_types::H256;
use types::BlockNumber;

/// The fork identifier a node advertises in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkId {
    /// CRC32 over the genesis hash and each past fork block number.
    pub hash: u32,
    /// The next scheduled fork block, zero when none is known.
    pub next: BlockNumber,
}

/// Validation outcome for a remote fork id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkIdValidity {
    /// The remote is compatible with the local chain.
    Compatible,
    /// The remote needs a software update before the next fork; still
    /// acceptable for syncing today.
    Stale,
    /// The remote is on a different chain; reject it.
    Incompatible,
}

/// Computes fork ids for one chain and validates remote ones.
#[derive(Debug, Clone)]
pub struct ForkFilter {
    genesis_hash: H256,
    // Ascending, deduplicated fork activation blocks.
    forks: Vec<BlockNumber>,
    // The checksum after genesis and after each fork, forks.len() + 1 entries.
    checksums: Vec<u32>,
}

impl ForkFilter {
    /// Build a filter from the genesis hash and the fork schedule.
    pub fn new(genesis_hash: H256, forks: Vec<BlockNumber>) -> Self {
        let mut digest = crc32::Digest::new(crc32::IEEE);
        digest.write(genesis_hash.as_bytes());
        let mut checksums = vec![digest.sum32()];
        for fork in &forks {
            digest.write(&fork.to_be_bytes());
            checksums.push(digest.sum32());
        }
        ForkFilter {
            genesis_hash,
            forks,
            checksums,
        }
    }

    /// The genesis hash the filter was built from.
    pub fn genesis_hash(&self) -> H256 {
        self.genesis_hash
    }

    // Index into `checksums` for the given head: the count of forks at or
    // below it.
    fn active_index(&self, head: BlockNumber) -> usize {
        self.forks.iter().take_while(|fork| **fork <= head).count()
    }

    /// The fork id to advertise at the given chain head.
    pub fn current(&self, head: BlockNumber) -> ForkId {
        let index = self.active_index(head);
        ForkId {
            hash: self.checksums[index],
            next: self.forks.get(index).cloned().unwrap_or(0),
        }
    }

    /// Validate a remote fork id against the local chain at `head`,
    /// per the EIP2124 rules.
    pub fn validate(&self, remote: ForkId, head: BlockNumber) -> ForkIdValidity {
        let local_index = self.active_index(head);

        // 1) The remote matches our current state exactly.
        if remote.hash == self.checksums[local_index] {
            // It must not believe a fork we already passed is still due.
            if remote.next != 0 && remote.next <= head {
                return ForkIdValidity::Incompatible;
            }
            return ForkIdValidity::Compatible;
        }

        // 2) The remote is a subset of our past: it is stale but on our
        //    chain if its checksum matches one of our earlier states and it
        //    expects the fork we applied next.
        for index in 0..local_index {
            if remote.hash == self.checksums[index] {
                return if remote.next == self.forks[index] {
                    ForkIdValidity::Stale
                } else {
                    ForkIdValidity::Incompatible
                };
            }
        }

        // 3) The remote is ahead of us: acceptable when its checksum matches
        //    one of our scheduled future states; we are the stale side.
        for index in local_index + 1..self.checksums.len() {
            if remote.hash == self.checksums[index] {
                return ForkIdValidity::Stale;
            }
        }

        ForkIdValidity::Incompatible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ForkFilter {
        ForkFilter::new(H256::repeat_byte(0x11), vec![100, 200, 1_000])
    }

    #[test]
    fn current_id_tracks_the_head() {
        let filter = filter();
        let at_genesis = filter.current(0);
        assert_eq!(at_genesis.next, 100);

        let after_first = filter.current(150);
        assert_ne!(after_first.hash, at_genesis.hash);
        assert_eq!(after_first.next, 200);

        let after_all = filter.current(2_000);
        assert_eq!(after_all.next, 0);
    }

    #[test]
    fn same_chain_is_compatible() {
        let filter = filter();
        for head in &[0u64, 99, 100, 500, 5_000] {
            assert_eq!(
                filter.validate(filter.current(*head), *head),
                ForkIdValidity::Compatible
            );
        }
    }

    #[test]
    fn stale_remote_is_tolerated() {
        let filter = filter();
        // The remote is still pre-fork 200 while we are past it.
        let remote = filter.current(150);
        assert_eq!(filter.validate(remote, 500), ForkIdValidity::Stale);
        // And the other way around: the remote is ahead of our head.
        let ahead = filter.current(1_500);
        assert_eq!(filter.validate(ahead, 150), ForkIdValidity::Stale);
    }

    #[test]
    fn different_genesis_is_incompatible() {
        let filter = filter();
        let other = ForkFilter::new(H256::repeat_byte(0x22), vec![100, 200, 1_000]);
        assert_eq!(
            filter.validate(other.current(500), 500),
            ForkIdValidity::Incompatible
        );
    }

    #[test]
    fn lying_about_past_forks_is_incompatible() {
        let filter = filter();
        let mut remote = filter.current(500);
        // Claims our current checksum but still expects fork 100.
        remote.next = 100;
        assert_eq!(filter.validate(remote, 500), ForkIdValidity::Incompatible);
    }
}
