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

//! The proof-of-work engine: header rules and ethash seal verification.

use ethash::{boundary_to_difficulty, EthashManager, DEFAULT_CACHED_EPOCHS};
use ethereum_types::U256;
use types::{header::Header, BlockNumber};
use unexpected::{Mismatch, OutOfBounds};

use engines::Engine;
use error::{BlockError, Error};
use machine::Machine;

/// Maximum number of uncles a block may declare.
pub const MAX_UNCLES: usize = 2;

/// Author reward before Byzantium, in wei (5 ETH).
pub const FRONTIER_BLOCK_REWARD: u64 = 5_000_000_000_000_000_000;
/// Author reward from Byzantium, in wei (3 ETH).
pub const BYZANTIUM_BLOCK_REWARD: u64 = 3_000_000_000_000_000_000;
/// Author reward from Constantinople, in wei (2 ETH).
pub const CONSTANTINOPLE_BLOCK_REWARD: u64 = 2_000_000_000_000_000_000;

/// Engine using Ethash proof-of-work consensus.
pub struct Ethash {
    machine: Machine,
    pow: EthashManager,
}

impl Ethash {
    /// Create a proof-of-work engine with the default epoch-cache cap.
    pub fn new(machine: Machine) -> Self {
        Self::with_cached_epochs(machine, DEFAULT_CACHED_EPOCHS)
    }

    /// Create a proof-of-work engine holding at most `cached_epochs` caches.
    pub fn with_cached_epochs(machine: Machine, cached_epochs: usize) -> Self {
        Ethash {
            machine,
            pow: EthashManager::new(cached_epochs),
        }
    }

    /// Verify the seal of `header`: recompute the mix digest and work value
    /// from the epoch cache and compare against the committed seal.
    fn verify_seal(&self, header: &Header) -> Result<(), Error> {
        let difficulty = *header.difficulty();
        if difficulty.is_zero() {
            return Err(BlockError::InvalidDifficulty(OutOfBounds {
                min: Some(1.into()),
                max: None,
                found: difficulty,
            })
            .into());
        }

        let pow = self.pow.compute_light(
            header.number(),
            &header.bare_hash(),
            header.nonce().to_low_u64_be(),
        );

        if &pow.mix_digest != header.mix_hash() {
            debug!(
                target: "engine",
                "seal mix mismatch for #{}: computed {:?}",
                header.number(), pow.mix_digest
            );
            return Err(BlockError::MismatchedSealMixDigest(Mismatch {
                expected: pow.mix_digest,
                found: *header.mix_hash(),
            })
            .into());
        }

        // The achieved difficulty is the boundary the work value stayed
        // under; it must reach the committed difficulty.
        let quality = boundary_to_difficulty(&pow.value);
        if quality < difficulty {
            return Err(BlockError::InvalidProofOfWork(OutOfBounds {
                min: Some(difficulty),
                max: None,
                found: quality,
            })
            .into());
        }

        Ok(())
    }
}

impl Engine for Ethash {
    fn name(&self) -> &str {
        "Ethash"
    }

    fn machine(&self) -> &Machine {
        &self.machine
    }

    fn maximum_uncle_count(&self, _block: BlockNumber) -> usize {
        MAX_UNCLES
    }

    fn verify_block_basic(&self, header: &Header) -> Result<(), Error> {
        let max = self.machine.params().maximum_extra_data_size;
        if header.number() != 0 && header.extra_data().len() > max {
            return Err(BlockError::ExtraDataOutOfBounds(OutOfBounds {
                min: None,
                max: Some(max),
                found: header.extra_data().len(),
            })
            .into());
        }
        Ok(())
    }

    fn verify_block_unordered(&self, header: &Header) -> Result<(), Error> {
        self.verify_seal(header)
    }

    fn verify_block_family(&self, header: &Header, parent: &Header) -> Result<(), Error> {
        let expected = self
            .machine
            .params()
            .expected_difficulty(parent, header.timestamp());
        if *header.difficulty() < expected {
            return Err(BlockError::InvalidDifficulty(OutOfBounds {
                min: Some(expected),
                max: None,
                found: *header.difficulty(),
            })
            .into());
        }
        Ok(())
    }

    fn block_reward(&self, block: BlockNumber) -> U256 {
        let params = self.machine.params();
        if params.is_constantinople(block) {
            CONSTANTINOPLE_BLOCK_REWARD.into()
        } else if params.is_byzantium(block) {
            BYZANTIUM_BLOCK_REWARD.into()
        } else {
            FRONTIER_BLOCK_REWARD.into()
        }
    }

    fn populate_from_parent(&self, header: &mut Header, parent: &Header) {
        let difficulty = self
            .machine
            .params()
            .expected_difficulty(parent, header.timestamp());
        header.set_difficulty(difficulty);
    }
}
