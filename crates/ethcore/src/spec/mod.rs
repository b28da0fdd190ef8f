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

//! Chain parameters: fork schedule, fee-market constants, difficulty and
//! base-fee evolution.

use std::cmp;

use ethereum_types::U256;
use types::{hash::KECCAK_EMPTY_LIST_RLP, header::Header, BlockNumber};
use unexpected::OutOfBounds;

use error::BlockError;

/// Anything above this number is a block that never happens.
pub const FOREVER: BlockNumber = BlockNumber::max_value();

/// EIP1559 base fee change denominator.
pub const BASE_FEE_CHANGE_DENOMINATOR: u64 = 8;
/// EIP1559 gas target to gas limit ratio.
pub const ELASTICITY_MULTIPLIER: u64 = 2;
/// EIP1559 base fee of the fork block, 1 gwei.
pub const INITIAL_BASE_FEE: u64 = 1_000_000_000;

/// Lowest difficulty a proof-of-work block may carry.
pub const MINIMUM_DIFFICULTY: u64 = 131_072;
/// Divisor bounding per-block difficulty adjustment.
pub const DIFFICULTY_BOUND_DIVISOR: u64 = 2_048;
/// Block count per difficulty-bomb period.
pub const EXP_DIFF_PERIOD: u64 = 100_000;

/// The extra-data bytes required within the DAO-fork window.
pub const DAO_EXTRA_DATA: &[u8] = b"dao-hard-fork";
/// How many blocks after the DAO fork the marker is required.
pub const DAO_EXTRA_RANGE: BlockNumber = 10;

/// Clique engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CliqueParams {
    /// Minimal period between blocks, in seconds.
    pub period: u64,
    /// Checkpoint interval in blocks.
    pub epoch: u64,
}

/// Parameters common to ethereum-like chains.
#[derive(Debug, Clone)]
pub struct CommonParams {
    /// The network we gossip on.
    pub network_id: u64,
    /// The id transactions are replay protected with.
    pub chain_id: u64,
    /// Minimum gas limit.
    pub min_gas_limit: U256,
    /// Gas limit bound divisor (how much gas limit can change per block).
    pub gas_limit_bound_divisor: U256,
    /// Maximum size of extra data for proof-of-work headers.
    pub maximum_extra_data_size: usize,
    /// Homestead transition block number.
    pub homestead_transition: BlockNumber,
    /// EIP150 transition block number.
    pub tangerine_transition: BlockNumber,
    /// EIP155/EIP158 transition block number.
    pub spurious_transition: BlockNumber,
    /// Byzantium transition block number.
    pub byzantium_transition: BlockNumber,
    /// Constantinople transition block number.
    pub constantinople_transition: BlockNumber,
    /// Petersburg transition block number.
    pub petersburg_transition: BlockNumber,
    /// Istanbul transition block number.
    pub istanbul_transition: BlockNumber,
    /// Berlin transition block number.
    pub berlin_transition: BlockNumber,
    /// London (EIP1559) transition block number.
    pub london_transition: BlockNumber,
    /// Arrow Glacier bomb-delay block number.
    pub arrow_glacier_transition: BlockNumber,
    /// The DAO hard-fork block, if the chain observed it.
    pub dao_fork_block: Option<BlockNumber>,
    /// Whether this chain took the DAO-fork side.
    pub dao_fork_support: bool,
    /// EIP1559 elasticity multiplier.
    pub elasticity_multiplier: U256,
    /// EIP1559 base fee change denominator.
    pub base_fee_change_denominator: U256,
    /// EIP1559 base fee of the fork block.
    pub initial_base_fee: U256,
    /// Clique parameters when the chain runs under proof-of-authority.
    pub clique: Option<CliqueParams>,
}

impl Default for CommonParams {
    fn default() -> Self {
        CommonParams {
            network_id: 1,
            chain_id: 1,
            min_gas_limit: 5_000.into(),
            gas_limit_bound_divisor: 1_024.into(),
            maximum_extra_data_size: 32,
            homestead_transition: FOREVER,
            tangerine_transition: FOREVER,
            spurious_transition: FOREVER,
            byzantium_transition: FOREVER,
            constantinople_transition: FOREVER,
            petersburg_transition: FOREVER,
            istanbul_transition: FOREVER,
            berlin_transition: FOREVER,
            london_transition: FOREVER,
            arrow_glacier_transition: FOREVER,
            dao_fork_block: None,
            dao_fork_support: false,
            elasticity_multiplier: ELASTICITY_MULTIPLIER.into(),
            base_fee_change_denominator: BASE_FEE_CHANGE_DENOMINATOR.into(),
            initial_base_fee: INITIAL_BASE_FEE.into(),
            clique: None,
        }
    }
}

impl CommonParams {
    /// A proof-of-work chain with every pre-London fork at genesis.
    pub fn test_pow() -> Self {
        CommonParams {
            homestead_transition: 0,
            tangerine_transition: 0,
            spurious_transition: 0,
            byzantium_transition: 0,
            constantinople_transition: 0,
            petersburg_transition: 0,
            istanbul_transition: 0,
            berlin_transition: 0,
            ..Default::default()
        }
    }

    /// A proof-of-work chain that activates London at the given block.
    pub fn test_london(transition: BlockNumber) -> Self {
        CommonParams {
            london_transition: transition,
            ..Self::test_pow()
        }
    }

    /// A clique chain with the given period and epoch.
    pub fn test_clique(period: u64, epoch: u64) -> Self {
        CommonParams {
            clique: Some(CliqueParams { period, epoch }),
            ..Self::test_pow()
        }
    }

    /// The block EIP1559 headers start at.
    pub fn eip1559_transition(&self) -> BlockNumber {
        self.london_transition
    }

    /// Whether the given block is at or past Homestead.
    pub fn is_homestead(&self, number: BlockNumber) -> bool {
        number >= self.homestead_transition
    }

    /// Whether the given block applies EIP158 state cleanup.
    pub fn is_spurious(&self, number: BlockNumber) -> bool {
        number >= self.spurious_transition
    }

    /// Whether the given block is at or past Byzantium.
    pub fn is_byzantium(&self, number: BlockNumber) -> bool {
        number >= self.byzantium_transition
    }

    /// Whether the given block is at or past Constantinople.
    pub fn is_constantinople(&self, number: BlockNumber) -> bool {
        number >= self.constantinople_transition
    }

    /// Whether the given block uses Istanbul gas costs.
    pub fn is_istanbul(&self, number: BlockNumber) -> bool {
        number >= self.istanbul_transition
    }

    /// Whether the given block is at or past London.
    pub fn is_london(&self, number: BlockNumber) -> bool {
        number >= self.london_transition
    }

    /// All finite fork activation blocks, ascending and deduplicated.
    /// The shape the fork-id checksum is computed over.
    pub fn fork_blocks(&self) -> Vec<BlockNumber> {
        let mut blocks: Vec<BlockNumber> = [
            self.homestead_transition,
            self.dao_fork_block.unwrap_or(FOREVER),
            self.tangerine_transition,
            self.spurious_transition,
            self.byzantium_transition,
            self.constantinople_transition,
            self.petersburg_transition,
            self.istanbul_transition,
            self.berlin_transition,
            self.london_transition,
            self.arrow_glacier_transition,
        ]
        .iter()
        .cloned()
        .filter(|number| *number != 0 && *number != FOREVER)
        .collect();
        blocks.sort();
        blocks.dedup();
        blocks
    }

    /// The base fee of the block following `parent`, `None` before London.
    pub fn calc_base_fee(&self, parent: &Header) -> Option<U256> {
        let number = parent.number() + 1;
        if number < self.london_transition {
            return None;
        }
        if number == self.london_transition {
            return Some(self.initial_base_fee);
        }

        let base_fee = parent.base_fee().unwrap_or(self.initial_base_fee);
        let gas_target = *parent.gas_limit() / self.elasticity_multiplier;
        if gas_target.is_zero() {
            return Some(base_fee);
        }

        let gas_used = *parent.gas_used();
        if gas_used == gas_target {
            Some(base_fee)
        } else if gas_used > gas_target {
            let delta = gas_used - gas_target;
            let increase = cmp::max(
                U256::one(),
                base_fee * delta / gas_target / self.base_fee_change_denominator,
            );
            Some(base_fee.saturating_add(increase))
        } else {
            let delta = gas_target - gas_used;
            let decrease = base_fee * delta / gas_target / self.base_fee_change_denominator;
            Some(base_fee.saturating_sub(decrease))
        }
    }

    /// The least difficulty the block after `parent` may carry under the
    /// proof-of-work fork rules, for the given child timestamp.
    pub fn expected_difficulty(&self, parent: &Header, header_timestamp: u64) -> U256 {
        let number = parent.number() + 1;
        let parent_difficulty = *parent.difficulty();
        let divisor = U256::from(DIFFICULTY_BOUND_DIVISOR);

        let mut target = if number < self.homestead_transition {
            if header_timestamp >= parent.timestamp() + 13 {
                parent_difficulty.saturating_sub(parent_difficulty / divisor)
            } else {
                parent_difficulty + parent_difficulty / divisor
            }
        } else {
            let (increment_divisor, threshold) = if number < self.byzantium_transition {
                (10, 1)
            } else if parent.uncles_hash() == &KECCAK_EMPTY_LIST_RLP {
                (9, 1)
            } else {
                (9, 2)
            };
            let diff_inc = header_timestamp.saturating_sub(parent.timestamp()) / increment_divisor;
            if diff_inc <= threshold {
                parent_difficulty
                    + parent_difficulty / divisor * U256::from(threshold - diff_inc)
            } else {
                parent_difficulty.saturating_sub(
                    parent_difficulty / divisor * U256::from(cmp::min(diff_inc - threshold, 99)),
                )
            }
        };
        target = cmp::max(U256::from(MINIMUM_DIFFICULTY), target);

        // Difficulty bomb, with the fork-scheduled delays applied.
        let delay = if number >= self.arrow_glacier_transition {
            10_700_000
        } else if number >= self.london_transition {
            9_700_000
        } else if number >= self.constantinople_transition {
            5_000_000
        } else if number >= self.byzantium_transition {
            3_000_000
        } else {
            0
        };
        let period = (number.saturating_sub(delay) / EXP_DIFF_PERIOD) as usize;
        if period > 1 {
            target = cmp::max(
                U256::from(MINIMUM_DIFFICULTY),
                target + (U256::one() << (period - 2)),
            );
        }

        target
    }

    /// Verify the gas limit (and its London doubling) against the parent.
    pub fn verify_gas_limit(&self, header: &Header, parent: &Header) -> Result<(), BlockError> {
        let mut parent_limit = *parent.gas_limit();
        if header.number() == self.london_transition {
            // The fork block doubles the limit; bounds apply to the doubled value.
            parent_limit = parent_limit * self.elasticity_multiplier;
        }
        let bound = parent_limit / self.gas_limit_bound_divisor;
        let min = cmp::max(parent_limit.saturating_sub(bound), self.min_gas_limit);
        let max = parent_limit.saturating_add(bound);
        let gas_limit = *header.gas_limit();
        if gas_limit <= min || gas_limit >= max {
            return Err(BlockError::InvalidGasLimit(OutOfBounds {
                min: Some(min),
                max: Some(max),
                found: gas_limit,
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::header::Header;

    fn parent_with(gas_limit: u64, gas_used: u64, base_fee: Option<u64>) -> Header {
        let mut parent = Header::new();
        parent.set_number(99);
        parent.set_gas_limit(gas_limit.into());
        parent.set_gas_used(gas_used.into());
        parent.set_base_fee(base_fee.map(Into::into));
        parent
    }

    #[test]
    fn base_fee_is_stable_at_target() {
        let params = CommonParams::test_london(0);
        // Parent target is 10M; used exactly the target.
        let parent = parent_with(20_000_000, 10_000_000, Some(1_000_000_000));
        assert_eq!(
            params.calc_base_fee(&parent),
            Some(1_000_000_000u64.into())
        );
    }

    #[test]
    fn base_fee_rises_and_falls_with_usage() {
        let params = CommonParams::test_london(0);

        let full = parent_with(20_000_000, 20_000_000, Some(1_000_000_000));
        // Full block: base fee up by 1/8.
        assert_eq!(
            params.calc_base_fee(&full),
            Some(1_125_000_000u64.into())
        );

        let empty = parent_with(20_000_000, 0, Some(1_000_000_000));
        // Empty block: base fee down by 1/8.
        assert_eq!(params.calc_base_fee(&empty), Some(875_000_000u64.into()));
    }

    #[test]
    fn base_fee_fork_block_pays_initial() {
        let params = CommonParams::test_london(100);
        let parent = parent_with(10_000_000, 0, None);
        assert_eq!(params.calc_base_fee(&parent), Some(INITIAL_BASE_FEE.into()));
    }

    #[test]
    fn no_base_fee_before_london() {
        let params = CommonParams::test_london(200);
        let parent = parent_with(10_000_000, 0, None);
        assert_eq!(params.calc_base_fee(&parent), None);
    }

    #[test]
    fn difficulty_adjusts_towards_block_time() {
        let params = CommonParams::test_pow();
        let mut parent = Header::new();
        parent.set_number(1000);
        parent.set_difficulty(1_000_000.into());
        parent.set_timestamp(1_000);

        let fast = params.expected_difficulty(&parent, 1_001);
        let slow = params.expected_difficulty(&parent, 1_100);
        assert!(fast > *parent.difficulty());
        assert!(slow < *parent.difficulty());
        assert!(params.expected_difficulty(&parent, 1_001) >= MINIMUM_DIFFICULTY.into());
    }

    #[test]
    fn gas_limit_bounds_follow_parent() {
        let params = CommonParams::test_pow();
        let mut parent = Header::new();
        parent.set_number(9);
        parent.set_gas_limit(1_024_000.into());

        let mut header = Header::new();
        header.set_number(10);
        header.set_gas_limit(1_024_999.into());
        assert!(params.verify_gas_limit(&header, &parent).is_ok());

        header.set_gas_limit(1_025_001.into());
        assert!(params.verify_gas_limit(&header, &parent).is_err());
    }

    #[test]
    fn gas_limit_doubles_at_london() {
        let mut params = CommonParams::test_pow();
        params.london_transition = 10;
        let mut parent = Header::new();
        parent.set_number(9);
        parent.set_gas_limit(1_000_000.into());

        let mut header = Header::new();
        header.set_number(10);
        // Doubled limit is acceptable at the fork block.
        header.set_gas_limit(2_000_000.into());
        assert!(params.verify_gas_limit(&header, &parent).is_ok());
    }
}
