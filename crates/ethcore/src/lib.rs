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

#![warn(missing_docs, unused_extern_crates)]

//! Ethcore library
//!
//! The consensus, validation and block execution core: chain parameters,
//! header/uncle/seal verification, the Ethash and Clique engines, the block
//! execution pipeline and the capability traits the synchroniser and the
//! transaction pool build upon.

extern crate common_types as types;
extern crate crossbeam_channel;
extern crate ethash;
extern crate ethcore_miner;
extern crate ethereum_types;
extern crate keccak_hash as hash;
extern crate lru_cache;
extern crate parity_crypto as crypto;
extern crate parking_lot;
extern crate rlp;
extern crate unexpected;

#[macro_use]
extern crate log;

#[cfg(test)]
extern crate env_logger;

pub mod block;
pub mod client;
pub mod engines;
pub mod error;
pub mod machine;
pub mod miner;
pub mod spec;
pub mod state;
pub mod verification;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
