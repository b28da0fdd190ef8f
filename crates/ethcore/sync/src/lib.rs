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

//! Blockchain synchronization.
//!
//! The chain synchroniser vets peers into a trusted set, pulls header
//! ranges and body batches through a recyclable work queue and commits
//! blocks strictly in order. The snap module fetches the account trie by
//! hash range with proof validation. Both are event-driven state machines:
//! the I/O layer delivers peer packets and timer ticks serially, so shared
//! state is only ever mutated between such events.

#![warn(missing_docs)]

extern crate common_types as types;
extern crate crc;
extern crate ethcore;
extern crate ethereum_types;
extern crate keccak_hash as hash;
extern crate parity_bytes as bytes;
extern crate rand;
extern crate rlp;

#[macro_use]
extern crate log;

#[cfg(test)]
extern crate env_logger;

pub mod chain;
pub mod forkid;
pub mod message;
pub mod snap;
pub mod sync_io;

#[cfg(test)]
mod tests;

pub use chain::{ChainSync, SyncConfig, SyncState};
pub use message::{DisconnectReason, PeerId, Status, SyncRequest};
pub use sync_io::SyncIo;
