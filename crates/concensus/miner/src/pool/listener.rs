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

//! Pool lifecycle notifications.

use ethereum_types::H256;
use types::transaction;

use pool::{RemovalReason, SharedTransaction};

/// Transaction pool listener.
///
/// Listener is being notified about status of every transaction in the pool.
pub trait Listener: Send {
    /// The transaction has been successfully added to the pool.
    /// If second argument is `Some` the transaction has took place of some other transaction
    /// which was already in the pool.
    fn added(&mut self, _tx: &SharedTransaction, _old: Option<&SharedTransaction>) {}

    /// The transaction was rejected at admission.
    fn rejected(&mut self, _hash: &H256, _reason: &transaction::Error) {}

    /// The transaction left the live buckets for the waste basket.
    fn dropped(&mut self, _tx: &SharedTransaction, _reason: &RemovalReason) {}

    /// The transaction was chosen for the candidate block.
    fn packed(&mut self, _tx: &SharedTransaction) {}

    /// The transaction was mined on the canonical chain and removed.
    fn culled(&mut self, _tx: &SharedTransaction) {}
}

/// A no-op listener.
#[derive(Debug, Default)]
pub struct NoopListener;

impl Listener for NoopListener {}

/// A listener that writes each event to the log.
#[derive(Debug, Default)]
pub struct Logger;

impl Listener for Logger {
    fn added(&mut self, tx: &SharedTransaction, old: Option<&SharedTransaction>) {
        debug!(
            target: "txqueue",
            "[{:?}] added to the pool (replacing {:?})",
            tx.hash(),
            old.map(|o| o.hash()),
        );
    }

    fn rejected(&mut self, hash: &H256, reason: &transaction::Error) {
        debug!(target: "txqueue", "[{:?}] rejected: {}", hash, reason);
    }

    fn dropped(&mut self, tx: &SharedTransaction, reason: &RemovalReason) {
        debug!(target: "txqueue", "[{:?}] dropped: {:?}", tx.hash(), reason);
    }

    fn packed(&mut self, tx: &SharedTransaction) {
        trace!(target: "txqueue", "[{:?}] packed into candidate block", tx.hash());
    }

    fn culled(&mut self, tx: &SharedTransaction) {
        trace!(target: "txqueue", "[{:?}] mined, removing", tx.hash());
    }
}
