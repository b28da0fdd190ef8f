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

//! Shared test plumbing: a recording `SyncIo` over the test client.

use std::{collections::HashSet, mem, sync::Arc};

use ethcore::{client::BlockChainClient, test_helpers::TestBlockChainClient};

use message::{DisconnectReason, PeerId, SyncRequest};
use sync_io::{NetworkError, SyncIo};

/// A `SyncIo` that records everything and answers from a test client.
pub struct TestSyncIo {
    /// The backing chain.
    pub chain: Arc<TestBlockChainClient>,
    /// Requests sent, in order.
    pub sent: Vec<(PeerId, SyncRequest)>,
    /// Disconnects issued, in order.
    pub disconnected: Vec<(PeerId, DisconnectReason)>,
    /// Peers that were disabled.
    pub disabled: Vec<PeerId>,
    /// Peers advertising the snap capability.
    pub snap_peers: HashSet<PeerId>,
}

impl Default for TestSyncIo {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSyncIo {
    /// A recorder over a fresh test chain.
    pub fn new() -> Self {
        Self::with_chain(Arc::new(TestBlockChainClient::new()))
    }

    /// A recorder over the given chain.
    pub fn with_chain(chain: Arc<TestBlockChainClient>) -> Self {
        TestSyncIo {
            chain,
            sent: Vec::new(),
            disconnected: Vec::new(),
            disabled: Vec::new(),
            snap_peers: HashSet::new(),
        }
    }

    /// Drain the recorded requests.
    pub fn take_sent(&mut self) -> Vec<(PeerId, SyncRequest)> {
        mem::replace(&mut self.sent, Vec::new())
    }
}

impl SyncIo for TestSyncIo {
    fn send(&mut self, peer_id: PeerId, request: SyncRequest) -> Result<(), NetworkError> {
        self.sent.push((peer_id, request));
        Ok(())
    }

    fn disconnect_peer(&mut self, peer_id: PeerId, reason: DisconnectReason) {
        self.disconnected.push((peer_id, reason));
    }

    fn disable_peer(&mut self, peer_id: PeerId) {
        self.disabled.push(peer_id);
    }

    fn chain(&self) -> &dyn BlockChainClient {
        &*self.chain
    }

    fn peer_supports_snap(&self, peer_id: PeerId) -> bool {
        self.snap_peers.contains(&peer_id)
    }
}
