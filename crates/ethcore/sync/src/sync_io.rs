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

//! IO interface the synchroniser drives: typed sends, peer management and
//! chain access. Implemented over the live network context by the transport
//! layer and by a recorder in tests.

use std::{error, fmt};

use ethcore::client::BlockChainClient;

use message::{DisconnectReason, PeerId, SyncRequest};

/// Errors the transport may report when sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The peer session is gone.
    PeerGone,
    /// The session is shutting down.
    Expired,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            NetworkError::PeerGone => write!(f, "Peer session is gone"),
            NetworkError::Expired => write!(f, "Session expired"),
        }
    }
}

impl error::Error for NetworkError {
    fn description(&self) -> &str {
        "Network error"
    }
}

/// IO interface for the syncing handler.
/// Provides peer connection management and an interface to the blockchain client.
pub trait SyncIo {
    /// Send a typed request to a peer. The transport encodes it.
    fn send(&mut self, peer_id: PeerId, request: SyncRequest) -> Result<(), NetworkError>;
    /// Disconnect peer with the given reason.
    fn disconnect_peer(&mut self, peer_id: PeerId, reason: DisconnectReason);
    /// Disable a peer: disconnect and never reconnect.
    fn disable_peer(&mut self, peer_id: PeerId);
    /// Get the blockchain.
    fn chain(&self) -> &dyn BlockChainClient;
    /// Check if the session is expired.
    fn is_expired(&self) -> bool {
        false
    }
    /// Whether the peer advertised the snap capability.
    fn peer_supports_snap(&self, _peer_id: PeerId) -> bool {
        false
    }
}
