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

//! The block synchroniser.
//!
//! Peers are vetted into a trusted set before syncing starts: the first
//! members are accepted provisionally, later candidates must produce the
//! best header claimed by a randomly chosen trusted peer within one round
//! trip. Trusted peers then serve work items — header ranges and their
//! bodies — which are committed strictly in block order.

pub mod work_queue;

pub use self::work_queue::{ItemState, WorkError, WorkItem, WorkQueue};

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use ethereum_types::H256;
use rand::Rng;
use types::{header::Header, transaction::UnverifiedTransaction, BlockNumber};

use forkid::{ForkFilter, ForkIdValidity};
use message::{
    BlockHeadersRequest, DisconnectReason, NewPooledTransactionHashes, PeerId, Status,
    SyncRequest, MAX_BODIES_TO_REQUEST, MAX_HEADERS_TO_REQUEST,
};
use sync_io::SyncIo;

/// Synchroniser configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The network transactions and blocks gossip on.
    pub network_id: u64,
    /// Trusted peers needed before block download starts.
    pub trusted_peers: usize,
    /// How long a request may stay unanswered.
    pub request_timeout: Duration,
    /// Blocks per work item, capped by the protocol limit.
    pub max_headers_per_request: u16,
    /// Bodies per request chunk.
    pub max_bodies_per_request: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            network_id: 1,
            trusted_peers: 2,
            request_timeout: Duration::from_secs(10),
            max_headers_per_request: MAX_HEADERS_TO_REQUEST as u16,
            max_bodies_per_request: MAX_BODIES_TO_REQUEST,
        }
    }
}

/// Overall synchroniser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Collecting trusted peers.
    WaitingPeers,
    /// Downloading and committing blocks.
    Blocks,
    /// Caught up; waiting for announcements.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerAsking {
    Nothing,
    /// Probing a candidate against a trusted peer's claimed best header.
    Probe {
        against: PeerId,
        expected: H256,
    },
    /// Resolving the number behind a trusted peer's best hash.
    BestHeader,
    BlockHeaders(usize),
    BlockBodies(usize),
}

struct PeerInfo {
    status: Status,
    asking: PeerAsking,
    ask_time: Instant,
    trusted: bool,
}

/// The block download orchestrator.
pub struct ChainSync {
    config: SyncConfig,
    state: SyncState,
    peers: HashMap<PeerId, PeerInfo>,
    work: WorkQueue,
    fork_filter: ForkFilter,
}

impl ChainSync {
    /// Create a synchroniser resuming at `best_block`.
    pub fn new(config: SyncConfig, best_block: BlockNumber, fork_filter: ForkFilter) -> Self {
        ChainSync {
            config,
            state: SyncState::WaitingPeers,
            peers: HashMap::new(),
            work: WorkQueue::new(best_block),
            fork_filter,
        }
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// The work queue, for inspection.
    pub fn work(&self) -> &WorkQueue {
        &self.work
    }

    /// Ids of the currently trusted peers.
    pub fn trusted_peers(&self) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, info)| info.trusted)
            .map(|(id, _)| *id)
            .collect()
    }

    fn trusted_count(&self) -> usize {
        self.peers.values().filter(|info| info.trusted).count()
    }

    fn send(&mut self, io: &mut dyn SyncIo, peer: PeerId, asking: PeerAsking, request: SyncRequest) {
        if io.send(peer, request).is_err() {
            // The transport lost the session; the disconnect event follows.
            trace!(target: "sync", "send to peer {} failed", peer);
            return;
        }
        if let Some(info) = self.peers.get_mut(&peer) {
            info.asking = asking;
            info.ask_time = Instant::now();
        }
    }

    /// Called by the transport when a peer completed the handshake.
    pub fn on_peer_connected(&mut self, io: &mut dyn SyncIo, peer: PeerId, status: Status) {
        if self.peers.contains_key(&peer) {
            debug!(target: "sync", "unexpected second handshake from peer {}", peer);
            return;
        }

        let genesis = self.fork_filter.genesis_hash();
        if status.network_id != self.config.network_id || status.genesis_hash != genesis {
            trace!(
                target: "sync",
                "peer {} on another network (id {}, genesis {:?})",
                peer, status.network_id, status.genesis_hash
            );
            io.disconnect_peer(peer, DisconnectReason::UselessPeer);
            return;
        }
        let head = io.chain().best_block_number();
        if self.fork_filter.validate(status.fork_id, head) == ForkIdValidity::Incompatible {
            trace!(target: "sync", "peer {} has an incompatible fork id", peer);
            io.disconnect_peer(peer, DisconnectReason::UselessPeer);
            return;
        }

        self.peers.insert(
            peer,
            PeerInfo {
                status,
                asking: PeerAsking::Nothing,
                ask_time: Instant::now(),
                trusted: false,
            },
        );

        if self.trusted_count() < self.config.trusted_peers {
            // Provisional members seed the trusted set.
            self.trust_peer(io, peer);
        } else {
            // Later candidates must reproduce a trusted peer's best header.
            let trusted = self.trusted_peers();
            let index = rand::thread_rng().gen_range(0, trusted.len());
            let against = trusted[index];
            let expected = self.peers[&against].status.best_hash;
            trace!(
                target: "sync",
                "probing peer {} against trusted peer {}", peer, against
            );
            self.send(
                io,
                peer,
                PeerAsking::Probe { against, expected },
                SyncRequest::BlockHeaders(BlockHeadersRequest {
                    start: expected.into(),
                    max: 1,
                    skip: 0,
                    reverse: false,
                }),
            );
        }
        self.continue_sync(io);
    }

    fn trust_peer(&mut self, io: &mut dyn SyncIo, peer: PeerId) {
        let best_hash = match self.peers.get_mut(&peer) {
            Some(info) => {
                info.trusted = true;
                info.status.best_hash
            }
            None => return,
        };
        trace!(target: "sync", "peer {} is now trusted", peer);

        // Resolve the height behind the peer's best hash.
        self.send(
            io,
            peer,
            PeerAsking::BestHeader,
            SyncRequest::BlockHeaders(BlockHeadersRequest {
                start: best_hash.into(),
                max: 1,
                skip: 0,
                reverse: false,
            }),
        );

        if self.state == SyncState::WaitingPeers
            && self.trusted_count() >= self.config.trusted_peers
        {
            debug!(target: "sync", "trusted set complete, starting block sync");
            self.state = SyncState::Blocks;
        }
    }

    /// Called by the transport when a peer delivered a `BlockHeaders` reply.
    pub fn on_block_headers(&mut self, io: &mut dyn SyncIo, peer: PeerId, headers: Vec<Header>) {
        let asking = match self.peers.get_mut(&peer) {
            Some(info) => {
                let asking = info.asking;
                info.asking = PeerAsking::Nothing;
                asking
            }
            None => return,
        };

        match asking {
            PeerAsking::Probe { against, expected } => {
                self.resolve_probe(io, peer, against, expected, headers)
            }
            PeerAsking::BestHeader => {
                if let Some(header) = headers.first() {
                    self.work.set_target(header.number());
                }
            }
            PeerAsking::BlockHeaders(slot) => {
                match self.work.insert_headers(slot, headers) {
                    Ok(()) => {
                        if self.work.item(slot).is_complete() {
                            self.try_commit(io);
                        } else {
                            self.request_bodies(io, peer, slot);
                        }
                    }
                    Err(err) => {
                        debug!(
                            target: "sync",
                            "peer {} delivered bad headers for slot {}: {:?}",
                            peer, slot, err
                        );
                        self.work.reset_slot(slot);
                        self.abandon_peer(io, peer, DisconnectReason::Subprotocol);
                    }
                }
            }
            PeerAsking::BlockBodies(_) | PeerAsking::Nothing => {
                debug!(target: "sync", "unsolicited headers from peer {}", peer);
                self.abandon_peer(io, peer, DisconnectReason::BreachOfProtocol);
            }
        }
        self.continue_sync(io);
    }

    /// Called by the transport when a peer delivered a `BlockBodies` reply.
    pub fn on_block_bodies(
        &mut self,
        io: &mut dyn SyncIo,
        peer: PeerId,
        bodies: Vec<types::block::BlockBody>,
    ) {
        let asking = match self.peers.get_mut(&peer) {
            Some(info) => {
                let asking = info.asking;
                info.asking = PeerAsking::Nothing;
                asking
            }
            None => return,
        };

        match asking {
            PeerAsking::BlockBodies(slot) => match self.work.insert_bodies(slot, bodies) {
                Ok(true) => self.try_commit(io),
                Ok(false) => self.request_bodies(io, peer, slot),
                Err(err) => {
                    debug!(
                        target: "sync",
                        "peer {} delivered bad bodies for slot {}: {:?}",
                        peer, slot, err
                    );
                    self.work.reset_slot(slot);
                    self.abandon_peer(io, peer, DisconnectReason::Subprotocol);
                }
            },
            _ => {
                debug!(target: "sync", "unsolicited bodies from peer {}", peer);
                self.abandon_peer(io, peer, DisconnectReason::BreachOfProtocol);
            }
        }
        self.continue_sync(io);
    }

    fn resolve_probe(
        &mut self,
        io: &mut dyn SyncIo,
        peer: PeerId,
        against: PeerId,
        expected: H256,
        headers: Vec<Header>,
    ) {
        if let Some(header) = headers.iter().find(|h| h.hash() == expected) {
            self.work.set_target(header.number());
            self.trust_peer(io, peer);
            return;
        }

        // The candidate disagrees with the chosen trusted peer. When every
        // other trusted peer agrees on a different best, the chosen one is
        // the outlier and is replaced; otherwise the candidate goes.
        let others: Vec<H256> = self
            .peers
            .iter()
            .filter(|(id, info)| info.trusted && **id != against)
            .map(|(_, info)| info.status.best_hash)
            .collect();
        let against_best = self.peers.get(&against).map(|info| info.status.best_hash);
        let outlier = !others.is_empty()
            && others.windows(2).all(|pair| pair[0] == pair[1])
            && against_best.map_or(false, |best| best != others[0]);

        if outlier {
            debug!(
                target: "sync",
                "trusted peer {} is an outlier, replacing it with peer {}",
                against, peer
            );
            self.peers.remove(&against);
            io.disconnect_peer(against, DisconnectReason::UselessPeer);
            self.trust_peer(io, peer);
        } else {
            trace!(target: "sync", "candidate peer {} failed the probe", peer);
            self.peers.remove(&peer);
            io.disconnect_peer(peer, DisconnectReason::UselessPeer);
        }
    }

    fn request_bodies(&mut self, io: &mut dyn SyncIo, peer: PeerId, slot: usize) {
        let hashes = self
            .work
            .item(slot)
            .needed_body_hashes(self.config.max_bodies_per_request);
        debug_assert!(!hashes.is_empty());
        // The slot stays with this peer for the body phase.
        self.send(
            io,
            peer,
            PeerAsking::BlockBodies(slot),
            SyncRequest::BlockBodies { hashes },
        );
    }

    /// Commit every contiguous `Received` slot, in order. A failing commit
    /// resets the slot and abandons the delivering peer.
    fn try_commit(&mut self, io: &mut dyn SyncIo) {
        while let Some(slot) = self.work.next_ready() {
            let blocks = self.work.blocks_to_commit(slot);
            let count = blocks.len();
            match io.chain().persist_blocks(blocks) {
                Ok(()) => {
                    self.work.mark_persisted(slot);
                    trace!(
                        target: "sync",
                        "committed {} blocks, now at #{}",
                        count, self.work.last_persisted()
                    );
                }
                Err(err) => {
                    let offender = self.work.item(slot).assigned_to;
                    warn!(target: "sync", "block commit failed: {}", err);
                    self.work.reset_slot(slot);
                    if let Some(offender) = offender {
                        self.abandon_peer(io, offender, DisconnectReason::Subprotocol);
                    }
                    break;
                }
            }
        }
        if self.work.is_done() && self.state == SyncState::Blocks {
            debug!(target: "sync", "in sync at #{}", self.work.last_persisted());
            self.state = SyncState::Idle;
        }
    }

    /// Hand work to every idle trusted peer.
    pub fn continue_sync(&mut self, io: &mut dyn SyncIo) {
        if self.state != SyncState::Blocks {
            return;
        }
        let idle: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|(_, info)| info.trusted && info.asking == PeerAsking::Nothing)
            .map(|(id, _)| *id)
            .collect();
        for peer in idle {
            let slot = match self.work.select(self.config.max_headers_per_request) {
                Some(slot) => slot,
                None => break,
            };
            let item = self.work.item(slot);
            let request = SyncRequest::BlockHeaders(BlockHeadersRequest {
                start: item.start_block.into(),
                max: item.count as usize,
                skip: 0,
                reverse: false,
            });
            self.work.mark_requested(slot, peer);
            self.send(io, peer, PeerAsking::BlockHeaders(slot), request);
        }
    }

    /// Called by the transport when a peer disconnected. In-flight work is
    /// reset and re-dispatched to other peers.
    pub fn on_peer_aborting(&mut self, io: &mut dyn SyncIo, peer: PeerId) {
        if self.peers.remove(&peer).is_none() {
            return;
        }
        trace!(target: "sync", "peer {} aborting", peer);
        self.work.reset_assigned(peer);
        if self.trusted_count() < self.config.trusted_peers
            && self.state != SyncState::WaitingPeers
        {
            debug!(target: "sync", "trusted set below threshold, pausing sync");
            self.state = SyncState::WaitingPeers;
        }
        self.continue_sync(io);
    }

    /// Periodic housekeeping: expire overdue requests. A timeout is
    /// indistinguishable from a transport failure, so the peer is abandoned.
    pub fn maintain_sync(&mut self, io: &mut dyn SyncIo) {
        let now = Instant::now();
        let overdue: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|(_, info)| {
                info.asking != PeerAsking::Nothing
                    && now.duration_since(info.ask_time) > self.config.request_timeout
            })
            .map(|(id, _)| *id)
            .collect();
        for peer in overdue {
            debug!(target: "sync", "peer {} timed out", peer);
            self.abandon_peer(io, peer, DisconnectReason::Timeout);
        }
        self.continue_sync(io);
    }

    fn abandon_peer(&mut self, io: &mut dyn SyncIo, peer: PeerId, reason: DisconnectReason) {
        self.work.reset_assigned(peer);
        self.peers.remove(&peer);
        io.disconnect_peer(peer, reason);
        if self.trusted_count() < self.config.trusted_peers
            && self.state != SyncState::WaitingPeers
        {
            self.state = SyncState::WaitingPeers;
        }
    }

    /// `NewBlockHashes` gossip: raises the download target.
    pub fn on_new_block_hashes(
        &mut self,
        io: &mut dyn SyncIo,
        peer: PeerId,
        hashes: Vec<(H256, BlockNumber)>,
    ) {
        if !self.peers.contains_key(&peer) {
            return;
        }
        for (_, number) in &hashes {
            self.work.set_target(*number);
        }
        if self.state == SyncState::Idle && !self.work.is_done() {
            self.state = SyncState::Blocks;
        }
        self.continue_sync(io);
    }

    /// `Transactions` gossip. Decoded transactions are handed to the queue
    /// owner through the returned list; the synchroniser only vets the peer.
    pub fn on_transactions(
        &mut self,
        _io: &mut dyn SyncIo,
        peer: PeerId,
        transactions: Vec<UnverifiedTransaction>,
    ) -> Vec<UnverifiedTransaction> {
        if !self.peers.contains_key(&peer) {
            return Vec::new();
        }
        trace!(
            target: "sync",
            "{} transactions gossiped by peer {}",
            transactions.len(), peer
        );
        transactions
    }

    /// `NewPooledTransactionHashes` gossip. From eth/68 the per-hash type
    /// and size lists must match the hash list; a mismatch is a protocol
    /// breach. Returns the hashes worth fetching.
    pub fn on_new_pooled_transaction_hashes(
        &mut self,
        io: &mut dyn SyncIo,
        peer: PeerId,
        announcement: NewPooledTransactionHashes,
    ) -> Vec<H256> {
        if !self.peers.contains_key(&peer) {
            return Vec::new();
        }
        let eth68 = !announcement.tx_types.is_empty() || !announcement.sizes.is_empty();
        if eth68
            && (announcement.tx_types.len() != announcement.hashes.len()
                || announcement.sizes.len() != announcement.hashes.len())
        {
            debug!(target: "sync", "peer {} announced malformed pooled hashes", peer);
            self.abandon_peer(io, peer, DisconnectReason::BreachOfProtocol);
            return Vec::new();
        }
        announcement.hashes
    }
}
