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

//! The snap account fetcher.
//!
//! Downloads the account trie of one state root by requesting inclusive
//! hash ranges from peers. Unfetched ranges live in a path interval set;
//! each reply is proof-validated and merged, consuming the prefix the
//! peer actually served and returning the rest.

pub mod proof_db;
pub mod ranges;

pub use self::{
    proof_db::{ProofDb, ProofError},
    ranges::PathIntervalSet,
};

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use ethereum_types::{BigEndianHash, H256, U256};

use message::{AccountRangeRequest, AccountRangeResponse, DisconnectReason, PeerId, SyncRequest};
use sync_io::SyncIo;

/// Snap fetcher configuration.
#[derive(Debug, Clone)]
pub struct SnapConfig {
    /// Longest account-hash span one request may cover.
    pub max_span: U256,
    /// Soft response size cap advertised to peers.
    pub response_bytes: u64,
    /// How long a request may stay unanswered.
    pub request_timeout: Duration,
}

impl Default for SnapConfig {
    fn default() -> Self {
        SnapConfig {
            // A 1/65536th slice of the hash space per request.
            max_span: U256::one() << 240,
            response_bytes: 512 * 1024,
            request_timeout: Duration::from_secs(10),
        }
    }
}

struct ActiveRange {
    lo: U256,
    hi: U256,
    started: Instant,
}

/// Fetches the account range of one state root.
pub struct SnapSync {
    root: H256,
    config: SnapConfig,
    unfetched: PathIntervalSet,
    active: HashMap<PeerId, ActiveRange>,
    // Peers that answered terminally (no more accounts) or do not serve
    // this root; neither is asked again.
    no_snap: HashSet<PeerId>,
    db: ProofDb,
    cancelled: bool,
}

impl SnapSync {
    /// Start fetching the full account space of `root`.
    pub fn new(root: H256, config: SnapConfig) -> Self {
        Self::with_ranges(root, config, PathIntervalSet::full())
    }

    /// Resume fetching with the given unfetched ranges.
    pub fn with_ranges(root: H256, config: SnapConfig, unfetched: PathIntervalSet) -> Self {
        SnapSync {
            root,
            config,
            unfetched,
            active: HashMap::new(),
            no_snap: HashSet::new(),
            db: ProofDb::new(),
            cancelled: false,
        }
    }

    /// The state root being fetched.
    pub fn root(&self) -> H256 {
        self.root
    }

    /// The fetched data so far.
    pub fn db(&self) -> &ProofDb {
        &self.db
    }

    /// The ranges not yet fetched.
    pub fn unfetched(&self) -> &PathIntervalSet {
        &self.unfetched
    }

    /// Whether every range was fetched and no request is in flight.
    pub fn is_complete(&self) -> bool {
        self.unfetched.is_empty() && self.active.is_empty()
    }

    /// Stop issuing requests; in-flight ranges are returned as replies or
    /// disconnects drain.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Hand one interval to every idle snap-capable peer.
    pub fn continue_sync(&mut self, io: &mut dyn SyncIo, peers: &[PeerId]) {
        if self.cancelled {
            return;
        }
        for peer in peers {
            if self.active.contains_key(peer)
                || self.no_snap.contains(peer)
                || !io.peer_supports_snap(*peer)
            {
                continue;
            }
            let (lo, hi) = match self.unfetched.acquire(self.config.max_span) {
                Some(range) => range,
                None => break,
            };
            let request = SyncRequest::AccountRange(AccountRangeRequest {
                root: self.root,
                origin: BigEndianHash::from_uint(&lo),
                limit: BigEndianHash::from_uint(&hi),
                response_bytes: self.config.response_bytes,
            });
            if io.send(*peer, request).is_err() {
                self.unfetched.insert(lo, hi);
                continue;
            }
            trace!(
                target: "snap",
                "peer {} fetching account range [{:x}, {:x}]",
                peer, lo, hi
            );
            self.active.insert(
                *peer,
                ActiveRange {
                    lo,
                    hi,
                    started: Instant::now(),
                },
            );
        }
    }

    /// Validate and merge one `AccountRange` reply.
    pub fn on_account_range(
        &mut self,
        io: &mut dyn SyncIo,
        peer: PeerId,
        response: AccountRangeResponse,
    ) {
        let range = match self.active.remove(&peer) {
            Some(range) => range,
            None => {
                debug!(target: "snap", "unsolicited account range from peer {}", peer);
                io.disconnect_peer(peer, DisconnectReason::BreachOfProtocol);
                return;
            }
        };
        let (lo, hi) = (range.lo, range.hi);

        if response.accounts.is_empty() {
            if response.proof.is_empty() {
                // The peer does not have this state root at all.
                debug!(
                    target: "snap",
                    "peer {} has no accounts for the state root", peer
                );
                self.no_snap.insert(peer);
                self.unfetched.insert(lo, hi);
            } else {
                // Terminal: no accounts exist at or beyond `lo`. The tail
                // of the interval is consumed and the peer is done serving.
                debug!(
                    target: "snap",
                    "peer {} reports no accounts beyond {:x}; range consumed", peer, lo
                );
                self.no_snap.insert(peer);
            }
            return;
        }

        let first = response.accounts[0].0.into_uint();
        if first < lo {
            debug!(target: "snap", "peer {} served an out-of-range account", peer);
            self.protocol_violation(io, peer, lo, hi);
            return;
        }
        if response.proof.is_empty() && !lo.is_zero() {
            debug!(target: "snap", "peer {} omitted a required proof", peer);
            self.protocol_violation(io, peer, lo, hi);
            return;
        }
        // A single trailing account past the limit is permitted.
        let overshoot = response
            .accounts
            .iter()
            .filter(|(hash, _)| hash.into_uint() > hi)
            .count();
        if overshoot > 1 {
            debug!(target: "snap", "peer {} overshot the range limit", peer);
            self.protocol_violation(io, peer, lo, hi);
            return;
        }

        let base: H256 = BigEndianHash::from_uint(&lo);
        let mut merge = self.db.begin_merge();
        let mut failure = None;
        for node in &response.proof {
            if let Err(err) = merge.insert_node(node.clone()) {
                failure = Some(err);
                break;
            }
        }
        if failure.is_none() {
            for (hash, body) in &response.accounts {
                merge.insert_account(*hash, body.clone());
            }
            failure = merge.validate(&self.root, &base).err();
        }

        match failure {
            Some(err) => {
                debug!(target: "snap", "peer {} served an invalid range: {}", peer, err);
                merge.rollback();
                self.protocol_violation(io, peer, lo, hi);
            }
            None => {
                merge.commit();
                let last = response
                    .accounts
                    .last()
                    .expect("accounts checked non-empty above; qed")
                    .0
                    .into_uint();
                trace!(
                    target: "snap",
                    "peer {} served {} accounts up to {:x}",
                    peer, response.accounts.len(), last
                );
                // The prefix up to the last served account is consumed;
                // the suffix goes back to the pool.
                if last < hi {
                    self.unfetched.insert(last + U256::one(), hi);
                }
            }
        }
    }

    fn protocol_violation(&mut self, io: &mut dyn SyncIo, peer: PeerId, lo: U256, hi: U256) {
        self.unfetched.insert(lo, hi);
        self.no_snap.insert(peer);
        io.disconnect_peer(peer, DisconnectReason::BreachOfProtocol);
    }

    /// Called by the transport when a peer disconnected: its in-flight
    /// range returns to the pool.
    pub fn on_peer_aborting(&mut self, peer: PeerId) {
        if let Some(range) = self.active.remove(&peer) {
            self.unfetched.insert(range.lo, range.hi);
        }
        self.no_snap.remove(&peer);
    }

    /// Periodic housekeeping: abandon peers whose request timed out.
    pub fn maintain(&mut self, io: &mut dyn SyncIo) {
        let now = Instant::now();
        let overdue: Vec<PeerId> = self
            .active
            .iter()
            .filter(|(_, range)| now.duration_since(range.started) > self.config.request_timeout)
            .map(|(id, _)| *id)
            .collect();
        for peer in overdue {
            debug!(target: "snap", "peer {} timed out on an account range", peer);
            if let Some(range) = self.active.remove(&peer) {
                self.unfetched.insert(range.lo, range.hi);
            }
            io.disconnect_peer(peer, DisconnectReason::Timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hash::keccak;
    use message::AccountRangeRequest;
    use snap::proof_db::tests::{leaf, nibbles_of};
    use tests::helpers::TestSyncIo;

    fn wide_config() -> SnapConfig {
        SnapConfig {
            max_span: U256::max_value(),
            ..Default::default()
        }
    }

    fn snap_with_range(root: H256, lo: U256, hi: U256) -> SnapSync {
        let mut ranges = PathIntervalSet::new();
        ranges.insert(lo, hi);
        SnapSync::with_ranges(root, wide_config(), ranges)
    }

    fn upper_half() -> (U256, U256) {
        (U256::from(0x80) << 248, U256::max_value())
    }

    fn sent_range(io: &mut TestSyncIo) -> AccountRangeRequest {
        let sent = io.take_sent();
        assert_eq!(sent.len(), 1);
        match sent.into_iter().next().unwrap().1 {
            SyncRequest::AccountRange(request) => request,
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn empty_with_proof_consumes_range_and_exhausts_peer() {
        let mut io = TestSyncIo::new();
        io.snap_peers.insert(1);
        let (lo, hi) = upper_half();
        let mut snap = snap_with_range(H256::repeat_byte(0x77), lo, hi);

        snap.continue_sync(&mut io, &[1]);
        let request = sent_range(&mut io);
        let mut expected_origin = H256::zero();
        expected_origin.as_bytes_mut()[0] = 0x80;
        assert_eq!(request.origin, expected_origin);
        assert_eq!(request.limit, H256::repeat_byte(0xff));

        // No accounts but a proof: nothing exists beyond the origin.
        snap.on_account_range(
            &mut io,
            1,
            AccountRangeResponse {
                accounts: vec![],
                proof: vec![b"boundary-node".to_vec()],
            },
        );

        assert!(snap.unfetched().is_empty());
        assert!(snap.is_complete());
        assert!(io.disconnected.is_empty());

        // The peer's snap capability is exhausted; it is not asked again.
        snap.unfetched.insert(lo, hi);
        snap.continue_sync(&mut io, &[1]);
        assert!(io.take_sent().is_empty());
    }

    #[test]
    fn empty_without_proof_returns_the_range() {
        let mut io = TestSyncIo::new();
        io.snap_peers.insert(1);
        let (lo, hi) = upper_half();
        let mut snap = snap_with_range(H256::repeat_byte(0x77), lo, hi);

        snap.continue_sync(&mut io, &[1]);
        io.take_sent();
        snap.on_account_range(&mut io, 1, AccountRangeResponse::default());

        // The state was unavailable on this peer; the range goes back.
        assert!(snap.unfetched().covers(lo, hi));
        assert!(!snap.is_complete());
    }

    #[test]
    fn valid_reply_consumes_prefix_and_returns_suffix() {
        let account = H256::repeat_byte(0x42);
        let body = b"account-body".to_vec();
        let root_node = leaf(&nibbles_of(&account), &body);
        let root = keccak(&root_node);

        let mut io = TestSyncIo::new();
        io.snap_peers.insert(1);
        let mut snap = snap_with_range(root, U256::zero(), U256::max_value());

        snap.continue_sync(&mut io, &[1]);
        io.take_sent();
        snap.on_account_range(
            &mut io,
            1,
            AccountRangeResponse {
                accounts: vec![(account, body.clone())],
                proof: vec![root_node],
            },
        );

        assert!(io.disconnected.is_empty());
        assert_eq!(snap.db().account(&account), Some(&body));
        // Consumed up to the last served account; the suffix remains.
        let resume = account.into_uint() + U256::one();
        assert!(snap.unfetched().covers(resume, U256::max_value()));
        assert!(!snap.unfetched().covers(U256::zero(), resume));
    }

    #[test]
    fn out_of_range_account_is_a_breach() {
        let mut io = TestSyncIo::new();
        io.snap_peers.insert(1);
        let (lo, hi) = upper_half();
        let mut snap = snap_with_range(H256::repeat_byte(0x77), lo, hi);

        snap.continue_sync(&mut io, &[1]);
        io.take_sent();
        // The served account sits below the requested origin.
        snap.on_account_range(
            &mut io,
            1,
            AccountRangeResponse {
                accounts: vec![(H256::repeat_byte(0x42), b"body".to_vec())],
                proof: vec![b"node".to_vec()],
            },
        );

        assert_eq!(
            io.disconnected,
            vec![(1, DisconnectReason::BreachOfProtocol)]
        );
        assert!(snap.unfetched().covers(lo, hi));
    }

    #[test]
    fn invalid_proof_rolls_the_merge_back() {
        let account = H256::repeat_byte(0x42);
        let body = b"account-body".to_vec();
        let root_node = leaf(&nibbles_of(&account), &body);
        // The fetcher expects a different root; the walk must fail.
        let root = H256::repeat_byte(0x13);

        let mut io = TestSyncIo::new();
        io.snap_peers.insert(1);
        let mut snap = snap_with_range(root, U256::zero(), U256::max_value());

        snap.continue_sync(&mut io, &[1]);
        io.take_sent();
        snap.on_account_range(
            &mut io,
            1,
            AccountRangeResponse {
                accounts: vec![(account, body)],
                proof: vec![root_node],
            },
        );

        assert_eq!(
            io.disconnected,
            vec![(1, DisconnectReason::BreachOfProtocol)]
        );
        assert_eq!(snap.db().accounts_len(), 0);
        assert_eq!(snap.db().nodes_len(), 0);
        assert!(snap.unfetched().covers(U256::zero(), U256::max_value()));
    }

    #[test]
    fn disconnect_and_timeout_return_ranges() {
        let mut io = TestSyncIo::new();
        io.snap_peers.insert(1);
        io.snap_peers.insert(2);
        let mut snap = SnapSync::with_ranges(
            H256::repeat_byte(0x77),
            SnapConfig {
                max_span: U256::one() << 255,
                request_timeout: Duration::from_millis(0),
                ..Default::default()
            },
            PathIntervalSet::full(),
        );

        snap.continue_sync(&mut io, &[1, 2]);
        assert_eq!(io.take_sent().len(), 2);
        assert!(snap.unfetched().is_empty());

        snap.on_peer_aborting(1);
        std::thread::sleep(Duration::from_millis(5));
        snap.maintain(&mut io);

        assert_eq!(io.disconnected, vec![(2, DisconnectReason::Timeout)]);
        assert_eq!(snap.unfetched(), &PathIntervalSet::full());
    }
}
