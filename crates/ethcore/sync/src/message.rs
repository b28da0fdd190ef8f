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

//! Typed sync messages.
//!
//! The wire codecs (`eth/66..68`, `snap/1`) live in the transport layer;
//! the synchroniser sends and receives these decoded shapes.

use bytes::Bytes;
use ethereum_types::{H256, U256};
use types::BlockNumber;

use forkid::ForkId;

/// A peer session identifier handed out by the transport.
pub type PeerId = usize;

/// Maximum number of headers one request may ask for.
pub const MAX_HEADERS_TO_REQUEST: usize = 192;
/// Maximum number of bodies one request may ask for.
pub const MAX_BODIES_TO_REQUEST: usize = 128;
/// Maximum number of receipt sets one request may ask for.
pub const MAX_RECEIPTS_TO_REQUEST: usize = 256;
/// Maximum number of trie nodes one request may ask for (eth/66 only).
pub const MAX_NODE_DATA_TO_REQUEST: usize = 384;

/// Why the core asks the transport to drop a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer is on a different network or an incompatible fork.
    UselessPeer,
    /// The peer violated the protocol, e.g. sent an unsolicited or
    /// malformed reply.
    BreachOfProtocol,
    /// The peer delivered data that failed validation.
    Subprotocol,
    /// The peer did not answer within the allowed time.
    Timeout,
}

/// The handshake a peer announces itself with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Negotiated eth protocol version.
    pub protocol_version: u8,
    /// The network the peer gossips on.
    pub network_id: u64,
    /// Total difficulty of the peer's best chain.
    pub total_difficulty: U256,
    /// Hash of the peer's best block.
    pub best_hash: H256,
    /// The peer's genesis hash.
    pub genesis_hash: H256,
    /// EIP2124 fork identifier.
    pub fork_id: ForkId,
}

/// Where a header request starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashOrNumber {
    /// Start at the block with this hash.
    Hash(H256),
    /// Start at the block with this number.
    Number(BlockNumber),
}

impl From<H256> for HashOrNumber {
    fn from(hash: H256) -> Self {
        HashOrNumber::Hash(hash)
    }
}

impl From<BlockNumber> for HashOrNumber {
    fn from(number: BlockNumber) -> Self {
        HashOrNumber::Number(number)
    }
}

/// `GetBlockHeaders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeadersRequest {
    /// First block of the range.
    pub start: HashOrNumber,
    /// Maximum number of headers wanted.
    pub max: usize,
    /// Blocks skipped between consecutive headers.
    pub skip: u64,
    /// Walk the chain towards genesis.
    pub reverse: bool,
}

/// `GetAccountRange` (snap/1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRangeRequest {
    /// The state root to serve from.
    pub root: H256,
    /// First account hash of the range, inclusive.
    pub origin: H256,
    /// Last account hash of the range, inclusive.
    pub limit: H256,
    /// Soft cap on the response size in bytes.
    pub response_bytes: u64,
}

/// An account row of an `AccountRange` reply: the hashed address and the
/// slim-encoded account body.
pub type AccountRangeEntry = (H256, Bytes);

/// `AccountRange` (snap/1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountRangeResponse {
    /// Consecutive account rows, ascending by hash.
    pub accounts: Vec<AccountRangeEntry>,
    /// Trie nodes proving the boundaries of the range.
    pub proof: Vec<Bytes>,
}

/// `GetStorageRanges` (snap/1). Exposed for completeness; the core
/// specified here only drives account ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRangesRequest {
    /// The state root to serve from.
    pub root: H256,
    /// The hashed accounts whose storage is wanted.
    pub accounts: Vec<H256>,
    /// First storage slot of the range, inclusive.
    pub origin: H256,
    /// Last storage slot of the range, inclusive.
    pub limit: H256,
    /// Soft cap on the response size in bytes.
    pub response_bytes: u64,
}

/// `GetByteCodes` (snap/1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteCodesRequest {
    /// Code hashes wanted.
    pub hashes: Vec<H256>,
    /// Soft cap on the response size in bytes.
    pub response_bytes: u64,
}

/// `GetTrieNodes` (snap/1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieNodesRequest {
    /// The state root to serve from.
    pub root: H256,
    /// Node paths wanted, grouped per account.
    pub paths: Vec<Vec<Bytes>>,
    /// Soft cap on the response size in bytes.
    pub response_bytes: u64,
}

/// `NewPooledTransactionHashes` gossip. From eth/68 the announcement also
/// carries the envelope type and encoded size of every hash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewPooledTransactionHashes {
    /// Envelope type per announced transaction (empty before eth/68).
    pub tx_types: Vec<u8>,
    /// Encoded size per announced transaction (empty before eth/68).
    pub sizes: Vec<u64>,
    /// The announced transaction hashes.
    pub hashes: Vec<H256>,
}

/// A request the synchroniser may issue to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRequest {
    /// `GetBlockHeaders`.
    BlockHeaders(BlockHeadersRequest),
    /// `GetBlockBodies`.
    BlockBodies {
        /// Hashes of the wanted blocks.
        hashes: Vec<H256>,
    },
    /// `GetReceipts`.
    Receipts {
        /// Hashes of the wanted blocks.
        hashes: Vec<H256>,
    },
    /// `GetNodeData`, eth/66 only.
    NodeData {
        /// Hashes of the wanted nodes.
        hashes: Vec<H256>,
    },
    /// `GetAccountRange`, snap/1.
    AccountRange(AccountRangeRequest),
    /// `GetStorageRanges`, snap/1.
    StorageRanges(StorageRangesRequest),
    /// `GetByteCodes`, snap/1.
    ByteCodes(ByteCodesRequest),
    /// `GetTrieNodes`, snap/1.
    TrieNodes(TrieNodesRequest),
}
