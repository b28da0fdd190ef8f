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

//! Consensus engine specification and basic implementations.

mod ethash;
mod null_engine;

pub mod clique;

pub use self::{clique::Clique, ethash::Ethash, null_engine::NullEngine};

use std::{error, fmt, sync::Weak};

use ethereum_types::{Address, H256, H64, U256};
use types::{header::Header, BlockNumber};
use unexpected::Mismatch;

use error::Error;
use machine::Machine;

/// Engine (consensus) errors.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Signature or author field does not belong to an authority.
    NotAuthorized(Address),
    /// The signer signed a block too recently.
    RecentlySigned(Address),
    /// The difficulty does not match the signer turn.
    WrongDifficulty(Mismatch<U256>),
    /// A checkpoint header carries a signer list that differs from the snapshot.
    MismatchingCheckpointSigners(H256),
    /// A vote header carries a nonce that is neither AUTH nor DROP.
    InvalidVote(H64),
    /// A checkpoint header names a beneficiary.
    InvalidCheckpointBeneficiary(Mismatch<Address>),
    /// Extra data is too short to carry the vanity prefix.
    MissingVanity,
    /// Extra data is too short to carry the signature suffix.
    MissingSignature,
    /// The embedded signer list is empty or not a multiple of an address.
    InvalidCheckpointSigners(usize),
    /// A non-checkpoint header embeds a signer list.
    UnexpectedCheckpointSigners(usize),
    /// The seal mix digest must be zeroed under proof-of-authority.
    InvalidMixDigest,
    /// Proof-of-authority blocks may not carry uncles.
    InvalidUncleHash,
    /// Signature recovery failed.
    FaultyRecoveredSigner(String),
    /// The checkpoint snapshot the verification needs is not available.
    MissingCheckpoint(H256),
    /// Verification was cancelled by a stop request.
    Stopped,
    /// Call requires a registered client but none is.
    RequiresClient,
    /// Custom.
    Custom(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::EngineError::*;
        let msg = match *self {
            NotAuthorized(ref address) => format!("Signer {} is not authorized.", address),
            RecentlySigned(ref address) => {
                format!("The signer {} has signed a block too recently", address)
            }
            WrongDifficulty(ref mis) => format!("Wrong difficulty for the signer turn: {}", mis),
            MismatchingCheckpointSigners(ref hash) => {
                format!("Signer list in checkpoint {} does not match the snapshot", hash)
            }
            InvalidVote(ref nonce) => format!(
                "Unexpected vote nonce {}; expected all zeros or all ones",
                nonce
            ),
            InvalidCheckpointBeneficiary(ref mis) => {
                format!("Unexpected checkpoint beneficiary: {}", mis)
            }
            MissingVanity => "Extra data is missing vanity data".into(),
            MissingSignature => "Extra data is missing signature".into(),
            InvalidCheckpointSigners(len) => format!(
                "Checkpoint signer list of length {} is empty or not divisible by 20",
                len
            ),
            UnexpectedCheckpointSigners(len) => format!(
                "Non-checkpoint header embeds a signer list of length {}",
                len
            ),
            InvalidMixDigest => "Mix digest must be zeroed under proof-of-authority".into(),
            InvalidUncleHash => "Proof-of-authority blocks may not carry uncles".into(),
            FaultyRecoveredSigner(ref msg) => format!("Faulty recovered signer: {}", msg),
            MissingCheckpoint(ref hash) => format!("Missing checkpoint block: {}", hash),
            Stopped => "Verification was cancelled".into(),
            RequiresClient => "Call requires client but none registered".into(),
            Custom(ref msg) => msg.clone(),
        };

        f.write_fmt(format_args!("Engine error ({})", msg))
    }
}

impl error::Error for EngineError {
    fn description(&self) -> &str {
        "Engine error"
    }
}

/// Header access an engine may need beyond the immediate parent, e.g. for
/// rebuilding an authority snapshot from the nearest checkpoint.
pub trait EngineClient: Send + Sync {
    /// A header from the canonical chain or a known fork.
    fn header_by_hash(&self, hash: &H256) -> Option<Header>;
}

/// A consensus mechanism for the chain.
/// Provides hooks into each of the major parts of block import.
pub trait Engine: Sync + Send {
    /// The name of this engine.
    fn name(&self) -> &str;

    /// Get access to the underlying state machine.
    fn machine(&self) -> &Machine;

    /// Maximum number of uncles a block is allowed to declare.
    fn maximum_uncle_count(&self, _block: BlockNumber) -> usize {
        0
    }

    /// Phase 1 quick block verification. Only does checks that are cheap.
    fn verify_block_basic(&self, _header: &Header) -> Result<(), Error> {
        Ok(())
    }

    /// Phase 2 verification. Perform costly checks such as seal validity.
    fn verify_block_unordered(&self, _header: &Header) -> Result<(), Error> {
        Ok(())
    }

    /// Phase 3 verification. Check block information against parent.
    fn verify_block_family(&self, _header: &Header, _parent: &Header) -> Result<(), Error> {
        Ok(())
    }

    /// Verify an ascending run of headers, sharing whatever state the engine
    /// walks (e.g. the clique snapshot). `headers[i]`'s parent must be
    /// `headers[i-1]`; the first header's parent must be `parent`.
    fn verify_header_batch(&self, parent: &Header, headers: &[Header]) -> Result<(), Error> {
        let mut parent = parent;
        for header in headers {
            self.verify_block_family(header, parent)?;
            parent = header;
        }
        Ok(())
    }

    /// Cooperatively cancel a running batch verification. The flag is
    /// cleared when the verification routine returns.
    fn stop_verification(&self) {}

    /// The reward credited to the author of the given block, without uncle
    /// adjustments.
    fn block_reward(&self, _block: BlockNumber) -> U256 {
        U256::zero()
    }

    /// Check whether the parent timestamp is valid for the header timestamp.
    fn is_timestamp_valid(&self, header_timestamp: u64, parent_timestamp: u64) -> bool {
        header_timestamp > parent_timestamp
    }

    /// Return a new open block header timestamp based on the parent timestamp.
    fn open_block_header_timestamp(&self, parent_timestamp: u64) -> u64 {
        use std::{cmp, time};

        let now = time::SystemTime::now()
            .duration_since(time::UNIX_EPOCH)
            .unwrap_or_default();
        cmp::max(now.as_secs() as u64, parent_timestamp + 1)
    }

    /// Populate a header's fields based on its parent's header.
    /// Usually implements the chain scoring rule based on weight.
    fn populate_from_parent(&self, _header: &mut Header, _parent: &Header) {}

    /// Add a client which can be used for retrieving ancestry.
    fn register_client(&self, _client: Weak<dyn EngineClient>) {}

    /// Register the address whose key this node signs with, when authoring.
    fn set_signer(&self, _signer: Option<Address>) {}

    /// The failure the last batch verification stopped at, if any:
    /// the offending header hash and the reason.
    fn verification_failure(&self) -> Option<(H256, EngineError)> {
        None
    }
}
