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

//! General error types for use in ethcore.

use std::{error, fmt};

use ethereum_types::{Bloom, H256, U256};
use types::{transaction, BlockNumber};
use unexpected::{Mismatch, OutOfBounds};

use engines::EngineError;
use machine::ExecutionError;

/// Errors concerning block processing.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockError {
    /// Extra data is of an invalid length.
    ExtraDataOutOfBounds(OutOfBounds<usize>),
    /// Gas used is above the gas limit, or non-zero with no transactions.
    TooMuchGasUsed(OutOfBounds<U256>),
    /// The body carries transactions but the header claims no gas was used.
    TransactionsWithZeroGasUsed,
    /// Gas limit is outside the bounds the parent header allows.
    InvalidGasLimit(OutOfBounds<U256>),
    /// Block number does not follow the parent.
    InvalidNumber(Mismatch<BlockNumber>),
    /// Timestamp is not ahead of the parent the way the engine requires.
    InvalidTimestamp(OutOfBounds<u64>),
    /// Difficulty is below what the fork rules dictate.
    InvalidDifficulty(OutOfBounds<U256>),
    /// The DAO-fork extra-data marker is missing or unexpected.
    InvalidDaoExtraData,
    /// Proof-of-work value is above the difficulty boundary.
    InvalidProofOfWork(OutOfBounds<U256>),
    /// Seal mix digest does not match the recomputed one.
    MismatchedSealMixDigest(Mismatch<H256>),
    /// Base fee differs from the one computed from the parent.
    IncorrectBaseFee(Mismatch<U256>),
    /// Header base fee is missing past the London fork.
    MissingBaseFee,
    /// State root after execution differs from the header.
    InvalidStateRoot(Mismatch<H256>),
    /// Receipts root after execution differs from the header.
    InvalidReceiptsRoot(Mismatch<H256>),
    /// Transactions root does not commit to the body.
    InvalidTransactionsRoot(Mismatch<H256>),
    /// Gas used after execution differs from the header.
    InvalidGasUsed(Mismatch<U256>),
    /// Log bloom after execution differs from the header.
    InvalidLogBloom(Box<Mismatch<Bloom>>),
    /// Uncle hash does not commit to the uncle list.
    InvalidUnclesHash(Mismatch<H256>),
    /// More uncles than the engine allows.
    TooManyUncles(OutOfBounds<usize>),
    /// Uncle is an ancestor generation too far back.
    UncleTooOld(OutOfBounds<BlockNumber>),
    /// Uncle has the same parent as the block (it would be a sibling).
    UncleIsBrother(OutOfBounds<BlockNumber>),
    /// Uncle is already on the canonical chain.
    UncleInChain(H256),
    /// The same uncle was already included.
    DuplicateUncle(H256),
    /// Uncle parent is not within the allowed ancestry.
    UncleParentNotInChain(H256),
    /// Parent of the block is not known.
    UnknownParent(H256),
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::BlockError::*;
        let msg = match *self {
            ExtraDataOutOfBounds(ref oob) => format!("Extra block data too long. {}", oob),
            TooMuchGasUsed(ref oob) => format!("Block has too much gas used. {}", oob),
            TransactionsWithZeroGasUsed => {
                "Block carries transactions but claims no gas was used".into()
            }
            InvalidGasLimit(ref oob) => format!("Invalid gas limit: {}", oob),
            InvalidNumber(ref mis) => format!("Invalid number in header: {}", mis),
            InvalidTimestamp(ref oob) => format!("Invalid timestamp in header: {}", oob),
            InvalidDifficulty(ref oob) => format!("Invalid block difficulty: {}", oob),
            InvalidDaoExtraData => "Wrong extra data within the DAO-fork window".into(),
            InvalidProofOfWork(ref oob) => format!("Invalid proof of work: {}", oob),
            MismatchedSealMixDigest(ref mis) => format!("Mismatched seal mix digest: {}", mis),
            IncorrectBaseFee(ref mis) => format!("Incorrect base fee: {}", mis),
            MissingBaseFee => "Header is missing a base fee past the London fork".into(),
            InvalidStateRoot(ref mis) => format!("Invalid state root in header: {}", mis),
            InvalidReceiptsRoot(ref mis) => format!("Invalid receipts trie root in header: {}", mis),
            InvalidTransactionsRoot(ref mis) => {
                format!("Invalid transactions root in header: {}", mis)
            }
            InvalidGasUsed(ref mis) => format!("Invalid gas used in header: {}", mis),
            InvalidLogBloom(ref mis) => format!("Invalid log bloom in header: {}", mis),
            InvalidUnclesHash(ref mis) => format!("Invalid uncles hash: {}", mis),
            TooManyUncles(ref oob) => format!("Block has too many uncles. {}", oob),
            UncleTooOld(ref oob) => format!("Uncle block is too old. {}", oob),
            UncleIsBrother(ref oob) => format!("Uncle from same generation as block. {}", oob),
            UncleInChain(ref hash) => format!("Uncle {} already in chain", hash),
            DuplicateUncle(ref hash) => format!("Uncle {} already in the header", hash),
            UncleParentNotInChain(ref hash) => {
                format!("Uncle {} has a parent outside the allowed ancestry", hash)
            }
            UnknownParent(ref hash) => format!("Unknown parent: {}", hash),
        };

        f.write_fmt(format_args!("Block error ({})", msg))
    }
}

impl error::Error for BlockError {
    fn description(&self) -> &str {
        "Block error"
    }
}

/// Ethcore-wide error aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Error concerning block processing.
    Block(BlockError),
    /// Error concerning the consensus engine.
    Engine(EngineError),
    /// Error concerning a transaction.
    Transaction(transaction::Error),
    /// Error concerning transaction execution.
    Execution(ExecutionError),
    /// An invariant of the node was violated; recovery is not possible.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Block(ref err) => err.fmt(f),
            Error::Engine(ref err) => err.fmt(f),
            Error::Transaction(ref err) => err.fmt(f),
            Error::Execution(ref err) => err.fmt(f),
            Error::Internal(ref msg) => f.write_fmt(format_args!("Internal error ({})", msg)),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "Ethcore error"
    }
}

impl From<BlockError> for Error {
    fn from(err: BlockError) -> Error {
        Error::Block(err)
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Error {
        Error::Engine(err)
    }
}

impl From<transaction::Error> for Error {
    fn from(err: transaction::Error) -> Error {
        Error::Transaction(err)
    }
}

impl From<ExecutionError> for Error {
    fn from(err: ExecutionError) -> Error {
        Error::Execution(err)
    }
}
