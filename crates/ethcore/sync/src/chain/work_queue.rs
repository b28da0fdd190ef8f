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

//! The download work queue: recyclable slots of block ranges.
//!
//! A slot walks `Initial -> Requested -> Received -> Persisted` and resets
//! to `Initial` on any failure. Bodies are matched to their headers by the
//! transaction root and uncle hash they must reproduce.

use std::collections::HashMap;

use ethereum_types::H256;
use types::{
    block::{Block, BlockBody},
    hash::{KECCAK_EMPTY_LIST_RLP, KECCAK_NULL_RLP},
    header::Header,
    BlockNumber,
};

use message::PeerId;

/// Lifecycle of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Created or reset; eligible for dispatch.
    Initial,
    /// A request covering the slot is in flight.
    Requested,
    /// Headers and bodies arrived completely.
    Received,
    /// Committed to the chain; the slot may be recycled.
    Persisted,
}

/// Errors that are fatal for one work item (and its delivering peer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkError {
    /// The reply did not carry exactly the requested headers.
    BadHeaderCount,
    /// Header numbers or parent links do not chain from the slot start.
    BadHeaderSequence,
    /// An empty body reply.
    NoBodies,
    /// A body matching no outstanding header.
    UnexpectedBody,
    /// The slot was not in the state the operation requires.
    BadState,
}

/// One unit of parallelisable download, covering
/// `[start_block, start_block + count)`.
#[derive(Debug)]
pub struct WorkItem {
    /// First block of the range.
    pub start_block: BlockNumber,
    /// Number of blocks covered.
    pub count: u16,
    /// Lifecycle state.
    pub state: ItemState,
    /// Downloaded headers, in order.
    pub headers: Vec<Header>,
    /// Downloaded bodies, aligned with `headers`.
    pub bodies: Vec<Option<BlockBody>>,
    /// The peer serving this slot, while one is.
    pub assigned_to: Option<PeerId>,
    /// Whether the item completed ahead of its turn.
    pub out_of_order: bool,
    // Outstanding bodies by the (transactions root, uncles hash) pair the
    // header commits to, mapping back to the header index.
    needed: HashMap<(H256, H256), usize>,
}

impl WorkItem {
    fn new(start_block: BlockNumber, count: u16) -> Self {
        WorkItem {
            start_block,
            count,
            state: ItemState::Initial,
            headers: Vec::new(),
            bodies: Vec::new(),
            assigned_to: None,
            out_of_order: false,
            needed: HashMap::new(),
        }
    }

    /// The last block of the range, inclusive.
    pub fn end_block(&self) -> BlockNumber {
        self.start_block + self.count as u64 - 1
    }

    /// Forget all progress and return to `Initial`.
    pub fn reset(&mut self) {
        self.state = ItemState::Initial;
        self.headers.clear();
        self.bodies.clear();
        self.needed.clear();
        self.assigned_to = None;
        self.out_of_order = false;
    }

    /// Hashes of blocks whose bodies are still outstanding.
    pub fn needed_body_hashes(&self, max: usize) -> Vec<H256> {
        self.needed
            .values()
            .take(max)
            .map(|index| self.headers[*index].hash())
            .collect()
    }

    /// Whether every header has its body.
    pub fn is_complete(&self) -> bool {
        !self.headers.is_empty() && self.needed.is_empty()
    }
}

/// The queue of download slots plus the strictly advancing persistence
/// cursor.
pub struct WorkQueue {
    items: Vec<WorkItem>,
    last_persisted: BlockNumber,
    target: BlockNumber,
}

impl WorkQueue {
    /// A queue whose cursor starts at the given block.
    pub fn new(last_persisted: BlockNumber) -> Self {
        WorkQueue {
            items: Vec::new(),
            last_persisted,
            target: last_persisted,
        }
    }

    /// Raise the highest block the queue will schedule.
    pub fn set_target(&mut self, target: BlockNumber) {
        if target > self.target {
            self.target = target;
        }
    }

    /// The highest block scheduled for download.
    pub fn target(&self) -> BlockNumber {
        self.target
    }

    /// The highest block committed, advanced strictly in order.
    pub fn last_persisted(&self) -> BlockNumber {
        self.last_persisted
    }

    /// Whether everything up to the target is committed.
    pub fn is_done(&self) -> bool {
        self.last_persisted >= self.target
    }

    /// Access a slot.
    pub fn item(&self, slot: usize) -> &WorkItem {
        &self.items[slot]
    }

    /// All slots.
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    // The end of the highest range still being worked on.
    fn max_pending_end(&self) -> BlockNumber {
        self.items
            .iter()
            .filter(|item| item.state != ItemState::Persisted)
            .map(WorkItem::end_block)
            .max()
            .unwrap_or(self.last_persisted)
            .max(self.last_persisted)
    }

    /// Pick a slot for a free peer: any `Initial` slot first, then a
    /// recycled `Persisted` slot, then a freshly appended one, capped at
    /// `cap` blocks. `None` when every block up to the target is covered.
    pub fn select(&mut self, cap: u16) -> Option<usize> {
        debug_assert!(cap > 0);
        if let Some(slot) = self
            .items
            .iter()
            .position(|item| item.state == ItemState::Initial)
        {
            return Some(slot);
        }

        let start = self.max_pending_end() + 1;
        if start > self.target {
            return None;
        }
        let count = ::std::cmp::min(cap as u64, self.target - start + 1) as u16;
        let fresh = WorkItem::new(start, count);

        if let Some(slot) = self
            .items
            .iter()
            .position(|item| item.state == ItemState::Persisted)
        {
            self.items[slot] = fresh;
            return Some(slot);
        }
        self.items.push(fresh);
        Some(self.items.len() - 1)
    }

    /// Mark a slot as requested from the given peer.
    pub fn mark_requested(&mut self, slot: usize, peer: PeerId) {
        let item = &mut self.items[slot];
        debug_assert_eq!(item.state, ItemState::Initial);
        item.state = ItemState::Requested;
        item.assigned_to = Some(peer);
    }

    /// Reset a slot to `Initial`, discarding partial data.
    pub fn reset_slot(&mut self, slot: usize) {
        self.items[slot].reset();
    }

    /// Reset the slot assigned to the given peer, if any, returning it.
    pub fn reset_assigned(&mut self, peer: PeerId) -> Option<usize> {
        let slot = self
            .items
            .iter()
            .position(|item| item.assigned_to == Some(peer) && item.state != ItemState::Persisted)?;
        self.items[slot].reset();
        Some(slot)
    }

    /// Store a header reply for a slot. The headers must cover the range
    /// exactly, numbered strictly `+1` from the start and hash-chained.
    /// Headers with provably empty bodies complete immediately.
    pub fn insert_headers(&mut self, slot: usize, headers: Vec<Header>) -> Result<(), WorkError> {
        let last_persisted = self.last_persisted;
        let item = &mut self.items[slot];
        if item.state != ItemState::Requested {
            return Err(WorkError::BadState);
        }
        if headers.len() != item.count as usize {
            return Err(WorkError::BadHeaderCount);
        }
        for (offset, header) in headers.iter().enumerate() {
            if header.number() != item.start_block + offset as u64 {
                return Err(WorkError::BadHeaderSequence);
            }
            if offset > 0 && header.parent_hash() != &headers[offset - 1].hash() {
                return Err(WorkError::BadHeaderSequence);
            }
        }

        item.bodies = vec![None; headers.len()];
        for (index, header) in headers.iter().enumerate() {
            if header.transactions_root() == &KECCAK_NULL_RLP
                && header.uncles_hash() == &KECCAK_EMPTY_LIST_RLP
            {
                item.bodies[index] = Some(BlockBody::default());
            } else {
                item.needed
                    .insert((*header.transactions_root(), *header.uncles_hash()), index);
            }
        }
        item.headers = headers;

        if item.needed.is_empty() {
            item.state = ItemState::Received;
            item.out_of_order = item.start_block != last_persisted + 1;
        }
        Ok(())
    }

    /// Store a body reply for a slot. Bodies are matched to headers by
    /// their content; an empty reply or a body matching nothing is fatal
    /// for the item.
    pub fn insert_bodies(&mut self, slot: usize, bodies: Vec<BlockBody>) -> Result<bool, WorkError> {
        let last_persisted = self.last_persisted;
        let item = &mut self.items[slot];
        if item.state != ItemState::Requested {
            return Err(WorkError::BadState);
        }
        if bodies.is_empty() {
            return Err(WorkError::NoBodies);
        }
        for body in bodies {
            let id = (body.transactions_root(), body.uncles_hash());
            match item.needed.remove(&id) {
                Some(index) => {
                    item.bodies[index] = Some(body);
                }
                None => return Err(WorkError::UnexpectedBody),
            }
        }
        if item.needed.is_empty() {
            item.state = ItemState::Received;
            item.out_of_order = item.start_block != last_persisted + 1;
            return Ok(true);
        }
        Ok(false)
    }

    /// The slot that may be committed now: `Received` and contiguous with
    /// the persistence cursor.
    pub fn next_ready(&self) -> Option<usize> {
        self.items.iter().position(|item| {
            item.state == ItemState::Received && item.start_block == self.last_persisted + 1
        })
    }

    /// Assemble the blocks of a `Received` slot for committing.
    pub fn blocks_to_commit(&self, slot: usize) -> Vec<Block> {
        let item = &self.items[slot];
        debug_assert_eq!(item.state, ItemState::Received);
        item.headers
            .iter()
            .zip(item.bodies.iter())
            .map(|(header, body)| {
                let body = body.clone().unwrap_or_default();
                Block {
                    header: header.clone(),
                    transactions: body.transactions,
                    uncles: body.uncles,
                }
            })
            .collect()
    }

    /// Commit a slot: the cursor advances to its end.
    pub fn mark_persisted(&mut self, slot: usize) {
        debug_assert_eq!(self.items[slot].start_block, self.last_persisted + 1);
        self.items[slot].state = ItemState::Persisted;
        self.last_persisted = self.items[slot].end_block();
    }
}
