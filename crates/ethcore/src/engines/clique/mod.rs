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

//! The Clique proof-of-authority engine.
//!
//! Verification at block N needs the snapshot at N-1; snapshots are rebuilt
//! from the nearest checkpoint below and cached by block hash. Batch
//! verification shares one snapshot walk for a whole ascending run of
//! headers, consulting the in-batch parents instead of the database.

mod snapshot;

pub use self::snapshot::{
    extract_signers, recover_creator, seal_hash, Snapshot, Tally, Vote, DIFF_INTURN, DIFF_NOTURN,
    NONCE_AUTH_VOTE, NONCE_DROP_VOTE, SIGNER_SIG_LENGTH, SIGNER_VANITY_LENGTH,
};

use std::sync::{
    atomic::{AtomicBool, Ordering as AtomicOrdering},
    Weak,
};

use ethereum_types::{Address, H256};
use lru_cache::LruCache;
use parking_lot::{Mutex, RwLock};
use types::{hash::KECCAK_EMPTY_LIST_RLP, header::Header, BlockNumber};
use unexpected::{Mismatch, OutOfBounds};

use engines::{Engine, EngineClient, EngineError};
use error::{BlockError, Error};
use machine::Machine;

/// How many recent snapshots to keep in memory.
const SNAPSHOT_CACHE_SIZE: usize = 128;

/// The Clique proof-of-authority engine.
pub struct Clique {
    machine: Machine,
    period: u64,
    epoch: u64,
    client: RwLock<Option<Weak<dyn EngineClient>>>,
    snapshots: RwLock<LruCache<H256, Snapshot>>,
    // Serialises access to the active signing identity.
    signer: Mutex<Option<Address>>,
    last_failure: Mutex<Option<(H256, EngineError)>>,
    stop: AtomicBool,
}

impl Clique {
    /// Create a clique engine; the machine parameters must carry a clique
    /// section.
    pub fn new(machine: Machine) -> Result<Self, Error> {
        let params = machine
            .params()
            .clique
            .ok_or_else(|| EngineError::Custom("chain spec carries no clique params".into()))?;
        if params.epoch == 0 {
            return Err(EngineError::Custom("clique epoch must be non-zero".into()).into());
        }
        Ok(Clique {
            machine,
            period: params.period,
            epoch: params.epoch,
            client: RwLock::new(None),
            snapshots: RwLock::new(LruCache::new(SNAPSHOT_CACHE_SIZE)),
            signer: Mutex::new(None),
            last_failure: Mutex::new(None),
            stop: AtomicBool::new(false),
        })
    }

    /// The checkpoint interval.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn is_checkpoint(&self, number: BlockNumber) -> bool {
        number % self.epoch == 0
    }

    fn lookup_header(&self, hash: &H256, parents: &[Header]) -> Option<Header> {
        // An ascending in-batch slice is consulted before the database.
        if let Some(header) = parents.iter().rev().find(|h| h.hash() == *hash) {
            return Some(header.clone());
        }
        self.client
            .read()
            .as_ref()
            .and_then(|weak| weak.upgrade())
            .and_then(|client| client.header_by_hash(hash))
    }

    /// The snapshot describing the state after `header`. Recomputed from the
    /// nearest checkpoint at or below it, reusing cached intermediates.
    pub fn snapshot_at(&self, header: &Header, parents: &[Header]) -> Result<Snapshot, Error> {
        let mut pending: Vec<Header> = Vec::new();
        let mut cursor = header.clone();

        let mut snap = loop {
            if let Some(snap) = self.snapshots.write().get_mut(&cursor.hash()) {
                break snap.clone();
            }
            if self.is_checkpoint(cursor.number()) {
                let snap = Snapshot::from_checkpoint_header(&cursor)?;
                trace!(
                    target: "engine",
                    "rebuilt snapshot from checkpoint #{}", cursor.number()
                );
                break snap;
            }
            let parent_hash = *cursor.parent_hash();
            let parent = self
                .lookup_header(&parent_hash, parents)
                .ok_or(EngineError::MissingCheckpoint(parent_hash))?;
            pending.push(cursor);
            cursor = parent;
        };

        for header in pending.iter().rev() {
            snap.apply(header, self.epoch)?;
            self.snapshots
                .write()
                .insert(header.hash(), snap.clone());
        }

        Ok(snap)
    }

    fn record_failure(&self, hash: H256, err: &EngineError) {
        *self.last_failure.lock() = Some((hash, err.clone()));
    }

    fn verify_against_snapshot(
        &self,
        snap: &mut Snapshot,
        header: &Header,
    ) -> Result<(), Error> {
        match snap.apply(header, self.epoch) {
            Ok(()) => {
                self.snapshots
                    .write()
                    .insert(header.hash(), snap.clone());
                Ok(())
            }
            Err(err) => {
                self.record_failure(header.hash(), &err);
                Err(err.into())
            }
        }
    }
}

impl Engine for Clique {
    fn name(&self) -> &str {
        "Clique"
    }

    fn machine(&self) -> &Machine {
        &self.machine
    }

    fn verify_block_basic(&self, header: &Header) -> Result<(), Error> {
        let number = header.number();
        let checkpoint = self.is_checkpoint(number);

        // The extra data must carry vanity and signature...
        let extra = header.extra_data();
        if extra.len() < SIGNER_VANITY_LENGTH {
            return Err(EngineError::MissingVanity.into());
        }
        if extra.len() < SIGNER_VANITY_LENGTH + SIGNER_SIG_LENGTH {
            return Err(EngineError::MissingSignature.into());
        }
        // ...and a signer list exactly at checkpoints.
        let signers_len = extra.len() - SIGNER_VANITY_LENGTH - SIGNER_SIG_LENGTH;
        if checkpoint && (signers_len == 0 || signers_len % 20 != 0) {
            return Err(EngineError::InvalidCheckpointSigners(signers_len).into());
        }
        if !checkpoint && signers_len != 0 {
            return Err(EngineError::UnexpectedCheckpointSigners(signers_len).into());
        }

        let nonce = *header.nonce();
        if nonce != NONCE_AUTH_VOTE && nonce != NONCE_DROP_VOTE {
            return Err(EngineError::InvalidVote(nonce).into());
        }
        if checkpoint {
            if nonce != NONCE_DROP_VOTE {
                return Err(EngineError::InvalidVote(nonce).into());
            }
            if !header.author().is_zero() {
                return Err(EngineError::InvalidCheckpointBeneficiary(Mismatch {
                    expected: Address::zero(),
                    found: *header.author(),
                })
                .into());
            }
        }

        if !header.mix_hash().is_zero() {
            return Err(EngineError::InvalidMixDigest.into());
        }
        if header.uncles_hash() != &KECCAK_EMPTY_LIST_RLP {
            return Err(EngineError::InvalidUncleHash.into());
        }

        let difficulty = *header.difficulty();
        if difficulty != DIFF_INTURN && difficulty != DIFF_NOTURN {
            return Err(EngineError::WrongDifficulty(Mismatch {
                expected: DIFF_NOTURN,
                found: difficulty,
            })
            .into());
        }

        Ok(())
    }

    fn verify_block_family(&self, header: &Header, parent: &Header) -> Result<(), Error> {
        let mut snap = self.snapshot_at(parent, &[])?;
        self.verify_against_snapshot(&mut snap, header)
    }

    fn verify_header_batch(&self, parent: &Header, headers: &[Header]) -> Result<(), Error> {
        let result = (|| {
            let mut snap = self.snapshot_at(parent, headers)?;
            for header in headers {
                if self.stop.load(AtomicOrdering::SeqCst) {
                    self.record_failure(header.hash(), &EngineError::Stopped);
                    return Err(EngineError::Stopped.into());
                }
                self.verify_against_snapshot(&mut snap, header)?;
            }
            Ok(())
        })();
        // The stop request does not outlive the batch it cancelled.
        self.stop.store(false, AtomicOrdering::SeqCst);
        result
    }

    fn stop_verification(&self) {
        self.stop.store(true, AtomicOrdering::SeqCst);
    }

    fn is_timestamp_valid(&self, header_timestamp: u64, parent_timestamp: u64) -> bool {
        header_timestamp >= parent_timestamp.saturating_add(self.period)
    }

    fn open_block_header_timestamp(&self, parent_timestamp: u64) -> u64 {
        use std::{cmp, time};

        let now = time::SystemTime::now()
            .duration_since(time::UNIX_EPOCH)
            .unwrap_or_default();
        cmp::max(now.as_secs() as u64, parent_timestamp + self.period)
    }

    fn populate_from_parent(&self, header: &mut Header, parent: &Header) {
        // Holding the signer fields for the whole decision serialises
        // concurrent sealing attempts.
        let signer = self.signer.lock();
        let difficulty = match *signer {
            Some(ref signer) => match self.snapshot_at(parent, &[]) {
                Ok(snap) if snap.inturn(parent.number() + 1, signer) => DIFF_INTURN,
                _ => DIFF_NOTURN,
            },
            None => DIFF_NOTURN,
        };
        header.set_difficulty(difficulty);
    }

    fn register_client(&self, client: Weak<dyn EngineClient>) {
        *self.client.write() = Some(client);
    }

    fn set_signer(&self, signer: Option<Address>) {
        *self.signer.lock() = signer;
    }

    fn verification_failure(&self) -> Option<(H256, EngineError)> {
        self.last_failure.lock().clone()
    }
}

// Timestamp rule sanity next to the family check it backs.
impl Clique {
    /// Verify the clique timestamp rule against the parent.
    pub fn verify_timestamp(&self, header: &Header, parent: &Header) -> Result<(), Error> {
        if !self.is_timestamp_valid(header.timestamp(), parent.timestamp()) {
            return Err(BlockError::InvalidTimestamp(OutOfBounds {
                min: Some(parent.timestamp().saturating_add(self.period)),
                max: None,
                found: header.timestamp(),
            })
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto::publickey::{Generator, Random};
    use engines::clique::snapshot::tests::{address_of, build_header, signer_keys};
    use spec::CommonParams;

    const EPOCH: u64 = 30_000;

    fn engine() -> Clique {
        Clique::new(Machine::new(CommonParams::test_clique(1, EPOCH))).unwrap()
    }

    /// A genesis checkpoint plus `count` chained vote-free blocks, each
    /// sealed by an eligible signer.
    fn chain(keys: &[::crypto::publickey::KeyPair], count: u64) -> Vec<Header> {
        let signers: Vec<Address> = keys.iter().map(address_of).collect();
        let genesis = build_header(
            0,
            &keys[0],
            Address::zero(),
            NONCE_DROP_VOTE,
            DIFF_NOTURN,
            &signers,
            H256::zero(),
        );

        let mut snap = Snapshot::from_checkpoint_header(&genesis).unwrap();
        let mut headers = vec![genesis];
        for number in 1..=count {
            let key = keys
                .iter()
                .find(|k| {
                    let a = address_of(k);
                    snap.inturn(number, &a) && !snap.recent.values().any(|r| *r == a)
                })
                .or_else(|| {
                    keys.iter()
                        .find(|k| !snap.recent.values().any(|r| *r == address_of(k)))
                })
                .expect("a signer is always eligible with three signers; qed");
            let diff = if snap.inturn(number, &address_of(key)) {
                DIFF_INTURN
            } else {
                DIFF_NOTURN
            };
            let header = build_header(
                number,
                key,
                Address::zero(),
                NONCE_DROP_VOTE,
                diff,
                &[],
                headers.last().unwrap().hash(),
            );
            snap.apply(&header, EPOCH).unwrap();
            headers.push(header);
        }
        headers
    }

    #[test]
    fn batch_verification_shares_the_walk() {
        let _ = ::env_logger::try_init();
        let engine = engine();
        let keys = signer_keys(3);
        let headers = chain(&keys, 5);

        engine
            .verify_header_batch(&headers[0], &headers[1..])
            .unwrap();
        assert!(engine.verification_failure().is_none());

        // The walk cached a snapshot for the batch tip.
        let tip = headers.last().unwrap();
        let snap = engine.snapshot_at(tip, &[]).unwrap();
        assert_eq!(snap.number, tip.number());
        assert_eq!(snap.signers.len(), 3);
    }

    #[test]
    fn failing_header_is_retained_on_the_engine() {
        let engine = engine();
        let keys = signer_keys(3);
        let mut headers = chain(&keys, 3);

        // Replace the tip with one sealed by an outsider.
        let outsider = Random.generate();
        let bad = build_header(
            3,
            &outsider,
            Address::zero(),
            NONCE_DROP_VOTE,
            DIFF_NOTURN,
            &[],
            headers[2].hash(),
        );
        let bad_hash = bad.hash();
        headers[3] = bad;

        assert!(engine.verify_header_batch(&headers[0], &headers[1..]).is_err());
        match engine.verification_failure() {
            Some((hash, EngineError::NotAuthorized(signer))) => {
                assert_eq!(hash, bad_hash);
                assert_eq!(signer, address_of(&outsider));
            }
            other => panic!("unexpected failure record: {:?}", other),
        }
    }

    #[test]
    fn stop_flag_cancels_batch_and_clears() {
        let engine = engine();
        let keys = signer_keys(3);
        let headers = chain(&keys, 3);

        engine.stop_verification();
        match engine.verify_header_batch(&headers[0], &headers[1..]) {
            Err(Error::Engine(EngineError::Stopped)) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        // The flag was cleared; the same batch now verifies.
        engine
            .verify_header_batch(&headers[0], &headers[1..])
            .unwrap();
    }

    #[test]
    fn basic_rules_reject_malformed_headers() {
        let engine = engine();
        let keys = signer_keys(1);

        // A vote header with an embedded signer list.
        let bogus = build_header(
            1,
            &keys[0],
            Address::zero(),
            NONCE_DROP_VOTE,
            DIFF_NOTURN,
            &[address_of(&keys[0])],
            H256::zero(),
        );
        assert!(engine.verify_block_basic(&bogus).is_err());

        // An invalid vote nonce.
        let bogus = build_header(
            1,
            &keys[0],
            Address::zero(),
            ethereum_types::H64::from_low_u64_be(5),
            DIFF_NOTURN,
            &[],
            H256::zero(),
        );
        assert!(engine.verify_block_basic(&bogus).is_err());

        // A checkpoint naming a beneficiary.
        let bogus = build_header(
            0,
            &keys[0],
            Address::from_low_u64_be(3),
            NONCE_DROP_VOTE,
            DIFF_NOTURN,
            &[address_of(&keys[0])],
            H256::zero(),
        );
        assert!(engine.verify_block_basic(&bogus).is_err());

        // A clean vote header passes.
        let fine = build_header(
            1,
            &keys[0],
            Address::zero(),
            NONCE_DROP_VOTE,
            DIFF_NOTURN,
            &[],
            H256::zero(),
        );
        engine.verify_block_basic(&fine).unwrap();
    }

    #[test]
    fn timestamp_must_respect_period() {
        let engine = Clique::new(Machine::new(CommonParams::test_clique(15, EPOCH))).unwrap();
        let mut parent = Header::new();
        parent.set_timestamp(1_000);

        let mut header = Header::new();
        header.set_timestamp(1_010);
        assert!(engine.verify_timestamp(&header, &parent).is_err());
        header.set_timestamp(1_015);
        assert!(engine.verify_timestamp(&header, &parent).is_ok());
    }
}
