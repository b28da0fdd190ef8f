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

//! The rolling authority snapshot: the signer set, the recent-signer window
//! and the live vote tally, advanced header by header from a checkpoint.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crypto::publickey::{public_to_address, recover, Signature};
use ethereum_types::{Address, H256, H64, U256};
use types::{hash::keccak, header::Header, BlockNumber};
use unexpected::Mismatch;

use engines::EngineError;

/// Fixed number of extra-data prefix bytes reserved for signer vanity.
pub const SIGNER_VANITY_LENGTH: usize = 32;
/// Fixed number of extra-data suffix bytes reserved for the signer seal.
pub const SIGNER_SIG_LENGTH: usize = 65;

/// Nonce of a header voting to authorise a signer.
pub const NONCE_AUTH_VOTE: H64 = H64([0xff; 8]);
/// Nonce of a header voting to deauthorise a signer.
pub const NONCE_DROP_VOTE: H64 = H64([0x00; 8]);

/// Difficulty of an in-turn block.
pub const DIFF_INTURN: U256 = U256([2, 0, 0, 0]);
/// Difficulty of an out-of-turn block.
pub const DIFF_NOTURN: U256 = U256([1, 0, 0, 0]);

/// The hash the header signature commits to: the header RLP with the
/// 65-byte signature stripped from the extra data.
pub fn seal_hash(header: &Header) -> Result<H256, EngineError> {
    let extra = header.extra_data();
    if extra.len() < SIGNER_VANITY_LENGTH {
        return Err(EngineError::MissingVanity);
    }
    if extra.len() < SIGNER_VANITY_LENGTH + SIGNER_SIG_LENGTH {
        return Err(EngineError::MissingSignature);
    }
    let mut stripped = header.clone();
    stripped.set_extra_data(extra[..extra.len() - SIGNER_SIG_LENGTH].to_vec());
    Ok(keccak(stripped.encoded()))
}

/// Recover the address that sealed the header.
pub fn recover_creator(header: &Header) -> Result<Address, EngineError> {
    let msg = seal_hash(header)?;
    let extra = header.extra_data();
    let mut sig = [0u8; SIGNER_SIG_LENGTH];
    sig.copy_from_slice(&extra[extra.len() - SIGNER_SIG_LENGTH..]);

    let public = recover(&Signature::from(sig), &msg)
        .map_err(|err| EngineError::FaultyRecoveredSigner(err.to_string()))?;
    Ok(public_to_address(&public))
}

/// Extract the signer list a checkpoint header embeds between the vanity
/// prefix and the signature suffix.
pub fn extract_signers(header: &Header) -> Result<Vec<Address>, EngineError> {
    let extra = header.extra_data();
    if extra.len() < SIGNER_VANITY_LENGTH + SIGNER_SIG_LENGTH {
        return Err(EngineError::MissingSignature);
    }
    let bytes = &extra[SIGNER_VANITY_LENGTH..extra.len() - SIGNER_SIG_LENGTH];
    if bytes.is_empty() || bytes.len() % 20 != 0 {
        return Err(EngineError::InvalidCheckpointSigners(bytes.len()));
    }
    Ok(bytes.chunks(20).map(Address::from_slice).collect())
}

/// One unexpired authorisation vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// The authorised signer that cast this vote.
    pub signer: Address,
    /// The block the vote was cast in.
    pub block: BlockNumber,
    /// The account being voted on.
    pub address: Address,
    /// Whether to authorise or deauthorise the account.
    pub authorize: bool,
}

/// The running vote count for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// The direction the votes agree on.
    pub authorize: bool,
    /// Number of live votes.
    pub votes: usize,
}

/// Authority state at one block.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Block number this snapshot describes.
    pub number: BlockNumber,
    /// Hash of the block this snapshot describes.
    pub hash: H256,
    /// The authorised signers, ordered.
    pub signers: BTreeSet<Address>,
    /// Recent signers, by the block they signed; none may sign again while
    /// inside the window.
    pub recent: BTreeMap<BlockNumber, Address>,
    /// Live votes, in casting order.
    pub votes: Vec<Vote>,
    /// Running tally per voted-on account.
    pub tally: HashMap<Address, Tally>,
}

impl Snapshot {
    /// A fresh snapshot with the given signer set and no votes.
    pub fn new<I>(number: BlockNumber, hash: H256, signers: I) -> Self
    where
        I: IntoIterator<Item = Address>,
    {
        Snapshot {
            number,
            hash,
            signers: signers.into_iter().collect(),
            recent: BTreeMap::new(),
            votes: Vec::new(),
            tally: HashMap::new(),
        }
    }

    /// Build the canonical snapshot of a checkpoint header.
    pub fn from_checkpoint_header(header: &Header) -> Result<Self, EngineError> {
        let signers = extract_signers(header)?;
        Ok(Snapshot::new(header.number(), header.hash(), signers))
    }

    /// The position of a signer in the sorted signer set.
    pub fn signer_index(&self, signer: &Address) -> Option<usize> {
        self.signers.iter().position(|s| s == signer)
    }

    /// Whether `signer` is due to seal the block at `number`.
    pub fn inturn(&self, number: BlockNumber, signer: &Address) -> bool {
        match self.signer_index(signer) {
            Some(index) => number % self.signers.len() as u64 == index as u64,
            None => false,
        }
    }

    /// Size of the recent-signer window plus the slot being sealed.
    fn recent_limit(&self) -> u64 {
        self.signers.len() as u64 / 2 + 1
    }

    fn cast(&mut self, address: Address, authorize: bool) -> bool {
        // A vote in the direction the set already reflects is meaningless.
        if self.signers.contains(&address) == authorize {
            return false;
        }
        let tally = self.tally.entry(address).or_insert(Tally {
            authorize,
            votes: 0,
        });
        if tally.authorize != authorize {
            return false;
        }
        tally.votes += 1;
        true
    }

    fn uncast(&mut self, address: Address, authorize: bool) {
        let remove = match self.tally.get_mut(&address) {
            Some(tally) if tally.authorize == authorize => {
                tally.votes -= 1;
                tally.votes == 0
            }
            _ => false,
        };
        if remove {
            self.tally.remove(&address);
        }
    }

    /// Advance the snapshot by one header. `epoch` is the checkpoint
    /// interval of the chain.
    pub fn apply(&mut self, header: &Header, epoch: u64) -> Result<(), EngineError> {
        let number = header.number();

        let signer = recover_creator(header)?;
        if !self.signers.contains(&signer) {
            return Err(EngineError::NotAuthorized(signer));
        }
        // The window covers the last |signers|/2 + 1 sealed blocks.
        if self.recent.values().any(|recent| *recent == signer) {
            return Err(EngineError::RecentlySigned(signer));
        }

        // The oldest recent signer falls out of the window.
        let limit = self.recent_limit();
        if number >= limit {
            self.recent.remove(&(number - limit));
        }

        let expected = if self.inturn(number, &signer) {
            DIFF_INTURN
        } else {
            DIFF_NOTURN
        };
        if *header.difficulty() != expected {
            return Err(EngineError::WrongDifficulty(Mismatch {
                expected,
                found: *header.difficulty(),
            }));
        }

        if number % epoch == 0 {
            // Checkpoints wipe the pending votes and must restate the
            // signer set verbatim.
            self.votes.clear();
            self.tally.clear();

            let embedded = extract_signers(header)?;
            let ours: Vec<Address> = self.signers.iter().cloned().collect();
            if embedded != ours {
                return Err(EngineError::MismatchingCheckpointSigners(header.hash()));
            }
        } else if !header.author().is_zero() {
            let beneficiary = *header.author();
            let nonce = *header.nonce();
            let authorize = if nonce == NONCE_AUTH_VOTE {
                true
            } else if nonce == NONCE_DROP_VOTE {
                false
            } else {
                return Err(EngineError::InvalidVote(nonce));
            };

            // A signer may only hold one live vote per account.
            if let Some(pos) = self
                .votes
                .iter()
                .position(|v| v.signer == signer && v.address == beneficiary)
            {
                let old = self.votes.remove(pos);
                self.uncast(old.address, old.authorize);
            }

            if self.cast(beneficiary, authorize) {
                self.votes.push(Vote {
                    signer,
                    block: number,
                    address: beneficiary,
                    authorize,
                });
            }

            // A majority commits the change.
            let decided = self
                .tally
                .get(&beneficiary)
                .map_or(false, |tally| tally.votes > self.signers.len() / 2);
            if decided {
                let authorize = self.tally[&beneficiary].authorize;
                if authorize {
                    self.signers.insert(beneficiary);
                } else {
                    self.signers.remove(&beneficiary);

                    // The window shrank with the signer set.
                    let limit = self.recent_limit();
                    if number >= limit {
                        self.recent.remove(&(number - limit));
                    }

                    // The deposed signer's pending votes die with it.
                    let cast: Vec<Vote> = self
                        .votes
                        .iter()
                        .filter(|v| v.signer == beneficiary)
                        .cloned()
                        .collect();
                    for vote in cast {
                        self.uncast(vote.address, vote.authorize);
                    }
                    self.votes.retain(|v| v.signer != beneficiary);
                }

                // Either way the question is settled.
                self.votes.retain(|v| v.address != beneficiary);
                self.tally.remove(&beneficiary);
            }
        }

        self.recent.insert(number, signer);
        self.number = number;
        self.hash = header.hash();

        debug_assert!(self.recent.len() as u64 <= self.recent_limit());
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crypto::publickey::{Generator, KeyPair, Random};

    /// Keypairs sorted by their address, the order clique turns follow.
    pub fn signer_keys(count: usize) -> Vec<KeyPair> {
        let mut keys: Vec<KeyPair> = (0..count).map(|_| Random.generate()).collect();
        keys.sort_by_key(|k| public_to_address(k.public()));
        keys
    }

    pub fn address_of(key: &KeyPair) -> Address {
        public_to_address(key.public())
    }

    /// Build and sign a vote header.
    pub fn vote_header(
        number: BlockNumber,
        key: &KeyPair,
        beneficiary: Address,
        nonce: H64,
        difficulty: U256,
    ) -> Header {
        build_header(number, key, beneficiary, nonce, difficulty, &[], H256::zero())
    }

    /// Build and sign a header, embedding a signer list when given.
    pub fn build_header(
        number: BlockNumber,
        key: &KeyPair,
        beneficiary: Address,
        nonce: H64,
        difficulty: U256,
        embedded_signers: &[Address],
        parent_hash: H256,
    ) -> Header {
        let mut header = Header::new();
        header.set_parent_hash(parent_hash);
        header.set_number(number);
        header.set_author(beneficiary);
        header.set_nonce(nonce);
        header.set_difficulty(difficulty);
        header.set_gas_limit(5_000.into());
        header.set_timestamp(number * 15);

        let mut extra = vec![0u8; SIGNER_VANITY_LENGTH];
        for signer in embedded_signers {
            extra.extend_from_slice(signer.as_bytes());
        }
        extra.extend_from_slice(&[0u8; SIGNER_SIG_LENGTH]);
        header.set_extra_data(extra.clone());

        let hash = seal_hash(&header).unwrap();
        let signature = crypto::publickey::sign(key.secret(), &hash).unwrap();
        let tail = extra.len() - SIGNER_SIG_LENGTH;
        extra[tail..].copy_from_slice(&signature[..]);
        header.set_extra_data(extra);
        header
    }

    fn snapshot_of(keys: &[KeyPair]) -> Snapshot {
        Snapshot::new(0, H256::zero(), keys.iter().map(address_of))
    }

    #[test]
    fn recent_signer_may_not_sign_again() {
        // Four signers: the window holds 4/2 = 2 recent signers.
        let keys = signer_keys(4);
        let mut snap = snapshot_of(&keys);

        for (i, key) in keys.iter().take(3).enumerate() {
            let number = (i + 1) as u64;
            let diff = if snap.inturn(number, &address_of(key)) {
                DIFF_INTURN
            } else {
                DIFF_NOTURN
            };
            let header = vote_header(number, key, Address::zero(), NONCE_DROP_VOTE, diff);
            snap.apply(&header, 30_000).unwrap();
        }
        assert!(snap.recent.len() as u64 <= 2 + 1);

        // The signer of block 1 is still inside the window at block 4.
        let offender = &keys[0];
        let diff = if snap.inturn(4, &address_of(offender)) {
            DIFF_INTURN
        } else {
            DIFF_NOTURN
        };
        let header = vote_header(4, offender, Address::zero(), NONCE_DROP_VOTE, diff);
        assert_eq!(
            snap.apply(&header, 30_000),
            Err(EngineError::RecentlySigned(address_of(offender)))
        );
    }

    #[test]
    fn majority_vote_admits_new_signer() {
        let keys = signer_keys(3);
        let mut snap = snapshot_of(&keys);
        let new_signer = Address::from_low_u64_be(0x5155);

        // First vote: no majority yet (need > 3/2 = 1, i.e. 2 votes).
        let voter = &keys[1];
        let diff = if snap.inturn(1, &address_of(voter)) {
            DIFF_INTURN
        } else {
            DIFF_NOTURN
        };
        let header = vote_header(1, voter, new_signer, NONCE_AUTH_VOTE, diff);
        snap.apply(&header, 30_000).unwrap();
        assert_eq!(snap.signers.len(), 3);
        assert_eq!(snap.tally[&new_signer].votes, 1);

        // Second distinct voter commits the change.
        let second = keys
            .iter()
            .find(|k| address_of(k) != address_of(voter))
            .unwrap();
        let diff = if snap.inturn(2, &address_of(second)) {
            DIFF_INTURN
        } else {
            DIFF_NOTURN
        };
        let header = vote_header(2, second, new_signer, NONCE_AUTH_VOTE, diff);
        snap.apply(&header, 30_000).unwrap();

        assert!(snap.signers.contains(&new_signer));
        assert_eq!(snap.signers.len(), 4);
        // Votes about the admitted signer are purged.
        assert!(snap.votes.iter().all(|v| v.address != new_signer));
        assert!(!snap.tally.contains_key(&new_signer));
    }

    #[test]
    fn unauthorized_signer_is_rejected() {
        let keys = signer_keys(2);
        let mut snap = snapshot_of(&keys);
        let outsider = Random.generate();

        let header = vote_header(1, &outsider, Address::zero(), NONCE_DROP_VOTE, DIFF_NOTURN);
        assert_eq!(
            snap.apply(&header, 30_000),
            Err(EngineError::NotAuthorized(address_of(&outsider)))
        );
    }

    #[test]
    fn wrong_turn_difficulty_is_rejected() {
        let keys = signer_keys(2);
        let mut snap = snapshot_of(&keys);
        let key = &keys[0];
        let inturn = snap.inturn(1, &address_of(key));

        // Claim the opposite turn.
        let wrong = if inturn { DIFF_NOTURN } else { DIFF_INTURN };
        let header = vote_header(1, key, Address::zero(), NONCE_DROP_VOTE, wrong);
        match snap.apply(&header, 30_000) {
            Err(EngineError::WrongDifficulty(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn checkpoint_requires_matching_signer_list() {
        let keys = signer_keys(3);
        let mut snap = snapshot_of(&keys);
        let signers: Vec<Address> = keys.iter().map(address_of).collect();

        // Epoch of 4: block 4 is a checkpoint. Walk blocks 1..3 first.
        for number in 1..4u64 {
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
                .unwrap();
            let diff = if snap.inturn(number, &address_of(key)) {
                DIFF_INTURN
            } else {
                DIFF_NOTURN
            };
            let header = vote_header(number, key, Address::zero(), NONCE_DROP_VOTE, diff);
            snap.apply(&header, 4).unwrap();
        }

        let key = keys
            .iter()
            .find(|k| !snap.recent.values().any(|r| *r == address_of(k)))
            .unwrap();
        let diff = if snap.inturn(4, &address_of(key)) {
            DIFF_INTURN
        } else {
            DIFF_NOTURN
        };

        // Wrong list: rejected.
        let bogus = build_header(
            4,
            key,
            Address::zero(),
            NONCE_DROP_VOTE,
            diff,
            &[Address::from_low_u64_be(1)],
            H256::zero(),
        );
        assert_eq!(
            snap.clone().apply(&bogus, 4),
            Err(EngineError::MismatchingCheckpointSigners(bogus.hash()))
        );

        // Correct list: accepted, and votes are wiped.
        let checkpoint = build_header(
            4,
            key,
            Address::zero(),
            NONCE_DROP_VOTE,
            diff,
            &signers,
            H256::zero(),
        );
        snap.apply(&checkpoint, 4).unwrap();
        assert!(snap.votes.is_empty());
        assert!(snap.tally.is_empty());
    }
}
