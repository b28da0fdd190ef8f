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

//! Block header.

use crate::{
    hash::{keccak, KECCAK_EMPTY_LIST_RLP, KECCAK_NULL_RLP},
    BlockNumber,
};
use ethereum_types::{Address, Bloom, H256, H64, U256};
use parity_bytes::Bytes;
use rlp::{DecoderError, Rlp, RlpStream};

/// Semantic boolean for when a seal/signature is included.
#[derive(Debug, Clone, Copy)]
enum Seal {
    /// The seal/signature is included.
    With,
    /// The seal/signature is not included.
    Without,
}

/// A block header.
///
/// Reflects the specific RLP fields of a block in the chain with additional room for the seal
/// which is non-specific.
///
/// Doesn't do all that much on its own.
#[derive(Debug, Clone, Eq)]
pub struct Header {
    /// Parent hash.
    parent_hash: H256,
    /// Block timestamp.
    timestamp: u64,
    /// Block number.
    number: BlockNumber,
    /// Block author.
    author: Address,

    /// Transactions root.
    transactions_root: H256,
    /// Block uncles hash.
    uncles_hash: H256,
    /// Block extra data.
    extra_data: Bytes,

    /// State root.
    state_root: H256,
    /// Block receipts root.
    receipts_root: H256,
    /// Block bloom.
    log_bloom: Bloom,
    /// Gas used for contracts execution.
    gas_used: U256,
    /// Block gas limit.
    gas_limit: U256,

    /// Block difficulty.
    difficulty: U256,
    /// Mix digest of the seal.
    mix_hash: H256,
    /// Nonce of the seal.
    nonce: H64,
    /// Base fee per gas. Introduced by EIP1559.
    base_fee_per_gas: Option<U256>,

    /// Memoized hash of the RLP representation *including* the seal fields.
    hash: Option<H256>,
}

impl PartialEq for Header {
    fn eq(&self, c: &Header) -> bool {
        if let (&Some(ref h1), &Some(ref h2)) = (&self.hash, &c.hash) {
            // Fast path, hashes are memoized for both.
            if h1 == h2 {
                return true;
            }
        }

        self.parent_hash == c.parent_hash
            && self.timestamp == c.timestamp
            && self.number == c.number
            && self.author == c.author
            && self.transactions_root == c.transactions_root
            && self.uncles_hash == c.uncles_hash
            && self.extra_data == c.extra_data
            && self.state_root == c.state_root
            && self.receipts_root == c.receipts_root
            && self.log_bloom == c.log_bloom
            && self.gas_used == c.gas_used
            && self.gas_limit == c.gas_limit
            && self.difficulty == c.difficulty
            && self.mix_hash == c.mix_hash
            && self.nonce == c.nonce
            && self.base_fee_per_gas == c.base_fee_per_gas
    }
}

impl Default for Header {
    fn default() -> Self {
        Header {
            parent_hash: H256::default(),
            timestamp: 0,
            number: 0,
            author: Address::default(),

            transactions_root: KECCAK_NULL_RLP,
            uncles_hash: KECCAK_EMPTY_LIST_RLP,
            extra_data: vec![],

            state_root: KECCAK_NULL_RLP,
            receipts_root: KECCAK_NULL_RLP,
            log_bloom: Bloom::default(),
            gas_used: U256::default(),
            gas_limit: U256::default(),

            difficulty: U256::default(),
            mix_hash: H256::default(),
            nonce: H64::default(),
            base_fee_per_gas: None,

            hash: None,
        }
    }
}

impl Header {
    /// Create a new, default-valued, header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the parent_hash field of the header.
    pub fn parent_hash(&self) -> &H256 {
        &self.parent_hash
    }

    /// Get the timestamp field of the header.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Get the number field of the header.
    pub fn number(&self) -> BlockNumber {
        self.number
    }

    /// Get the author field of the header.
    pub fn author(&self) -> &Address {
        &self.author
    }

    /// Get the extra data field of the header.
    pub fn extra_data(&self) -> &Bytes {
        &self.extra_data
    }

    /// Get the state root field of the header.
    pub fn state_root(&self) -> &H256 {
        &self.state_root
    }

    /// Get the receipts root field of the header.
    pub fn receipts_root(&self) -> &H256 {
        &self.receipts_root
    }

    /// Get the log bloom field of the header.
    pub fn log_bloom(&self) -> &Bloom {
        &self.log_bloom
    }

    /// Get the transactions root field of the header.
    pub fn transactions_root(&self) -> &H256 {
        &self.transactions_root
    }

    /// Get the uncles hash field of the header.
    pub fn uncles_hash(&self) -> &H256 {
        &self.uncles_hash
    }

    /// Get the gas used field of the header.
    pub fn gas_used(&self) -> &U256 {
        &self.gas_used
    }

    /// Get the gas limit field of the header.
    pub fn gas_limit(&self) -> &U256 {
        &self.gas_limit
    }

    /// Get the difficulty field of the header.
    pub fn difficulty(&self) -> &U256 {
        &self.difficulty
    }

    /// Get the mix digest field of the seal.
    pub fn mix_hash(&self) -> &H256 {
        &self.mix_hash
    }

    /// Get the nonce field of the seal.
    pub fn nonce(&self) -> &H64 {
        &self.nonce
    }

    /// Get the base fee field of the header, introduced by EIP1559.
    pub fn base_fee(&self) -> Option<U256> {
        self.base_fee_per_gas
    }

    /// Set the number field of the header.
    pub fn set_parent_hash(&mut self, a: H256) {
        change_field(&mut self.hash, &mut self.parent_hash, a);
    }

    /// Set the uncles hash field of the header.
    pub fn set_uncles_hash(&mut self, a: H256) {
        change_field(&mut self.hash, &mut self.uncles_hash, a);
    }

    /// Set the state root field of the header.
    pub fn set_state_root(&mut self, a: H256) {
        change_field(&mut self.hash, &mut self.state_root, a);
    }

    /// Set the transactions root field of the header.
    pub fn set_transactions_root(&mut self, a: H256) {
        change_field(&mut self.hash, &mut self.transactions_root, a);
    }

    /// Set the receipts root field of the header.
    pub fn set_receipts_root(&mut self, a: H256) {
        change_field(&mut self.hash, &mut self.receipts_root, a);
    }

    /// Set the log bloom field of the header.
    pub fn set_log_bloom(&mut self, a: Bloom) {
        change_field(&mut self.hash, &mut self.log_bloom, a);
    }

    /// Set the timestamp field of the header.
    pub fn set_timestamp(&mut self, a: u64) {
        change_field(&mut self.hash, &mut self.timestamp, a);
    }

    /// Set the number field of the header.
    pub fn set_number(&mut self, a: BlockNumber) {
        change_field(&mut self.hash, &mut self.number, a);
    }

    /// Set the author field of the header.
    pub fn set_author(&mut self, a: Address) {
        change_field(&mut self.hash, &mut self.author, a);
    }

    /// Set the extra data field of the header.
    pub fn set_extra_data(&mut self, a: Bytes) {
        change_field(&mut self.hash, &mut self.extra_data, a);
    }

    /// Set the gas used field of the header.
    pub fn set_gas_used(&mut self, a: U256) {
        change_field(&mut self.hash, &mut self.gas_used, a);
    }

    /// Set the gas limit field of the header.
    pub fn set_gas_limit(&mut self, a: U256) {
        change_field(&mut self.hash, &mut self.gas_limit, a);
    }

    /// Set the difficulty field of the header.
    pub fn set_difficulty(&mut self, a: U256) {
        change_field(&mut self.hash, &mut self.difficulty, a);
    }

    /// Set the mix digest field of the seal.
    pub fn set_mix_hash(&mut self, a: H256) {
        change_field(&mut self.hash, &mut self.mix_hash, a);
    }

    /// Set the nonce field of the seal.
    pub fn set_nonce(&mut self, a: H64) {
        change_field(&mut self.hash, &mut self.nonce, a);
    }

    /// Set the base fee field of the header.
    pub fn set_base_fee(&mut self, a: Option<U256>) {
        change_field(&mut self.hash, &mut self.base_fee_per_gas, a);
    }

    /// Get & memoize the hash of this header (keccak of the RLP with seal).
    pub fn compute_hash(&mut self) -> H256 {
        let hash = self.hash();
        self.hash = Some(hash);
        hash
    }

    /// Get the hash of this header (keccak of the RLP with seal).
    pub fn hash(&self) -> H256 {
        self.hash.unwrap_or_else(|| keccak(self.rlp(Seal::With)))
    }

    /// Get the hash of the header excluding the seal. For proof-of-work chains
    /// this is the mining hash the nonce and mix digest commit to.
    pub fn bare_hash(&self) -> H256 {
        keccak(self.rlp(Seal::Without))
    }

    /// Encode the header, with or without the seal.
    fn stream_rlp(&self, s: &mut RlpStream, with_seal: Seal) {
        let base = if self.base_fee_per_gas.is_some() { 1 } else { 0 };
        let fields = match with_seal {
            Seal::With => 15 + base,
            Seal::Without => 13 + base,
        };

        s.begin_list(fields);
        s.append(&self.parent_hash)
            .append(&self.uncles_hash)
            .append(&self.author)
            .append(&self.state_root)
            .append(&self.transactions_root)
            .append(&self.receipts_root)
            .append(&self.log_bloom)
            .append(&self.difficulty)
            .append(&self.number)
            .append(&self.gas_limit)
            .append(&self.gas_used)
            .append(&self.timestamp)
            .append(&self.extra_data);

        if let Seal::With = with_seal {
            s.append(&self.mix_hash).append(&self.nonce);
        }

        if let Some(ref base_fee) = self.base_fee_per_gas {
            s.append(base_fee);
        }
    }

    /// Get the RLP representation of this Header.
    fn rlp(&self, with_seal: Seal) -> Bytes {
        let mut s = RlpStream::new();
        self.stream_rlp(&mut s, with_seal);
        s.out()
    }

    /// Get the full RLP representation of this Header (including seal).
    pub fn encoded(&self) -> Bytes {
        self.rlp(Seal::With)
    }

    /// Decode a header. The base fee is expected for blocks at or past the
    /// EIP1559 transition and must be absent before it.
    pub fn decode_rlp(r: &Rlp, eip1559_transition: BlockNumber) -> Result<Self, DecoderError> {
        let number: BlockNumber = r.val_at(8)?;
        let expected_len = if number >= eip1559_transition { 16 } else { 15 };
        if r.item_count()? != expected_len {
            return Err(DecoderError::RlpIncorrectListLen);
        }

        let blockheader = Header {
            parent_hash: r.val_at(0)?,
            uncles_hash: r.val_at(1)?,
            author: r.val_at(2)?,
            state_root: r.val_at(3)?,
            transactions_root: r.val_at(4)?,
            receipts_root: r.val_at(5)?,
            log_bloom: r.val_at(6)?,
            difficulty: r.val_at(7)?,
            number,
            gas_limit: r.val_at(9)?,
            gas_used: r.val_at(10)?,
            timestamp: r.val_at(11)?,
            extra_data: r.val_at(12)?,
            mix_hash: r.val_at(13)?,
            nonce: r.val_at(14)?,
            base_fee_per_gas: if number >= eip1559_transition {
                Some(r.val_at(15)?)
            } else {
                None
            },
            hash: keccak(r.as_raw()).into(),
        };

        Ok(blockheader)
    }

    /// Decode an RLP list of headers.
    pub fn decode_rlp_list(
        r: &Rlp,
        eip1559_transition: BlockNumber,
    ) -> Result<Vec<Self>, DecoderError> {
        if !r.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        let mut headers = Vec::with_capacity(r.item_count()?);
        for h in r.iter() {
            headers.push(Self::decode_rlp(&h, eip1559_transition)?);
        }
        Ok(headers)
    }
}

impl rlp::Encodable for Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        self.stream_rlp(s, Seal::With);
    }
}

/// Alter value of given field, reset memoised hash if changed.
fn change_field<T>(hash: &mut Option<H256>, field: &mut T, value: T)
where
    T: PartialEq<T>,
{
    if field != &value {
        *field = value;
        *hash = None;
    }
}

#[cfg(test)]
mod tests {
    use super::Header;
    use ethereum_types::{H256, U256};
    use rlp::Rlp;

    fn sample_header() -> Header {
        let mut header = Header::new();
        header.set_parent_hash(H256::from_low_u64_be(1));
        header.set_number(42);
        header.set_gas_limit(100_000.into());
        header.set_gas_used(21_000.into());
        header.set_difficulty(0x20000.into());
        header.set_timestamp(1_600_000_000);
        header.set_extra_data(b"fe".to_vec());
        header
    }

    #[test]
    fn decode_and_encode_header() {
        let header = sample_header();
        let encoded = header.encoded();

        let decoded = Header::decode_rlp(&Rlp::new(&encoded), u64::max_value())
            .expect("sample header is decodable");
        assert_eq!(decoded, header);
        assert_eq!(decoded.encoded(), encoded);
        assert_eq!(decoded.hash(), header.hash());
    }

    #[test]
    fn decode_and_encode_header_with_base_fee() {
        let mut header = sample_header();
        header.set_base_fee(Some(U256::from(1_000_000_000u64)));
        let encoded = header.encoded();

        // Transition at or below the header number expects the extra field.
        let decoded =
            Header::decode_rlp(&Rlp::new(&encoded), 42).expect("eip1559 header is decodable");
        assert_eq!(decoded.base_fee(), Some(U256::from(1_000_000_000u64)));
        assert_eq!(decoded, header);
        assert_eq!(decoded.encoded(), encoded);
    }

    #[test]
    fn decode_rejects_wrong_arity_for_transition() {
        let header = sample_header();
        let encoded = header.encoded();

        // Legacy encoding, but the chain says number 42 is past the transition.
        assert!(Header::decode_rlp(&Rlp::new(&encoded), 42).is_err());
    }

    #[test]
    fn hash_is_invalidated_by_setters() {
        let mut header = sample_header();
        let hash = header.compute_hash();
        header.set_timestamp(header.timestamp() + 1);
        assert_ne!(hash, header.hash());
    }

    #[test]
    fn bare_hash_excludes_seal() {
        let mut header = sample_header();
        let bare = header.bare_hash();
        let full = header.hash();
        assert_ne!(bare, full);

        header.set_nonce(ethereum_types::H64::from_low_u64_be(7));
        assert_eq!(bare, header.bare_hash());
        assert_ne!(full, header.hash());
    }
}
