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

//! Basic account type -- the decoded RLP from the state trie.

use ethereum_types::{H256, U256};
use parity_bytes::Bytes;
use rlp::{DecoderError, Rlp, RlpStream};

use crate::hash::{KECCAK_EMPTY, KECCAK_NULL_RLP};

/// Basic account type.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BasicAccount {
    /// Nonce of the account.
    pub nonce: U256,
    /// Balance of the account.
    pub balance: U256,
    /// Storage root of the account.
    pub storage_root: H256,
    /// Code hash of the account.
    pub code_hash: H256,
}

impl Default for BasicAccount {
    fn default() -> Self {
        BasicAccount {
            nonce: U256::zero(),
            balance: U256::zero(),
            storage_root: KECCAK_NULL_RLP,
            code_hash: KECCAK_EMPTY,
        }
    }
}

impl BasicAccount {
    /// The "slim" encoding used by the snap protocol: the empty storage root
    /// and the empty code hash are compressed to zero-length strings.
    pub fn to_slim_rlp(&self) -> Bytes {
        let mut s = RlpStream::new_list(4);
        s.append(&self.nonce);
        s.append(&self.balance);
        if self.storage_root == KECCAK_NULL_RLP {
            s.append_empty_data();
        } else {
            s.append(&self.storage_root);
        }
        if self.code_hash == KECCAK_EMPTY {
            s.append_empty_data();
        } else {
            s.append(&self.code_hash);
        }
        s.out()
    }

    /// Decode the "slim" snap encoding, restoring the empty storage root and
    /// code hash markers.
    pub fn from_slim_rlp(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 4 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let storage_root = rlp.at(2)?;
        let code_hash = rlp.at(3)?;
        Ok(BasicAccount {
            nonce: rlp.val_at(0)?,
            balance: rlp.val_at(1)?,
            storage_root: if storage_root.is_empty() {
                KECCAK_NULL_RLP
            } else {
                storage_root.as_val()?
            },
            code_hash: if code_hash.is_empty() {
                KECCAK_EMPTY
            } else {
                code_hash.as_val()?
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::BasicAccount;
    use crate::hash::{KECCAK_EMPTY, KECCAK_NULL_RLP};
    use ethereum_types::H256;
    use rlp::Rlp;

    #[test]
    fn slim_encoding_compresses_empty_markers() {
        let account = BasicAccount {
            nonce: 1.into(),
            balance: 2.into(),
            ..Default::default()
        };
        let slim = account.to_slim_rlp();
        // The two empty markers shrink to single bytes.
        let full = ::rlp::encode(&account);
        assert!(slim.len() < full.len());

        let decoded = BasicAccount::from_slim_rlp(&Rlp::new(&slim)).unwrap();
        assert_eq!(decoded.storage_root, KECCAK_NULL_RLP);
        assert_eq!(decoded.code_hash, KECCAK_EMPTY);
        assert_eq!(decoded, account);
    }

    #[test]
    fn slim_encoding_preserves_real_roots() {
        let account = BasicAccount {
            nonce: 1.into(),
            balance: 2.into(),
            storage_root: H256::from_low_u64_be(3),
            code_hash: H256::from_low_u64_be(4),
        };
        let decoded = BasicAccount::from_slim_rlp(&Rlp::new(&account.to_slim_rlp())).unwrap();
        assert_eq!(decoded, account);
    }
}
