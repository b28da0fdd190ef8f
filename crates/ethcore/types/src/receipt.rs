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

//! Receipt

use ethereum_types::{Bloom, H256, U256};
use parity_bytes::Bytes;
use rlp::{DecoderError, Rlp, RlpStream};

use crate::{log_entry::LogEntry, transaction::TypedTxId};

/// Transaction outcome store in the receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Status and state root are unknown under EIP-98 rules.
    Unknown,
    /// State root is known. Pre EIP-98 rules.
    StateRoot(H256),
    /// Status code is known. EIP-658 rules.
    StatusCode(u8),
}

/// Information describing execution of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// The transaction outcome.
    pub outcome: TransactionOutcome,
    /// The total gas used in the block following execution of the transaction.
    pub gas_used: U256,
    /// The OR-wide combination of all logs' blooms for this transaction.
    pub log_bloom: Bloom,
    /// The logs stemming from this transaction.
    pub logs: Vec<LogEntry>,
}

impl Receipt {
    /// Create a new receipt.
    pub fn new(outcome: TransactionOutcome, gas_used: U256, logs: Vec<LogEntry>) -> Self {
        Self {
            outcome,
            gas_used,
            log_bloom: logs.iter().fold(Bloom::default(), |mut b, l| {
                b.accrue_bloom(&l.bloom());
                b
            }),
            logs,
        }
    }

    fn rlp_append(&self, s: &mut RlpStream) {
        match self.outcome {
            TransactionOutcome::Unknown => {
                s.begin_list(3);
            }
            TransactionOutcome::StateRoot(ref root) => {
                s.begin_list(4);
                s.append(root);
            }
            TransactionOutcome::StatusCode(ref status_code) => {
                s.begin_list(4);
                s.append(status_code);
            }
        }
        s.append(&self.gas_used);
        s.append(&self.log_bloom);
        s.append_list(&self.logs);
    }

    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        match rlp.item_count()? {
            3 => Ok(Receipt {
                outcome: TransactionOutcome::Unknown,
                gas_used: rlp.val_at(0)?,
                log_bloom: rlp.val_at(1)?,
                logs: rlp.list_at(2)?,
            }),
            4 => Ok(Receipt {
                gas_used: rlp.val_at(1)?,
                log_bloom: rlp.val_at(2)?,
                logs: rlp.list_at(3)?,
                outcome: {
                    let first = rlp.at(0)?;
                    if first.is_data() && first.data()?.len() <= 1 {
                        TransactionOutcome::StatusCode(first.as_val()?)
                    } else {
                        TransactionOutcome::StateRoot(first.as_val()?)
                    }
                },
            }),
            _ => Err(DecoderError::RlpIncorrectListLen),
        }
    }
}

/// A receipt carrying the type of the transaction it belongs to. Typed
/// receipts travel as type-prefixed envelopes wherever typed transactions do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedReceipt {
    /// Type of the transaction this receipt is for.
    pub receipt_type: TypedTxId,
    /// The receipt payload.
    pub receipt: Receipt,
}

impl TypedReceipt {
    /// Create a new typed receipt.
    pub fn new(receipt_type: TypedTxId, receipt: Receipt) -> Self {
        Self {
            receipt_type,
            receipt,
        }
    }

    /// The wire/trie encoding of the receipt.
    pub fn encode(&self) -> Bytes {
        let mut s = RlpStream::new();
        self.receipt.rlp_append(&mut s);
        match self.receipt_type {
            TypedTxId::Legacy => s.out(),
            t => {
                let mut out = vec![t.type_byte()];
                out.extend_from_slice(s.as_raw());
                out
            }
        }
    }

    /// Decode one receipt from an RLP value: a list for legacy, a byte string
    /// carrying a typed envelope otherwise.
    pub fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.is_list() {
            Ok(TypedReceipt::new(TypedTxId::Legacy, Receipt::decode(rlp)?))
        } else {
            let bytes = rlp.data()?;
            let type_byte = *bytes
                .first()
                .ok_or(DecoderError::Custom("empty typed receipt"))?;
            let receipt_type = TypedTxId::from_type_byte(type_byte)
                .ok_or(DecoderError::Custom("unknown receipt type"))?;
            Ok(TypedReceipt::new(
                receipt_type,
                Receipt::decode(&Rlp::new(&bytes[1..]))?,
            ))
        }
    }

    /// Decode an RLP list of receipts.
    pub fn decode_rlp_list(rlp: &Rlp) -> Result<Vec<Self>, DecoderError> {
        if !rlp.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        let mut receipts = Vec::with_capacity(rlp.item_count()?);
        for r in rlp.iter() {
            receipts.push(Self::decode(&r)?);
        }
        Ok(receipts)
    }
}

impl rlp::Encodable for TypedReceipt {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self.receipt_type {
            TypedTxId::Legacy => self.receipt.rlp_append(s),
            _ => {
                s.append_internal(&self.encode());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Receipt, TransactionOutcome, TypedReceipt};
    use crate::{log_entry::LogEntry, transaction::TypedTxId};
    use ethereum_types::Address;
    use rlp::{Rlp, RlpStream};

    fn sample_receipt(receipt_type: TypedTxId) -> TypedReceipt {
        TypedReceipt::new(
            receipt_type,
            Receipt::new(
                TransactionOutcome::StatusCode(1),
                42_000.into(),
                vec![LogEntry {
                    address: Address::from_low_u64_be(3),
                    topics: vec![],
                    data: b"log".to_vec(),
                }],
            ),
        )
    }

    #[test]
    fn round_trip_legacy() {
        let receipt = sample_receipt(TypedTxId::Legacy);
        let encoded = receipt.encode();
        let decoded = TypedReceipt::decode(&Rlp::new(&encoded)).unwrap();
        assert_eq!(decoded, receipt);
    }

    #[test]
    fn round_trip_typed_in_list() {
        let receipts = vec![
            sample_receipt(TypedTxId::Legacy),
            sample_receipt(TypedTxId::EIP1559),
        ];
        let mut stream = RlpStream::new();
        stream.append_list(&receipts);
        let out = stream.out();
        let decoded = TypedReceipt::decode_rlp_list(&Rlp::new(&out)).unwrap();
        assert_eq!(decoded, receipts);
    }

    #[test]
    fn bloom_accrues_logs() {
        let receipt = sample_receipt(TypedTxId::Legacy);
        assert!(!receipt.receipt.log_bloom.is_zero());
    }
}
