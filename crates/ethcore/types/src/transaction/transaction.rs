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

//! Typed transactions: the legacy format and the EIP1559 dynamic-fee format.

use std::ops::Deref;

use crate::{
    crypto::publickey::{
        self, public_to_address, recover, Public, Secret, Signature,
    },
    hash::keccak,
    transaction::error::Error,
};
use ethereum_types::{Address, BigEndianHash, H256, U256};
use parity_bytes::Bytes;
use rlp::{self, DecoderError, Rlp, RlpStream};

/// Base gas cost of any transaction.
pub const TX_GAS: u64 = 21_000;
/// Additional gas charged for a contract creation.
pub const TX_CREATE_GAS: u64 = 32_000;
/// Gas per zero byte of transaction data.
pub const TX_DATA_ZERO_GAS: u64 = 4;
/// Gas per non-zero byte of transaction data, before Istanbul.
pub const TX_DATA_NON_ZERO_GAS_FRONTIER: u64 = 68;
/// Gas per non-zero byte of transaction data, since Istanbul (EIP2028).
pub const TX_DATA_NON_ZERO_GAS: u64 = 16;
/// Gas per address in an access list (EIP2930).
pub const TX_ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
/// Gas per storage key in an access list (EIP2930).
pub const TX_ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

/// Transaction type identifier, the first byte of a typed transaction envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedTxId {
    /// Untyped RLP list, pre EIP2718.
    Legacy,
    /// Dynamic-fee transaction, EIP1559.
    EIP1559,
}

impl TypedTxId {
    /// The envelope type byte. Legacy transactions have no envelope.
    pub fn type_byte(self) -> u8 {
        match self {
            TypedTxId::Legacy => 0x00,
            TypedTxId::EIP1559 => 0x02,
        }
    }

    /// Recognize a type byte.
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            0x02 => Some(TypedTxId::EIP1559),
            _ => None,
        }
    }
}

/// Transaction action type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create creates new contract.
    Create,
    /// Calls contract at given address.
    /// In the case of a transfer, this is the receiver's address.'
    Call(Address),
}

impl Default for Action {
    fn default() -> Action {
        Action::Create
    }
}

impl rlp::Decodable for Action {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.is_empty() {
            if rlp.is_data() {
                Ok(Action::Create)
            } else {
                Err(DecoderError::RlpExpectedToBeData)
            }
        } else {
            Ok(Action::Call(rlp.as_val()?))
        }
    }
}

impl rlp::Encodable for Action {
    fn rlp_append(&self, s: &mut RlpStream) {
        match *self {
            Action::Create => s.append_internal(&""),
            Action::Call(ref addr) => s.append_internal(addr),
        };
    }
}

/// One entry of an EIP2930 access list.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct AccessListItem {
    /// Accessed address.
    pub address: Address,
    /// Accessed storage keys.
    pub storage_keys: Vec<H256>,
}

/// EIP2930 access list.
pub type AccessList = Vec<AccessListItem>;

/// A set of information describing an externally-originating message call
/// or contract creation operation.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Nonce.
    pub nonce: U256,
    /// Gas price, or the max fee per gas for a dynamic-fee transaction.
    pub gas_price: U256,
    /// Gas paid up front for transaction execution.
    pub gas: U256,
    /// Action, either create or call.
    pub action: Action,
    /// Transfered value.
    pub value: U256,
    /// Transaction data.
    pub data: Bytes,
}

impl Transaction {
    /// Append object with the payload fields, without any signature scheme
    /// fields. Used by the legacy signature hash.
    fn rlp_append_unsigned(&self, s: &mut RlpStream, chain_id: Option<u64>) {
        s.begin_list(if chain_id.is_none() { 6 } else { 9 });
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas);
        s.append(&self.action);
        s.append(&self.value);
        s.append(&self.data);
        if let Some(n) = chain_id {
            s.append(&n);
            s.append(&0u8);
            s.append(&0u8);
        }
    }

    /// The message hash of the pre EIP2718 signature scheme, replay protected
    /// per EIP155 whenever a chain id is given.
    pub fn signature_hash(&self, chain_id: Option<u64>) -> H256 {
        let mut stream = RlpStream::new();
        self.rlp_append_unsigned(&mut stream, chain_id);
        keccak(stream.as_raw())
    }
}

/// Dynamic-fee transaction body, EIP1559. The inner transaction's `gas_price`
/// doubles as the max fee per gas.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct EIP1559TransactionTx {
    /// The base transaction fields; `gas_price` carries `max_fee_per_gas`.
    pub transaction: Transaction,
    /// Portion of the fee that goes to the block author.
    pub max_priority_fee_per_gas: U256,
    /// EIP2930 access list.
    pub access_list: AccessList,
}

impl EIP1559TransactionTx {
    /// Append the unsigned payload (everything the signature commits to).
    fn rlp_append_unsigned(&self, s: &mut RlpStream, chain_id: Option<u64>) {
        s.begin_list(9);
        s.append(&chain_id.unwrap_or(0));
        s.append(&self.transaction.nonce);
        s.append(&self.max_priority_fee_per_gas);
        s.append(&self.transaction.gas_price);
        s.append(&self.transaction.gas);
        s.append(&self.transaction.action);
        s.append(&self.transaction.value);
        s.append(&self.transaction.data);
        s.append_list(&self.access_list);
    }

    /// The message hash of the EIP1559 signature scheme: keccak of the type
    /// byte followed by the unsigned payload list.
    pub fn signature_hash(&self, chain_id: Option<u64>) -> H256 {
        let mut stream = RlpStream::new();
        self.rlp_append_unsigned(&mut stream, chain_id);
        let mut message = vec![TypedTxId::EIP1559.type_byte()];
        message.extend_from_slice(stream.as_raw());
        keccak(&message)
    }
}

/// A transaction of any supported type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedTransaction {
    /// Pre EIP2718 legacy transaction.
    Legacy(Transaction),
    /// Dynamic-fee transaction introduced by the London fork.
    EIP1559Transaction(EIP1559TransactionTx),
}

impl TypedTransaction {
    /// Transaction type identifier.
    pub fn tx_type(&self) -> TypedTxId {
        match *self {
            TypedTransaction::Legacy(_) => TypedTxId::Legacy,
            TypedTransaction::EIP1559Transaction(_) => TypedTxId::EIP1559,
        }
    }

    /// The base fields common to all transaction types.
    pub fn tx(&self) -> &Transaction {
        match *self {
            TypedTransaction::Legacy(ref tx) => tx,
            TypedTransaction::EIP1559Transaction(ref tx) => &tx.transaction,
        }
    }

    /// Max fee per gas: the fee cap of a dynamic-fee transaction, the plain
    /// gas price of a legacy one.
    pub fn max_fee_per_gas(&self) -> U256 {
        self.tx().gas_price
    }

    /// Max priority fee per gas. Legacy transactions tip their whole price.
    pub fn max_priority_fee_per_gas(&self) -> U256 {
        match *self {
            TypedTransaction::Legacy(ref tx) => tx.gas_price,
            TypedTransaction::EIP1559Transaction(ref tx) => tx.max_priority_fee_per_gas,
        }
    }

    /// The message hash the signature commits to.
    pub fn signature_hash(&self, chain_id: Option<u64>) -> H256 {
        match *self {
            TypedTransaction::Legacy(ref tx) => tx.signature_hash(chain_id),
            TypedTransaction::EIP1559Transaction(ref tx) => tx.signature_hash(chain_id),
        }
    }

    /// Gas consumed before any code runs: the base cost, data cost, creation
    /// cost and access list cost.
    pub fn intrinsic_gas(&self, is_istanbul: bool) -> u64 {
        let tx = self.tx();
        let mut gas = TX_GAS;
        if let Action::Create = tx.action {
            gas = gas.saturating_add(TX_CREATE_GAS);
        }
        let non_zero_gas = if is_istanbul {
            TX_DATA_NON_ZERO_GAS
        } else {
            TX_DATA_NON_ZERO_GAS_FRONTIER
        };
        for byte in &tx.data {
            gas = gas.saturating_add(if *byte == 0 {
                TX_DATA_ZERO_GAS
            } else {
                non_zero_gas
            });
        }
        if let TypedTransaction::EIP1559Transaction(ref tx) = *self {
            for item in &tx.access_list {
                gas = gas
                    .saturating_add(TX_ACCESS_LIST_ADDRESS_GAS)
                    .saturating_add(
                        TX_ACCESS_LIST_STORAGE_KEY_GAS
                            .saturating_mul(item.storage_keys.len() as u64),
                    );
            }
        }
        gas
    }

    /// Signs the transaction with the given signature and chain id.
    pub fn with_signature(self, sig: Signature, chain_id: Option<u64>) -> UnverifiedTransaction {
        UnverifiedTransaction {
            unsigned: self,
            chain_id,
            signature: SignatureComponents {
                r: U256::from_big_endian(sig.r()),
                s: U256::from_big_endian(sig.s()),
                standard_v: sig.v(),
            },
            hash: H256::zero(),
        }
        .compute_hash()
    }

    /// Signs the transaction as coming from `secret`.
    pub fn sign(self, secret: &Secret, chain_id: Option<u64>) -> SignedTransaction {
        let sig = publickey::sign(secret, &self.signature_hash(chain_id))
            .expect("data is valid and context has signing capabilities; qed");
        SignedTransaction::new(self.with_signature(sig, chain_id))
            .expect("secret is valid so it's recoverable; qed")
    }

    /// Specify the sender; this won't survive the serialize/deserialize
    /// process, but can be cloned.
    pub fn fake_sign(self, from: Address) -> SignedTransaction {
        SignedTransaction {
            transaction: UnverifiedTransaction {
                unsigned: self,
                chain_id: None,
                signature: SignatureComponents {
                    r: U256::one(),
                    s: U256::one(),
                    standard_v: 4,
                },
                hash: H256::zero(),
            }
            .compute_hash(),
            sender: from,
            public: None,
        }
    }
}

/// Components that constitute a transaction signature.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SignatureComponents {
    /// The V field of the signature; the recovery id without any replay
    /// protection applied.
    pub standard_v: u8,
    /// The R field of the signature.
    pub r: U256,
    /// The S field of the signature.
    pub s: U256,
}

/// Signed transaction information without verified signature.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnverifiedTransaction {
    /// Plain Transaction.
    unsigned: TypedTransaction,
    /// Chain id this transaction was signed for, if replay protected.
    chain_id: Option<u64>,
    /// Signature.
    signature: SignatureComponents,
    /// Hash of the transaction
    hash: H256,
}

impl Deref for UnverifiedTransaction {
    type Target = TypedTransaction;

    fn deref(&self) -> &Self::Target {
        &self.unsigned
    }
}

impl UnverifiedTransaction {
    /// Used to compute hash of created transactions.
    fn compute_hash(mut self) -> UnverifiedTransaction {
        let hash = keccak(&*self.encode());
        self.hash = hash;
        self
    }

    /// Reference to unsigned part of this transaction.
    pub fn as_unsigned(&self) -> &TypedTransaction {
        &self.unsigned
    }

    /// Get the hash of this transaction (keccak of the wire encoding).
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// The chain id recovered from the signature scheme, if any.
    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    /// The signature components.
    pub fn signature_components(&self) -> &SignatureComponents {
        &self.signature
    }

    /// Construct a signature object from the sig.
    pub fn signature(&self) -> Signature {
        Signature::from_rsv(
            &H256::from_uint(&self.signature.r),
            &H256::from_uint(&self.signature.s),
            self.signature.standard_v,
        )
    }

    /// Checks if the signature is empty.
    pub fn is_unsigned(&self) -> bool {
        self.signature.r.is_zero() && self.signature.s.is_zero()
    }

    /// Whether this transaction pays no fee at all.
    pub fn has_zero_gas_price(&self) -> bool {
        self.tx().gas_price.is_zero()
    }

    /// The V field of a legacy wire encoding, replay protected per EIP155.
    fn legacy_v(&self) -> u64 {
        match self.chain_id {
            Some(n) => 35 + n * 2 + self.signature.standard_v as u64,
            None => 27 + self.signature.standard_v as u64,
        }
    }

    /// Split a legacy V field into the standard recovery id and chain id.
    fn split_v(v: u64) -> Result<(u8, Option<u64>), DecoderError> {
        match v {
            27 | 28 => Ok(((v - 27) as u8, None)),
            v if v >= 35 => Ok((((v - 35) % 2) as u8, Some((v - 35) / 2))),
            _ => Err(DecoderError::Custom("invalid signature V field")),
        }
    }

    /// Append the signed legacy RLP list.
    fn rlp_append_legacy(&self, s: &mut RlpStream) {
        let tx = self.unsigned.tx();
        s.begin_list(9);
        s.append(&tx.nonce);
        s.append(&tx.gas_price);
        s.append(&tx.gas);
        s.append(&tx.action);
        s.append(&tx.value);
        s.append(&tx.data);
        s.append(&self.legacy_v());
        s.append(&self.signature.r);
        s.append(&self.signature.s);
    }

    /// The wire encoding: a plain RLP list for legacy transactions, a typed
    /// envelope (type byte followed by the payload list) otherwise.
    pub fn encode(&self) -> Bytes {
        match self.unsigned {
            TypedTransaction::Legacy(_) => {
                let mut s = RlpStream::new();
                self.rlp_append_legacy(&mut s);
                s.out()
            }
            TypedTransaction::EIP1559Transaction(ref t) => {
                let mut s = RlpStream::new();
                s.begin_list(12);
                s.append(&self.chain_id.unwrap_or(0));
                s.append(&t.transaction.nonce);
                s.append(&t.max_priority_fee_per_gas);
                s.append(&t.transaction.gas_price);
                s.append(&t.transaction.gas);
                s.append(&t.transaction.action);
                s.append(&t.transaction.value);
                s.append(&t.transaction.data);
                s.append_list(&t.access_list);
                s.append(&self.signature.standard_v);
                s.append(&self.signature.r);
                s.append(&self.signature.s);

                let mut out = vec![TypedTxId::EIP1559.type_byte()];
                out.extend_from_slice(s.as_raw());
                out
            }
        }
    }

    fn decode_legacy(d: &Rlp) -> Result<Self, DecoderError> {
        if d.item_count()? != 9 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let (standard_v, chain_id) = Self::split_v(d.val_at(6)?)?;
        Ok(UnverifiedTransaction {
            unsigned: TypedTransaction::Legacy(Transaction {
                nonce: d.val_at(0)?,
                gas_price: d.val_at(1)?,
                gas: d.val_at(2)?,
                action: d.val_at(3)?,
                value: d.val_at(4)?,
                data: d.val_at(5)?,
            }),
            chain_id,
            signature: SignatureComponents {
                standard_v,
                r: d.val_at(7)?,
                s: d.val_at(8)?,
            },
            hash: keccak(d.as_raw()),
        })
    }

    fn decode_typed(bytes: &[u8]) -> Result<Self, DecoderError> {
        let type_byte = *bytes
            .first()
            .ok_or(DecoderError::Custom("empty typed transaction"))?;
        if TypedTxId::from_type_byte(type_byte) != Some(TypedTxId::EIP1559) {
            return Err(DecoderError::Custom("unknown transaction type"));
        }
        let d = Rlp::new(&bytes[1..]);
        if d.item_count()? != 12 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let chain_id: u64 = d.val_at(0)?;
        Ok(UnverifiedTransaction {
            unsigned: TypedTransaction::EIP1559Transaction(EIP1559TransactionTx {
                transaction: Transaction {
                    nonce: d.val_at(1)?,
                    gas_price: d.val_at(3)?,
                    gas: d.val_at(4)?,
                    action: d.val_at(5)?,
                    value: d.val_at(6)?,
                    data: d.val_at(7)?,
                },
                max_priority_fee_per_gas: d.val_at(2)?,
                access_list: d.list_at(8)?,
            }),
            chain_id: Some(chain_id),
            signature: SignatureComponents {
                standard_v: d.val_at(9)?,
                r: d.val_at(10)?,
                s: d.val_at(11)?,
            },
            hash: keccak(bytes),
        })
    }

    /// Decode one transaction from an RLP value: a list for legacy, a byte
    /// string carrying a typed envelope otherwise.
    pub fn decode(d: &Rlp) -> Result<Self, DecoderError> {
        if d.is_list() {
            Self::decode_legacy(d)
        } else {
            Self::decode_typed(d.data()?)
        }
    }

    /// Decode raw wire bytes (not wrapped in any enclosing list).
    pub fn decode_raw(bytes: &[u8]) -> Result<Self, DecoderError> {
        if bytes.first().map_or(false, |b| *b >= 0xc0) {
            Self::decode_legacy(&Rlp::new(bytes))
        } else {
            Self::decode_typed(bytes)
        }
    }

    /// Decode an RLP list of transactions, as found in a block body.
    pub fn decode_rlp_list(d: &Rlp) -> Result<Vec<Self>, DecoderError> {
        if !d.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        let mut txs = Vec::with_capacity(d.item_count()?);
        for tx in d.iter() {
            txs.push(Self::decode(&tx)?);
        }
        Ok(txs)
    }

    /// Recovers the public key of the sender.
    pub fn recover_public(&self) -> Result<Public, publickey::Error> {
        recover(
            &self.signature(),
            &self.unsigned.signature_hash(self.chain_id),
        )
    }

    /// Verify basic signature params. Does not attempt sender recovery.
    pub fn verify_basic(&self, chain_id: Option<u64>) -> Result<(), Error> {
        if self.is_unsigned() {
            return Err(Error::InvalidSignature("empty signature".into()));
        }
        if self.chain_id.is_some() && self.chain_id != chain_id {
            return Err(Error::InvalidChainId);
        }
        Ok(())
    }

    /// The price the transaction actually pays per unit of gas, given the
    /// block base fee.
    pub fn effective_gas_price(&self, block_base_fee: Option<U256>) -> U256 {
        match self.unsigned {
            TypedTransaction::Legacy(ref tx) => tx.gas_price,
            TypedTransaction::EIP1559Transaction(_) => match block_base_fee {
                Some(base_fee) => std::cmp::min(
                    self.max_fee_per_gas(),
                    base_fee.saturating_add(self.max_priority_fee_per_gas()),
                ),
                None => self.max_fee_per_gas(),
            },
        }
    }

    /// The part of the effective gas price that goes to the block author.
    pub fn effective_priority_fee(&self, block_base_fee: Option<U256>) -> U256 {
        self.effective_gas_price(block_base_fee)
            .saturating_sub(block_base_fee.unwrap_or_default())
    }
}

impl rlp::Encodable for UnverifiedTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self.unsigned {
            TypedTransaction::Legacy(_) => self.rlp_append_legacy(s),
            // Typed envelopes travel as opaque byte strings inside lists.
            TypedTransaction::EIP1559Transaction(_) => {
                s.append_internal(&self.encode());
            }
        }
    }
}

/// A `UnverifiedTransaction` with successfully recovered `sender`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SignedTransaction {
    transaction: UnverifiedTransaction,
    sender: Address,
    public: Option<Public>,
}

impl Deref for SignedTransaction {
    type Target = UnverifiedTransaction;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl From<SignedTransaction> for UnverifiedTransaction {
    fn from(tx: SignedTransaction) -> Self {
        tx.transaction
    }
}

impl SignedTransaction {
    /// Try to verify transaction and recover sender.
    pub fn new(transaction: UnverifiedTransaction) -> Result<Self, publickey::Error> {
        if transaction.is_unsigned() {
            return Err(publickey::Error::InvalidSignature);
        }
        let public = transaction.recover_public()?;
        let sender = public_to_address(&public);
        Ok(SignedTransaction {
            transaction,
            sender,
            public: Some(public),
        })
    }

    /// Returns transaction sender.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Returns a public key of the sender.
    pub fn public_key(&self) -> Option<Public> {
        self.public
    }

    /// Deconstructs this transaction back into `UnverifiedTransaction`
    pub fn deconstruct(self) -> (UnverifiedTransaction, Address, Option<Public>) {
        (self.transaction, self.sender, self.public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::publickey::{Generator, Random};
    use rustc_hex::FromHex;

    fn legacy_tx() -> TypedTransaction {
        TypedTransaction::Legacy(Transaction {
            nonce: 7.into(),
            gas_price: 20_000_000_000u64.into(),
            gas: 21_000.into(),
            action: Action::Call(Address::from_low_u64_be(0xca11)),
            value: 1.into(),
            data: vec![],
        })
    }

    fn dynamic_fee_tx() -> TypedTransaction {
        TypedTransaction::EIP1559Transaction(EIP1559TransactionTx {
            transaction: Transaction {
                nonce: 3.into(),
                gas_price: 100.into(),
                gas: 30_000.into(),
                action: Action::Create,
                value: 0.into(),
                data: "3331600055".from_hex().unwrap(),
            },
            max_priority_fee_per_gas: 10.into(),
            access_list: vec![AccessListItem {
                address: Address::from_low_u64_be(1),
                storage_keys: vec![H256::from_low_u64_be(2)],
            }],
        })
    }

    #[test]
    fn sender_recovery_legacy() {
        let keypair = Random.generate();
        let signed = legacy_tx().sign(keypair.secret(), Some(1));
        assert_eq!(
            signed.sender(),
            public_to_address(keypair.public())
        );
        assert_eq!(signed.chain_id(), Some(1));
    }

    #[test]
    fn sender_recovery_eip1559() {
        let keypair = Random.generate();
        let signed = dynamic_fee_tx().sign(keypair.secret(), Some(5));
        assert_eq!(signed.sender(), public_to_address(keypair.public()));
        assert_eq!(signed.tx_type(), TypedTxId::EIP1559);
    }

    #[test]
    fn wire_round_trip() {
        let keypair = Random.generate();
        for tx in vec![
            legacy_tx().sign(keypair.secret(), None),
            legacy_tx().sign(keypair.secret(), Some(1)),
            dynamic_fee_tx().sign(keypair.secret(), Some(1)),
        ] {
            let encoded = tx.encode();
            let decoded = UnverifiedTransaction::decode_raw(&encoded).unwrap();
            assert_eq!(&decoded, &*tx);
            assert_eq!(decoded.hash(), tx.hash());

            let recovered = SignedTransaction::new(decoded).unwrap();
            assert_eq!(recovered.sender(), tx.sender());
        }
    }

    #[test]
    fn list_round_trip_mixed_types() {
        let keypair = Random.generate();
        let txs = vec![
            UnverifiedTransaction::from(legacy_tx().sign(keypair.secret(), Some(1))),
            UnverifiedTransaction::from(dynamic_fee_tx().sign(keypair.secret(), Some(1))),
        ];
        let mut stream = RlpStream::new();
        stream.append_list(&txs);
        let out = stream.out();

        let decoded = UnverifiedTransaction::decode_rlp_list(&Rlp::new(&out)).unwrap();
        assert_eq!(decoded, txs);
    }

    #[test]
    fn effective_fees() {
        let keypair = Random.generate();
        let tx = dynamic_fee_tx().sign(keypair.secret(), Some(1));
        // max fee 100, priority 10.
        assert_eq!(tx.effective_gas_price(Some(50.into())), U256::from(60));
        assert_eq!(tx.effective_priority_fee(Some(50.into())), U256::from(10));
        // base fee close to the cap squeezes the tip.
        assert_eq!(tx.effective_gas_price(Some(95.into())), U256::from(100));
        assert_eq!(tx.effective_priority_fee(Some(95.into())), U256::from(5));
        // base fee above the cap gives a zero tip.
        assert_eq!(tx.effective_priority_fee(Some(120.into())), U256::from(0));

        let legacy = legacy_tx().sign(keypair.secret(), None);
        assert_eq!(
            legacy.effective_gas_price(Some(1.into())),
            legacy.tx().gas_price
        );
        assert_eq!(
            legacy.effective_priority_fee(Some(1.into())),
            legacy.tx().gas_price - 1
        );
    }

    #[test]
    fn intrinsic_gas_counts_data_and_access_list() {
        let tx = legacy_tx();
        assert_eq!(tx.intrinsic_gas(true), TX_GAS);

        let tx = dynamic_fee_tx();
        // create + 5 non-zero data bytes + one address and one storage key.
        let expected = TX_GAS
            + TX_CREATE_GAS
            + 5 * TX_DATA_NON_ZERO_GAS
            + TX_ACCESS_LIST_ADDRESS_GAS
            + TX_ACCESS_LIST_STORAGE_KEY_GAS;
        assert_eq!(tx.intrinsic_gas(true), expected);
        assert!(tx.intrinsic_gas(false) == expected);
    }

    #[test]
    fn eip155_v_encoding() {
        let keypair = Random.generate();
        let signed = legacy_tx().sign(keypair.secret(), Some(1));
        let encoded = signed.encode();
        let rlp = Rlp::new(&encoded);
        let v: u64 = rlp.val_at(6).unwrap();
        assert!(v == 37 || v == 38);
    }
}
