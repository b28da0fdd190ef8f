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

//! Storage for proof trie nodes and fetched account rows.
//!
//! Nodes are keyed by the keccak of their bytes and parsed on insertion.
//! A merge batch records what it adds so a failed validation can roll the
//! whole reply back out.

use std::{
    collections::{BTreeMap, HashMap},
    error, fmt,
};

use bytes::Bytes;
use ethereum_types::H256;
use hash::keccak;
use rlp::{DecoderError, Rlp};

/// Errors raised while storing or validating proof data.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofError {
    /// A node failed to parse.
    Decoder(String),
    /// A node has a shape no trie node can have.
    InvalidNode(&'static str),
    /// A newly inserted node is referenced by nothing.
    UnreachableNode(H256),
    /// Account hashes are not strictly increasing.
    NonMonotonicAccount(H256),
    /// An account hash is below the requested range base.
    AccountBelowBase(H256),
    /// A referenced node is not stored.
    MissingNode(H256),
    /// The trie walk did not reproduce an account body.
    BadAccountProof(H256),
}

impl From<DecoderError> for ProofError {
    fn from(err: DecoderError) -> Self {
        ProofError::Decoder(format!("{}", err))
    }
}

impl fmt::Display for ProofError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ProofError::*;
        match *self {
            Decoder(ref err) => write!(f, "Proof node RLP error: {}", err),
            InvalidNode(msg) => write!(f, "Invalid proof node: {}", msg),
            UnreachableNode(ref hash) => write!(f, "Unreferenced proof node: {}", hash),
            NonMonotonicAccount(ref hash) => {
                write!(f, "Account hashes not strictly increasing at {}", hash)
            }
            AccountBelowBase(ref hash) => {
                write!(f, "Account {} below the requested range base", hash)
            }
            MissingNode(ref hash) => write!(f, "Missing proof node: {}", hash),
            BadAccountProof(ref hash) => write!(f, "Account {} fails the trie walk", hash),
        }
    }
}

impl error::Error for ProofError {
    fn description(&self) -> &str {
        "Proof error"
    }
}

/// A reference to a child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    /// No child.
    Empty,
    /// Child stored separately, by hash.
    Hash(H256),
    /// Child small enough to be inlined.
    Inline(Bytes),
}

/// A parsed trie node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedNode {
    /// A 17-item branch.
    Branch {
        /// One link per nibble.
        children: Box<[NodeRef; 16]>,
        /// The value stored at this prefix, if any.
        value: Option<Bytes>,
    },
    /// A shared-prefix extension.
    Extension {
        /// The prefix nibbles.
        path: Vec<u8>,
        /// The single child.
        child: NodeRef,
    },
    /// A terminal node.
    Leaf {
        /// The remaining path nibbles.
        path: Vec<u8>,
        /// The stored value.
        value: Bytes,
    },
}

fn parse_ref(rlp: &Rlp) -> Result<NodeRef, ProofError> {
    if rlp.is_list() {
        return Ok(NodeRef::Inline(rlp.as_raw().to_vec()));
    }
    let data = rlp.data()?;
    match data.len() {
        0 => Ok(NodeRef::Empty),
        32 => Ok(NodeRef::Hash(H256::from_slice(data))),
        _ => Err(ProofError::InvalidNode("child reference length")),
    }
}

// Hex-prefix decoding: the tag nibble distinguishes extensions from leaves
// and even from odd paths.
fn decode_path(encoded: &[u8]) -> Result<(Vec<u8>, bool), ProofError> {
    let first = *encoded
        .first()
        .ok_or(ProofError::InvalidNode("empty path"))?;
    let tag = first >> 4;
    if tag > 3 {
        return Err(ProofError::InvalidNode("bad path tag"));
    }
    let is_leaf = tag >= 2;
    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if tag & 1 == 1 {
        nibbles.push(first & 0x0f);
    }
    for byte in &encoded[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    Ok((nibbles, is_leaf))
}

/// Parse raw node bytes.
pub fn parse_node(bytes: &[u8]) -> Result<ParsedNode, ProofError> {
    let rlp = Rlp::new(bytes);
    if !rlp.is_list() {
        return Err(ProofError::InvalidNode("node is not a list"));
    }
    match rlp.item_count()? {
        17 => {
            let mut children: Box<[NodeRef; 16]> = Box::new(Default::default());
            for i in 0..16 {
                children[i] = parse_ref(&rlp.at(i)?)?;
            }
            let value_rlp = rlp.at(16)?;
            let value = value_rlp.data()?;
            Ok(ParsedNode::Branch {
                children,
                value: if value.is_empty() {
                    None
                } else {
                    Some(value.to_vec())
                },
            })
        }
        2 => {
            let (path, is_leaf) = decode_path(rlp.at(0)?.data()?)?;
            if is_leaf {
                Ok(ParsedNode::Leaf {
                    path,
                    value: rlp.at(1)?.data()?.to_vec(),
                })
            } else {
                Ok(ParsedNode::Extension {
                    path,
                    child: parse_ref(&rlp.at(1)?)?,
                })
            }
        }
        _ => Err(ProofError::InvalidNode("unexpected item count")),
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        NodeRef::Empty
    }
}

struct StoredNode {
    #[allow(dead_code)]
    raw: Bytes,
    parsed: ParsedNode,
}

/// Proof-node and account storage for one snap-sync run.
#[derive(Default)]
pub struct ProofDb {
    nodes: HashMap<H256, StoredNode>,
    accounts: BTreeMap<H256, Bytes>,
}

impl ProofDb {
    /// An empty database.
    pub fn new() -> Self {
        ProofDb::default()
    }

    /// A parsed node by key.
    pub fn node(&self, key: &H256) -> Option<&ParsedNode> {
        self.nodes.get(key).map(|stored| &stored.parsed)
    }

    /// A fetched account body by hash.
    pub fn account(&self, hash: &H256) -> Option<&Bytes> {
        self.accounts.get(hash)
    }

    /// Number of fetched accounts.
    pub fn accounts_len(&self) -> usize {
        self.accounts.len()
    }

    /// Number of stored nodes.
    pub fn nodes_len(&self) -> usize {
        self.nodes.len()
    }

    /// Begin a rollback-capable merge of one reply.
    pub fn begin_merge(&mut self) -> Merge {
        Merge {
            db: self,
            new_nodes: Vec::new(),
            new_accounts: Vec::new(),
        }
    }

    fn resolve(&self, node_ref: &NodeRef, context: &H256) -> Result<ParsedNode, ProofError> {
        match node_ref {
            NodeRef::Empty => Err(ProofError::BadAccountProof(*context)),
            NodeRef::Hash(hash) => self
                .node(hash)
                .cloned()
                .ok_or(ProofError::MissingNode(*hash)),
            NodeRef::Inline(raw) => parse_node(raw),
        }
    }

    /// Walk the trie from `root` down the nibbles of `account_hash` and
    /// return the stored value.
    pub fn walk_account(&self, root: &H256, account_hash: &H256) -> Result<Bytes, ProofError> {
        let nibbles: Vec<u8> = account_hash
            .as_bytes()
            .iter()
            .flat_map(|byte| vec![byte >> 4, byte & 0x0f])
            .collect();
        let mut node = self
            .node(root)
            .cloned()
            .ok_or(ProofError::MissingNode(*root))?;
        let mut offset = 0;

        loop {
            match node {
                ParsedNode::Leaf { ref path, ref value } => {
                    if &nibbles[offset..] == path.as_slice() {
                        return Ok(value.clone());
                    }
                    return Err(ProofError::BadAccountProof(*account_hash));
                }
                ParsedNode::Extension { ref path, ref child } => {
                    if !nibbles[offset..].starts_with(path) {
                        return Err(ProofError::BadAccountProof(*account_hash));
                    }
                    offset += path.len();
                    node = self.resolve(child, account_hash)?;
                }
                ParsedNode::Branch {
                    ref children,
                    ref value,
                } => {
                    if offset == nibbles.len() {
                        return value
                            .clone()
                            .ok_or(ProofError::BadAccountProof(*account_hash));
                    }
                    let index = nibbles[offset] as usize;
                    offset += 1;
                    node = self.resolve(&children[index], account_hash)?;
                }
            }
        }
    }
}

/// A merge of one reply into the database, validated before commit.
pub struct Merge<'a> {
    db: &'a mut ProofDb,
    new_nodes: Vec<H256>,
    new_accounts: Vec<H256>,
}

impl<'a> Merge<'a> {
    /// Store one proof node; parsing happens here. Re-inserting a known
    /// node is a no-op.
    pub fn insert_node(&mut self, bytes: Bytes) -> Result<H256, ProofError> {
        let key = keccak(&bytes);
        if self.db.nodes.contains_key(&key) {
            return Ok(key);
        }
        let parsed = parse_node(&bytes)?;
        self.db.nodes.insert(
            key,
            StoredNode {
                raw: bytes,
                parsed,
            },
        );
        self.new_nodes.push(key);
        Ok(key)
    }

    /// Record one account row.
    pub fn insert_account(&mut self, hash: H256, body: Bytes) {
        if self.db.accounts.insert(hash, body).is_none() {
            self.new_accounts.push(hash);
        }
    }

    /// Check the batch: every new node referenced from the new set or the
    /// root, account hashes strictly increasing and bounded below by
    /// `base`, and the last account body provable by a walk from `root`.
    pub fn validate(&self, root: &H256, base: &H256) -> Result<(), ProofError> {
        let mut previous: Option<H256> = None;
        for hash in &self.new_accounts {
            if hash < base {
                return Err(ProofError::AccountBelowBase(*hash));
            }
            if let Some(previous) = previous {
                if *hash <= previous {
                    return Err(ProofError::NonMonotonicAccount(*hash));
                }
            }
            previous = Some(*hash);
        }

        // Gather everything the new nodes (and the root) can refer to.
        let mut referenced: Vec<H256> = vec![*root];
        for key in &self.new_nodes {
            if let Some(ParsedNode::Branch { children, .. }) = self.db.node(key) {
                for child in children.iter() {
                    if let NodeRef::Hash(hash) = child {
                        referenced.push(*hash);
                    }
                }
            }
            if let Some(ParsedNode::Extension { child, .. }) = self.db.node(key) {
                if let NodeRef::Hash(hash) = child {
                    referenced.push(*hash);
                }
            }
        }
        for key in &self.new_nodes {
            if !referenced.contains(key) {
                return Err(ProofError::UnreachableNode(*key));
            }
        }

        if let Some(last) = self.new_accounts.last() {
            let expected = self
                .db
                .account(last)
                .cloned()
                .ok_or(ProofError::BadAccountProof(*last))?;
            let walked = self.db.walk_account(root, last)?;
            if walked != expected {
                return Err(ProofError::BadAccountProof(*last));
            }
        }

        Ok(())
    }

    /// Keep the batch.
    pub fn commit(self) {}

    /// Remove everything the batch added.
    pub fn rollback(self) {
        for key in self.new_nodes {
            self.db.nodes.remove(&key);
        }
        for hash in self.new_accounts {
            self.db.accounts.remove(&hash);
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use rlp::RlpStream;

    /// Hex-prefix encoding for tests.
    pub fn hp(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
        let mut tag: u8 = if is_leaf { 2 } else { 0 };
        let odd = nibbles.len() % 2 == 1;
        let mut out = Vec::new();
        if odd {
            tag |= 1;
            out.push(tag << 4 | nibbles[0]);
        } else {
            out.push(tag << 4);
        }
        let rest = if odd { &nibbles[1..] } else { nibbles };
        for pair in rest.chunks(2) {
            out.push(pair[0] << 4 | pair[1]);
        }
        out
    }

    /// The nibble expansion of a hash.
    pub fn nibbles_of(hash: &H256) -> Vec<u8> {
        hash.as_bytes()
            .iter()
            .flat_map(|b| vec![b >> 4, b & 0x0f])
            .collect()
    }

    /// A leaf node for the given path and value.
    pub fn leaf(path: &[u8], value: &[u8]) -> Vec<u8> {
        let mut stream = RlpStream::new_list(2);
        stream.append(&hp(path, true));
        stream.append(&value.to_vec());
        stream.out()
    }

    #[test]
    fn parses_branch_and_leaf_shapes() {
        let leaf_bytes = leaf(&[1, 2, 3], b"value");
        match parse_node(&leaf_bytes).unwrap() {
            ParsedNode::Leaf { path, value } => {
                assert_eq!(path, vec![1, 2, 3]);
                assert_eq!(value, b"value".to_vec());
            }
            other => panic!("unexpected node: {:?}", other),
        }

        let mut stream = RlpStream::new_list(17);
        for _ in 0..16 {
            stream.append_empty_data();
        }
        stream.append_empty_data();
        match parse_node(&stream.out()).unwrap() {
            ParsedNode::Branch { children, value } => {
                assert!(children.iter().all(|c| *c == NodeRef::Empty));
                assert!(value.is_none());
            }
            other => panic!("unexpected node: {:?}", other),
        }

        assert!(parse_node(b"ferron").is_err());
    }

    #[test]
    fn single_leaf_trie_walks() {
        let account = H256::repeat_byte(0x42);
        let body = b"account-body".to_vec();
        let root_bytes = leaf(&nibbles_of(&account), &body);

        let mut db = ProofDb::new();
        let mut merge = db.begin_merge();
        let root = merge.insert_node(root_bytes).unwrap();
        merge.insert_account(account, body.clone());
        merge.validate(&root, &H256::zero()).unwrap();
        merge.commit();

        assert_eq!(db.walk_account(&root, &account).unwrap(), body);
    }

    #[test]
    fn branch_trie_walks_both_arms() {
        // Two accounts differing in their first nibble.
        let mut a_bytes = [0x11u8; 32];
        a_bytes[0] = 0x1a;
        let mut b_bytes = [0x11u8; 32];
        b_bytes[0] = 0x2a;
        let account_a = H256(a_bytes);
        let account_b = H256(b_bytes);
        let body_a = b"body-a".to_vec();
        let body_b = b"body-b".to_vec();

        let leaf_a = leaf(&nibbles_of(&account_a)[1..], &body_a);
        let leaf_b = leaf(&nibbles_of(&account_b)[1..], &body_b);
        let hash_a = keccak(&leaf_a);
        let hash_b = keccak(&leaf_b);

        let mut stream = RlpStream::new_list(17);
        for i in 0..16 {
            match i {
                1 => stream.append(&hash_a),
                2 => stream.append(&hash_b),
                _ => stream.append_empty_data(),
            };
        }
        stream.append_empty_data();
        let branch = stream.out();

        let mut db = ProofDb::new();
        let mut merge = db.begin_merge();
        let root = merge.insert_node(branch).unwrap();
        merge.insert_node(leaf_a).unwrap();
        merge.insert_node(leaf_b).unwrap();
        merge.insert_account(account_a, body_a.clone());
        merge.insert_account(account_b, body_b.clone());
        merge.validate(&root, &H256::zero()).unwrap();
        merge.commit();

        assert_eq!(db.walk_account(&root, &account_a).unwrap(), body_a);
        assert_eq!(db.walk_account(&root, &account_b).unwrap(), body_b);
        assert!(db
            .walk_account(&root, &H256::repeat_byte(0x99))
            .is_err());
    }

    #[test]
    fn unreferenced_node_fails_validation() {
        let account = H256::repeat_byte(0x42);
        let body = b"account-body".to_vec();
        let root_bytes = leaf(&nibbles_of(&account), &body);
        let stray = leaf(&[1, 2], b"stray");
        let stray_hash = keccak(&stray);

        let mut db = ProofDb::new();
        let mut merge = db.begin_merge();
        let root = merge.insert_node(root_bytes).unwrap();
        merge.insert_node(stray).unwrap();
        merge.insert_account(account, body);

        assert_eq!(
            merge.validate(&root, &H256::zero()),
            Err(ProofError::UnreachableNode(stray_hash))
        );
    }

    #[test]
    fn rollback_removes_the_batch() {
        let account = H256::repeat_byte(0x42);
        let body = b"account-body".to_vec();
        let root_bytes = leaf(&nibbles_of(&account), &body);

        let mut db = ProofDb::new();
        let mut merge = db.begin_merge();
        let root = merge.insert_node(root_bytes).unwrap();
        merge.insert_account(account, body);
        merge.rollback();

        assert!(db.node(&root).is_none());
        assert!(db.account(&account).is_none());
        assert_eq!(db.accounts_len(), 0);
    }

    #[test]
    fn account_ordering_is_enforced() {
        let mut db = ProofDb::new();
        let mut merge = db.begin_merge();
        merge.insert_account(H256::repeat_byte(2), b"two".to_vec());
        merge.insert_account(H256::repeat_byte(1), b"one".to_vec());

        // Orders by insertion, so 1 after 2 is non-monotonic.
        assert_eq!(
            merge.validate(&H256::zero(), &H256::zero()),
            Err(ProofError::NonMonotonicAccount(H256::repeat_byte(1)))
        );

        let mut db = ProofDb::new();
        let mut merge = db.begin_merge();
        merge.insert_account(H256::repeat_byte(5), b"five".to_vec());
        assert_eq!(
            merge.validate(&H256::zero(), &H256::repeat_byte(6)),
            Err(ProofError::AccountBelowBase(H256::repeat_byte(5)))
        );
    }
}
