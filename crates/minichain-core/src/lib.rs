//! Append-only, in-memory proof-of-work ledger.
//!
//! Transactions are pooled by a [`Ledger`], sealed into [`Block`]s by the
//! proof-of-work search in [`pow`], and the resulting chain can be re-verified
//! at any time by recomputing every block hash and link.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod chain;
pub mod constants;
pub mod error;
pub mod pow;
pub mod sink;
pub mod view;

pub use chain::{genesis_block, Ledger, LedgerConfig};
pub use error::{ChainCorruption, InvalidTransaction, LedgerError};
pub use sink::{LogSink, MemorySink, NullSink, TracingSink};
pub use view::{chain_view, BlockView};

pub type Hash = [u8; 32];

/// Wall-clock time as Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// `None` only for rewards issued by the ledger itself.
    pub sender: Option<String>,
    pub recipient: String,
    pub amount: u64,
    /// Unix milliseconds.
    pub created_at: i64,
}

impl Transaction {
    /// A transfer between two addresses, stamped with the current time.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self::with_timestamp(Some(sender.into()), recipient, amount, now_millis())
    }

    /// A mining reward: no debited party.
    pub fn reward(recipient: impl Into<String>, amount: u64) -> Self {
        Self::with_timestamp(None, recipient, amount, now_millis())
    }

    pub fn with_timestamp(
        sender: Option<String>,
        recipient: impl Into<String>,
        amount: u64,
        created_at: i64,
    ) -> Self {
        Self {
            sender,
            recipient: recipient.into(),
            amount,
            created_at,
        }
    }

    pub fn is_reward(&self) -> bool {
        self.sender.is_none()
    }

    /// Rules a transfer must satisfy to enter the pending pool.
    pub fn check(&self) -> Result<(), InvalidTransaction> {
        match self.sender.as_deref() {
            Some(sender) if !sender.trim().is_empty() => {}
            _ => return Err(InvalidTransaction::MissingSender),
        }
        if self.recipient.trim().is_empty() {
            return Err(InvalidTransaction::MissingRecipient);
        }
        if self.amount == 0 {
            return Err(InvalidTransaction::NonPositiveAmount);
        }
        Ok(())
    }

    /// Canonical encoding fed to the hash. Strings are length-prefixed so no
    /// two distinct transactions share an encoding.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let sender_len = self.sender.as_ref().map_or(0, |s| 8 + s.len());
        let mut bytes = Vec::with_capacity(1 + sender_len + 8 + self.recipient.len() + 8 + 8);
        match &self.sender {
            Some(sender) => {
                bytes.push(1);
                put_str(&mut bytes, sender);
            }
            None => bytes.push(0),
        }
        put_str(&mut bytes, &self.recipient);
        bytes.extend_from_slice(&self.amount.to_le_bytes());
        bytes.extend_from_slice(&self.created_at.to_le_bytes());
        bytes
    }

    pub fn hash(&self) -> Hash {
        sha256(&self.hash_bytes())
    }
}

fn put_str(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(&(s.len() as u64).to_le_bytes());
    bytes.extend_from_slice(s.as_bytes());
}

fn sha256(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Binary merkle root over transaction hashes, in list order. An odd node is
/// paired with itself; an empty list yields all zeroes.
pub fn merkle_root(txs: &[Transaction]) -> Hash {
    if txs.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<Hash> = txs.iter().map(Transaction::hash).collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let (a, b) = if pair.len() == 2 {
                (pair[0], pair[1])
            } else {
                (pair[0], pair[0])
            };
            let mut hasher = Sha256::new();
            hasher.update(a);
            hasher.update(b);
            let digest = hasher.finalize();
            let mut out = [0u8; 32];
            out.copy_from_slice(&digest[..]);
            next.push(out);
        }
        level = next;
    }
    level[0]
}

/// Header preimage. The transaction count is hashed alongside the merkle root
/// because duplicating the trailing transaction leaves the root unchanged.
pub(crate) fn header_bytes(
    index: u64,
    timestamp: i64,
    tx_count: usize,
    merkle_root: &Hash,
    previous_hash: &str,
    nonce: u64,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + 8 + 8 + 32 + 8 + previous_hash.len() + 8);
    bytes.extend_from_slice(&index.to_le_bytes());
    bytes.extend_from_slice(&timestamp.to_le_bytes());
    bytes.extend_from_slice(&(tx_count as u64).to_le_bytes());
    bytes.extend_from_slice(merkle_root);
    put_str(&mut bytes, previous_hash);
    bytes.extend_from_slice(&nonce.to_le_bytes());
    bytes
}

pub(crate) fn header_digest(
    index: u64,
    timestamp: i64,
    tx_count: usize,
    merkle_root: &Hash,
    previous_hash: &str,
    nonce: u64,
) -> Hash {
    sha256(&header_bytes(
        index,
        timestamp,
        tx_count,
        merkle_root,
        previous_hash,
        nonce,
    ))
}

/// SHA-256 of a block's fields as 64 lowercase hex characters.
pub fn calculate_hash(
    index: u64,
    timestamp: i64,
    transactions: &[Transaction],
    previous_hash: &str,
    nonce: u64,
) -> String {
    let root = merkle_root(transactions);
    hex::encode(header_digest(
        index,
        timestamp,
        transactions.len(),
        &root,
        previous_hash,
        nonce,
    ))
}

/// A block that has not been sealed yet. Mining varies `nonce` until the
/// digest meets the difficulty target and then yields a [`Block`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub index: u64,
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
}

impl Candidate {
    pub fn new(
        index: u64,
        timestamp: i64,
        transactions: Vec<Transaction>,
        previous_hash: impl Into<String>,
    ) -> Self {
        Self {
            index,
            timestamp,
            transactions,
            previous_hash: previous_hash.into(),
            nonce: 0,
        }
    }

    pub fn hash(&self) -> String {
        calculate_hash(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Seals at the current nonce without any search.
    pub(crate) fn seal(self) -> Block {
        let hash = self.hash();
        self.seal_with(hash)
    }

    pub(crate) fn seal_with(self, hash: String) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            nonce: self.nonce,
            hash,
        }
    }
}

/// A sealed block. Only mining and genesis construction produce one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    previous_hash: String,
    nonce: u64,
    hash: String,
}

impl Block {
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The digest stored when the block was sealed.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Recomputes the digest from the block's current contents.
    pub fn calculate_hash(&self) -> String {
        calculate_hash(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// True while the stored digest still matches the contents.
    pub fn is_intact(&self) -> bool {
        self.calculate_hash() == self.hash
    }

    /// Mutable access to sealed transactions. Any change here is corruption:
    /// the stored hash is left as is and chain validation will flag the block.
    pub fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}
