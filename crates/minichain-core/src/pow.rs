use crate::{
    constants::HASH_HEX_SIZE, header_digest, merkle_root, sink::LogSink, Block, Candidate, Hash,
};
use tracing::Level;

/// Number of leading zero hex digits in a digest.
pub fn leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            if *b < 0x10 {
                total += 1;
            }
            break;
        }
    }
    total
}

/// Whether a hex digest begins with `difficulty` `'0'` characters.
pub fn meets_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash_hex.len() >= difficulty && hash_hex.bytes().take(difficulty).all(|c| c == b'0')
}

/// Nonce search over a fixed candidate. The merkle root is computed once and
/// only the nonce varies between attempts.
struct Search {
    candidate: Candidate,
    root: Hash,
}

impl Search {
    fn new(candidate: Candidate) -> Self {
        let root = merkle_root(&candidate.transactions);
        Self { candidate, root }
    }

    /// Tests the current nonce. On a miss the nonce moves on by one.
    fn attempt(&mut self, difficulty: u32) -> Option<Hash> {
        let c = &self.candidate;
        let digest = header_digest(
            c.index,
            c.timestamp,
            c.transactions.len(),
            &self.root,
            &c.previous_hash,
            c.nonce,
        );
        if leading_zero_nibbles(&digest) >= difficulty {
            return Some(digest);
        }
        self.candidate.nonce = self.candidate.nonce.wrapping_add(1);
        None
    }

    fn seal(self, digest: Hash) -> Block {
        self.candidate.seal_with(hex::encode(digest))
    }
}

/// Mines the candidate by incrementing its nonce until the digest has at
/// least `difficulty` leading zero hex digits. The search is unbounded and
/// blocks the caller until it succeeds.
///
/// `difficulty` must be at most [`HASH_HEX_SIZE`]: no digest has more leading
/// zero hex digits than that, so a larger target never returns.
/// [`LedgerConfig::validate`](crate::LedgerConfig::validate) enforces the bound.
pub fn mine_block<L: LogSink + ?Sized>(candidate: Candidate, difficulty: u32, sink: &L) -> Block {
    sink.log(
        Level::INFO,
        &format!(
            "mining block {} at difficulty {}",
            candidate.index, difficulty
        ),
    );
    let mut search = Search::new(candidate);
    let digest = loop {
        if let Some(digest) = search.attempt(difficulty) {
            break digest;
        }
    };
    let block = search.seal(digest);
    sink.log(
        Level::INFO,
        &format!(
            "block {} mined with nonce {}: {}",
            block.index(),
            block.nonce(),
            block.hash()
        ),
    );
    block
}

/// Like [`mine_block`] but gives up after `max_attempts` nonces.
///
/// On exhaustion the candidate comes back with its nonce at the first untried
/// value, so feeding it back in continues the same search and ends on the same
/// nonce an uninterrupted run would have found. A `difficulty` above
/// [`HASH_HEX_SIZE`] always exhausts the budget.
pub fn mine_bounded<L: LogSink + ?Sized>(
    candidate: Candidate,
    difficulty: u32,
    max_attempts: u64,
    sink: &L,
) -> Result<Block, Candidate> {
    let start = candidate.nonce;
    let mut search = Search::new(candidate);
    for _ in 0..max_attempts {
        if let Some(digest) = search.attempt(difficulty) {
            let block = search.seal(digest);
            sink.log(
                Level::DEBUG,
                &format!(
                    "block {} mined with nonce {}: {}",
                    block.index(),
                    block.nonce(),
                    block.hash()
                ),
            );
            return Ok(block);
        }
    }
    sink.log(
        Level::DEBUG,
        &format!(
            "block {} not mined after nonces {}..{}",
            search.candidate.index, start, search.candidate.nonce
        ),
    );
    Err(search.candidate)
}
