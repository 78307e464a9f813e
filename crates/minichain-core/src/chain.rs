use crate::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, GENESIS_PREVIOUS_HASH, HASH_HEX_SIZE},
    error::{ChainCorruption, InvalidTransaction, LedgerError},
    now_millis, pow,
    sink::{LogSink, TracingSink},
    view::{self, BlockView},
    Block, Candidate, Transaction,
};
use serde::{Deserialize, Serialize};
use tracing::Level;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Leading zero hex digits a mined block hash must have.
    pub difficulty: u32,
    /// Paid to the miner of each block, inside the following block.
    pub mining_reward: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty as usize > HASH_HEX_SIZE {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty {} exceeds the {HASH_HEX_SIZE} hex digits of a block hash",
                self.difficulty
            )));
        }
        if self.mining_reward == 0 {
            return Err(LedgerError::InvalidConfig(
                "mining reward must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// An empty block at index 0 with previous hash `"0"`. Genesis is sealed as is
/// and never mined.
pub fn genesis_block() -> Block {
    Candidate::new(0, now_millis(), Vec::new(), GENESIS_PREVIOUS_HASH).seal()
}

/// The chain plus its pool of pending transactions.
///
/// The chain always starts with the genesis block. Blocks are only appended,
/// by [`Ledger::mine_pending_transactions`].
#[derive(Debug)]
pub struct Ledger<L: LogSink = TracingSink> {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    config: LedgerConfig,
    sink: L,
}

impl Ledger {
    /// A ledger that reports through `tracing`.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        Self::with_sink(config, TracingSink)
    }
}

impl<L: LogSink> Ledger<L> {
    pub fn with_sink(config: LedgerConfig, sink: L) -> Result<Self, LedgerError> {
        config.validate()?;
        let genesis = genesis_block();
        sink.log(
            Level::INFO,
            &format!(
                "blockchain initialized at difficulty {} with genesis {}",
                config.difficulty,
                genesis.hash()
            ),
        );
        Ok(Self {
            chain: vec![genesis],
            pending: Vec::new(),
            config,
            sink,
        })
    }

    /// Queues a transfer for the next block. Rewards (no sender) cannot be
    /// submitted here.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), LedgerError> {
        if let Err(reason) = tx.check() {
            self.sink
                .log(Level::WARN, &format!("transaction rejected: {reason}"));
            return Err(reason.into());
        }
        self.sink.log(
            Level::INFO,
            &format!(
                "transaction added: {} -> {} ({})",
                tx.sender.as_deref().unwrap_or_default(),
                tx.recipient,
                tx.amount
            ),
        );
        self.pending.push(tx);
        Ok(())
    }

    /// Seals the whole pending pool into a new block and appends it.
    ///
    /// The miner's reward is not part of that block: it becomes the first
    /// pending transaction of the next one.
    pub fn mine_pending_transactions(&mut self, miner: &str) -> Result<&Block, LedgerError> {
        if miner.trim().is_empty() {
            return Err(InvalidTransaction::MissingRecipient.into());
        }
        let index = self.chain.len() as u64;
        let previous_hash = self.latest_block().hash().to_string();
        let transactions = std::mem::take(&mut self.pending);
        let candidate = Candidate::new(index, now_millis(), transactions, previous_hash);

        let block = pow::mine_block(candidate, self.config.difficulty, &self.sink);
        self.chain.push(block);
        self.pending = vec![Transaction::reward(miner, self.config.mining_reward)];

        Ok(self.latest_block())
    }

    /// Re-derives every block hash and link after genesis. Stops at the first
    /// inconsistency.
    pub fn verify_chain(&self) -> Result<(), ChainCorruption> {
        for (position, pair) in self.chain.windows(2).enumerate() {
            let (previous, block) = (&pair[0], &pair[1]);
            let index = position as u64 + 1;

            let computed = block.calculate_hash();
            if computed != block.hash() {
                return Err(ChainCorruption::HashMismatch {
                    index,
                    stored: block.hash().to_string(),
                    computed,
                });
            }
            if block.previous_hash() != previous.hash() {
                return Err(ChainCorruption::BrokenLink {
                    index,
                    expected: previous.hash().to_string(),
                    found: block.previous_hash().to_string(),
                });
            }
        }
        Ok(())
    }

    /// [`verify_chain`](Self::verify_chain) as a yes/no answer; the reason for
    /// a failure goes to the sink.
    pub fn validate_chain(&self) -> bool {
        match self.verify_chain() {
            Ok(()) => true,
            Err(corruption) => {
                self.sink.log(Level::WARN, &corruption.to_string());
                false
            }
        }
    }

    /// Replays every committed transaction. Pending ones are not counted and
    /// balances may go negative.
    pub fn balance_of(&self, address: &str) -> i128 {
        let mut balance = 0i128;
        for tx in self.chain.iter().flat_map(Block::transactions) {
            if tx.sender.as_deref() == Some(address) {
                balance -= i128::from(tx.amount);
            }
            if tx.recipient == address {
                balance += i128::from(tx.amount);
            }
        }
        balance
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn latest_block(&self) -> &Block {
        // Never empty: genesis is pushed on construction.
        &self.chain[self.chain.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// True when the chain holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn mining_reward(&self) -> u64 {
        self.config.mining_reward
    }

    pub fn sink(&self) -> &L {
        &self.sink
    }

    /// Mutable access to a sealed block. Whatever is changed through this is
    /// corruption, and [`validate_chain`](Self::validate_chain) will say so.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.chain.get_mut(index)
    }

    pub fn view(&self) -> Vec<BlockView> {
        view::chain_view(&self.chain)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        view::render_json(&self.view())
    }
}
