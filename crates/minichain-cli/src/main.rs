use anyhow::Result;
use clap::{Parser, Subcommand};
use minichain_core::{
    calculate_hash,
    constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, GENESIS_PREVIOUS_HASH},
    pow, Ledger, LedgerConfig, Transaction,
};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "minichain-cli")]
#[command(about = "Drive an in-memory proof-of-work ledger")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the transfer, mining and tamper-detection walkthrough
    Demo {
        /// Leading zero hex digits required of each block hash
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        /// Reward paid to the miner, one block late
        #[arg(long, default_value_t = DEFAULT_MINING_REWARD)]
        reward: u64,
        /// Address credited with mining rewards
        #[arg(long, default_value = "miner")]
        miner: String,
        /// Print the chain as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the hash of a block with no transactions
    Hash {
        #[arg(long, default_value_t = 0)]
        index: u64,
        /// Unix milliseconds
        #[arg(long)]
        timestamp: i64,
        #[arg(long, default_value = GENESIS_PREVIOUS_HASH)]
        previous_hash: String,
        #[arg(long, default_value_t = 0)]
        nonce: u64,
        /// Also report whether the hash meets this difficulty
        #[arg(long)]
        difficulty: Option<u32>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Demo {
            difficulty,
            reward,
            miner,
            json,
        } => demo(
            LedgerConfig {
                difficulty,
                mining_reward: reward,
            },
            &miner,
            json,
        ),
        Command::Hash {
            index,
            timestamp,
            previous_hash,
            nonce,
            difficulty,
            json,
        } => {
            let report = hash_report(index, timestamp, &previous_hash, nonce, difficulty);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report["hash"].as_str().unwrap_or_default());
                if let (Some(difficulty), Some(meets)) =
                    (difficulty, report["meets_difficulty"].as_bool())
                {
                    println!("meets difficulty {difficulty}: {meets}");
                }
            }
            Ok(())
        }
    }
}

/// Hash of an empty block, and whether it meets `difficulty` when one is given.
fn hash_report(
    index: u64,
    timestamp: i64,
    previous_hash: &str,
    nonce: u64,
    difficulty: Option<u32>,
) -> Value {
    let hash = calculate_hash(index, timestamp, &[], previous_hash, nonce);
    let mut report = json!({
        "index": index,
        "timestamp": timestamp,
        "previous_hash": previous_hash,
        "nonce": nonce,
        "hash": hash,
    });
    if let Some(difficulty) = difficulty {
        report["difficulty"] = json!(difficulty);
        report["meets_difficulty"] = json!(pow::meets_difficulty(&hash, difficulty));
    }
    report
}

fn demo(config: LedgerConfig, miner: &str, json: bool) -> Result<()> {
    let mut ledger = Ledger::new(config)?;

    ledger.add_transaction(Transaction::new("alice", "bob", 50))?;
    ledger.add_transaction(Transaction::new("bob", "carol", 25))?;
    ledger.mine_pending_transactions(miner)?;

    ledger.add_transaction(Transaction::new("carol", "alice", 10))?;
    ledger.add_transaction(Transaction::new("alice", miner, 15))?;
    ledger.mine_pending_transactions(miner)?;

    // Settles the reward for the block above.
    ledger.mine_pending_transactions(miner)?;

    if json {
        println!("{}", ledger.to_json()?);
    } else {
        for block in ledger.view() {
            println!(
                "#{} {} nonce={} txs={}",
                block.index,
                block.timestamp,
                block.nonce,
                block.transactions.len()
            );
            println!("   prev {}", block.previous_hash);
            println!("   hash {}", block.hash);
        }
    }

    println!();
    for address in ["alice", "bob", "carol", miner] {
        println!("balance {address}: {}", ledger.balance_of(address));
    }

    println!();
    println!("chain valid: {}", ledger.validate_chain());

    if let Some(block) = ledger.block_mut(1) {
        if let Some(tx) = block.transactions_mut().first_mut() {
            info!("tampering: block 1 amount {} -> {}", tx.amount, tx.amount * 2);
            tx.amount *= 2;
        }
    }
    match ledger.verify_chain() {
        Ok(()) => println!("chain valid after tampering: true"),
        Err(corruption) => {
            println!("chain valid after tampering: false");
            println!("reason: {corruption}");
        }
    }
    Ok(())
}
