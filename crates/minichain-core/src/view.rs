//! Read-only projection of the chain for display. Nothing here validates.
use chrono::{Local, TimeZone};
use serde::Serialize;

use crate::{Block, Transaction};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlockView {
    pub index: u64,
    /// Local time of the block's creation.
    pub timestamp: String,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index(),
            timestamp: format_timestamp(block.timestamp()),
            transactions: block.transactions().to_vec(),
            previous_hash: block.previous_hash().to_string(),
            hash: block.hash().to_string(),
            nonce: block.nonce(),
        }
    }
}

/// Unix milliseconds as local time. Out-of-range values are shown raw.
pub fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format(TIMESTAMP_FORMAT).to_string(),
        None => millis.to_string(),
    }
}

pub fn chain_view(blocks: &[Block]) -> Vec<BlockView> {
    blocks.iter().map(BlockView::from).collect()
}

pub fn render_json(views: &[BlockView]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(views)
}
