use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use alloy::primitives::{address, Address};
use chrono::{DateTime, TimeZone, Utc};
use ethflow_utils::{ChainSource, InternalTransaction};

pub const ADDRESS: Address = address!("0x94845333028B1204Fbe14E1278Fd4Adde46B22ce");
pub const CONTRACT: Address = address!("0xE68F1cb52659f256Fee05Fd088D588908A6e85A1");

pub fn utc_date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn tx(block_number: u64, wei: &str) -> InternalTransaction {
    InternalTransaction {
        from: CONTRACT,
        to: ADDRESS,
        block_number,
        value: wei.to_string(),
        synthetic: false,
    }
}

fn outage() -> ethflow_utils::Error {
    ethflow_utils::Error::Upstream {
        status: 502,
        message: "Bad Gateway".to_string(),
    }
}

/// In-memory chain. Unknown blocks have a zero balance.
#[derive(Default)]
pub struct MockSource {
    current_block: u64,
    latest_balance: f64,
    balances: HashMap<u64, f64>,
    failing_blocks: HashSet<u64>,
    blocks_at: HashMap<i64, u64>,
    transactions: Vec<InternalTransaction>,
    failing: AtomicBool,
    block_height_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    transaction_calls: AtomicUsize,
    block_lookups: AtomicUsize,
}

impl MockSource {
    pub fn new(current_block: u64) -> Self {
        Self {
            current_block,
            ..Default::default()
        }
    }

    pub fn with_balance(mut self, block: u64, ether: f64) -> Self {
        self.balances.insert(block, ether);
        self
    }

    pub fn with_latest_balance(mut self, ether: f64) -> Self {
        self.latest_balance = ether;
        self
    }

    pub fn failing_block(mut self, block: u64) -> Self {
        self.failing_blocks.insert(block);
        self
    }

    pub fn with_block_at(mut self, at: DateTime<Utc>, block: u64) -> Self {
        self.blocks_at.insert(at.timestamp(), block);
        self
    }

    pub fn with_transactions(mut self, transactions: Vec<InternalTransaction>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn block_height_calls(&self) -> usize {
        self.block_height_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn transaction_calls(&self) -> usize {
        self.transaction_calls.load(Ordering::SeqCst)
    }

    pub fn block_lookups(&self) -> usize {
        self.block_lookups.load(Ordering::SeqCst)
    }

    fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }
}

impl ChainSource for MockSource {
    async fn current_block_height(&self) -> ethflow_utils::Result<u64> {
        self.block_height_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_failing() {
            return Err(outage());
        }
        Ok(self.current_block)
    }

    async fn balance_at_block(
        &self,
        _address: Address,
        block: Option<u64>,
    ) -> ethflow_utils::Result<f64> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        match block {
            _ if self.is_failing() => Err(outage()),
            None => Ok(self.latest_balance),
            Some(block) if self.failing_blocks.contains(&block) => Err(outage()),
            Some(block) => Ok(self.balances.get(&block).copied().unwrap_or_default()),
        }
    }

    async fn internal_transactions(
        &self,
        _contract: Address,
        _address: Address,
    ) -> Vec<InternalTransaction> {
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_failing() {
            return Vec::new();
        }
        self.transactions.clone()
    }

    async fn block_at_time(&self, timestamp: i64) -> ethflow_utils::Result<u64> {
        self.block_lookups.fetch_add(1, Ordering::SeqCst);
        self.blocks_at
            .get(&timestamp)
            .copied()
            .ok_or_else(outage)
    }
}
