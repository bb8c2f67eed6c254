//! In-memory ledger and sender doubles for unit tests.

use alloy::primitives::{Address, B256, U256};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use keeper_chain::{
    AuctionInfo, AuctionParams, EnforcementCall, EnforcementSender, GlobalRiskParams,
    KeeperLedger, LiquidationStatus, Position,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct MockLedger {
    pub positions: Mutex<HashMap<Address, Vec<Position>>>,
    pub failing_owners: Mutex<HashSet<Address>>,
    pub statuses: Mutex<HashMap<(Address, U256), LiquidationStatus>>,
    pub failing_statuses: Mutex<HashSet<(Address, U256)>>,
    pub auctions: Mutex<BTreeMap<U256, AuctionInfo>>,
    pub failing_auctions: Mutex<HashSet<U256>>,
    pub auction_listing_fails: Mutex<bool>,
    /// `None` makes the read fail.
    pub risk_params: Mutex<Option<GlobalRiskParams>>,
    pub auction_params: Mutex<Option<AuctionParams>>,
    pub price: Mutex<Option<U256>>,
    pub timestamp: Mutex<Option<u64>>,
    pub position_reads: AtomicUsize,
    pub status_reads: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            risk_params: Mutex::new(Some(GlobalRiskParams::default())),
            auction_params: Mutex::new(Some(AuctionParams::default())),
            ..Default::default()
        }
    }

    pub fn add_position(&self, position: Position) {
        self.positions
            .lock()
            .entry(position.owner)
            .or_default()
            .push(position);
    }

    pub fn set_status(&self, owner: Address, token_id: U256, status: LiquidationStatus) {
        self.statuses.lock().insert((owner, token_id), status);
    }

    pub fn add_auction(&self, auction: AuctionInfo) {
        self.auctions.lock().insert(auction.auction_id, auction);
    }

    pub fn set_price(&self, price: Option<U256>) {
        *self.price.lock() = price;
    }

    pub fn set_timestamp(&self, timestamp: Option<u64>) {
        *self.timestamp.lock() = timestamp;
    }
}

#[async_trait]
impl KeeperLedger for MockLedger {
    async fn positions_of(&self, owner: Address) -> Result<Vec<Position>> {
        self.position_reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_owners.lock().contains(&owner) {
            bail!("execution reverted");
        }
        Ok(self
            .positions
            .lock()
            .get(&owner)
            .map(|list| list.iter().filter(|p| p.is_live()).cloned().collect())
            .unwrap_or_default())
    }

    async fn active_auction_ids(&self) -> Result<Vec<U256>> {
        if *self.auction_listing_fails.lock() {
            bail!("connection refused");
        }
        Ok(self.auctions.lock().keys().copied().collect())
    }

    async fn auction(&self, auction_id: U256) -> Result<AuctionInfo> {
        if self.failing_auctions.lock().contains(&auction_id) {
            bail!("execution reverted");
        }
        self.auctions
            .lock()
            .get(&auction_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown auction {auction_id}"))
    }

    async fn liquidation_status(
        &self,
        owner: Address,
        token_id: U256,
    ) -> Result<LiquidationStatus> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_statuses.lock().contains(&(owner, token_id)) {
            bail!("execution reverted");
        }
        Ok(self
            .statuses
            .lock()
            .get(&(owner, token_id))
            .copied()
            .unwrap_or_default())
    }

    async fn global_risk_params(&self) -> Result<GlobalRiskParams> {
        (*self.risk_params.lock()).ok_or_else(|| anyhow!("globalConfig reverted"))
    }

    async fn auction_params(&self) -> Result<AuctionParams> {
        (*self.auction_params.lock()).ok_or_else(|| anyhow!("auctionParams reverted"))
    }

    async fn reference_price(&self) -> Result<U256> {
        (*self.price.lock()).ok_or_else(|| anyhow!("oracle unreachable"))
    }

    async fn latest_timestamp(&self) -> Result<u64> {
        (*self.timestamp.lock()).ok_or_else(|| anyhow!("block unavailable"))
    }
}

#[derive(Debug)]
pub struct MockSender {
    pub address: Address,
    pub estimate: Mutex<Option<u64>>,
    pub submit_fails: Mutex<bool>,
    /// Receipt returned for every transaction; `None` keeps it pending.
    pub receipt: Mutex<Option<bool>>,
    pub submitted: Mutex<Vec<(EnforcementCall, u64)>>,
    pub submitted_at: Mutex<Vec<Instant>>,
    pub receipt_polls: AtomicUsize,
}

impl MockSender {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            estimate: Mutex::new(Some(200_000)),
            submit_fails: Mutex::new(false),
            receipt: Mutex::new(Some(true)),
            submitted: Mutex::new(Vec::new()),
            submitted_at: Mutex::new(Vec::new()),
            receipt_polls: AtomicUsize::new(0),
        }
    }

    pub fn submitted_calls(&self) -> Vec<EnforcementCall> {
        self.submitted.lock().iter().map(|(call, _)| *call).collect()
    }
}

#[async_trait]
impl EnforcementSender for MockSender {
    fn keeper_address(&self) -> Address {
        self.address
    }

    async fn estimate_gas(&self, _call: &EnforcementCall) -> Result<u64> {
        (*self.estimate.lock()).ok_or_else(|| anyhow!("execution reverted: not liquidatable"))
    }

    async fn submit(&self, call: &EnforcementCall, gas_limit: u64) -> Result<B256> {
        if *self.submit_fails.lock() {
            bail!("nonce too low");
        }
        self.submitted_at.lock().push(Instant::now());
        let mut submitted = self.submitted.lock();
        submitted.push((*call, gas_limit));
        Ok(B256::with_last_byte(submitted.len() as u8))
    }

    async fn receipt_status(&self, _tx_hash: B256) -> Result<Option<bool>> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.receipt.lock())
    }
}
