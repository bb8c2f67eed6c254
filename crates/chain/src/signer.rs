//! Transaction signer and sender for enforcement calls.
//! Uses Alloy providers for type-safe RPC interactions.
//!
//! - Nonce: read from the chain's pending count and broadcast under one lock,
//!   so every loop sharing the key gets distinct, gap-free nonces
//! - Gas limit: supplied per call (estimate plus buffer)
//! - Gas pricing: Legacy or EIP-1559 through [`GasStrategy`]

use crate::contracts::KeeperContracts;
use crate::gas::{create_gas_strategy, GasParams, GasPricing, GasStrategy, LegacyGasStrategy};
use crate::protocol::{EnforcementCall, EnforcementSender};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Nonce assignment for the keeper account.
///
/// Shared by every loop that signs with the same key. The pending-count read,
/// the assignment and the broadcast all happen under `lane`, so a rejected
/// broadcast can release its nonce without disturbing another caller.
pub struct NonceManager {
    /// Next nonce to hand out
    current: AtomicU64,
    /// Last nonce observed on chain
    last_synced: AtomicU64,
    /// Held from the pending-count read through broadcast
    lane: Mutex<()>,
}

impl NonceManager {
    /// Create new nonce manager with initial value from chain.
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_nonce),
            last_synced: AtomicU64::new(initial_nonce),
            lane: Mutex::new(()),
        }
    }

    /// Get next nonce and increment counter.
    #[inline]
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst)
    }

    /// Get current nonce without incrementing.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Last nonce read from chain.
    #[inline]
    pub fn last_synced(&self) -> u64 {
        self.last_synced.load(Ordering::SeqCst)
    }

    /// Set the counter to the chain's pending count, in either direction.
    pub fn reset(&self, chain_nonce: u64) {
        self.current.store(chain_nonce, Ordering::SeqCst);
        self.last_synced.store(chain_nonce, Ordering::SeqCst);
    }

    /// Assign a nonce and broadcast with it, one caller at a time.
    ///
    /// The counter is first set from `pending_count`; if that read fails the
    /// local counter is used. A failed broadcast hands its nonce back.
    pub async fn assign_and_send<T, P, B>(
        &self,
        pending_count: impl FnOnce() -> P,
        broadcast: impl FnOnce(u64) -> B,
    ) -> Result<T>
    where
        P: Future<Output = Result<u64>>,
        B: Future<Output = Result<T>>,
    {
        let _lane = self.lane.lock().await;

        match pending_count().await {
            Ok(chain_nonce) => {
                if chain_nonce != self.current() {
                    debug!(
                        chain_nonce,
                        local_nonce = self.current(),
                        "Nonce realigned to chain pending count"
                    );
                }
                self.reset(chain_nonce);
            }
            Err(e) => warn!(error = %e, "Pending nonce read failed, using local counter"),
        }

        let nonce = self.next();
        match broadcast(nonce).await {
            Ok(sent) => Ok(sent),
            Err(e) => {
                warn!(nonce, error = %e, "Transaction rejected, releasing nonce");
                self.current.store(nonce, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

/// Signs and submits enforcement transactions for the keeper account.
pub struct TransactionSender {
    /// RPC URL for sending transactions
    rpc_url: String,
    /// Signer wallet
    wallet: EthereumWallet,
    /// Signer address (also the reward recipient)
    pub address: Address,
    /// Chain ID
    chain_id: u64,
    /// Contracts enforcement calls are sent to
    contracts: KeeperContracts,
    /// Local nonce counter
    nonce_manager: NonceManager,
    /// Gas pricing strategy
    gas_strategy: Box<dyn GasStrategy>,
    /// Last fetched gas parameters, used when a refresh fails
    cached_gas_params: parking_lot::RwLock<Option<GasParams>>,
}

/// Builder for TransactionSender with flexible configuration.
pub struct TransactionSenderBuilder {
    rpc_url: String,
    contracts: KeeperContracts,
    chain_id: Option<u64>,
    gas_strategy: Option<Box<dyn GasStrategy>>,
}

impl TransactionSenderBuilder {
    /// Create a new builder.
    pub fn new(rpc_url: impl Into<String>, contracts: KeeperContracts) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contracts,
            chain_id: None,
            gas_strategy: None,
        }
    }

    /// Set the chain ID. Read from the node when unset.
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Set the gas strategy.
    pub fn gas_strategy(mut self, strategy: Box<dyn GasStrategy>) -> Self {
        self.gas_strategy = Some(strategy);
        self
    }

    /// Set gas strategy from config parameters.
    pub fn gas_from_config(
        mut self,
        pricing: GasPricing,
        default_gas_price_gwei: f64,
        max_gas_price_gwei: f64,
        priority_fee_gwei: Option<f64>,
    ) -> Self {
        self.gas_strategy = Some(create_gas_strategy(
            pricing,
            default_gas_price_gwei,
            max_gas_price_gwei,
            priority_fee_gwei,
        ));
        self
    }

    /// Build the TransactionSender.
    pub async fn build(self, private_key: &str) -> Result<TransactionSender> {
        // Parse private key (with or without 0x prefix)
        let key_str = private_key.trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str.parse()?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);

        let chain_id = match self.chain_id {
            Some(id) => id,
            None => provider.get_chain_id().await?,
        };

        let initial_nonce = provider.get_transaction_count(address).pending().await?;
        let nonce_manager = NonceManager::new(initial_nonce);

        let gas_strategy = self.gas_strategy.unwrap_or_else(|| {
            Box::new(LegacyGasStrategy::new(
                1_000_000_000,   // 1 gwei default
                100_000_000_000, // 100 gwei max
            ))
        });

        let initial_gas_params = gas_strategy.fetch_params(&self.rpc_url).await.ok();

        info!(
            address = %address,
            chain_id = chain_id,
            initial_nonce = initial_nonce,
            gas_strategy = gas_strategy.strategy_name(),
            "Transaction sender initialized"
        );

        Ok(TransactionSender {
            rpc_url: self.rpc_url,
            wallet,
            address,
            chain_id,
            contracts: self.contracts,
            nonce_manager,
            gas_strategy,
            cached_gas_params: parking_lot::RwLock::new(initial_gas_params),
        })
    }
}

impl TransactionSender {
    /// Create a transaction sender with Legacy gas pricing, reading the chain ID from the node.
    pub async fn new(private_key: &str, rpc_url: &str, contracts: KeeperContracts) -> Result<Self> {
        TransactionSenderBuilder::new(rpc_url, contracts)
            .build(private_key)
            .await
    }

    /// Get the current gas strategy name.
    pub fn gas_strategy_name(&self) -> &'static str {
        self.gas_strategy.strategy_name()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Fetch gas parameters, falling back to the last good value.
    async fn gas_params(&self) -> Result<GasParams> {
        match self.gas_strategy.fetch_params(&self.rpc_url).await {
            Ok(params) => {
                *self.cached_gas_params.write() = Some(params.clone());
                Ok(params)
            }
            Err(e) => {
                let cached = self.cached_gas_params.read().clone();
                match cached {
                    Some(params) => {
                        warn!(error = %e, "Gas price fetch failed, using cached params");
                        Ok(params)
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Sign and broadcast calldata to `to`. Does not wait for inclusion.
    pub async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
        gas_limit: u64,
    ) -> Result<B256> {
        let total_start = Instant::now();
        let gas_params = self.gas_params().await?;

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.parse()?);
        let provider = &provider;
        let address = self.address;

        let pending_count = || async move {
            let count = provider.get_transaction_count(address).pending().await?;
            Ok::<_, anyhow::Error>(count)
        };

        let broadcast = |nonce: u64| {
            let mut tx = TransactionRequest::default()
                .with_from(address)
                .with_to(to)
                .with_input(calldata)
                .with_nonce(nonce)
                .with_gas_limit(gas_limit)
                .with_chain_id(self.chain_id);
            self.gas_strategy.apply_gas(&mut tx, &gas_params);

            info!(
                to = %to,
                nonce = nonce,
                gas_limit = gas_limit,
                gas_strategy = self.gas_strategy.strategy_name(),
                gas_price_gwei = gas_params.effective_gas_price() / 1_000_000_000,
                "Sending transaction"
            );

            async move {
                let pending = provider.send_transaction(tx).await?;
                Ok::<_, anyhow::Error>((*pending.tx_hash(), nonce))
            }
        };

        let (tx_hash, nonce) = self
            .nonce_manager
            .assign_and_send(pending_count, broadcast)
            .await?;

        info!(
            tx_hash = %tx_hash,
            nonce = nonce,
            submit_ms = total_start.elapsed().as_millis(),
            "Transaction submitted"
        );
        Ok(tx_hash)
    }
}

#[async_trait]
impl EnforcementSender for TransactionSender {
    fn keeper_address(&self) -> Address {
        self.address
    }

    async fn estimate_gas(&self, call: &EnforcementCall) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(call.target(&self.contracts))
            .with_input(call.calldata());

        let gas = provider.estimate_gas(tx).await?;
        debug!(call = %call, gas = gas, "Gas estimated");
        Ok(gas)
    }

    async fn submit(&self, call: &EnforcementCall, gas_limit: u64) -> Result<B256> {
        self.send_transaction(call.target(&self.contracts), call.calldata(), gas_limit)
            .await
    }

    async fn receipt_status(&self, tx_hash: B256) -> Result<Option<bool>> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let receipt = provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|r| r.status()))
    }
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("gas_strategy", &self.gas_strategy.strategy_name())
            .finish_non_exhaustive()
    }
}
