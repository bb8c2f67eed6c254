//! Execution engine for enforcement transactions.
//!
//! One opportunity goes through gas estimation, submission and a bounded
//! receipt wait. Failures become [`ExecutionOutcome`] values; nothing escapes
//! as an error and nothing is retried within the round.

use crate::opportunity::Opportunity;
use alloy::primitives::B256;
use keeper_chain::EnforcementSender;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Default gas added on top of the estimate.
pub const DEFAULT_GAS_BUFFER: u64 = 10_000;

/// Terminal state of one enforcement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Included with status success.
    Confirmed { tx_hash: B256 },
    /// Included but reverted.
    Reverted { tx_hash: B256 },
    /// No receipt before the confirmation timeout. Not resubmitted.
    TimedOut { tx_hash: B256 },
    /// Gas estimation failed; nothing was sent.
    Skipped { reason: String },
    /// Signing or broadcast failed.
    SubmitFailed { reason: String },
}

impl ExecutionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ExecutionOutcome::Confirmed { .. })
    }

    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            ExecutionOutcome::Confirmed { tx_hash }
            | ExecutionOutcome::Reverted { tx_hash }
            | ExecutionOutcome::TimedOut { tx_hash } => Some(*tx_hash),
            ExecutionOutcome::Skipped { .. } | ExecutionOutcome::SubmitFailed { .. } => None,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Confirmed { tx_hash } => write!(f, "confirmed ({tx_hash})"),
            ExecutionOutcome::Reverted { tx_hash } => write!(f, "reverted ({tx_hash})"),
            ExecutionOutcome::TimedOut { tx_hash } => write!(f, "timed out ({tx_hash})"),
            ExecutionOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
            ExecutionOutcome::SubmitFailed { reason } => write!(f, "submit failed: {reason}"),
        }
    }
}

/// Executes opportunities through an [`EnforcementSender`].
#[derive(Debug)]
pub struct ExecutionEngine {
    sender: Arc<dyn EnforcementSender>,

    /// Gas added to every estimate
    gas_buffer: u64,

    /// Upper bound on the receipt wait
    confirmation_timeout: Duration,

    /// Delay between receipt lookups
    receipt_poll_interval: Duration,
}

impl ExecutionEngine {
    pub fn new(sender: Arc<dyn EnforcementSender>) -> Self {
        Self {
            sender,
            gas_buffer: DEFAULT_GAS_BUFFER,
            confirmation_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_gas_buffer(mut self, gas_buffer: u64) -> Self {
        self.gas_buffer = gas_buffer;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    /// Estimate, submit and wait for one opportunity.
    #[instrument(skip(self, opportunity), fields(opportunity = %opportunity))]
    pub async fn execute(&self, opportunity: &Opportunity) -> ExecutionOutcome {
        let call = opportunity.to_call(self.sender.keeper_address());

        let estimate = match self.sender.estimate_gas(&call).await {
            Ok(gas) => gas,
            Err(e) => {
                warn!(call = %call, error = %e, "Gas estimation failed, skipping");
                return ExecutionOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };
        let gas_limit = estimate.saturating_add(self.gas_buffer);
        debug!(estimate, gas_limit, "Gas estimated");

        let start = Instant::now();
        let tx_hash = match self.sender.submit(&call, gas_limit).await {
            Ok(hash) => hash,
            Err(e) => {
                error!(call = %call, error = %e, "Transaction submission failed");
                return ExecutionOutcome::SubmitFailed {
                    reason: e.to_string(),
                };
            }
        };
        info!(tx_hash = %tx_hash, call = %call, gas_limit, "Enforcement transaction submitted");

        let outcome = self.await_receipt(tx_hash).await;
        match &outcome {
            ExecutionOutcome::Confirmed { .. } => info!(
                tx_hash = %tx_hash,
                elapsed_ms = start.elapsed().as_millis(),
                "Enforcement transaction confirmed"
            ),
            ExecutionOutcome::Reverted { .. } => {
                error!(tx_hash = %tx_hash, call = %call, "Enforcement transaction reverted")
            }
            ExecutionOutcome::TimedOut { .. } => warn!(
                tx_hash = %tx_hash,
                timeout_secs = self.confirmation_timeout.as_secs(),
                "No receipt before timeout, leaving transaction pending"
            ),
            _ => {}
        }
        outcome
    }

    async fn await_receipt(&self, tx_hash: B256) -> ExecutionOutcome {
        let poll = async {
            loop {
                match self.sender.receipt_status(tx_hash).await {
                    Ok(Some(true)) => return ExecutionOutcome::Confirmed { tx_hash },
                    Ok(Some(false)) => return ExecutionOutcome::Reverted { tx_hash },
                    Ok(None) => {}
                    Err(e) => debug!(tx_hash = %tx_hash, error = %e, "Receipt lookup failed"),
                }
                tokio::time::sleep(self.receipt_poll_interval).await;
            }
        };

        tokio::time::timeout(self.confirmation_timeout, poll)
            .await
            .unwrap_or(ExecutionOutcome::TimedOut { tx_hash })
    }
}
