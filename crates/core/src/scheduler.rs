//! Poll scheduler driving one keeper.
//!
//! Each iteration collects opportunities and executes them one by one. An
//! error escaping the iteration sends the loop into backoff. Shutdown is
//! observed at every sleep; an in-flight receipt wait always completes.

use crate::error::KeeperResult;
use crate::executor::{ExecutionEngine, ExecutionOutcome};
use crate::keepers::Keeper;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub inter_opportunity_delay: Duration,
    pub backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            inter_opportunity_delay: Duration::from_secs(5),
            backoff: Duration::from_secs(60),
        }
    }
}

/// Outcome counts for one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationSummary {
    pub opportunities: usize,
    pub confirmed: usize,
    pub reverted: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub submit_failed: usize,
    /// Opportunities left unexecuted because of shutdown
    pub abandoned: usize,
}

impl IterationSummary {
    fn record(&mut self, outcome: &ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Confirmed { .. } => self.confirmed += 1,
            ExecutionOutcome::Reverted { .. } => self.reverted += 1,
            ExecutionOutcome::TimedOut { .. } => self.timed_out += 1,
            ExecutionOutcome::Skipped { .. } => self.skipped += 1,
            ExecutionOutcome::SubmitFailed { .. } => self.submit_failed += 1,
        }
    }

    pub fn executed(&self) -> usize {
        self.confirmed + self.reverted + self.timed_out + self.skipped + self.submit_failed
    }
}

pub struct PollScheduler {
    keeper: Arc<dyn Keeper>,
    engine: Arc<ExecutionEngine>,
    config: SchedulerConfig,
    shutdown: watch::Receiver<bool>,
}

impl PollScheduler {
    pub fn new(
        keeper: Arc<dyn Keeper>,
        engine: Arc<ExecutionEngine>,
        config: SchedulerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            keeper,
            engine,
            config,
            shutdown,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep unless shutdown arrives first. Returns `false` on shutdown.
    async fn pause(&mut self, duration: Duration) -> bool {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            if self.shutdown_requested() {
                return false;
            }
            tokio::select! {
                _ = &mut sleep => return true,
                changed = self.shutdown.changed() => {
                    // sender dropped
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Run until shutdown.
    pub async fn run(mut self) {
        let name = self.keeper.name();
        info!(
            keeper = name,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            backoff_secs = self.config.backoff.as_secs(),
            "Keeper loop started"
        );

        loop {
            let delay = match self.run_iteration().await {
                Ok(_) => self.config.poll_interval,
                Err(e) => {
                    error!(
                        keeper = name,
                        kind = e.kind(),
                        error = %e,
                        "Iteration failed, backing off"
                    );
                    self.config.backoff
                }
            };
            if !self.pause(delay).await {
                break;
            }
        }

        info!(keeper = name, "Keeper loop stopped");
    }

    /// One polling iteration: collect, execute sequentially, summarize.
    #[instrument(skip(self), fields(keeper = self.keeper.name()))]
    pub async fn run_iteration(&mut self) -> KeeperResult<IterationSummary> {
        let opportunities = self.keeper.collect_opportunities().await?;
        let mut summary = IterationSummary {
            opportunities: opportunities.len(),
            ..Default::default()
        };

        for (index, opportunity) in opportunities.iter().enumerate() {
            if self.shutdown_requested() {
                summary.abandoned = opportunities.len() - index;
                warn!(
                    remaining = summary.abandoned,
                    "Shutdown requested, not submitting remaining opportunities"
                );
                break;
            }

            let outcome = self.engine.execute(opportunity).await;
            info!(opportunity = %opportunity, outcome = %outcome, "Opportunity processed");
            summary.record(&outcome);

            if !self.pause(self.config.inter_opportunity_delay).await {
                summary.abandoned = opportunities.len() - index - 1;
                if summary.abandoned > 0 {
                    warn!(
                    remaining = summary.abandoned,
                    "Shutdown requested, not submitting remaining opportunities"
                );
                }
                break;
            }
        }

        info!(
            opportunities = summary.opportunities,
            confirmed = summary.confirmed,
            reverted = summary.reverted,
            timed_out = summary.timed_out,
            skipped = summary.skipped,
            submit_failed = summary.submit_failed,
            abandoned = summary.abandoned,
            "Iteration complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeeperError;
    use crate::opportunity::Opportunity;
    use crate::testing::MockSender;
    use alloy::primitives::{Address, U256};
    use async_trait::async_trait;
    use keeper_chain::EnforcementCall;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Replays scripted iteration results, then keeps returning no opportunities.
    struct ScriptedKeeper {
        script: Mutex<VecDeque<KeeperResult<Vec<Opportunity>>>>,
        calls: AtomicUsize,
        polled_at: Mutex<Vec<Instant>>,
    }

    impl ScriptedKeeper {
        fn new(script: Vec<KeeperResult<Vec<Opportunity>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                polled_at: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Keeper for ScriptedKeeper {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn collect_opportunities(&self) -> KeeperResult<Vec<Opportunity>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.polled_at.lock().push(Instant::now());
            self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn reset(id: u64) -> Opportunity {
        Opportunity::AuctionReset {
            auction_id: U256::from(id),
            reason: crate::auction::ResetReason::ProtocolFlag,
        }
    }

    fn scheduler(
        keeper: Arc<ScriptedKeeper>,
        sender: &Arc<MockSender>,
        shutdown: watch::Receiver<bool>,
    ) -> PollScheduler {
        let engine = Arc::new(ExecutionEngine::new(sender.clone()));
        PollScheduler::new(keeper, engine, SchedulerConfig::default(), shutdown)
    }

    #[tokio::test(start_paused = true)]
    async fn test_executes_opportunities_in_order() {
        let script = vec![Ok(vec![reset(3), reset(1), reset(2)])];
        let keeper = Arc::new(ScriptedKeeper::new(script));
        let sender = Arc::new(MockSender::new(Address::repeat_byte(0xee)));
        let (_tx, rx) = watch::channel(false);

        let summary = scheduler(keeper, &sender, rx).run_iteration().await.unwrap();

        assert_eq!(summary.opportunities, 3);
        assert_eq!(summary.confirmed, 3);
        let ids: Vec<U256> = sender
            .submitted_calls()
            .into_iter()
            .map(|call| match call {
                EnforcementCall::TriggerAuctionReset { auction_id, .. } => auction_id,
                other => panic!("unexpected call {other}"),
            })
            .collect();
        assert_eq!(ids, vec![U256::from(3u64), U256::from(1u64), U256::from(2u64)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_are_counted() {
        let keeper = Arc::new(ScriptedKeeper::new(vec![Ok(vec![reset(1), reset(2)])]));
        let sender = Arc::new(MockSender::new(Address::repeat_byte(0xee)));
        *sender.estimate.lock() = None;
        let (_tx, rx) = watch::channel(false);

        let summary = scheduler(keeper, &sender, rx).run_iteration().await.unwrap();

        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.executed(), 2);
        assert!(sender.submitted.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_remaining_submissions() {
        let script = vec![Ok(vec![reset(1), reset(2), reset(3)])];
        let keeper = Arc::new(ScriptedKeeper::new(script));
        let sender = Arc::new(MockSender::new(Address::repeat_byte(0xee)));
        let (tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(keeper, &sender, rx);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            tx.send(true).ok();
            tx
        });

        let summary = scheduler.run_iteration().await.unwrap();
        let _tx = stopper.await.unwrap();

        assert_eq!(summary.confirmed, 1);
        assert_eq!(summary.abandoned, 2);
        assert_eq!(sender.submitted.lock().len(), 1);
    }

    /// Paused-clock timers fire on millisecond ticks.
    fn assert_gap(earlier: Instant, later: Instant, expected: Duration) {
        let gap = later - earlier;
        assert!(
            gap >= expected && gap <= expected + Duration::from_millis(10),
            "gap {gap:?}, expected {expected:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_spaces_submissions_and_iterations() {
        let keeper = Arc::new(ScriptedKeeper::new(vec![Ok(vec![reset(1), reset(2)])]));
        let sender = Arc::new(MockSender::new(Address::repeat_byte(0xee)));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler(keeper.clone(), &sender, rx).run());

        // submissions at t=0 and t=5, iteration ends after the second 5s
        // delay at t=10, next poll 30s later at t=40
        tokio::time::sleep(Duration::from_secs(39)).await;
        assert_eq!(keeper.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(keeper.calls.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();

        let submitted_at = sender.submitted_at.lock().clone();
        let polled_at = keeper.polled_at.lock().clone();
        assert_eq!(submitted_at.len(), 2);
        assert_eq!(polled_at.len(), 2);
        assert_gap(polled_at[0], submitted_at[0], Duration::ZERO);
        assert_gap(submitted_at[0], submitted_at[1], Duration::from_secs(5));
        assert_gap(submitted_at[1], polled_at[1], Duration::from_secs(5 + 30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_backs_off_and_exits_on_shutdown() {
        let keeper = Arc::new(ScriptedKeeper::new(vec![
            Err(KeeperError::connectivity("reference price", anyhow::anyhow!("refused"))),
            Ok(vec![reset(1)]),
        ]));
        let sender = Arc::new(MockSender::new(Address::repeat_byte(0xee)));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler(keeper.clone(), &sender, rx).run());

        // first iteration fails at t=0, backoff 60s, second iteration at t=60
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(keeper.calls.load(Ordering::SeqCst), 1);
        assert!(sender.submitted.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(keeper.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sender.submitted.lock().len(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(keeper.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_when_shutdown_already_set() {
        let keeper = Arc::new(ScriptedKeeper::new(vec![]));
        let sender = Arc::new(MockSender::new(Address::repeat_byte(0xee)));
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        scheduler(keeper.clone(), &sender, rx).run().await;
        assert_eq!(keeper.calls.load(Ordering::SeqCst), 1);
    }
}
