//! Liquidation keeper.

use super::Keeper;
use crate::error::{KeeperError, KeeperResult};
use crate::fetcher::StateFetcher;
use crate::opportunity::Opportunity;
use crate::risk::{trigger_price, NavAssessment, PositionNav};
use crate::u256_math::wad_to_f64;
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Watches a fixed list of owners and flags positions whose net NAV fell
/// below the liquidation threshold.
///
/// The list is taken as given; [`KeeperConfig::watched_accounts`] already
/// removes duplicates.
///
/// [`KeeperConfig::watched_accounts`]: crate::KeeperConfig::watched_accounts
#[derive(Debug)]
pub struct LiquidationKeeper {
    fetcher: Arc<StateFetcher>,
    accounts: Vec<Address>,
}

impl LiquidationKeeper {
    pub fn new(fetcher: Arc<StateFetcher>, accounts: Vec<Address>) -> Self {
        Self { fetcher, accounts }
    }
}

#[async_trait]
impl Keeper for LiquidationKeeper {
    fn name(&self) -> &'static str {
        "liquidation"
    }

    #[instrument(skip(self), fields(accounts = self.accounts.len()))]
    async fn collect_opportunities(&self) -> KeeperResult<Vec<Opportunity>> {
        let snapshot = self.fetcher.liquidation_snapshot().await?;
        let risk = &snapshot.risk;
        let positions = self.fetcher.fetch_positions(&self.accounts).await;

        let mut opportunities = Vec::new();
        for position in &positions {
            let nav = match PositionNav::compute(position, snapshot.price) {
                Ok(nav) => nav,
                Err(e) => {
                    let err = KeeperError::data_integrity(
                        format!("position {}/{}", position.owner, position.token_id),
                        e.to_string(),
                    );
                    error!(
                        owner = %position.owner,
                        token_id = %position.token_id,
                        kind = err.kind(),
                        error = %err,
                        "Skipping position"
                    );
                    continue;
                }
            };

            if !nav.below_liquidation(risk) {
                if nav.in_adjustment_band(risk) {
                    debug!(
                        owner = %position.owner,
                        token_id = %position.token_id,
                        net_nav = wad_to_f64(nav.net_nav),
                        adjustment_threshold = wad_to_f64(risk.adjustment_threshold),
                        "Position below adjustment threshold"
                    );
                }
                continue;
            }

            let status = match self
                .fetcher
                .fetch_liquidation_status(position.owner, position.token_id)
                .await
            {
                Ok(status) => status,
                Err(err) => {
                    warn!(
                        owner = %position.owner,
                        token_id = %position.token_id,
                        kind = err.kind(),
                        error = %err,
                        "Skipping position"
                    );
                    continue;
                }
            };

            let assessment = NavAssessment::new(nav, risk, &status);
            if !assessment.eligible {
                debug!(
                    owner = %position.owner,
                    token_id = %position.token_id,
                    frozen = status.frozen,
                    under_liquidation = status.under_liquidation,
                    "Position below threshold but blocked"
                );
                continue;
            }

            let trigger = trigger_price(position, risk).map(wad_to_f64).unwrap_or_default();
            info!(
                owner = %position.owner,
                token_id = %position.token_id,
                tier = position.tier().map(|t| t.ratio()).unwrap_or("?"),
                gross_nav = wad_to_f64(assessment.gross_nav),
                net_nav = assessment.net_nav_f64(),
                threshold = wad_to_f64(risk.liquidation_threshold),
                price = wad_to_f64(snapshot.price),
                trigger_price = trigger,
                "Liquidation opportunity"
            );
            opportunities.push(Opportunity::Liquidation {
                owner: position.owner,
                token_id: position.token_id,
                net_nav: assessment.net_nav,
            });
        }

        info!(
            positions = positions.len(),
            opportunities = opportunities.len(),
            "Liquidation scan complete"
        );
        Ok(opportunities)
    }
}
