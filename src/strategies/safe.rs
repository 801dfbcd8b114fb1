//! Safe multisig purchase execution
//!
//! Required approvals and the trade itself are collected into one atomic
//! Safe transaction batch and queued for co-signing. The terminal state is
//! "queued in the Safe", never a mined receipt; settlement happens later,
//! once the remaining owners sign.

use crate::errors::EngineError;
use crate::observability::FlowContext;
use crate::progress::{CancelToken, StepProgress};
use crate::types::{AccountKind, Currency};

use super::{
    buy_step_specs, buy_steps, require_context, run_step, BuyOutcome, BuyRequest, BuyStrategy,
    StrategyDeps,
};
use async_trait::async_trait;

pub struct SafeBuyStrategy {
    deps: StrategyDeps,
}

impl SafeBuyStrategy {
    pub fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl BuyStrategy for SafeBuyStrategy {
    async fn execute(
        &self,
        request: BuyRequest,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<BuyOutcome, EngineError> {
        let (_, exchange) = require_context(&self.deps, &request.order, progress).await?;
        let safe = match self.deps.safe.clone() {
            Some(safe) => safe,
            None => {
                progress.set_open(false).await;
                return Err(EngineError::precondition("no Safe client configured"));
            }
        };
        let safe_address = safe.safe_address();

        let ctx = FlowContext::new("buy-fraction-safe");
        ctx.log_started();

        progress.set_title(request.dialog_title()).await;
        progress.set_steps(buy_step_specs(AccountKind::Safe)).await;
        progress.set_open(true).await;

        // The Safe itself receives the units and pays for them.
        let taker = run_step(progress, cancel, &ctx, buy_steps::SETUP, async {
            exchange.create_fractional_sale_taker_bid(
                &request.order,
                safe_address,
                request.unit_amount,
                request.price_per_unit,
            )
        })
        .await?;

        let mut batch = Vec::new();

        run_step(progress, cancel, &ctx, buy_steps::ERC20_APPROVAL, async {
            if let Currency::Erc20(token) = request.order.currency() {
                let total = taker.total_price();
                let allowance = exchange.allowance(token, safe_address).await?;
                if allowance < total {
                    batch.push(exchange.build_erc20_approval(token, total)?);
                }
            }
            Ok(())
        })
        .await?;

        run_step(progress, cancel, &ctx, buy_steps::TRANSFER_MANAGER, async {
            if !exchange.is_transfer_manager_approved(safe_address).await? {
                batch.push(exchange.build_transfer_manager_approval()?);
            }
            Ok(())
        })
        .await?;

        let safe_tx_hash = run_step(progress, cancel, &ctx, buy_steps::SUBMIT, async {
            batch.push(exchange.build_order_execution(&request.order, &taker)?);
            if batch.len() == 1 {
                safe.queue_transaction(&batch[0]).await
            } else {
                safe.queue_batch(&batch).await
            }
        })
        .await?;

        // Queued is this strategy's terminal state. No receipt is awaited;
        // co-signers settle the trade out of band.
        progress.complete(buy_steps::CONFIRM).await?;
        ctx.log_completed(&format!("queued in Safe as {safe_tx_hash}"));

        Ok(BuyOutcome::QueuedInSafe { safe_tx_hash })
    }
}
