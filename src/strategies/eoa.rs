//! Direct EOA purchase execution
//!
//! Every on-chain action is signed and sent from the connected account, and
//! success means a mined, non-reverted receipt for the trade itself.

use crate::errors::EngineError;
use crate::observability::FlowContext;
use crate::progress::{CancelToken, StepProgress};
use crate::types::{AccountKind, Currency, TransactionReceipt};

use super::{
    buy_step_specs, buy_steps, require_context, run_step, BuyOutcome, BuyRequest, BuyStrategy,
    StrategyDeps,
};
use async_trait::async_trait;

pub struct EoaBuyStrategy {
    deps: StrategyDeps,
}

impl EoaBuyStrategy {
    pub fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }

    fn receipt_outcome(receipt: &TransactionReceipt) -> Result<(), EngineError> {
        if receipt.success {
            return Ok(());
        }
        Err(EngineError::revert(
            receipt
                .revert_reason
                .as_deref()
                .unwrap_or("transaction reverted"),
        ))
    }
}

#[async_trait]
impl BuyStrategy for EoaBuyStrategy {
    async fn execute(
        &self,
        request: BuyRequest,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<BuyOutcome, EngineError> {
        let (buyer, exchange) = require_context(&self.deps, &request.order, progress).await?;
        let wallet = self.deps.wallet.clone();

        let ctx = FlowContext::new("buy-fraction-eoa");
        ctx.log_started();

        progress.set_title(request.dialog_title()).await;
        progress.set_steps(buy_step_specs(AccountKind::Eoa)).await;
        progress.set_open(true).await;

        let taker = run_step(progress, cancel, &ctx, buy_steps::SETUP, async {
            exchange.create_fractional_sale_taker_bid(
                &request.order,
                buyer,
                request.unit_amount,
                request.price_per_unit,
            )
        })
        .await?;

        // Native-currency orders need no allowance; the step still completes.
        run_step(progress, cancel, &ctx, buy_steps::ERC20_APPROVAL, async {
            if let Currency::Erc20(token) = request.order.currency() {
                let total = taker.total_price();
                let allowance = exchange.allowance(token, buyer).await?;
                if allowance < total {
                    let tx_hash = exchange.approve_erc20(token, total).await?;
                    let receipt = wallet.wait_for_receipt(tx_hash).await?;
                    Self::receipt_outcome(&receipt)?;
                }
            }
            Ok(())
        })
        .await?;

        run_step(progress, cancel, &ctx, buy_steps::TRANSFER_MANAGER, async {
            if !exchange.is_transfer_manager_approved(buyer).await? {
                let tx_hash = exchange.grant_transfer_manager_approval().await?;
                let receipt = wallet.wait_for_receipt(tx_hash).await?;
                Self::receipt_outcome(&receipt)?;
            }
            Ok(())
        })
        .await?;

        let tx_hash = run_step(progress, cancel, &ctx, buy_steps::SUBMIT, async {
            exchange.execute_order(&request.order, &taker).await
        })
        .await?;

        run_step(progress, cancel, &ctx, buy_steps::CONFIRM, async {
            let receipt = wallet.wait_for_receipt(tx_hash).await?;
            Self::receipt_outcome(&receipt)
        })
        .await?;

        // The final step never auto-completes; mark it now that the trade
        // has a mined receipt.
        progress.complete(buy_steps::CONFIRM).await?;
        ctx.log_completed(&format!("settled in {tx_hash}"));

        Ok(BuyOutcome::Settled { tx_hash })
    }
}
