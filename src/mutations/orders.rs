//! Marketplace order flows: create listing, cancel, delete

use alloy_primitives::B256;

use crate::errors::EngineError;
use crate::observability::FlowContext;
use crate::progress::{run_step, CancelToken, StepProgress};
use crate::steps::StepSpec;
use crate::types::{MakerAskParams, MarketplaceOrder};

use super::{step_ids, Orchestrator, REVALIDATE};

mod listing_steps {
    pub const CREATE_ASK: &str = "create-ask";
    pub const COLLECTION_APPROVAL: &str = "collection-approval";
    pub const SIGN: &str = "sign-order";
    pub const REGISTER: &str = "register-order";
}

impl Orchestrator {
    /// List a fraction for fractional sale: build the maker ask, make sure
    /// the marketplace may move collection items, collect the EIP-712
    /// signature, and register the signed order with the backend.
    pub async fn create_listing(
        &self,
        params: MakerAskParams,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<String, EngineError> {
        let (signer, _) = self.require_wallet()?;
        let exchange = self.require_exchange()?;

        if params.price_per_unit.is_zero() {
            return Err(EngineError::validation("price per unit must be non-zero"));
        }
        if params.min_unit_amount > params.max_unit_amount {
            return Err(EngineError::validation(
                "minimum unit amount exceeds maximum",
            ));
        }
        if params.start_time >= params.end_time {
            return Err(EngineError::validation("listing window is empty"));
        }

        let ctx = FlowContext::new("create-listing");
        ctx.log_started();

        progress.set_title("Create listing").await;
        progress
            .set_steps(vec![
                StepSpec::new(listing_steps::CREATE_ASK, "Preparing maker order"),
                StepSpec::new(listing_steps::COLLECTION_APPROVAL, "Approving collection"),
                StepSpec::new(listing_steps::SIGN, "Awaiting order signature"),
                StepSpec::new(listing_steps::REGISTER, "Registering order"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        let unsigned = run_step(progress, cancel, &ctx, listing_steps::CREATE_ASK, async {
            exchange
                .create_fractional_sale_maker_ask(&params, signer)
                .await
        })
        .await?;

        run_step(
            progress,
            cancel,
            &ctx,
            listing_steps::COLLECTION_APPROVAL,
            async {
                if !exchange
                    .is_collection_approved(params.collection, signer)
                    .await?
                {
                    let tx_hash = exchange.approve_all_collection_items(params.collection).await?;
                    let receipt = self.wallet().wait_for_receipt(tx_hash).await?;
                    if !receipt.success {
                        return Err(EngineError::revert(
                            receipt
                                .revert_reason
                                .as_deref()
                                .unwrap_or("collection approval reverted"),
                        ));
                    }
                }
                Ok(())
            },
        )
        .await?;

        let signature = run_step(progress, cancel, &ctx, listing_steps::SIGN, async {
            self.wallet().sign_typed_data(&unsigned.typed_data).await
        })
        .await?;

        let mut order = unsigned.order;
        order.signature = signature;

        let order_id = run_step(progress, cancel, &ctx, listing_steps::REGISTER, async {
            self.backend().register_order(&order).await
        })
        .await?;

        self.finish(
            progress,
            cancel,
            &ctx,
            vec![
                "/marketplace".to_string(),
                format!("/profile/{signer}/listings"),
            ],
        )
        .await?;
        Ok(order_id)
    }

    /// Cancel a maker order on-chain by invalidating its nonce. Only the
    /// signing address may cancel.
    pub async fn cancel_order(
        &self,
        order: &MarketplaceOrder,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<B256, EngineError> {
        let (signer, _) = self.require_wallet()?;
        let exchange = self.require_exchange()?;
        self.require_order_owner(order, signer)?;

        let ctx = FlowContext::new("cancel-order");
        ctx.log_started();

        progress.set_title("Cancel listing").await;
        progress
            .set_steps(vec![
                StepSpec::new(step_ids::SUBMIT, "Cancelling order on-chain"),
                StepSpec::new(step_ids::CONFIRM, "Waiting for confirmation"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        let tx_hash = run_step(progress, cancel, &ctx, step_ids::SUBMIT, async {
            exchange.cancel_orders(&[order.order_nonce]).await
        })
        .await?;

        self.confirm_receipt(progress, cancel, &ctx, tx_hash).await?;
        self.finish(
            progress,
            cancel,
            &ctx,
            vec![
                "/marketplace".to_string(),
                format!("/profile/{signer}/listings"),
            ],
        )
        .await?;
        Ok(tx_hash)
    }

    /// Delete an order record from the backend. The owner proves authority
    /// with a fresh signature; nothing happens on-chain.
    pub async fn delete_order(
        &self,
        order: &MarketplaceOrder,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        let (signer, _) = self.require_wallet()?;
        self.require_order_owner(order, signer)?;

        let ctx = FlowContext::new("delete-order");
        ctx.log_started();

        progress.set_title("Delete listing").await;
        progress
            .set_steps(vec![
                StepSpec::new(listing_steps::SIGN, "Awaiting signature"),
                StepSpec::new(step_ids::SUBMIT, "Deleting order"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        let order_id = order.id.clone();
        let signature = run_step(progress, cancel, &ctx, listing_steps::SIGN, async {
            self.wallet()
                .sign_message(&format!("Delete order {order_id}"))
                .await
        })
        .await?;

        run_step(progress, cancel, &ctx, step_ids::SUBMIT, async {
            self.backend().delete_order(&order.id, &signature).await
        })
        .await?;

        self.finish(
            progress,
            cancel,
            &ctx,
            vec![
                "/marketplace".to_string(),
                format!("/profile/{signer}/listings"),
            ],
        )
        .await
    }

    fn require_order_owner(
        &self,
        order: &MarketplaceOrder,
        signer: alloy_primitives::Address,
    ) -> Result<(), EngineError> {
        if order.signer != signer {
            return Err(EngineError::Unauthorized(format!(
                "order {} belongs to {}",
                order.id, order.signer
            )));
        }
        Ok(())
    }
}
