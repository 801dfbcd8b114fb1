//! Mutation flow orchestration
//!
//! Every state-changing user action follows one template:
//! 1. validate required context, aborting before the dialog ever opens
//! 2. declare the step list, set a title, open the dialog
//! 3. one external call sequence per step, strictly in order; a failure
//!    marks the step and stops the run
//! 4. on full success, an awaited revalidation step refreshes the affected
//!    views, then the dialog closes after a short delay
//!
//! Flows are not idempotent (resubmission creates new signatures and
//! orders); there is no automatic retry, and re-triggering an action starts
//! a fresh run that discards prior step state.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;

use crate::clients::{
    BackendApi, ExchangeClient, HypercertClient, Revalidator, SafeClient, WalletClient,
};
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::observability::FlowContext;
use crate::progress::{run_step, CancelToken, StepProgress};
use crate::strategies::{select_buy_strategy, BuyOutcome, BuyRequest, StrategyDeps};

mod boards;
mod fractions;
mod orders;

pub use fractions::MintRequest;

/// Step id of the shared trailing revalidation step
pub const REVALIDATE: &str = "revalidate";

/// Step ids shared across mutation flows
pub(crate) mod step_ids {
    pub const UPLOAD_ALLOWLIST: &str = "upload-allowlist";
    pub const SUBMIT: &str = "submit-transaction";
    pub const CONFIRM: &str = "confirm";
}

/// Entry point for all mutation flows
///
/// Holds the client seams and flow configuration; one instance serves the
/// whole application, while each invocation gets its own progress handle
/// and cancel token.
pub struct Orchestrator {
    wallet: Arc<dyn WalletClient>,
    backend: Arc<dyn BackendApi>,
    revalidator: Arc<dyn Revalidator>,
    exchange: Option<Arc<dyn ExchangeClient>>,
    safe: Option<Arc<dyn SafeClient>>,
    hypercerts: Option<Arc<dyn HypercertClient>>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(
        wallet: Arc<dyn WalletClient>,
        backend: Arc<dyn BackendApi>,
        revalidator: Arc<dyn Revalidator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            wallet,
            backend,
            revalidator,
            exchange: None,
            safe: None,
            hypercerts: None,
            config,
        }
    }

    pub fn with_exchange(mut self, exchange: Arc<dyn ExchangeClient>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn with_safe(mut self, safe: Arc<dyn SafeClient>) -> Self {
        self.safe = Some(safe);
        self
    }

    pub fn with_hypercerts(mut self, hypercerts: Arc<dyn HypercertClient>) -> Self {
        self.hypercerts = Some(hypercerts);
        self
    }

    /// Buy a fraction with the strategy matching the connected account.
    /// Strategy selection happens here, once per invocation.
    pub async fn buy_fraction(
        &self,
        request: BuyRequest,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<BuyOutcome, EngineError> {
        let deps = StrategyDeps {
            wallet: self.wallet.clone(),
            exchange: self.exchange.clone(),
            safe: self.safe.clone(),
        };
        let strategy = select_buy_strategy(deps)?;
        let hypercert_id = request.order.item_ids.first().cloned();
        let outcome = strategy.execute(request, progress, cancel).await?;

        let ctx = FlowContext::new("buy-fraction");
        let mut paths = vec!["/marketplace".to_string()];
        if let Some(item) = hypercert_id {
            paths.push(format!("/hypercerts/{item}"));
        }
        // The strategy has settled (or queued) the trade; the revalidation
        // step runs like any other, but a failed refresh is only shown on
        // the step. It never turns a settled trade into an error.
        if self.config.flows.skip_revalidation {
            progress.complete(REVALIDATE).await?;
        } else if run_step(progress, cancel, &ctx, REVALIDATE, async {
            self.revalidator.revalidate(&paths).await
        })
        .await
        .is_err()
        {
            return Ok(outcome);
        } else {
            progress.complete(REVALIDATE).await?;
        }
        ctx.log_completed("views revalidated");
        self.delayed_close(progress).await;
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Shared template pieces
    // ------------------------------------------------------------------

    /// Wallet address and chain id, checked before any dialog is shown.
    pub(crate) fn require_wallet(&self) -> Result<(Address, u64), EngineError> {
        let address = self
            .wallet
            .address()
            .ok_or_else(|| EngineError::precondition("no connected wallet"))?;
        let chain_id = self
            .wallet
            .chain_id()
            .ok_or_else(|| EngineError::precondition("no chain id"))?;
        if chain_id != self.config.chain.id {
            return Err(EngineError::precondition(format!(
                "wallet is on chain {chain_id}, expected {} ({})",
                self.config.chain.id, self.config.chain.name
            )));
        }
        Ok((address, chain_id))
    }

    pub(crate) fn require_hypercerts(&self) -> Result<Arc<dyn HypercertClient>, EngineError> {
        self.hypercerts
            .clone()
            .ok_or_else(|| EngineError::precondition("no hypercert client"))
    }

    pub(crate) fn require_exchange(&self) -> Result<Arc<dyn ExchangeClient>, EngineError> {
        self.exchange
            .clone()
            .ok_or_else(|| EngineError::precondition("no exchange client"))
    }

    pub(crate) fn wallet(&self) -> &Arc<dyn WalletClient> {
        &self.wallet
    }

    pub(crate) fn backend(&self) -> &Arc<dyn BackendApi> {
        &self.backend
    }

    /// Run the trailing revalidation step, then close the dialog after the
    /// configured delay. Revalidation failures are visible in the step list.
    pub(crate) async fn finish(
        &self,
        progress: &StepProgress,
        cancel: &CancelToken,
        ctx: &FlowContext,
        paths: Vec<String>,
    ) -> Result<(), EngineError> {
        if self.config.flows.skip_revalidation {
            progress.complete(REVALIDATE).await?;
        } else {
            run_step(progress, cancel, ctx, REVALIDATE, async {
                self.revalidator.revalidate(&paths).await
            })
            .await?;
            progress.complete(REVALIDATE).await?;
        }
        ctx.log_completed("views revalidated");
        self.delayed_close(progress).await;
        Ok(())
    }

    async fn delayed_close(&self, progress: &StepProgress) {
        progress
            .close_after(Duration::from_millis(self.config.flows.close_delay_ms))
            .await;
    }
}
