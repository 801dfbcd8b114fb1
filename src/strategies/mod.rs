//! Buy strategy abstraction
//!
//! One logical purchase operation, two custody models. The EOA strategy
//! signs and sends directly and only succeeds on a mined receipt; the Safe
//! strategy queues a transaction for multisig co-signing and stops there.
//! "Submitted" and "settled" are distinct terminal states and the outcome
//! type keeps them apart.

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::clients::{ExchangeClient, SafeClient, WalletClient};
use crate::errors::EngineError;
use crate::mutations::REVALIDATE;
use crate::progress::{run_step, CancelToken, StepProgress};
use crate::steps::StepSpec;
use crate::types::{AccountKind, MarketplaceOrder};

mod eoa;
mod safe;

pub use eoa::EoaBuyStrategy;
pub use safe::SafeBuyStrategy;

/// Step ids shared by both buy strategies
pub mod buy_steps {
    pub const SETUP: &str = "setup-order";
    pub const ERC20_APPROVAL: &str = "erc20-approval";
    pub const TRANSFER_MANAGER: &str = "transfer-manager-approval";
    pub const SUBMIT: &str = "submit-trade";
    pub const CONFIRM: &str = "confirm";
}

/// The five strategy steps plus the shared trailing revalidation step,
/// with descriptions matching the custody model. The strategy drives the
/// first five; the orchestrator runs the revalidation.
pub fn buy_step_specs(kind: AccountKind) -> Vec<StepSpec> {
    use buy_steps::*;
    match kind {
        AccountKind::Eoa => vec![
            StepSpec::new(SETUP, "Setting up order execution"),
            StepSpec::new(ERC20_APPROVAL, "Checking token approval"),
            StepSpec::new(TRANSFER_MANAGER, "Approving transfer manager"),
            StepSpec::new(SUBMIT, "Awaiting signature and submitting trade"),
            StepSpec::new(CONFIRM, "Waiting for confirmation"),
            StepSpec::new(REVALIDATE, "Refreshing views"),
        ],
        AccountKind::Safe => vec![
            StepSpec::new(SETUP, "Setting up order execution"),
            StepSpec::new(ERC20_APPROVAL, "Preparing token approval"),
            StepSpec::new(TRANSFER_MANAGER, "Preparing transfer manager approval"),
            StepSpec::new(SUBMIT, "Queueing transaction in Safe"),
            StepSpec::new(CONFIRM, "Queued, awaiting co-signers"),
            StepSpec::new(REVALIDATE, "Refreshing views"),
        ],
    }
}

/// Inputs to one purchase
#[derive(Debug, Clone)]
pub struct BuyRequest {
    pub order: MarketplaceOrder,
    pub unit_amount: U256,
    pub price_per_unit: U256,

    /// Display name used in the dialog title
    pub hypercert_name: Option<String>,

    /// Total units of the hypercert, for share-of-total display
    pub total_units_in_hypercert: Option<U256>,
}

impl BuyRequest {
    pub fn dialog_title(&self) -> String {
        match &self.hypercert_name {
            Some(name) => format!("Buy {name}"),
            None => "Buy hypercert fraction".to_string(),
        }
    }
}

/// Terminal state of a purchase; the two variants are not interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuyOutcome {
    /// Direct execution: mined and confirmed on-chain
    Settled { tx_hash: B256 },
    /// Safe execution: queued for co-signing, not yet settled
    QueuedInSafe { safe_tx_hash: B256 },
}

/// Clients a strategy needs. `exchange` and the wallet's address/chain id
/// are preconditions checked before any step is shown.
#[derive(Clone)]
pub struct StrategyDeps {
    pub wallet: Arc<dyn WalletClient>,
    pub exchange: Option<Arc<dyn ExchangeClient>>,
    pub safe: Option<Arc<dyn SafeClient>>,
}

/// A purchase execution plan for one custody model
#[async_trait]
pub trait BuyStrategy: Send + Sync {
    async fn execute(
        &self,
        request: BuyRequest,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<BuyOutcome, EngineError>;
}

/// Pick the concrete strategy for the connected account. Selection happens
/// once per invocation; the active account can change between calls.
pub fn select_buy_strategy(deps: StrategyDeps) -> Result<Box<dyn BuyStrategy>, EngineError> {
    match deps.wallet.account_kind() {
        AccountKind::Eoa => Ok(Box::new(EoaBuyStrategy::new(deps))),
        AccountKind::Safe => {
            if deps.safe.is_none() {
                return Err(EngineError::precondition(
                    "Safe account selected but no Safe client configured",
                ));
            }
            Ok(Box::new(SafeBuyStrategy::new(deps)))
        }
    }
}

/// Check that everything a strategy needs is present, before any step list
/// is shown. On failure the dialog is force-closed and no partial step list
/// ever becomes visible.
pub(crate) async fn require_context(
    deps: &StrategyDeps,
    order: &MarketplaceOrder,
    progress: &StepProgress,
) -> Result<(Address, Arc<dyn ExchangeClient>), EngineError> {
    match check_context(deps, order) {
        Ok(out) => Ok(out),
        Err(error) => {
            progress.set_open(false).await;
            Err(error)
        }
    }
}

fn check_context(
    deps: &StrategyDeps,
    order: &MarketplaceOrder,
) -> Result<(Address, Arc<dyn ExchangeClient>), EngineError> {
    let exchange = deps
        .exchange
        .clone()
        .ok_or_else(|| EngineError::precondition("no exchange client"))?;
    let address = deps
        .wallet
        .address()
        .ok_or_else(|| EngineError::precondition("no connected wallet"))?;
    let chain_id = deps
        .wallet
        .chain_id()
        .ok_or_else(|| EngineError::precondition("no chain id"))?;
    if chain_id != order.chain_id {
        return Err(EngineError::precondition(format!(
            "wallet is on chain {}, order is on chain {}",
            chain_id, order.chain_id
        )));
    }
    Ok((address, exchange))
}
