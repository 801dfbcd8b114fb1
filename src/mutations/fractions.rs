//! Mint, split, burn and transfer flows for hypercert fractions,
//! plus allowlist creation

use alloy_primitives::{Address, B256, U256};

use crate::allowlist::{validate_entries, AllowlistEntry};
use crate::errors::EngineError;
use crate::observability::FlowContext;
use crate::progress::{run_step, CancelToken, StepProgress};
use crate::steps::StepSpec;
use crate::types::{HypercertFraction, TransferRestrictions, DEFAULT_TOTAL_UNITS};

use super::{Orchestrator, REVALIDATE};

/// Inputs to the mint flow. Metadata is already pinned; the allowlist, when
/// present, is validated client-side and pinned as part of the flow.
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub metadata_uri: String,
    pub name: String,
    pub restrictions: TransferRestrictions,
    pub allowlist: Option<Vec<AllowlistEntry>>,
}

use super::step_ids;

impl Orchestrator {
    /// Mint a new hypercert, optionally gated by an allowlist.
    pub async fn mint_hypercert(
        &self,
        request: MintRequest,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<B256, EngineError> {
        self.require_wallet()?;
        let hypercerts = self.require_hypercerts()?;

        // Validation errors never reach the step dialog.
        if let Some(entries) = &request.allowlist {
            validate_entries(entries, *DEFAULT_TOTAL_UNITS)?;
        }

        let ctx = FlowContext::new("mint-hypercert");
        ctx.log_started();

        let mut specs = Vec::new();
        if request.allowlist.is_some() {
            specs.push(StepSpec::new(step_ids::UPLOAD_ALLOWLIST, "Uploading allowlist"));
        }
        specs.push(StepSpec::new(step_ids::SUBMIT, "Minting hypercert"));
        specs.push(StepSpec::new(step_ids::CONFIRM, "Waiting for confirmation"));
        specs.push(StepSpec::new(REVALIDATE, "Refreshing views"));

        progress.set_title(format!("Mint {}", request.name)).await;
        progress.set_steps(specs).await;
        progress.set_open(true).await;

        let allowlist_uri = match &request.allowlist {
            Some(entries) => {
                let cid = run_step(progress, cancel, &ctx, step_ids::UPLOAD_ALLOWLIST, async {
                    self.backend()
                        .upload_allowlist(entries, *DEFAULT_TOTAL_UNITS)
                        .await
                })
                .await?;
                Some(format!("ipfs://{cid}"))
            }
            None => None,
        };

        let tx_hash = run_step(progress, cancel, &ctx, step_ids::SUBMIT, async {
            hypercerts
                .mint(
                    &request.metadata_uri,
                    *DEFAULT_TOTAL_UNITS,
                    request.restrictions,
                    allowlist_uri.as_deref(),
                )
                .await
        })
        .await?;

        self.confirm_receipt(progress, cancel, &ctx, tx_hash).await?;
        self.finish(progress, cancel, &ctx, vec!["/hypercerts".to_string()])
            .await?;
        Ok(tx_hash)
    }

    /// Split a fraction into parts. Parts must sum to the fraction's units;
    /// total units across fractions of one hypercert never change.
    pub async fn split_fraction(
        &self,
        fraction: &HypercertFraction,
        parts: Vec<U256>,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<B256, EngineError> {
        let (owner, _) = self.require_wallet()?;
        let hypercerts = self.require_hypercerts()?;
        self.require_fraction_owner(fraction, owner)?;

        if parts.len() < 2 {
            return Err(EngineError::validation("split needs at least two parts"));
        }
        let mut sum = U256::ZERO;
        for part in &parts {
            if part.is_zero() {
                return Err(EngineError::validation("split parts must be non-zero"));
            }
            sum = sum
                .checked_add(*part)
                .ok_or_else(|| EngineError::validation("split parts overflow"))?;
        }
        if sum != fraction.units {
            return Err(EngineError::validation(format!(
                "split parts sum to {sum}, fraction holds {}",
                fraction.units
            )));
        }

        let ctx = FlowContext::new("split-fraction");
        self.simple_chain_flow(
            progress,
            cancel,
            &ctx,
            "Split fraction",
            "Splitting fraction",
            async { hypercerts.split_fraction(fraction.fraction_id, &parts).await },
            vec![format!("/hypercerts/{}", fraction.hypercert_id)],
        )
        .await
    }

    /// Burn a fraction the connected wallet owns.
    pub async fn burn_fraction(
        &self,
        fraction: &HypercertFraction,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<B256, EngineError> {
        let (owner, _) = self.require_wallet()?;
        let hypercerts = self.require_hypercerts()?;
        self.require_fraction_owner(fraction, owner)?;

        let ctx = FlowContext::new("burn-fraction");
        self.simple_chain_flow(
            progress,
            cancel,
            &ctx,
            "Burn fraction",
            "Burning fraction",
            async { hypercerts.burn_fraction(fraction.fraction_id).await },
            vec![format!("/hypercerts/{}", fraction.hypercert_id)],
        )
        .await
    }

    /// Transfer a fraction to another address.
    pub async fn transfer_fraction(
        &self,
        fraction: &HypercertFraction,
        to: Address,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<B256, EngineError> {
        let (owner, _) = self.require_wallet()?;
        let hypercerts = self.require_hypercerts()?;
        self.require_fraction_owner(fraction, owner)?;

        if to.is_zero() {
            return Err(EngineError::validation("cannot transfer to the zero address"));
        }
        if to == owner {
            return Err(EngineError::validation("recipient is already the owner"));
        }

        let ctx = FlowContext::new("transfer-fraction");
        self.simple_chain_flow(
            progress,
            cancel,
            &ctx,
            "Transfer fraction",
            "Transferring fraction",
            async { hypercerts.transfer_fraction(fraction.fraction_id, to).await },
            vec![format!("/hypercerts/{}", fraction.hypercert_id)],
        )
        .await
    }

    /// Validate and pin an allowlist on its own, outside a mint. Returns the
    /// IPFS CID; the list is immutable once pinned.
    pub async fn create_allowlist(
        &self,
        entries: Vec<AllowlistEntry>,
        total_units: U256,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<String, EngineError> {
        self.require_wallet()?;
        validate_entries(&entries, total_units)?;

        let ctx = FlowContext::new("create-allowlist");
        ctx.log_started();

        progress.set_title("Create allowlist").await;
        progress
            .set_steps(vec![
                StepSpec::new(step_ids::UPLOAD_ALLOWLIST, "Uploading allowlist"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        let cid = run_step(progress, cancel, &ctx, step_ids::UPLOAD_ALLOWLIST, async {
            self.backend().upload_allowlist(&entries, total_units).await
        })
        .await?;

        self.finish(progress, cancel, &ctx, vec!["/hypercerts".to_string()])
            .await?;
        Ok(cid)
    }

    // ------------------------------------------------------------------

    fn require_fraction_owner(
        &self,
        fraction: &HypercertFraction,
        owner: Address,
    ) -> Result<(), EngineError> {
        if fraction.owner != owner {
            return Err(EngineError::Unauthorized(format!(
                "fraction {} is owned by {}",
                fraction.fraction_id, fraction.owner
            )));
        }
        Ok(())
    }

    /// The submit/confirm/revalidate shape shared by single-transaction
    /// chain flows.
    async fn simple_chain_flow<F>(
        &self,
        progress: &StepProgress,
        cancel: &CancelToken,
        ctx: &FlowContext,
        title: &str,
        submit_description: &str,
        submit: F,
        revalidate_paths: Vec<String>,
    ) -> Result<B256, EngineError>
    where
        F: std::future::Future<Output = Result<B256, EngineError>>,
    {
        ctx.log_started();
        progress.set_title(title).await;
        progress
            .set_steps(vec![
                StepSpec::new(step_ids::SUBMIT, submit_description),
                StepSpec::new(step_ids::CONFIRM, "Waiting for confirmation"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        let tx_hash = run_step(progress, cancel, ctx, step_ids::SUBMIT, submit).await?;
        self.confirm_receipt(progress, cancel, ctx, tx_hash).await?;
        self.finish(progress, cancel, ctx, revalidate_paths).await?;
        Ok(tx_hash)
    }

    pub(crate) async fn confirm_receipt(
        &self,
        progress: &StepProgress,
        cancel: &CancelToken,
        ctx: &FlowContext,
        tx_hash: B256,
    ) -> Result<(), EngineError> {
        run_step(progress, cancel, ctx, step_ids::CONFIRM, async {
            let receipt = self.wallet().wait_for_receipt(tx_hash).await?;
            if !receipt.success {
                return Err(EngineError::revert(
                    receipt
                        .revert_reason
                        .as_deref()
                        .unwrap_or("transaction reverted"),
                ));
            }
            Ok(())
        })
        .await
    }
}
