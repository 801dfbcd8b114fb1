//! Hyperboard CRUD, user settings, and evaluation attestations

use alloy_primitives::B256;

use crate::clients::{HyperboardPayload, UserSettings};
use crate::errors::EngineError;
use crate::observability::FlowContext;
use crate::progress::{run_step, CancelToken, StepProgress};
use crate::steps::StepSpec;

use super::{step_ids, Orchestrator, REVALIDATE};

const SIGN: &str = "sign-message";

fn validate_board(payload: &HyperboardPayload) -> Result<(), EngineError> {
    if payload.title.trim().is_empty() {
        return Err(EngineError::validation("hyperboard title is required"));
    }
    if payload.collection_ids.is_empty() {
        return Err(EngineError::validation(
            "hyperboard needs at least one collection",
        ));
    }
    Ok(())
}

impl Orchestrator {
    pub async fn create_hyperboard(
        &self,
        payload: HyperboardPayload,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<String, EngineError> {
        let (admin, _) = self.require_wallet()?;
        validate_board(&payload)?;

        let ctx = FlowContext::new("create-hyperboard");
        ctx.log_started();

        progress.set_title("Create hyperboard").await;
        progress
            .set_steps(vec![
                StepSpec::new(step_ids::SUBMIT, "Creating hyperboard"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        let board_id = run_step(progress, cancel, &ctx, step_ids::SUBMIT, async {
            self.backend().create_hyperboard(&payload).await
        })
        .await?;

        self.finish(
            progress,
            cancel,
            &ctx,
            vec![
                "/hyperboards".to_string(),
                format!("/profile/{admin}/hyperboards"),
            ],
        )
        .await?;
        Ok(board_id)
    }

    pub async fn update_hyperboard(
        &self,
        board_id: &str,
        payload: HyperboardPayload,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        self.require_wallet()?;
        validate_board(&payload)?;

        let ctx = FlowContext::new("update-hyperboard");
        ctx.log_started();

        progress.set_title("Update hyperboard").await;
        progress
            .set_steps(vec![
                StepSpec::new(step_ids::SUBMIT, "Updating hyperboard"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        run_step(progress, cancel, &ctx, step_ids::SUBMIT, async {
            self.backend().update_hyperboard(board_id, &payload).await
        })
        .await?;

        self.finish(
            progress,
            cancel,
            &ctx,
            vec![format!("/hyperboards/{board_id}")],
        )
        .await
    }

    pub async fn delete_hyperboard(
        &self,
        board_id: &str,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        let (admin, _) = self.require_wallet()?;

        let ctx = FlowContext::new("delete-hyperboard");
        ctx.log_started();

        progress.set_title("Delete hyperboard").await;
        progress
            .set_steps(vec![
                StepSpec::new(step_ids::SUBMIT, "Deleting hyperboard"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        run_step(progress, cancel, &ctx, step_ids::SUBMIT, async {
            self.backend().delete_hyperboard(board_id, admin).await
        })
        .await?;

        self.finish(
            progress,
            cancel,
            &ctx,
            vec![
                "/hyperboards".to_string(),
                format!("/profile/{admin}/hyperboards"),
            ],
        )
        .await
    }

    /// Update profile settings. The backend requires a fresh signature so a
    /// profile can only be changed by its owner.
    pub async fn update_user_settings(
        &self,
        settings: UserSettings,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        let (address, _) = self.require_wallet()?;

        let ctx = FlowContext::new("update-user-settings");
        ctx.log_started();

        progress.set_title("Update profile").await;
        progress
            .set_steps(vec![
                StepSpec::new(SIGN, "Awaiting signature"),
                StepSpec::new(step_ids::SUBMIT, "Saving settings"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        // The wallet signature is requested but the backend carries its own
        // session auth; the signed message is proof of address ownership.
        run_step(progress, cancel, &ctx, SIGN, async {
            self.wallet()
                .sign_message(&format!("Update settings for {address}"))
                .await
        })
        .await?;

        run_step(progress, cancel, &ctx, step_ids::SUBMIT, async {
            self.backend().update_user_settings(address, &settings).await
        })
        .await?;

        self.finish(progress, cancel, &ctx, vec![format!("/profile/{address}")])
            .await
    }

    /// Submit an evaluation attestation about a hypercert.
    pub async fn submit_attestation(
        &self,
        hypercert_id: &str,
        evaluation: serde_json::Value,
        progress: &StepProgress,
        cancel: &CancelToken,
    ) -> Result<B256, EngineError> {
        self.require_wallet()?;
        let hypercerts = self.require_hypercerts()?;

        let ctx = FlowContext::new("submit-attestation");
        ctx.log_started();

        progress.set_title("Submit evaluation").await;
        progress
            .set_steps(vec![
                StepSpec::new(step_ids::SUBMIT, "Submitting attestation"),
                StepSpec::new(step_ids::CONFIRM, "Waiting for confirmation"),
                StepSpec::new(REVALIDATE, "Refreshing views"),
            ])
            .await;
        progress.set_open(true).await;

        let tx_hash = run_step(progress, cancel, &ctx, step_ids::SUBMIT, async {
            hypercerts.attest(hypercert_id, &evaluation).await
        })
        .await?;

        self.confirm_receipt(progress, cancel, &ctx, tx_hash).await?;
        self.finish(
            progress,
            cancel,
            &ctx,
            vec![format!("/hypercerts/{hypercert_id}")],
        )
        .await?;
        Ok(tx_hash)
    }
}
