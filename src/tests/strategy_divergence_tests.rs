//! Buy strategy tests: EOA settlement vs Safe queueing
//!
//! The two strategies share one logical purchase but have different
//! completion criteria: a mined receipt for the EOA path, a queued Safe
//! transaction for the Safe path. These tests pin that divergence down.

use std::sync::Arc;

use alloy_primitives::U256;

use crate::errors::EngineError;
use crate::mutations::REVALIDATE;
use crate::progress::{CancelToken, StepProgress};
use crate::steps::StepState;
use crate::strategies::{
    buy_steps, select_buy_strategy, BuyOutcome, BuyRequest, StrategyDeps,
};
use crate::test_utils::{
    sample_erc20_order, sample_order, MockExchangeClient, MockSafeClient, MockWalletClient,
};
use crate::types::MarketplaceOrder;

fn request_for(order: MarketplaceOrder) -> BuyRequest {
    BuyRequest {
        unit_amount: U256::from(5u64),
        price_per_unit: order.price,
        hypercert_name: Some("Clean River Restoration".to_string()),
        total_units_in_hypercert: Some(U256::from(10_000u64)),
        order,
    }
}

fn eoa_deps(
    wallet: Arc<MockWalletClient>,
    exchange: Arc<MockExchangeClient>,
) -> StrategyDeps {
    StrategyDeps {
        wallet,
        exchange: Some(exchange),
        safe: None,
    }
}

#[tokio::test]
async fn eoa_native_buy_skips_approval_but_completes_the_step() {
    let wallet = Arc::new(MockWalletClient::connected());
    let exchange = Arc::new(MockExchangeClient::default());
    let strategy = select_buy_strategy(eoa_deps(wallet.clone(), exchange.clone())).unwrap();

    let progress = StepProgress::new("");
    let outcome = strategy
        .execute(request_for(sample_order()), &progress, &CancelToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, BuyOutcome::Settled { .. }));

    // Native currency: no allowance read, no approval transaction, yet the
    // approval step finishes as completed.
    assert!(!exchange.log.contains("allowance"));
    assert!(!exchange.log.contains("approve_erc20"));
    let snapshot = progress.snapshot().await;
    assert!(snapshot.steps[..5]
        .iter()
        .all(|s| s.state == StepState::Completed));
    // Revalidation belongs to the orchestrator, not the strategy.
    assert_eq!(snapshot.steps[5].id, REVALIDATE);
    assert_eq!(snapshot.steps[5].state, StepState::Idle);
    assert_eq!(snapshot.title, "Buy Clean River Restoration");

    // Settlement requires the mined receipt.
    assert!(wallet.log.contains("wait_for_receipt"));
}

#[tokio::test]
async fn eoa_insufficient_allowance_issues_approval_before_trade() {
    let wallet = Arc::new(MockWalletClient::connected());
    let exchange = Arc::new(MockExchangeClient {
        allowance: U256::ZERO,
        ..MockExchangeClient::default()
    });
    let strategy = select_buy_strategy(eoa_deps(wallet.clone(), exchange.clone())).unwrap();

    let progress = StepProgress::new("");
    strategy
        .execute(
            request_for(sample_erc20_order()),
            &progress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    let calls = exchange.log.calls();
    let approve_at = calls.iter().position(|c| c == "approve_erc20").unwrap();
    let execute_at = calls.iter().position(|c| c == "execute_order").unwrap();
    assert!(approve_at < execute_at, "approval must precede execution");

    // The approval receipt and the trade receipt were both awaited.
    assert_eq!(
        wallet
            .log
            .calls()
            .iter()
            .filter(|c| *c == "wait_for_receipt")
            .count(),
        2
    );
}

#[tokio::test]
async fn eoa_approval_revert_halts_run_at_the_approval_step() {
    let wallet = Arc::new(MockWalletClient {
        receipt_success: false,
        ..MockWalletClient::connected()
    });
    let exchange = Arc::new(MockExchangeClient {
        allowance: U256::ZERO,
        ..MockExchangeClient::default()
    });
    let strategy = select_buy_strategy(eoa_deps(wallet, exchange.clone())).unwrap();

    let progress = StepProgress::new("");
    let err = strategy
        .execute(
            request_for(sample_erc20_order()),
            &progress,
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ContractRevert { .. }));

    let snapshot = progress.snapshot().await;
    let errored = snapshot.errored_step().unwrap();
    assert_eq!(errored.id, buy_steps::ERC20_APPROVAL);
    assert!(snapshot.open, "dialog stays open for inspection");

    // Nothing after the failed step ran.
    assert!(!exchange.log.contains("is_transfer_manager_approved"));
    assert!(!exchange.log.contains("execute_order"));
}

#[tokio::test]
async fn safe_buy_queues_batch_and_never_waits_for_receipt() {
    let wallet = Arc::new(MockWalletClient::safe_owner());
    let exchange = Arc::new(MockExchangeClient {
        allowance: U256::ZERO,
        transfer_manager_approved: false,
        ..MockExchangeClient::default()
    });
    let safe = Arc::new(MockSafeClient::default());
    let deps = StrategyDeps {
        wallet: wallet.clone(),
        exchange: Some(exchange.clone()),
        safe: Some(safe.clone()),
    };
    let strategy = select_buy_strategy(deps).unwrap();

    let progress = StepProgress::new("");
    let outcome = strategy
        .execute(
            request_for(sample_erc20_order()),
            &progress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, BuyOutcome::QueuedInSafe { .. }));

    // The key divergence: queued means queued, not settled.
    assert!(!wallet.log.contains("wait_for_receipt"));
    assert!(!exchange.log.contains("execute_order"));

    // Approval, transfer-manager approval and execution went out as one
    // atomic batch.
    let batches = safe.queued_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);

    let snapshot = progress.snapshot().await;
    assert!(snapshot.steps[..5]
        .iter()
        .all(|s| s.state == StepState::Completed));
    assert_eq!(snapshot.steps[5].state, StepState::Idle);
}

#[tokio::test]
async fn safe_buy_with_no_pending_approvals_queues_single_transaction() {
    let wallet = Arc::new(MockWalletClient::safe_owner());
    let exchange = Arc::new(MockExchangeClient::default());
    let safe = Arc::new(MockSafeClient::default());
    let deps = StrategyDeps {
        wallet,
        exchange: Some(exchange),
        safe: Some(safe.clone()),
    };
    let strategy = select_buy_strategy(deps).unwrap();

    let progress = StepProgress::new("");
    strategy
        .execute(request_for(sample_order()), &progress, &CancelToken::new())
        .await
        .unwrap();

    assert!(safe.log.contains("queue_transaction"));
    let batches = safe.queued_batches();
    assert_eq!(batches[0].len(), 1);
}

#[tokio::test]
async fn missing_wallet_fails_before_dialog_opens() {
    let wallet = Arc::new(MockWalletClient::disconnected());
    let exchange = Arc::new(MockExchangeClient::default());
    let strategy = select_buy_strategy(eoa_deps(wallet, exchange.clone())).unwrap();

    let progress = StepProgress::new("");
    let err = strategy
        .execute(request_for(sample_order()), &progress, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));

    let snapshot = progress.snapshot().await;
    assert!(!snapshot.open, "dialog must never become visible");
    assert!(snapshot.steps.is_empty(), "no partial step list is shown");
    assert!(exchange.log.calls().is_empty(), "no side effects");
}

#[tokio::test]
async fn chain_mismatch_is_a_precondition_failure() {
    let wallet = Arc::new(MockWalletClient {
        chain_id: Some(1),
        ..MockWalletClient::connected()
    });
    let exchange = Arc::new(MockExchangeClient::default());
    let strategy = select_buy_strategy(eoa_deps(wallet, exchange)).unwrap();

    let progress = StepProgress::new("");
    let err = strategy
        .execute(request_for(sample_order()), &progress, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("chain 1"));
}

#[tokio::test]
async fn safe_account_without_safe_client_is_rejected_at_selection() {
    let deps = StrategyDeps {
        wallet: Arc::new(MockWalletClient::safe_owner()),
        exchange: Some(Arc::new(MockExchangeClient::default())),
        safe: None,
    };
    let err = match select_buy_strategy(deps) {
        Ok(_) => panic!("selection must fail without a Safe client"),
        Err(err) => err,
    };
    assert!(matches!(err, EngineError::Precondition(_)));
}

#[tokio::test]
async fn cancelled_token_aborts_the_active_step() {
    let wallet = Arc::new(MockWalletClient::connected());
    let exchange = Arc::new(MockExchangeClient::default());
    let strategy = select_buy_strategy(eoa_deps(wallet, exchange)).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();

    let progress = StepProgress::new("");
    let err = strategy
        .execute(request_for(sample_order()), &progress, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));

    let snapshot = progress.snapshot().await;
    let errored = snapshot.errored_step().unwrap();
    assert_eq!(errored.id, buy_steps::SETUP);
    assert_eq!(
        errored.state,
        StepState::Error {
            message: "Operation cancelled".to_string()
        }
    );
}
