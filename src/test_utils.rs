//! Test utilities
//!
//! Deterministic mock implementations of every client seam, compiled only
//! for tests or under the `test_utils` feature. Mocks record the external
//! calls they receive so tests can assert call sequences, e.g. that the
//! Safe buy strategy never waits for a receipt.

#![cfg(any(test, feature = "test_utils"))]

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::json;

use crate::allowlist::AllowlistEntry;
use crate::clients::{
    BackendApi, ExchangeClient, HyperboardPayload, HypercertClient, Revalidator, SafeClient,
    UnsignedMakerAsk, UserSettings, WalletClient,
};
use crate::errors::EngineError;
use crate::types::{
    AccountKind, MakerAskParams, MarketplaceOrder, TakerOrder, TransactionReceipt,
    TransactionRequest, TransferRestrictions,
};

/// Shared call recorder; clones observe the same log.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.0.lock().unwrap().iter().any(|c| c == call)
    }
}

/// A native-currency maker order on chain 10 priced at 100 per unit
pub fn sample_order() -> MarketplaceOrder {
    MarketplaceOrder {
        id: "order-1".to_string(),
        chain_id: 10,
        signer: Address::repeat_byte(0x0a),
        collection: Address::repeat_byte(0x0b),
        currency: Address::ZERO,
        price: U256::from(100u64),
        item_ids: vec![U256::from(42u64)],
        start_time: 0,
        end_time: u64::MAX,
        order_nonce: U256::from(7u64),
        signature: Bytes::from(vec![0x01, 0x02]),
        invalidated: false,
        validator_codes: vec![],
    }
}

/// The same order denominated in an ERC20 token
pub fn sample_erc20_order() -> MarketplaceOrder {
    let mut order = sample_order();
    order.currency = Address::repeat_byte(0x0c);
    order
}

pub fn sample_fraction(owner: Address) -> crate::types::HypercertFraction {
    crate::types::HypercertFraction {
        hypercert_id: "10-0x0b-42".to_string(),
        fraction_id: U256::from(42u64),
        owner,
        units: U256::from(1_000u64),
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

pub struct MockWalletClient {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    pub kind: AccountKind,
    /// When true every signature request fails as a user rejection
    pub reject_signatures: bool,
    /// When false, receipts come back mined-but-reverted
    pub receipt_success: bool,
    pub log: CallLog,
}

impl MockWalletClient {
    pub fn connected() -> Self {
        Self {
            address: Some(Address::repeat_byte(0x01)),
            chain_id: Some(10),
            kind: AccountKind::Eoa,
            reject_signatures: false,
            receipt_success: true,
            log: CallLog::default(),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            address: None,
            chain_id: None,
            ..Self::connected()
        }
    }

    pub fn safe_owner() -> Self {
        Self {
            kind: AccountKind::Safe,
            ..Self::connected()
        }
    }
}

#[async_trait]
impl WalletClient for MockWalletClient {
    fn address(&self) -> Option<Address> {
        self.address
    }

    fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    fn account_kind(&self) -> AccountKind {
        self.kind
    }

    async fn sign_typed_data(&self, _payload: &serde_json::Value) -> Result<Bytes, EngineError> {
        self.log.record("sign_typed_data");
        if self.reject_signatures {
            return Err(EngineError::SignatureRejected(
                "user denied signature".to_string(),
            ));
        }
        Ok(Bytes::from(vec![0xaa; 65]))
    }

    async fn sign_message(&self, _message: &str) -> Result<Bytes, EngineError> {
        self.log.record("sign_message");
        if self.reject_signatures {
            return Err(EngineError::SignatureRejected(
                "user denied signature".to_string(),
            ));
        }
        Ok(Bytes::from(vec![0xbb; 65]))
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, EngineError> {
        self.log.record("wait_for_receipt");
        Ok(TransactionReceipt {
            tx_hash,
            block_number: 1_000,
            success: self.receipt_success,
            revert_reason: if self.receipt_success {
                None
            } else {
                Some("execution reverted".to_string())
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

pub struct MockExchangeClient {
    pub allowance: U256,
    pub transfer_manager_approved: bool,
    pub collection_approved: bool,
    /// Error every chain-writing call with this revert reason
    pub revert_with: Option<String>,
    pub log: CallLog,
    pub tx_counter: AtomicU8,
}

impl Default for MockExchangeClient {
    fn default() -> Self {
        Self {
            allowance: U256::MAX,
            transfer_manager_approved: true,
            collection_approved: true,
            revert_with: None,
            log: CallLog::default(),
            tx_counter: AtomicU8::new(0x10),
        }
    }
}

impl MockExchangeClient {
    fn next_tx_hash(&self) -> B256 {
        B256::repeat_byte(self.tx_counter.fetch_add(1, Ordering::SeqCst))
    }

    fn maybe_revert(&self) -> Result<(), EngineError> {
        match &self.revert_with {
            Some(reason) => Err(EngineError::revert(reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ExchangeClient for MockExchangeClient {
    async fn create_fractional_sale_maker_ask(
        &self,
        params: &MakerAskParams,
        signer: Address,
    ) -> Result<UnsignedMakerAsk, EngineError> {
        self.log.record("create_maker_ask");
        Ok(UnsignedMakerAsk {
            order: MarketplaceOrder {
                id: String::new(),
                chain_id: 10,
                signer,
                collection: params.collection,
                currency: params.currency,
                price: params.price_per_unit,
                item_ids: vec![params.item_id],
                start_time: params.start_time,
                end_time: params.end_time,
                order_nonce: U256::from(1u64),
                signature: Bytes::new(),
                invalidated: false,
                validator_codes: vec![],
            },
            typed_data: json!({ "primaryType": "Maker" }),
        })
    }

    fn create_fractional_sale_taker_bid(
        &self,
        order: &MarketplaceOrder,
        recipient: Address,
        unit_amount: U256,
        price_per_unit: U256,
    ) -> Result<TakerOrder, EngineError> {
        self.log.record("create_taker_bid");
        if unit_amount.is_zero() {
            return Err(EngineError::validation("unit amount must be non-zero"));
        }
        if price_per_unit < order.price {
            return Err(EngineError::validation("bid below asking price"));
        }
        Ok(TakerOrder {
            recipient,
            unit_amount,
            price_per_unit,
        })
    }

    async fn execute_order(
        &self,
        _order: &MarketplaceOrder,
        _taker: &TakerOrder,
    ) -> Result<B256, EngineError> {
        self.log.record("execute_order");
        self.maybe_revert()?;
        Ok(self.next_tx_hash())
    }

    async fn cancel_orders(&self, nonces: &[U256]) -> Result<B256, EngineError> {
        self.log.record(format!("cancel_orders:{}", nonces.len()));
        self.maybe_revert()?;
        Ok(self.next_tx_hash())
    }

    async fn allowance(&self, _currency: Address, _owner: Address) -> Result<U256, EngineError> {
        self.log.record("allowance");
        Ok(self.allowance)
    }

    async fn approve_erc20(&self, _currency: Address, _amount: U256) -> Result<B256, EngineError> {
        self.log.record("approve_erc20");
        self.maybe_revert()?;
        Ok(self.next_tx_hash())
    }

    async fn is_transfer_manager_approved(&self, _owner: Address) -> Result<bool, EngineError> {
        self.log.record("is_transfer_manager_approved");
        Ok(self.transfer_manager_approved)
    }

    async fn grant_transfer_manager_approval(&self) -> Result<B256, EngineError> {
        self.log.record("grant_transfer_manager_approval");
        self.maybe_revert()?;
        Ok(self.next_tx_hash())
    }

    async fn is_collection_approved(
        &self,
        _collection: Address,
        _owner: Address,
    ) -> Result<bool, EngineError> {
        self.log.record("is_collection_approved");
        Ok(self.collection_approved)
    }

    async fn approve_all_collection_items(
        &self,
        _collection: Address,
    ) -> Result<B256, EngineError> {
        self.log.record("approve_all_collection_items");
        self.maybe_revert()?;
        Ok(self.next_tx_hash())
    }

    fn build_erc20_approval(
        &self,
        currency: Address,
        _amount: U256,
    ) -> Result<TransactionRequest, EngineError> {
        self.log.record("build_erc20_approval");
        Ok(TransactionRequest::call(currency, Bytes::from(vec![0x09])))
    }

    fn build_transfer_manager_approval(&self) -> Result<TransactionRequest, EngineError> {
        self.log.record("build_transfer_manager_approval");
        Ok(TransactionRequest::call(
            Address::repeat_byte(0x0d),
            Bytes::from(vec![0x0a]),
        ))
    }

    fn build_order_execution(
        &self,
        order: &MarketplaceOrder,
        taker: &TakerOrder,
    ) -> Result<TransactionRequest, EngineError> {
        self.log.record("build_order_execution");
        let value = if order.currency().is_native() {
            taker.total_price()
        } else {
            U256::ZERO
        };
        Ok(TransactionRequest {
            to: Address::repeat_byte(0x0e),
            value,
            data: Bytes::from(vec![0x0b]),
        })
    }
}

// ---------------------------------------------------------------------------
// Safe
// ---------------------------------------------------------------------------

pub struct MockSafeClient {
    pub address: Address,
    pub log: CallLog,
    batches: Mutex<Vec<Vec<TransactionRequest>>>,
}

impl Default for MockSafeClient {
    fn default() -> Self {
        Self {
            address: Address::repeat_byte(0x5a),
            log: CallLog::default(),
            batches: Mutex::new(Vec::new()),
        }
    }
}

impl MockSafeClient {
    pub fn queued_batches(&self) -> Vec<Vec<TransactionRequest>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SafeClient for MockSafeClient {
    fn safe_address(&self) -> Address {
        self.address
    }

    async fn queue_transaction(&self, request: &TransactionRequest) -> Result<B256, EngineError> {
        self.log.record("queue_transaction");
        self.batches.lock().unwrap().push(vec![request.clone()]);
        Ok(B256::repeat_byte(0x5a))
    }

    async fn queue_batch(&self, requests: &[TransactionRequest]) -> Result<B256, EngineError> {
        self.log.record(format!("queue_batch:{}", requests.len()));
        self.batches.lock().unwrap().push(requests.to_vec());
        Ok(B256::repeat_byte(0x5b))
    }
}

// ---------------------------------------------------------------------------
// Hypercert protocol
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockHypercertClient {
    /// Name of the operation that should fail, if any
    pub fail_op: Option<&'static str>,
    pub log: CallLog,
}

impl MockHypercertClient {
    fn outcome(&self, op: &'static str, hash_byte: u8) -> Result<B256, EngineError> {
        self.log.record(op);
        if self.fail_op == Some(op) {
            return Err(EngineError::rpc(format!("{op} failed")));
        }
        Ok(B256::repeat_byte(hash_byte))
    }
}

#[async_trait]
impl HypercertClient for MockHypercertClient {
    async fn mint(
        &self,
        _metadata_uri: &str,
        _total_units: U256,
        _restrictions: TransferRestrictions,
        allowlist_uri: Option<&str>,
    ) -> Result<B256, EngineError> {
        if allowlist_uri.is_some() {
            self.log.record("mint:allowlisted");
        }
        self.outcome("mint", 0x21)
    }

    async fn split_fraction(
        &self,
        _fraction_id: U256,
        parts: &[U256],
    ) -> Result<B256, EngineError> {
        self.log.record(format!("split:{}", parts.len()));
        self.outcome("split_fraction", 0x22)
    }

    async fn burn_fraction(&self, _fraction_id: U256) -> Result<B256, EngineError> {
        self.outcome("burn_fraction", 0x23)
    }

    async fn transfer_fraction(
        &self,
        _fraction_id: U256,
        _to: Address,
    ) -> Result<B256, EngineError> {
        self.outcome("transfer_fraction", 0x24)
    }

    async fn attest(
        &self,
        _hypercert_id: &str,
        _evaluation: &serde_json::Value,
    ) -> Result<B256, EngineError> {
        self.outcome("attest", 0x25)
    }
}

// ---------------------------------------------------------------------------
// Backend and revalidator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockBackendApi {
    pub fail_with: Option<(u16, String)>,
    pub log: CallLog,
    uploads: Mutex<Vec<Vec<AllowlistEntry>>>,
}

impl MockBackendApi {
    pub fn failing(status: u16, message: &str) -> Self {
        Self {
            fail_with: Some((status, message.to_string())),
            ..Self::default()
        }
    }

    pub fn uploaded_allowlists(&self) -> Vec<Vec<AllowlistEntry>> {
        self.uploads.lock().unwrap().clone()
    }

    fn maybe_fail(&self) -> Result<(), EngineError> {
        match &self.fail_with {
            Some((status, message)) => Err(EngineError::Http {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BackendApi for MockBackendApi {
    async fn upload_allowlist(
        &self,
        entries: &[AllowlistEntry],
        _total_units: U256,
    ) -> Result<String, EngineError> {
        self.log.record("upload_allowlist");
        self.maybe_fail()?;
        self.uploads.lock().unwrap().push(entries.to_vec());
        Ok("bafybeigmock".to_string())
    }

    async fn register_order(&self, _order: &MarketplaceOrder) -> Result<String, EngineError> {
        self.log.record("register_order");
        self.maybe_fail()?;
        Ok("order-1".to_string())
    }

    async fn delete_order(&self, order_id: &str, _signature: &Bytes) -> Result<(), EngineError> {
        self.log.record(format!("delete_order:{order_id}"));
        self.maybe_fail()
    }

    async fn create_hyperboard(&self, _payload: &HyperboardPayload) -> Result<String, EngineError> {
        self.log.record("create_hyperboard");
        self.maybe_fail()?;
        Ok("board-1".to_string())
    }

    async fn update_hyperboard(
        &self,
        board_id: &str,
        _payload: &HyperboardPayload,
    ) -> Result<(), EngineError> {
        self.log.record(format!("update_hyperboard:{board_id}"));
        self.maybe_fail()
    }

    async fn delete_hyperboard(&self, board_id: &str, _admin: Address) -> Result<(), EngineError> {
        self.log.record(format!("delete_hyperboard:{board_id}"));
        self.maybe_fail()
    }

    async fn update_user_settings(
        &self,
        _address: Address,
        _settings: &UserSettings,
    ) -> Result<(), EngineError> {
        self.log.record("update_user_settings");
        self.maybe_fail()
    }
}

#[derive(Default)]
pub struct MockRevalidator {
    pub fail: bool,
    paths: Mutex<Vec<Vec<String>>>,
}

impl MockRevalidator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn revalidated_paths(&self) -> Vec<Vec<String>> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl Revalidator for MockRevalidator {
    async fn revalidate(&self, paths: &[String]) -> Result<(), EngineError> {
        if self.fail {
            return Err(EngineError::rpc("revalidation endpoint unreachable"));
        }
        self.paths.lock().unwrap().push(paths.to_vec());
        Ok(())
    }
}
