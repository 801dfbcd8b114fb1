//! Client seams for external collaborators
//!
//! The orchestrator never talks to a chain, Safe, exchange contract, or the
//! backend directly; everything goes through the traits in this module. The
//! host application supplies wallet/exchange/Safe/hypercert clients (thin
//! adapters over its SDKs); a concrete reqwest-based [`HttpBackend`] for the
//! REST API ships in [`backend`].

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::allowlist::AllowlistEntry;
use crate::errors::EngineError;
use crate::types::{
    AccountKind, MakerAskParams, MarketplaceOrder, TakerOrder, TransactionReceipt,
    TransactionRequest, TransferRestrictions,
};

pub mod backend;

pub use backend::HttpBackend;

/// Connected wallet and chain access
///
/// `address`/`chain_id` return `None` when no wallet is connected; every
/// flow checks them as preconditions before declaring any step.
#[async_trait]
pub trait WalletClient: Send + Sync {
    fn address(&self) -> Option<Address>;
    fn chain_id(&self) -> Option<u64>;
    fn account_kind(&self) -> AccountKind;

    async fn sign_typed_data(&self, payload: &serde_json::Value) -> Result<Bytes, EngineError>;
    async fn sign_message(&self, message: &str) -> Result<Bytes, EngineError>;
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, EngineError>;
}

/// A maker ask plus the EIP-712 payload the maker still has to sign
#[derive(Debug, Clone)]
pub struct UnsignedMakerAsk {
    pub order: MarketplaceOrder,
    pub typed_data: serde_json::Value,
}

/// Marketplace exchange contract access
///
/// The `build_*` methods return raw calls for the Safe path, where actions
/// are queued for co-signing instead of sent from an EOA.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn create_fractional_sale_maker_ask(
        &self,
        params: &MakerAskParams,
        signer: Address,
    ) -> Result<UnsignedMakerAsk, EngineError>;

    /// Construct the taker side of a fractional purchase. Synchronous: pure
    /// validation against the maker order, no chain access.
    fn create_fractional_sale_taker_bid(
        &self,
        order: &MarketplaceOrder,
        recipient: Address,
        unit_amount: U256,
        price_per_unit: U256,
    ) -> Result<TakerOrder, EngineError>;

    /// Sign and submit the trade; returns the transaction hash.
    async fn execute_order(
        &self,
        order: &MarketplaceOrder,
        taker: &TakerOrder,
    ) -> Result<B256, EngineError>;

    /// Cancel maker nonces on-chain; returns the transaction hash.
    async fn cancel_orders(&self, nonces: &[U256]) -> Result<B256, EngineError>;

    async fn allowance(&self, currency: Address, owner: Address) -> Result<U256, EngineError>;
    async fn approve_erc20(&self, currency: Address, amount: U256) -> Result<B256, EngineError>;

    async fn is_transfer_manager_approved(&self, owner: Address) -> Result<bool, EngineError>;
    async fn grant_transfer_manager_approval(&self) -> Result<B256, EngineError>;

    async fn is_collection_approved(
        &self,
        collection: Address,
        owner: Address,
    ) -> Result<bool, EngineError>;
    async fn approve_all_collection_items(&self, collection: Address)
        -> Result<B256, EngineError>;

    fn build_erc20_approval(
        &self,
        currency: Address,
        amount: U256,
    ) -> Result<TransactionRequest, EngineError>;
    fn build_transfer_manager_approval(&self) -> Result<TransactionRequest, EngineError>;
    fn build_order_execution(
        &self,
        order: &MarketplaceOrder,
        taker: &TakerOrder,
    ) -> Result<TransactionRequest, EngineError>;
}

/// Safe multisig access: queues transactions for co-signing.
///
/// Queueing returns the Safe transaction hash; settlement happens later,
/// once enough co-signers approve. Nothing here waits for a receipt.
#[async_trait]
pub trait SafeClient: Send + Sync {
    fn safe_address(&self) -> Address;

    async fn queue_transaction(&self, request: &TransactionRequest) -> Result<B256, EngineError>;

    /// Queue several calls as one atomic Safe transaction batch.
    async fn queue_batch(&self, requests: &[TransactionRequest]) -> Result<B256, EngineError>;
}

/// Hypercert protocol access: mint, split, burn, transfer, attest
#[async_trait]
pub trait HypercertClient: Send + Sync {
    async fn mint(
        &self,
        metadata_uri: &str,
        total_units: U256,
        restrictions: TransferRestrictions,
        allowlist_uri: Option<&str>,
    ) -> Result<B256, EngineError>;

    /// Split a fraction into the given unit parts. Parts must sum to the
    /// fraction's current units; the contract enforces this too.
    async fn split_fraction(&self, fraction_id: U256, parts: &[U256]) -> Result<B256, EngineError>;

    async fn burn_fraction(&self, fraction_id: U256) -> Result<B256, EngineError>;

    async fn transfer_fraction(&self, fraction_id: U256, to: Address) -> Result<B256, EngineError>;

    /// Submit an evaluation attestation about a hypercert.
    async fn attest(
        &self,
        hypercert_id: &str,
        evaluation: &serde_json::Value,
    ) -> Result<B256, EngineError>;
}

/// Hyperboard create/update payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperboardPayload {
    pub title: String,
    pub collection_ids: Vec<String>,
    pub border_color: String,
}

/// User profile settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

/// Marketplace backend REST API
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Pin a validated allowlist to IPFS; returns the CID.
    async fn upload_allowlist(
        &self,
        entries: &[AllowlistEntry],
        total_units: U256,
    ) -> Result<String, EngineError>;

    /// Register a signed maker order; returns the backend order id.
    async fn register_order(&self, order: &MarketplaceOrder) -> Result<String, EngineError>;

    /// Delete an order record. `signature` proves the caller owns the order.
    async fn delete_order(&self, order_id: &str, signature: &Bytes) -> Result<(), EngineError>;

    async fn create_hyperboard(&self, payload: &HyperboardPayload) -> Result<String, EngineError>;
    async fn update_hyperboard(
        &self,
        board_id: &str,
        payload: &HyperboardPayload,
    ) -> Result<(), EngineError>;
    async fn delete_hyperboard(&self, board_id: &str, admin: Address) -> Result<(), EngineError>;

    async fn update_user_settings(
        &self,
        address: Address,
        settings: &UserSettings,
    ) -> Result<(), EngineError>;
}

/// Cache invalidation for server-rendered views
///
/// Revalidation is an explicit, awaited step in every mutation flow; a
/// failed revalidation is visible in the step list instead of leaving
/// stale views silently.
#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate(&self, paths: &[String]) -> Result<(), EngineError>;
}
