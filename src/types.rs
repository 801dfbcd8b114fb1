//! Common types used throughout the engine

use alloy_primitives::{Address, Bytes, B256, U256};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Every hypercert is minted with this fixed total supply of units.
/// Allowlists must allocate exactly this many units across all entries.
pub static DEFAULT_TOTAL_UNITS: Lazy<U256> = Lazy::new(|| U256::from(10u64).pow(U256::from(18u64)));

/// Custody model of the currently connected account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    /// Plain externally-owned account; transactions are signed and sent directly
    Eoa,
    /// Safe multisig; transactions are queued for co-signing instead of sent
    Safe,
}

/// Currency an order is denominated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    /// Chain-native token (no ERC20 approval needed)
    Native,
    /// ERC20 token at the given contract address
    Erc20(Address),
}

impl Currency {
    /// The zero address is the marketplace convention for the native token.
    pub fn from_address(address: Address) -> Self {
        if address.is_zero() {
            Self::Native
        } else {
            Self::Erc20(address)
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Native => Address::ZERO,
            Self::Erc20(address) => *address,
        }
    }
}

/// Transfer restriction policy chosen at mint time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferRestrictions {
    AllowAll,
    DisallowAll,
    FromCreatorOnly,
}

/// A signed maker order listed on the marketplace
///
/// Created by the listing flow, consumed by buy flows. The `signer` is the
/// sole authority able to cancel or delete the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceOrder {
    /// Backend-assigned order id
    pub id: String,

    /// Chain the order is valid on
    pub chain_id: u64,

    /// Address that signed the maker order
    pub signer: Address,

    /// Hypercert collection contract
    pub collection: Address,

    /// Currency contract address (zero address = native token)
    pub currency: Address,

    /// Price per unit in the smallest denomination of `currency`
    pub price: U256,

    /// Token ids covered by this order
    pub item_ids: Vec<U256>,

    /// Validity window (unix seconds)
    pub start_time: u64,
    pub end_time: u64,

    /// Maker nonce, used for on-chain cancellation
    pub order_nonce: U256,

    /// EIP-712 maker signature
    pub signature: Bytes,

    /// Set by external validity checks; invalidated orders are not executable
    pub invalidated: bool,

    /// Validator error codes from the last validity check
    pub validator_codes: Vec<u16>,
}

impl MarketplaceOrder {
    pub fn currency(&self) -> Currency {
        Currency::from_address(self.currency)
    }

    /// Executable right now: not invalidated and inside the validity window.
    pub fn is_executable(&self, now: u64) -> bool {
        !self.invalidated && now >= self.start_time && now < self.end_time
    }
}

/// Taker side of a fractional sale, constructed against a maker order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakerOrder {
    /// Address receiving the purchased units
    pub recipient: Address,

    /// Number of units being bought
    pub unit_amount: U256,

    /// Price per unit the taker agrees to pay
    pub price_per_unit: U256,
}

impl TakerOrder {
    /// Total price for this bid
    pub fn total_price(&self) -> U256 {
        self.unit_amount * self.price_per_unit
    }
}

/// Parameters for creating a fractional sale maker ask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakerAskParams {
    pub collection: Address,
    pub currency: Address,
    pub item_id: U256,
    pub price_per_unit: U256,
    /// Smallest number of units a buyer may take
    pub min_unit_amount: U256,
    /// Largest number of units a buyer may take
    pub max_unit_amount: U256,
    pub start_time: u64,
    pub end_time: u64,
}

/// An on-chain owned slice of a hypercert's total units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypercertFraction {
    /// Claim id of the parent hypercert (chain-qualified)
    pub hypercert_id: String,

    /// Token id of this fraction
    pub fraction_id: U256,

    /// Current owner
    pub owner: Address,

    /// Units held by this fraction
    pub units: U256,
}

/// A raw contract call to be sent directly or queued in a Safe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl TransactionRequest {
    pub fn call(to: Address, data: Bytes) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data,
        }
    }
}

/// Result of waiting for a transaction to be mined
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: B256,
    pub block_number: u64,

    /// False when the transaction was mined but reverted
    pub success: bool,

    /// Raw revert data when available (ABI-encoded `Error(string)` or free text)
    pub revert_reason: Option<String>,
}
