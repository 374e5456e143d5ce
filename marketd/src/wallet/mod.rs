//! Wallet/node RPC surface
//!
//! The escrow engine consumes blockchain primitives through the [`WalletRpc`]
//! trait; the concrete [`WalletClient`] speaks JSON-RPC to a node, tests use
//! a mock. Every call is a suspension point with no implicit timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod client;

pub use client::WalletClient;

/// Wallet RPC failures
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed rpc response: {0}")]
    InvalidResponse(String),
}

/// Spendable output returned by `listunspent`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnspentOutput {
    pub txid: String,
    pub vout: u32,
    pub amount: f64,
    #[serde(default)]
    pub spendable: bool,
    #[serde(default)]
    pub solvable: bool,
}

/// Transaction input reference for `createrawtransaction`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
}

/// Per-input issue reported by `signrawtransaction`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SigningIssue {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    pub error: String,
}

/// Result of `signrawtransaction`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignedTransaction {
    pub hex: String,
    pub complete: bool,
    #[serde(default)]
    pub errors: Vec<SigningIssue>,
}

/// Output of a decoded transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecodedOutput {
    pub value: f64,
    #[serde(default)]
    pub n: u32,
}

/// Result of `decoderawtransaction`, reduced to the fields the protocol uses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecodedTransaction {
    pub txid: String,
    pub vout: Vec<DecodedOutput>,
}

/// Blockchain primitives consumed by the escrow protocol
///
/// Any JSON-RPC-capable node client satisfies this surface.
#[async_trait]
pub trait WalletRpc: Send + Sync {
    async fn list_unspent(
        &self,
        min_conf: u32,
        max_conf: u32,
        addresses: &[String],
        include_unsafe: bool,
    ) -> Result<Vec<UnspentOutput>, WalletError>;

    async fn add_multisig_address(
        &self,
        n_required: u32,
        pubkeys: &[String],
        label: &str,
    ) -> Result<String, WalletError>;

    async fn sign_raw_transaction(&self, hex: &str) -> Result<SignedTransaction, WalletError>;

    /// Broadcast a fully-signed transaction; returns the txid
    async fn send_raw_transaction(&self, hex: &str) -> Result<String, WalletError>;

    async fn decode_raw_transaction(&self, hex: &str) -> Result<DecodedTransaction, WalletError>;

    async fn create_raw_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &BTreeMap<String, f64>,
    ) -> Result<String, WalletError>;

    /// Fetch the hex of a confirmed transaction by txid
    async fn get_raw_transaction(&self, txid: &str) -> Result<String, WalletError>;

    async fn get_new_address(
        &self,
        labels: &[String],
        is_watch_only: bool,
    ) -> Result<String, WalletError>;
}
