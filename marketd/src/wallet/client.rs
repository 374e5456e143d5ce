//! JSON-RPC wallet client
//!
//! Thin reqwest-based client for a bitcoind-compatible wallet node. Each
//! method is a single RPC round trip; errors reported by the node are
//! surfaced as [`WalletError::Rpc`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{
    DecodedTransaction, SignedTransaction, TxInput, UnspentOutput, WalletError, WalletRpc,
};

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// reqwest-backed JSON-RPC client
pub struct WalletClient {
    http: reqwest::Client,
    url: String,
    user: String,
    password: String,
    next_id: AtomicU64,
}

impl WalletClient {
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            user: user.into(),
            password: password.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, WalletError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "wallet rpc call");

        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .http
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(WalletError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| WalletError::InvalidResponse(format!("{method}: empty result")))
    }
}

#[async_trait]
impl WalletRpc for WalletClient {
    async fn list_unspent(
        &self,
        min_conf: u32,
        max_conf: u32,
        addresses: &[String],
        include_unsafe: bool,
    ) -> Result<Vec<UnspentOutput>, WalletError> {
        self.call(
            "listunspent",
            json!([min_conf, max_conf, addresses, include_unsafe]),
        )
        .await
    }

    async fn add_multisig_address(
        &self,
        n_required: u32,
        pubkeys: &[String],
        label: &str,
    ) -> Result<String, WalletError> {
        self.call("addmultisigaddress", json!([n_required, pubkeys, label]))
            .await
    }

    async fn sign_raw_transaction(&self, hex: &str) -> Result<SignedTransaction, WalletError> {
        self.call("signrawtransaction", json!([hex])).await
    }

    async fn send_raw_transaction(&self, hex: &str) -> Result<String, WalletError> {
        self.call("sendrawtransaction", json!([hex])).await
    }

    async fn decode_raw_transaction(&self, hex: &str) -> Result<DecodedTransaction, WalletError> {
        self.call("decoderawtransaction", json!([hex])).await
    }

    async fn create_raw_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &BTreeMap<String, f64>,
    ) -> Result<String, WalletError> {
        self.call("createrawtransaction", json!([inputs, outputs]))
            .await
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<String, WalletError> {
        self.call("getrawtransaction", json!([txid])).await
    }

    async fn get_new_address(
        &self,
        labels: &[String],
        is_watch_only: bool,
    ) -> Result<String, WalletError> {
        self.call("getnewaddress", json!([labels, is_watch_only]))
            .await
    }
}
