//! Ethereum-style JSON-RPC ledger client

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::types::{LedgerClient, LedgerError, LedgerResult, Receipt, TxHandle};

/// Local development node
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: Option<String>,
    block_number: Option<String>,
    status: Option<String>,
}

/// Ledger client speaking `eth_sendRawTransaction` / `eth_getTransactionReceipt`
pub struct JsonRpcLedger {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    pub fn new(url: impl Into<String>) -> LedgerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> LedgerResult<Option<T>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response: RpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    async fn submit(&self, raw_tx: &[u8]) -> LedgerResult<TxHandle> {
        let raw_hex = format!("0x{}", hex::encode(raw_tx));
        tracing::debug!(url = %self.url, bytes = raw_tx.len(), "eth_sendRawTransaction");

        let hash: Option<String> = self
            .call("eth_sendRawTransaction", json!([raw_hex]))
            .await?;

        hash.map(TxHandle)
            .ok_or_else(|| LedgerError::InvalidResponse("missing transaction hash".into()))
    }

    async fn get_receipt(&self, handle: &TxHandle) -> LedgerResult<Option<Receipt>> {
        let raw: Option<RawReceipt> = self
            .call("eth_getTransactionReceipt", json!([handle.as_str()]))
            .await?;

        raw.map(|raw| receipt_from_raw(raw, handle)).transpose()
    }
}

fn receipt_from_raw(raw: RawReceipt, handle: &TxHandle) -> LedgerResult<Receipt> {
    let block_number = raw.block_number.as_deref().map(parse_quantity).transpose()?;
    let success = raw
        .status
        .as_deref()
        .map(parse_quantity)
        .transpose()?
        .map(|status| status == 1);

    Ok(Receipt {
        tx_hash: raw.transaction_hash.unwrap_or_else(|| handle.0.clone()),
        block_number,
        success,
    })
}

/// Parse a JSON-RPC hex quantity such as `0x1b4`
fn parse_quantity(quantity: &str) -> LedgerResult<u64> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::InvalidResponse(format!("quantity without 0x: {quantity}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::InvalidResponse(format!("bad quantity {quantity}: {e}")))
}
