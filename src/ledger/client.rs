//! JSON-RPC client for the ledger node with timeout and failover handling.
//!
//! # Responsibilities
//! - Speak JSON-RPC 2.0 over HTTP to a primary endpoint plus failovers
//! - Bound every call with the configured timeout
//! - Translate HTTP statuses and node error objects into `LedgerError`
//!   so the submitter can tell transient failures from permanent ones

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

use crate::ledger::rpc::RpcTransport;
use crate::ledger::transaction::Transaction;
use crate::ledger::types::{
    AccountSnapshot, Commitment, FreshnessToken, Hash, LedgerConfig, LedgerError, LedgerResult, Pubkey,
    Signature, SignatureStatus,
};

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// `{ context, value }` wrapper used by most account-level methods.
#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiAccount {
    lamports: u64,
    owner: String,
    data: (String, String),
    executable: bool,
}

#[derive(Deserialize)]
struct KeyedUiAccount {
    pubkey: String,
    account: UiAccount,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiSignatureStatus {
    slot: u64,
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<Commitment>,
}

impl TryFrom<UiAccount> for AccountSnapshot {
    type Error = LedgerError;

    fn try_from(account: UiAccount) -> LedgerResult<Self> {
        let (encoded, encoding) = account.data;
        if encoding != "base64" {
            return Err(LedgerError::InvalidResponse(format!(
                "unexpected account data encoding '{}'",
                encoding
            )));
        }
        let data = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| LedgerError::InvalidResponse(format!("account data is not base64: {}", e)))?;
        Ok(AccountSnapshot {
            lamports: account.lamports,
            owner: account.owner.parse()?,
            data,
            executable: account.executable,
        })
    }
}

/// Ledger JSON-RPC client with failover support.
#[derive(Clone)]
pub struct JsonRpcClient {
    /// Endpoints (primary + failovers).
    endpoints: Vec<url::Url>,
    /// Shared HTTP connection pool.
    http: reqwest::Client,
    /// Configuration.
    config: LedgerConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl JsonRpcClient {
    /// Create a new client.
    ///
    /// The primary URL must parse; unparsable failover URLs are skipped with
    /// a warning. No request is made until the first call.
    pub fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut endpoints = Vec::new();

        // 1. Add primary endpoint
        let primary: url::Url = config.rpc_url.parse().map_err(|e| {
            LedgerError::Transport(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        endpoints.push(primary);

        // 2. Add failover endpoints
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to create HTTP client: {}", e)))?;

        tracing::info!(
            rpc_url = %config.rpc_url,
            failovers = endpoints.len() - 1,
            commitment = config.commitment.as_str(),
            "Ledger RPC client initialized"
        );

        Ok(Self {
            endpoints,
            http,
            config,
            timeout_duration,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn commitment(&self) -> &'static str {
        self.config.commitment.as_str()
    }

    /// Issue a call, moving to the next endpoint only on transport-level failures.
    ///
    /// A node that answered with an error object is authoritative; asking
    /// another node the same question would not change the answer.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> LedgerResult<T> {
        let mut failures: Vec<LedgerError> = Vec::new();

        for (i, endpoint) in self.endpoints.iter().enumerate() {
            match self.call_endpoint(endpoint, method, &params).await {
                Ok(result) => return Ok(result),
                Err(e) if is_endpoint_failure(&e) => {
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC endpoint failed, trying next");
                    failures.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        if failures.len() == 1 {
            return Err(failures.remove(0));
        }
        let summary = failures.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
        Err(LedgerError::AllEndpointsFailed(summary))
    }

    async fn call_endpoint<T: DeserializeOwned>(
        &self,
        endpoint: &url::Url,
        method: &str,
        params: &Value,
    ) -> LedgerResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: fastrand::u64(..),
            method,
            params,
        };

        let fut = async {
            let response = self
                .http
                .post(endpoint.clone())
                .json(&request)
                .send()
                .await
                .map_err(|e| LedgerError::Transport(e.to_string()))?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LedgerError::RateLimited);
            }
            if !status.is_success() {
                return Err(LedgerError::Http(status.as_u16()));
            }

            response
                .json::<JsonRpcResponse<T>>()
                .await
                .map_err(|e| LedgerError::InvalidResponse(format!("{}: {}", method, e)))
        };

        let body = match timeout(self.timeout_duration, fut).await {
            Ok(result) => result?,
            Err(_) => return Err(LedgerError::Timeout(self.config.rpc_timeout_secs)),
        };

        if let Some(error) = body.error {
            return Err(classify_node_error(error));
        }
        body.result
            .ok_or_else(|| LedgerError::InvalidResponse(format!("{}: response has neither result nor error", method)))
    }
}

fn is_endpoint_failure(error: &LedgerError) -> bool {
    match error {
        LedgerError::Transport(_) | LedgerError::Timeout(_) | LedgerError::RateLimited => true,
        LedgerError::Http(status) => *status >= 500,
        _ => false,
    }
}

fn classify_node_error(error: JsonRpcErrorObject) -> LedgerError {
    let data_mentions_blockhash = error
        .data
        .as_ref()
        .map(|d| d.to_string().contains("BlockhashNotFound"))
        .unwrap_or(false);

    if error.message.contains("Blockhash not found") || data_mentions_blockhash {
        return LedgerError::BlockhashNotFound;
    }
    let data_mentions_processed = error
        .data
        .as_ref()
        .map(|d| d.to_string().contains("AlreadyProcessed"))
        .unwrap_or(false);
    if error.message.contains("already been processed") || data_mentions_processed {
        return LedgerError::AlreadyProcessed;
    }
    LedgerError::Node {
        code: error.code,
        message: error.message,
    }
}

#[async_trait]
impl RpcTransport for JsonRpcClient {
    async fn get_account_info(&self, address: &Pubkey) -> LedgerResult<Option<AccountSnapshot>> {
        let params = json!([address.to_string(), { "encoding": "base64", "commitment": self.commitment() }]);
        let response: WithContext<Option<UiAccount>> = self.call("getAccountInfo", params).await?;
        response.value.map(AccountSnapshot::try_from).transpose()
    }

    async fn get_program_accounts(&self, program_id: &Pubkey) -> LedgerResult<Vec<(Pubkey, AccountSnapshot)>> {
        let params = json!([program_id.to_string(), { "encoding": "base64", "commitment": self.commitment() }]);
        let accounts: Vec<KeyedUiAccount> = self.call("getProgramAccounts", params).await?;
        accounts
            .into_iter()
            .map(|keyed| Ok((keyed.pubkey.parse()?, AccountSnapshot::try_from(keyed.account)?)))
            .collect()
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> LedgerResult<u64> {
        self.call("getMinimumBalanceForRentExemption", json!([data_len])).await
    }

    async fn get_latest_blockhash(&self) -> LedgerResult<FreshnessToken> {
        let params = json!([{ "commitment": self.commitment() }]);
        let response: WithContext<UiBlockhash> = self.call("getLatestBlockhash", params).await?;
        Ok(FreshnessToken {
            blockhash: response.value.blockhash.parse::<Hash>()?,
            expiry_height: response.value.last_valid_block_height,
        })
    }

    async fn get_block_height(&self) -> LedgerResult<u64> {
        self.call("getBlockHeight", json!([{ "commitment": self.commitment() }])).await
    }

    async fn send_transaction(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        let encoded = BASE64.encode(transaction.serialize());
        let params = json!([encoded, {
            "encoding": "base64",
            "skipPreflight": false,
            "preflightCommitment": self.commitment(),
            "maxRetries": 0
        }]);
        let signature: String = self.call("sendTransaction", params).await?;
        signature.parse()
    }

    async fn get_signature_status(&self, signature: &Signature) -> LedgerResult<Option<SignatureStatus>> {
        let params = json!([[signature.to_string()], { "searchTransactionHistory": false }]);
        let response: WithContext<Vec<Option<UiSignatureStatus>>> = self.call("getSignatureStatuses", params).await?;
        let status = response.value.into_iter().next().flatten();
        Ok(status.map(|s| SignatureStatus {
            slot: s.slot,
            confirmation_status: s.confirmation_status,
            err: s.err.filter(|e| !e.is_null()).map(|e| e.to_string()),
        }))
    }
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("endpoints", &self.endpoints.len())
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
