//! Chain JSON-RPC client
//!
//! One endpoint is shared for signature polling, transaction lookups, and
//! purchase submission. Requests are framed by hand and sent with a per-call
//! proxied HTTP client, so each call can ride a different egress credential.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::proxy::ProxyCredential;

/// How many recent signatures one poll requests
pub const SIGNATURE_FETCH_LIMIT: u64 = 1000;

/// JSON-RPC response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// `getSignaturesForAddress` entry; only the signature itself matters here
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureEntry {
    pub signature: String,
}

/// `getTransaction` result
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
}

/// Post-execution metadata of a fetched transaction.
///
/// "No error" means `err` is explicitly null or absent; both deserialize to
/// `None`. Key presence alone is never consulted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub post_token_balances: Vec<TokenBalance>,
}

/// One post-execution token balance entry
#[derive(Debug, Clone, Deserialize)]
pub struct TokenBalance {
    pub mint: String,
}

/// Raw `sendTransaction` outcome.
///
/// A string `result` is the submitted transaction signature and means the
/// purchase landed; anything else (error object, null result) means this
/// worker lost the race.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionResult {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.result, Some(Value::String(_)))
    }

    /// The on-chain signature of the submitted purchase, on success
    pub fn transaction_signature(&self) -> Option<&str> {
        match &self.result {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// JSON-RPC client for the configured chain endpoint
pub struct RpcClient {
    endpoint: String,
}

impl RpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one JSON-RPC request through the given proxy credential
    async fn call(
        &self,
        method: &str,
        params: Value,
        credential: &ProxyCredential,
    ) -> Result<RpcResponse> {
        let client = credential.http_client()?;
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = client.post(&self.endpoint).json(&body).send().await?;
        let envelope: RpcResponse = response.json().await?;
        Ok(envelope)
    }

    /// Fetch up to [`SIGNATURE_FETCH_LIMIT`] recent signatures for a program
    pub async fn signatures_for_address(
        &self,
        program: &str,
        credential: &ProxyCredential,
    ) -> Result<Vec<String>> {
        let params = json!([
            program,
            { "limit": SIGNATURE_FETCH_LIMIT, "commitment": "confirmed" },
        ]);

        let envelope = self.call("getSignaturesForAddress", params, credential).await?;
        let result = envelope.result.ok_or_else(|| {
            Error::Rpc(format!(
                "getSignaturesForAddress returned no result: {:?}",
                envelope.error
            ))
        })?;

        let entries: Vec<SignatureEntry> = serde_json::from_value(result)?;
        Ok(entries.into_iter().map(|e| e.signature).collect())
    }

    /// Fetch one finalized transaction by signature.
    ///
    /// `Ok(None)` means the node does not have a record for it yet.
    pub async fn transaction(
        &self,
        signature: &str,
        credential: &ProxyCredential,
    ) -> Result<Option<TransactionRecord>> {
        let params = json!([signature, "json"]);
        let envelope = self.call("getTransaction", params, credential).await?;

        if let Some(error) = envelope.error {
            return Err(Error::Rpc(format!("getTransaction failed: {}", error)));
        }

        match envelope.result {
            None | Some(Value::Null) => Ok(None),
            Some(result) => {
                let record: TransactionRecord = serde_json::from_value(result)?;
                Ok(Some(record))
            }
        }
    }

    /// Submit a signed, base64-encoded transaction.
    ///
    /// The raw envelope is returned unjudged; the caller decides what a
    /// winning result looks like. Never retried.
    pub async fn send_transaction(
        &self,
        transaction_base64: &str,
        credential: &ProxyCredential,
    ) -> Result<SubmissionResult> {
        let params = json!([
            transaction_base64,
            { "encoding": "base64", "commitment": "confirmed" },
        ]);

        let envelope = self.call("sendTransaction", params, credential).await?;
        Ok(SubmissionResult {
            result: envelope.result,
            error: envelope.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_err_null_and_absent_are_no_error() {
        let with_null: TransactionRecord = serde_json::from_str(
            r#"{"meta": {"err": null, "postTokenBalances": [{"mint": "M1"}]}}"#,
        )
        .unwrap();
        assert!(with_null.meta.as_ref().unwrap().err.is_none());

        let absent: TransactionRecord =
            serde_json::from_str(r#"{"meta": {"postTokenBalances": [{"mint": "M1"}]}}"#).unwrap();
        assert!(absent.meta.as_ref().unwrap().err.is_none());
    }

    #[test]
    fn test_meta_err_object_is_error() {
        let record: TransactionRecord = serde_json::from_str(
            r#"{"meta": {"err": {"InstructionError": [0, "Custom"]}, "postTokenBalances": [{"mint": "M1"}]}}"#,
        )
        .unwrap();
        assert!(record.meta.as_ref().unwrap().err.is_some());
    }

    #[test]
    fn test_token_balances_default_empty() {
        let record: TransactionRecord = serde_json::from_str(r#"{"meta": {"err": null}}"#).unwrap();
        assert!(record.meta.as_ref().unwrap().post_token_balances.is_empty());
    }

    #[test]
    fn test_submission_string_result_is_success() {
        let ok: SubmissionResult = serde_json::from_str(r#"{"result": "abc123"}"#).unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.transaction_signature(), Some("abc123"));
    }

    #[test]
    fn test_submission_error_object_is_failure() {
        let failed: SubmissionResult =
            serde_json::from_str(r#"{"error": {"code": -32002, "message": "simulation failed"}}"#)
                .unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.transaction_signature(), None);
    }

    #[test]
    fn test_submission_null_result_is_failure() {
        let null: SubmissionResult = serde_json::from_str(r#"{"result": null}"#).unwrap();
        assert!(!null.is_success());

        // Non-string results do not count either
        let numeric: SubmissionResult = serde_json::from_str(r#"{"result": 42}"#).unwrap();
        assert!(!numeric.is_success());
    }
}
