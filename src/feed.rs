//! Signature feed for the watched marketplace program
//!
//! One poll fetches the full recent-signature window; the orchestrator
//! diffs it against everything already seen and dispatches only the new
//! ones. A failed poll is retried by the caller, never treated as an empty
//! cycle: silently skipping a window would mean silently missing listings.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::proxy::ProxyCredential;
use crate::rpc::RpcClient;

/// Polls recent signatures for one program address
pub struct SignatureFeed {
    rpc: Arc<RpcClient>,
    program: String,
}

impl SignatureFeed {
    pub fn new(rpc: Arc<RpcClient>, program: impl Into<String>) -> Self {
        Self {
            rpc,
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Fetch the current recent-signature window under the given credential.
    ///
    /// Returns the full set, not a delta; diffing is the caller's job.
    pub async fn poll(&self, credential: &ProxyCredential) -> Result<HashSet<String>> {
        let signatures = self
            .rpc
            .signatures_for_address(&self.program, credential)
            .await?;
        Ok(signatures.into_iter().collect())
    }
}

/// Members of `current` not present in `previous`
pub fn diff(current: &HashSet<String>, previous: &HashSet<String>) -> HashSet<String> {
    current.difference(previous).cloned().collect()
}
