//! Per-signature transaction verification
//!
//! A freshly observed signature may reference any marketplace program
//! activity, not only listings. Only a successful transaction that moved a
//! token is a listing candidate; its mint is what the resolver hunts next.
//! Nodes lag behind `confirmed` commitment, so the fetch retries with a
//! fixed pause until the record exists.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::proxy::ProxyCredential;
use crate::race::RaceCoordinator;
use crate::rpc::{RpcClient, TransactionRecord};

/// Fixed pause between fetch attempts, to respect node rate limits
pub const FETCH_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Verifies one signature and extracts the transferred token's mint
pub struct TransactionVerifier {
    rpc: Arc<RpcClient>,
    race: Arc<RaceCoordinator>,
}

impl TransactionVerifier {
    pub fn new(rpc: Arc<RpcClient>, race: Arc<RaceCoordinator>) -> Self {
        Self { rpc, race }
    }

    /// Fetch the transaction behind `signature` and return its first
    /// post-execution token mint, if it represents a successful transfer.
    ///
    /// Retries indefinitely on transport failure or a not-yet-available
    /// record, pausing [`FETCH_RETRY_DELAY`] between attempts. Abandons
    /// with `None` once the race is won.
    pub async fn verify(
        &self,
        signature: &str,
        credential: &ProxyCredential,
    ) -> Option<String> {
        let record = loop {
            if self.race.has_won() {
                return None;
            }

            match self.rpc.transaction(signature, credential).await {
                Ok(Some(record)) => break record,
                Ok(None) => {
                    debug!(signature, "Transaction not yet available, retrying");
                }
                Err(e) => {
                    warn!(signature, proxy = %credential, "Transaction fetch failed: {}", e);
                }
            }
            sleep(FETCH_RETRY_DELAY).await;
        };

        if self.race.has_won() {
            return None;
        }

        qualifying_mint(&record)
    }
}

/// The mint of a qualifying transfer: execution succeeded (an explicitly
/// null or absent `err` is the only definition of success) and at least one
/// post-execution token balance exists.
pub(crate) fn qualifying_mint(record: &TransactionRecord) -> Option<String> {
    let meta = record.meta.as_ref()?;
    if meta.err.is_some() {
        return None;
    }
    meta.post_token_balances.first().map(|b| b.mint.clone())
}
