//! Purchase execution
//!
//! The marketplace hands back an encoded unsigned transaction for a
//! (listing, buyer) pair; this module decodes it, signs it against the
//! message's own blockhash, and submits it exactly once. Submission is
//! never retried: a rejection just means this worker lost the race, which
//! is the expected outcome for every worker but one.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::marketplace::{Listing, MarketplaceClient};
use crate::proxy::ProxyCredential;
use crate::race::RaceCoordinator;
use crate::rpc::{RpcClient, SubmissionResult};
use crate::verifier::FETCH_RETRY_DELAY;

/// Executes the buy for one qualifying listing
pub struct PurchaseExecutor {
    marketplace: Arc<MarketplaceClient>,
    rpc: Arc<RpcClient>,
    race: Arc<RaceCoordinator>,
    signer: Arc<Keypair>,
    dry_run: bool,
}

impl PurchaseExecutor {
    pub fn new(
        marketplace: Arc<MarketplaceClient>,
        rpc: Arc<RpcClient>,
        race: Arc<RaceCoordinator>,
        signer: Arc<Keypair>,
        dry_run: bool,
    ) -> Self {
        Self {
            marketplace,
            rpc,
            race,
            signer,
            dry_run,
        }
    }

    /// Fetch, sign, and submit the purchase for `listing`.
    ///
    /// `None` means this worker abandoned (race won elsewhere, or the
    /// instruction could not be turned into a signed transaction). A
    /// returned result may still be a losing one; the caller judges it.
    pub async fn execute(
        &self,
        listing: &Listing,
        credential: &ProxyCredential,
    ) -> Option<SubmissionResult> {
        let instruction = loop {
            if self.race.has_won() {
                return None;
            }

            match self
                .marketplace
                .buy_instruction(listing, &self.signer.pubkey(), credential)
                .await
            {
                Ok(instruction) => break instruction,
                Err(e) if e.is_retryable() => {
                    warn!(mint = %listing.mint_address, proxy = %credential, "Buy instruction fetch failed: {}", e);
                    sleep(FETCH_RETRY_DELAY).await;
                }
                Err(e) => {
                    warn!(mint = %listing.mint_address, "Buy instruction unavailable: {}", e);
                    return None;
                }
            }
        };

        let mut transaction = match decode_transaction(&instruction.tx_signed.data) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(mint = %listing.mint_address, "{}", e);
                return None;
            }
        };

        // Pre-sign check point
        if self.race.has_won() {
            debug!(mint = %listing.mint_address, "Race already won, skipping sign");
            return None;
        }

        let wire = match sign_and_encode(&mut transaction, &self.signer) {
            Ok(wire) => wire,
            Err(e) => {
                warn!(mint = %listing.mint_address, "{}", e);
                return None;
            }
        };

        // Pre-submit check point
        if self.race.has_won() {
            debug!(mint = %listing.mint_address, "Race already won, skipping submission");
            return None;
        }

        if self.dry_run {
            info!(
                mint = %listing.mint_address,
                price = listing.price,
                "DRY-RUN: would submit purchase transaction"
            );
            return Some(SubmissionResult {
                result: Some(serde_json::Value::String("dry-run".into())),
                error: None,
            });
        }

        match self.rpc.send_transaction(&wire, credential).await {
            Ok(result) => {
                info!(
                    mint = %listing.mint_address,
                    success = result.is_success(),
                    "Submission response: {:?}",
                    result.result.as_ref().or(result.error.as_ref())
                );
                Some(result)
            }
            Err(e) => {
                warn!(mint = %listing.mint_address, proxy = %credential, "Submission failed: {}", e);
                None
            }
        }
    }
}

/// Decode the marketplace's encoded transaction (Solana wire format)
fn decode_transaction(data: &[u8]) -> Result<Transaction> {
    bincode::deserialize(data).map_err(|e| Error::TransactionDecode(e.to_string()))
}

/// Sign against the message's own recent blockhash and base64-encode for
/// `sendTransaction`. The buyer may be one of several required signers;
/// only the buyer's slot is filled here.
fn sign_and_encode(transaction: &mut Transaction, signer: &Keypair) -> Result<String> {
    let blockhash = transaction.message.recent_blockhash;
    transaction
        .try_partial_sign(&[signer], blockhash)
        .map_err(|e| Error::Signing(e.to_string()))?;

    let wire = bincode::serialize(transaction).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(BASE64.encode(wire))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::message::Message;
    use solana_sdk::signature::Signature;
    use solana_sdk::system_instruction;

    fn unsigned_buyer_transaction(buyer: &Keypair) -> Transaction {
        let recipient = Keypair::new();
        let instruction =
            system_instruction::transfer(&buyer.pubkey(), &recipient.pubkey(), 500_000_000);
        Transaction::new_unsigned(Message::new(&[instruction], Some(&buyer.pubkey())))
    }

    #[test]
    fn test_decode_round_trip() {
        let buyer = Keypair::new();
        let transaction = unsigned_buyer_transaction(&buyer);
        let data = bincode::serialize(&transaction).unwrap();

        let decoded = decode_transaction(&data).unwrap();
        assert_eq!(decoded.message, transaction.message);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_transaction(&[0xde, 0xad, 0xbe, 0xef]),
            Err(Error::TransactionDecode(_))
        ));
    }

    #[test]
    fn test_sign_and_encode_fills_buyer_signature() {
        let buyer = Keypair::new();
        let mut transaction = unsigned_buyer_transaction(&buyer);
        assert_eq!(transaction.signatures[0], Signature::default());

        let wire = sign_and_encode(&mut transaction, &buyer).unwrap();
        assert_ne!(transaction.signatures[0], Signature::default());

        // The encoded form round-trips to the signed transaction
        let decoded: Transaction = bincode::deserialize(&BASE64.decode(wire).unwrap()).unwrap();
        assert_eq!(decoded.signatures, transaction.signatures);
    }

    #[test]
    fn test_signing_preserves_message_blockhash() {
        let buyer = Keypair::new();
        let mut transaction = unsigned_buyer_transaction(&buyer);
        let blockhash = transaction.message.recent_blockhash;

        sign_and_encode(&mut transaction, &buyer).unwrap();
        assert_eq!(transaction.message.recent_blockhash, blockhash);
    }
}
