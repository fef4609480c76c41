//! Sniper orchestration
//!
//! One long-lived polling loop plus one short-lived worker per newly
//! observed signature. The loop owns the seen-signature set, so merges are
//! serialized and nothing is dispatched twice; workers run the
//! verify -> resolve -> execute pipeline independently and abandon
//! cooperatively once the race is won. In-flight workers are never
//! preempted: a purchase already submitted is on-chain or not, regardless
//! of local state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::executor::PurchaseExecutor;
use crate::feed::{self, SignatureFeed};
use crate::proxy::{ProxyCredential, ProxyPool};
use crate::race::RaceCoordinator;
use crate::resolver::ListingResolver;
use crate::verifier::TransactionVerifier;

/// Owns the polling loop and dispatches pipeline workers
pub struct SniperOrchestrator {
    feed: SignatureFeed,
    verifier: Arc<TransactionVerifier>,
    resolver: Arc<ListingResolver>,
    executor: Arc<PurchaseExecutor>,
    race: Arc<RaceCoordinator>,
    pool: Arc<ProxyPool>,
    dispatch_delay: Duration,
    max_workers: usize,
}

impl SniperOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        feed: SignatureFeed,
        verifier: Arc<TransactionVerifier>,
        resolver: Arc<ListingResolver>,
        executor: Arc<PurchaseExecutor>,
        race: Arc<RaceCoordinator>,
        pool: Arc<ProxyPool>,
        dispatch_delay: Duration,
        max_workers: usize,
    ) -> Self {
        Self {
            feed,
            verifier,
            resolver,
            executor,
            race,
            pool,
            dispatch_delay,
            max_workers,
        }
    }

    /// Run the race to completion; returns the winning feed signature.
    ///
    /// The seen set is seeded with one initial poll so that nothing listed
    /// before startup is chased.
    pub async fn run(&self) -> Option<String> {
        let started = chrono::Utc::now();

        let mut seen = self.poll_until_success().await;
        info!(
            program = self.feed.program(),
            seeded = seen.len(),
            "Watching for new listings"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut workers = JoinSet::new();

        while !self.race.has_won() {
            let current = self.poll_until_success().await;
            let fresh = feed::diff(&current, &seen);
            seen.extend(fresh.iter().cloned());

            for signature in fresh {
                if self.race.has_won() {
                    break;
                }

                // Permit acquisition queues excess dispatches on this loop
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                self.dispatch(&mut workers, signature, permit);

                sleep(self.dispatch_delay).await;
            }
        }

        debug!("Draining in-flight workers");
        while workers.join_next().await.is_some() {}

        let winner = self.race.winner().map(String::from);
        if let Some(signature) = &winner {
            let elapsed = chrono::Utc::now() - started;
            info!(
                signature = %signature,
                elapsed_secs = elapsed.num_seconds(),
                "Purchase race won"
            );
        }
        winner
    }

    /// Retry the same poll cycle until it succeeds; a transport fault never
    /// counts as an empty cycle.
    async fn poll_until_success(&self) -> HashSet<String> {
        loop {
            let credential = self.pool.next();
            match self.feed.poll(credential).await {
                Ok(signatures) => return signatures,
                Err(e) => {
                    warn!(proxy = %credential, "Signature poll failed, retrying: {}", e);
                }
            }
            if self.race.has_won() {
                return HashSet::new();
            }
        }
    }

    fn dispatch(
        &self,
        workers: &mut JoinSet<()>,
        signature: String,
        permit: OwnedSemaphorePermit,
    ) {
        let credential = self.pool.next().clone();
        let verifier = self.verifier.clone();
        let resolver = self.resolver.clone();
        let executor = self.executor.clone();
        let race = self.race.clone();

        workers.spawn(async move {
            let _permit = permit;
            run_worker(signature, credential, verifier, resolver, executor, race).await;
        });
    }
}

/// One pipeline worker: verify -> resolve -> execute, abandoning at the
/// first stage that rules this signature out or observes a win.
pub(crate) async fn run_worker(
    signature: String,
    credential: ProxyCredential,
    verifier: Arc<TransactionVerifier>,
    resolver: Arc<ListingResolver>,
    executor: Arc<PurchaseExecutor>,
    race: Arc<RaceCoordinator>,
) {
    let Some(mint) = verifier.verify(&signature, &credential).await else {
        return;
    };
    debug!(signature = %signature, mint = %mint, "Verified token transfer");

    let Some(listing) = resolver.resolve(&mint, &credential).await else {
        return;
    };

    let Some(result) = executor.execute(&listing, &credential).await else {
        return;
    };

    if result.is_success() {
        if race.try_win(signature.clone()) {
            info!(
                signature = %signature,
                mint = %mint,
                tx = result.transaction_signature().unwrap_or("?"),
                "Winning purchase submitted"
            );
        } else {
            // Two submissions landed; only the first transition counts
            warn!(
                signature = %signature,
                mint = %mint,
                "Purchase landed after race was already won"
            );
        }
    } else {
        debug!(signature = %signature, "Purchase rejected, worker lost the race");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::MarketplaceClient;
    use crate::rpc::RpcClient;
    use solana_sdk::signature::Keypair;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn credential() -> ProxyCredential {
        "10.0.0.1:8080:u:p".parse().unwrap()
    }

    #[tokio::test]
    async fn test_worker_dispatched_after_win_does_no_work() {
        let race = Arc::new(RaceCoordinator::new());
        assert!(race.try_win("earlier-winner"));

        // Endpoints would refuse connections; the worker must return before
        // touching any of them because every stage gates on the race first.
        let rpc = Arc::new(RpcClient::new("http://127.0.0.1:1"));
        let marketplace = Arc::new(MarketplaceClient::new(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1/",
        ));

        let verifier = Arc::new(TransactionVerifier::new(rpc.clone(), race.clone()));
        let resolver = Arc::new(ListingResolver::new(
            marketplace.clone(),
            race.clone(),
            "Degen Ape",
            1.0,
        ));
        let executor = Arc::new(PurchaseExecutor::new(
            marketplace,
            rpc,
            race.clone(),
            Arc::new(Keypair::new()),
            false,
        ));

        run_worker(
            "late-signature".into(),
            credential(),
            verifier,
            resolver,
            executor,
            race.clone(),
        )
        .await;

        assert_eq!(race.winner(), Some("earlier-winner"));
    }

    #[tokio::test]
    async fn test_losing_worker_aborts_before_submission() {
        let race = Arc::new(RaceCoordinator::new());
        let submissions = Arc::new(AtomicUsize::new(0));

        // Winner: submits, then claims the race
        let winner_race = race.clone();
        let winner_submissions = submissions.clone();
        let winner = tokio::spawn(async move {
            winner_submissions.fetch_add(1, Ordering::SeqCst);
            assert!(winner_race.try_win("S1"));
        });
        winner.await.unwrap();

        // Loser: reaches its pre-submit check point after the win and
        // abandons without submitting
        let loser_race = race.clone();
        let loser_submissions = submissions.clone();
        let loser = tokio::spawn(async move {
            if loser_race.has_won() {
                return;
            }
            loser_submissions.fetch_add(1, Ordering::SeqCst);
            loser_race.try_win("S2");
        });
        loser.await.unwrap();

        assert_eq!(submissions.load(Ordering::SeqCst), 1);
        assert_eq!(race.winner(), Some("S1"));
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let semaphore = Arc::new(Semaphore::new(2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut workers = JoinSet::new();
        for _ in 0..8 {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            workers.spawn(async move {
                let _permit = permit;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while workers.join_next().await.is_some() {}

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
