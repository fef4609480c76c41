//! CLI command implementations

use anyhow::Result;
use solana_sdk::signer::Signer;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::executor::PurchaseExecutor;
use crate::feed::SignatureFeed;
use crate::marketplace::MarketplaceClient;
use crate::proxy::ProxyPool;
use crate::race::RaceCoordinator;
use crate::resolver::ListingResolver;
use crate::rpc::RpcClient;
use crate::sniper::SniperOrchestrator;
use crate::verifier::TransactionVerifier;
use crate::wallet;

/// Start the sniper
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        warn!("Running in DRY-RUN mode - no purchase will be submitted");
    }

    info!(
        "Hunting '{}' up to {} SOL",
        config.sniper.collection_name, config.sniper.price_ceiling_sol
    );

    // Fail fast on operator misconfiguration before the race starts
    let pool = Arc::new(ProxyPool::from_entries(&config.proxy.resolved_entries()?)?);
    info!("Loaded {} proxy credentials", pool.len());

    let signer = Arc::new(wallet::load_keypair(Path::new(&config.wallet.keypair_path))?);
    info!("Buyer: {}", signer.pubkey());

    let rpc = Arc::new(RpcClient::new(config.rpc.endpoint.clone()));
    let marketplace = Arc::new(MarketplaceClient::new(
        config.marketplace.base_url.clone(),
        config.marketplace.referer.clone(),
    ));
    let race = Arc::new(RaceCoordinator::new());

    let feed = SignatureFeed::new(rpc.clone(), config.sniper.program_address.clone());
    let verifier = Arc::new(TransactionVerifier::new(rpc.clone(), race.clone()));
    let resolver = Arc::new(ListingResolver::new(
        marketplace.clone(),
        race.clone(),
        config.sniper.collection_name.clone(),
        config.sniper.price_ceiling_sol,
    ));
    let executor = Arc::new(PurchaseExecutor::new(
        marketplace,
        rpc,
        race.clone(),
        signer,
        dry_run,
    ));

    let orchestrator = SniperOrchestrator::new(
        feed,
        verifier,
        resolver,
        executor,
        race,
        pool,
        Duration::from_millis(config.sniper.dispatch_delay_ms),
        config.sniper.max_concurrent_workers,
    );

    match orchestrator.run().await {
        Some(signature) => info!("Sniping complete, won on signature {}", signature),
        None => warn!("Run ended without a winning purchase"),
    }

    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check system health: one signature poll through the first proxy
pub async fn health(config: &Config) -> Result<()> {
    let pool = ProxyPool::from_entries(&config.proxy.resolved_entries()?)?;
    let rpc = RpcClient::new(config.rpc.endpoint.clone());

    let credential = pool.next();
    info!("Polling {} via {}", rpc.endpoint(), credential);

    let started = std::time::Instant::now();
    let signatures = rpc
        .signatures_for_address(&config.sniper.program_address, credential)
        .await?;

    info!(
        "OK: {} recent signatures in {}ms",
        signatures.len(),
        started.elapsed().as_millis()
    );
    Ok(())
}
