//! Listing resolution and qualification
//!
//! The marketplace indexes new listings with a lag: the record appears
//! first, the accounts needed to purchase it appear moments later. The
//! resolver polls the per-mint endpoint up to a bounded attempt count and
//! classifies what it finds. Wrong collection and over-ceiling listings
//! end the hunt immediately; neither changes during a race window.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::marketplace::{Listing, MarketplaceClient};
use crate::proxy::ProxyCredential;
use crate::race::RaceCoordinator;

/// Bounded number of listing polls per mint
pub const MAX_ATTEMPTS: usize = 50;

/// Outcome of assessing one fetched listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// Qualifies; purchase it
    Fulfillable,
    /// Right collection, acceptable record, but escrow accounts not yet
    /// indexed; poll again
    NotYetFulfillable,
    /// Title does not contain the collection name; give up on this mint
    WrongCollection,
    /// Price above the ceiling; give up on this mint
    OverCeiling,
}

fn assess(listing: &Listing, collection: &str, ceiling: f64) -> Verdict {
    if !listing.matches_collection(collection) {
        return Verdict::WrongCollection;
    }
    if !listing.is_fulfillable() {
        return Verdict::NotYetFulfillable;
    }
    if listing.price > ceiling {
        return Verdict::OverCeiling;
    }
    Verdict::Fulfillable
}

/// Resolves a mint to a qualifying, fulfillable listing
pub struct ListingResolver {
    marketplace: Arc<MarketplaceClient>,
    race: Arc<RaceCoordinator>,
    collection: String,
    ceiling: f64,
}

impl ListingResolver {
    pub fn new(
        marketplace: Arc<MarketplaceClient>,
        race: Arc<RaceCoordinator>,
        collection: impl Into<String>,
        ceiling: f64,
    ) -> Self {
        Self {
            marketplace,
            race,
            collection: collection.into(),
            ceiling,
        }
    }

    /// Poll the marketplace for this mint's listing until it qualifies,
    /// is ruled out, or [`MAX_ATTEMPTS`] are spent.
    pub async fn resolve(
        &self,
        mint: &str,
        credential: &ProxyCredential,
    ) -> Option<Listing> {
        resolve_with(
            || self.marketplace.listing(mint, credential),
            || self.race.has_won(),
            &self.collection,
            self.ceiling,
            mint,
            credential,
        )
        .await
    }
}

/// Resolution loop, generic over its fetch step so the attempt accounting
/// can be exercised without a network.
async fn resolve_with<F, Fut>(
    mut fetch: F,
    abort: impl Fn() -> bool,
    collection: &str,
    ceiling: f64,
    mint: &str,
    credential: &ProxyCredential,
) -> Option<Listing>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<Listing>>>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        if abort() {
            debug!(mint, "Race already won, abandoning resolution");
            return None;
        }

        let listing = match fetch().await {
            Ok(Some(listing)) => listing,
            Ok(None) => {
                debug!(mint, attempt, "No listing record yet");
                continue;
            }
            Err(e) => {
                warn!(mint, attempt, proxy = %credential, "Listing fetch failed: {}", e);
                continue;
            }
        };

        info!(mint, title = %listing.title, "New listing observed");

        match assess(&listing, collection, ceiling) {
            Verdict::Fulfillable => {
                info!(mint, price = listing.price, title = %listing.title, "Qualifying listing");
                return Some(listing);
            }
            Verdict::NotYetFulfillable => {
                debug!(mint, attempt, "Listing not yet fulfillable");
            }
            Verdict::WrongCollection => {
                debug!(mint, title = %listing.title, "Wrong collection");
                return None;
            }
            Verdict::OverCeiling => {
                debug!(mint, price = listing.price, ceiling, "Price above ceiling");
                return None;
            }
        }
    }

    debug!(mint, "Resolution attempts exhausted");
    None
}
