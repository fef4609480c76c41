//! Marketplace API client
//!
//! Two read-only endpoints: the per-mint listing lookup and the
//! buy-instruction builder. Both are plain GETs through a per-call proxied
//! client. The marketplace indexes listings asynchronously, so a listing
//! can exist without the escrow/auction-house/seller-referral accounts
//! needed to construct a purchase; such a listing is not yet fulfillable.

use serde::Deserialize;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::proxy::ProxyCredential;

/// Watched marketplace program address
pub const MARKETPLACE_PROGRAM_STR: &str = "M2mx93ekt1fmXSVkTrUL9xVFHkmME8HTUi5Cyc5aF7K";

lazy_static::lazy_static! {
    /// Watched marketplace program address as Pubkey
    pub static ref MARKETPLACE_PROGRAM: Pubkey =
        Pubkey::from_str(MARKETPLACE_PROGRAM_STR).expect("Invalid marketplace program address");
}

/// One marketplace listing record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub mint_address: String,
    pub owner: String,
    /// Token account holding the listed asset
    pub id: String,
    /// Asking price in the chain's native unit
    pub price: f64,
    pub title: String,
    #[serde(default)]
    pub creators: Vec<Value>,
    #[serde(default)]
    pub escrow_pubkey: Option<String>,
    #[serde(default)]
    pub auction_house_key: Option<String>,
    #[serde(default)]
    pub seller_referral: Option<String>,
}

impl Listing {
    /// A listing is fulfillable only once the marketplace has indexed the
    /// escrow, auction-house, and seller-referral accounts. Until then a
    /// purchase instruction cannot be built and the listing must be
    /// re-polled.
    pub fn is_fulfillable(&self) -> bool {
        self.escrow_pubkey.is_some()
            && self.auction_house_key.is_some()
            && self.seller_referral.is_some()
    }

    /// Substring match against the configured collection name
    pub fn matches_collection(&self, collection: &str) -> bool {
        self.title.contains(collection)
    }
}

/// Encoded unsigned transaction returned by the buy-instruction endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct BuyInstruction {
    #[serde(rename = "txSigned")]
    pub tx_signed: EncodedTransaction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodedTransaction {
    pub data: Vec<u8>,
}

/// HTTP client for the marketplace query and buy-instruction APIs
pub struct MarketplaceClient {
    base_url: String,
    referer: String,
}

impl MarketplaceClient {
    pub fn new(base_url: impl Into<String>, referer: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            referer: referer.into(),
        }
    }

    /// Fetch the current listing record for a mint.
    ///
    /// `Ok(None)` means the marketplace has no (complete) record yet; a
    /// transport fault is an `Err` so the caller can tell the two apart.
    pub async fn listing(
        &self,
        mint: &str,
        credential: &ProxyCredential,
    ) -> Result<Option<Listing>> {
        let client = credential.http_client()?;
        let url = format!("{}/nft-by-mint/{}", self.base_url, mint);

        let response = client.get(&url).send().await?;
        let body: Value = response.json().await?;

        // Partial or empty records deserialize as "nothing listed yet"
        match serde_json::from_value::<Listing>(body) {
            Ok(listing) => Ok(Some(listing)),
            Err(_) => Ok(None),
        }
    }

    /// Request a buy instruction for (listing, buyer).
    ///
    /// The listing must be fulfillable; the marketplace needs all three
    /// indexed accounts to build the instruction.
    pub async fn buy_instruction(
        &self,
        listing: &Listing,
        buyer: &Pubkey,
        credential: &ProxyCredential,
    ) -> Result<BuyInstruction> {
        let auction_house = listing
            .auction_house_key
            .as_deref()
            .ok_or_else(|| Error::Marketplace("listing missing auctionHouseKey".into()))?;
        let seller_referral = listing
            .seller_referral
            .as_deref()
            .ok_or_else(|| Error::Marketplace("listing missing sellerReferral".into()))?;

        let client = credential.http_client()?;
        let url = format!("{}/buy-instruction", self.base_url);

        let response = client
            .get(&url)
            .header("referer", &self.referer)
            .query(&[
                ("buyer", buyer.to_string().as_str()),
                ("seller", listing.owner.as_str()),
                ("auctionHouseAddress", auction_house),
                ("tokenMint", listing.mint_address.as_str()),
                ("tokenATA", listing.id.as_str()),
                ("price", listing.price.to_string().as_str()),
                ("sellerReferral", seller_referral),
                ("sellerExpiry", "-1"),
            ])
            .send()
            .await?;

        let instruction: BuyInstruction = response.json().await?;
        Ok(instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fulfillable_json() -> &'static str {
        r#"{
            "mintAddress": "MintAAA",
            "owner": "OwnerBBB",
            "id": "TokenAccountCCC",
            "price": 0.5,
            "title": "Degen Ape #1234",
            "creators": [{"address": "CreatorDDD", "share": 100}],
            "escrowPubkey": "EscrowEEE",
            "auctionHouseKey": "HouseFFF",
            "sellerReferral": "ReferralGGG"
        }"#
    }

    #[test]
    fn test_parse_fulfillable_listing() {
        let listing: Listing = serde_json::from_str(fulfillable_json()).unwrap();
        assert_eq!(listing.mint_address, "MintAAA");
        assert_eq!(listing.price, 0.5);
        assert!(listing.is_fulfillable());
    }

    #[test]
    fn test_parse_listing_without_escrow_accounts() {
        let listing: Listing = serde_json::from_str(
            r#"{
                "mintAddress": "MintAAA",
                "owner": "OwnerBBB",
                "id": "TokenAccountCCC",
                "price": 2.0,
                "title": "Degen Ape #1234"
            }"#,
        )
        .unwrap();
        assert!(!listing.is_fulfillable());
    }

    #[test]
    fn test_partially_indexed_listing_is_not_fulfillable() {
        let listing: Listing = serde_json::from_str(
            r#"{
                "mintAddress": "MintAAA",
                "owner": "OwnerBBB",
                "id": "TokenAccountCCC",
                "price": 2.0,
                "title": "Degen Ape #1234",
                "escrowPubkey": "EscrowEEE"
            }"#,
        )
        .unwrap();
        assert!(!listing.is_fulfillable());
    }

    #[test]
    fn test_collection_substring_match() {
        let listing: Listing = serde_json::from_str(fulfillable_json()).unwrap();
        assert!(listing.matches_collection("Degen Ape"));
        assert!(listing.matches_collection("Ape #12"));
        assert!(!listing.matches_collection("Okay Bear"));
    }

    #[test]
    fn test_parse_buy_instruction_bytes() {
        let instruction: BuyInstruction =
            serde_json::from_str(r#"{"txSigned": {"data": [1, 0, 255, 42]}}"#).unwrap();
        assert_eq!(instruction.tx_signed.data, vec![1, 0, 255, 42]);
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = MarketplaceClient::new("https://api.example.com/", "https://example.com/");
        assert_eq!(client.base_url, "https://api.example.com");
    }

    #[test]
    fn test_marketplace_program_parses() {
        assert_eq!(MARKETPLACE_PROGRAM.to_string(), MARKETPLACE_PROGRAM_STR);
    }
}
