use bigdecimal::BigDecimal;
use shared::Listing;
use tracing::{info, warn};

use crate::api::BookingApi;
use crate::error::ApiError;
use crate::models::parse_listing;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    pub location: Option<String>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
}

impl ListingFilter {
    pub fn is_empty(&self) -> bool {
        self.location_term().is_none() && self.min_price.is_none() && self.max_price.is_none()
    }

    fn location_term(&self) -> Option<String> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }
}

/// Location matches title or location text; price bounds are inclusive.
pub fn filter_listings(listings: &[Listing], filter: &ListingFilter) -> Vec<Listing> {
    let term = filter.location_term();

    listings
        .iter()
        .filter(|listing| match &term {
            Some(term) => {
                listing.title.to_lowercase().contains(term.as_str())
                    || listing
                        .location
                        .as_ref()
                        .is_some_and(|location| location.to_lowercase().contains(term.as_str()))
            }
            None => true,
        })
        .filter(|listing| {
            filter
                .min_price
                .as_ref()
                .map_or(true, |min| &listing.price_per_night >= min)
        })
        .filter(|listing| {
            filter
                .max_price
                .as_ref()
                .map_or(true, |max| &listing.price_per_night <= max)
        })
        .cloned()
        .collect()
}

pub async fn fetch_listings<A: BookingApi + ?Sized>(api: &A) -> Result<Vec<Listing>, ApiError> {
    let remote = api.list_listings().await?;
    let total = remote.len();

    let listings: Vec<Listing> = remote
        .into_iter()
        .filter_map(|listing| match parse_listing(listing) {
            Ok(listing) => Some(listing),
            Err(e) => {
                warn!("Skipping listing: {}", e);
                None
            }
        })
        .collect();

    info!("Fetched {} of {} listings", listings.len(), total);
    Ok(listings)
}
