//! Shared fixtures for the integration tests

#![allow(dead_code)]

use rental_scout::ad_model::{AdRecord, Apartment, Building, Finance, Location};

/// A fully described two-room flat near Sokol
pub fn moscow_flat() -> AdRecord {
    AdRecord {
        location: Location {
            city: Some("Moscow".to_string()),
            metro: Some("Sokol".to_string()),
            address: Some("Leningradsky prospekt 75".to_string()),
        },
        apartment: Apartment {
            rooms: 2,
            renovation: Some("Cosmetic".to_string()),
            kitchen_combined: true,
            isolated_rooms: 2,
            bathroom: Some("Separate".to_string()),
            balcony: Some("Loggia".to_string()),
            wardrobe: true,
            furnishing: Some("fully furnished with appliances".to_string()),
        },
        building: Building {
            parking: Some("In the yard".to_string()),
            proximity_to_metro: 5,
            infrastructure: Some("school kindergarten park".to_string()),
        },
        finance: Finance {
            price_per_month: 50000,
            utilities_payment: Some("Separately".to_string()),
            deposit: Some("1 month".to_string()),
            commission: Some("50%".to_string()),
            living_conditions: Some("no pets".to_string()),
            contact_info: Some("@landlord".to_string()),
        },
    }
}

/// Same flat, one rouble more expensive
pub fn moscow_flat_repost() -> AdRecord {
    let mut ad = moscow_flat();
    ad.finance.price_per_month = 50001;
    ad
}

/// Same flat description, but in Saint Petersburg and three times the price
pub fn petersburg_flat() -> AdRecord {
    let mut ad = moscow_flat();
    ad.location.city = Some("Saint Petersburg".to_string());
    ad.finance.price_per_month = 150000;
    ad
}
