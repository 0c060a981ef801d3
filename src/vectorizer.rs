//! # Vectorizer Module
//!
//! Turns an [`AdRecord`] into a fixed-order [`FeatureVector`]. The component
//! order is part of the persisted store format: reordering it invalidates
//! every stored vector.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ad_model::AdRecord;
use crate::encoders::{
    encode_balcony, encode_bathroom, encode_city, encode_commission, encode_deposit,
    encode_metro, encode_parking, encode_renovation, encode_utilities_payment,
};

/// Number of components in every feature vector
pub const FEATURE_COUNT: usize = 19;

/// Component names, in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "city",
    "metro",
    "address_length",
    "rooms",
    "renovation",
    "kitchen_combined",
    "isolated_rooms",
    "bathroom",
    "balcony",
    "wardrobe",
    "furnishing_words",
    "parking",
    "proximity_to_metro",
    "infrastructure_words",
    "price_per_month",
    "utilities_payment",
    "deposit",
    "commission",
    "living_conditions_words",
];

/// Fixed-length numeric encoding of an ad
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(components: [f64; FEATURE_COUNT]) -> Self {
        Self(components)
    }

    pub fn zeros() -> Self {
        Self([0.0; FEATURE_COUNT])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }
}

/// `name=value` pairs in vector order, for logs
impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in FEATURE_NAMES.iter().zip(self.0.iter()).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        let len = values.len();
        let components: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| {
            format!("feature vector must have {FEATURE_COUNT} components, found {len}")
        })?;
        if let Some(bad) = components.iter().find(|x| !x.is_finite()) {
            return Err(format!("feature vector contains a non-finite value: {bad}"));
        }
        Ok(Self(components))
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(vector: FeatureVector) -> Self {
        vector.0.to_vec()
    }
}

fn word_count(text: Option<&str>) -> f64 {
    text.map_or(0, |t| t.split_whitespace().count()) as f64
}

fn char_count(text: Option<&str>) -> f64 {
    text.map_or(0, |t| t.chars().count()) as f64
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Encode an ad into its feature vector. Never fails.
pub fn vectorize(ad: &AdRecord) -> FeatureVector {
    let location = &ad.location;
    let apartment = &ad.apartment;
    let building = &ad.building;
    let finance = &ad.finance;

    FeatureVector([
        // Location
        encode_city(location.city.as_deref()),
        encode_metro(location.metro.as_deref()),
        char_count(location.address.as_deref()),
        // Apartment
        apartment.rooms as f64,
        encode_renovation(apartment.renovation.as_deref()),
        flag(apartment.kitchen_combined),
        apartment.isolated_rooms as f64,
        encode_bathroom(apartment.bathroom.as_deref()),
        encode_balcony(apartment.balcony.as_deref()),
        flag(apartment.wardrobe),
        word_count(apartment.furnishing.as_deref()),
        // Building
        encode_parking(building.parking.as_deref()),
        building.proximity_to_metro as f64,
        word_count(building.infrastructure.as_deref()),
        // Finance
        finance.price_per_month as f64,
        encode_utilities_payment(finance.utilities_payment.as_deref()),
        encode_deposit(finance.deposit.as_deref()),
        encode_commission(finance.commission.as_deref()),
        word_count(finance.living_conditions.as_deref()),
    ])
}
