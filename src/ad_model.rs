//! # Rental Ad Data Model
//!
//! Structured form of a rental advertisement as produced by the extraction
//! model. An [`AdRecord`] is grouped into location, apartment, building and
//! finance attributes.
//!
//! ## Usage
//!
//! ```rust
//! use rental_scout::ad_model::AdRecord;
//!
//! let json = r#"{"city": "Moscow", "rooms": "2", "price_per_month": 50000}"#;
//! let ad = AdRecord::from_extraction_json(json).unwrap();
//! assert_eq!(ad.apartment.rooms, 2);
//! assert_eq!(ad.finance.price_per_month, 50000);
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::errors::ExtractionError;

/// Keys the extraction model is asked to fill in
pub const EXTRACTION_KEYS: [&str; 20] = [
    "city",
    "metro",
    "address",
    "rooms",
    "renovation",
    "kitchen_combined",
    "isolated_rooms",
    "bathroom",
    "balcony",
    "wardrobe",
    "furnishing",
    "parking",
    "proximity_to_metro",
    "infrastructure",
    "price_per_month",
    "utilities_payment",
    "deposit",
    "commission",
    "living_conditions",
    "contact_info",
];

lazy_static! {
    // ```json ... ``` or ``` ... ``` wrappers models like to add
    static ref CODE_FENCE_REGEX: Regex =
        Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").expect("Code fence pattern should be valid");
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub metro: Option<String>,
    /// Free-text street address
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Apartment {
    pub rooms: i64,
    pub renovation: Option<String>,
    /// Kitchen combined with a living room
    pub kitchen_combined: bool,
    pub isolated_rooms: i64,
    pub bathroom: Option<String>,
    pub balcony: Option<String>,
    pub wardrobe: bool,
    pub furnishing: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub parking: Option<String>,
    /// Walking distance to the metro, in minutes
    pub proximity_to_metro: i64,
    pub infrastructure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finance {
    /// Monthly rent in roubles
    pub price_per_month: i64,
    pub utilities_payment: Option<String>,
    pub deposit: Option<String>,
    pub commission: Option<String>,
    pub living_conditions: Option<String>,
    pub contact_info: Option<String>,
}

/// A rental advertisement extracted from a channel message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    pub location: Location,
    pub apartment: Apartment,
    pub building: Building,
    pub finance: Finance,
}

impl AdRecord {
    /// Build a record from the extraction model's JSON answer.
    ///
    /// The conversion is lenient about value types: numbers may arrive as
    /// strings, flags as "Yes"/"No", and missing keys fall back to zero or
    /// absent. Only a body that is not a JSON object is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Malformed`] when the text is not valid JSON
    /// or the top-level value is not an object.
    pub fn from_extraction_json(raw: &str) -> Result<Self, ExtractionError> {
        let body = strip_code_fence(raw);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ExtractionError::Malformed(format!("invalid JSON: {e}")))?;

        let Value::Object(fields) = value else {
            return Err(ExtractionError::Malformed(
                "expected a JSON object at the top level".to_string(),
            ));
        };

        Ok(Self {
            location: Location {
                city: text_field(&fields, "city"),
                metro: text_field(&fields, "metro"),
                address: text_field(&fields, "address"),
            },
            apartment: Apartment {
                rooms: int_field(&fields, "rooms"),
                renovation: text_field(&fields, "renovation"),
                kitchen_combined: flag_field(&fields, "kitchen_combined"),
                isolated_rooms: int_field(&fields, "isolated_rooms"),
                bathroom: text_field(&fields, "bathroom"),
                balcony: text_field(&fields, "balcony"),
                wardrobe: flag_field(&fields, "wardrobe"),
                furnishing: text_field(&fields, "furnishing"),
            },
            building: Building {
                parking: text_field(&fields, "parking"),
                proximity_to_metro: int_field(&fields, "proximity_to_metro"),
                infrastructure: text_field(&fields, "infrastructure"),
            },
            finance: Finance {
                price_per_month: int_field(&fields, "price_per_month"),
                utilities_payment: text_field(&fields, "utilities_payment"),
                deposit: text_field(&fields, "deposit"),
                commission: text_field(&fields, "commission"),
                living_conditions: text_field(&fields, "living_conditions"),
                contact_info: text_field(&fields, "contact_info"),
            },
        })
    }
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE_REGEX.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match fields.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        Value::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn int_field(fields: &Map<String, Value>, key: &str) -> i64 {
    match fields.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => parse_leading_int(s),
        _ => 0,
    }
}

// "50 000 руб." -> 50000, "2-комнатная" -> 2, "-5" -> -5
fn parse_leading_int(text: &str) -> i64 {
    let text = text.trim();
    let Some(start) = text.find(|c: char| c.is_ascii_digit()) else {
        return 0;
    };
    let negative = text[..start].ends_with('-');
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ' ' || *c == '\u{a0}')
        .filter(|c| c.is_ascii_digit())
        .collect();
    let value: i64 = digits.parse().unwrap_or(0);
    if negative {
        -value
    } else {
        value
    }
}

fn flag_field(fields: &Map<String, Value>, key: &str) -> bool {
    match fields.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "yes" | "да" | "true"),
        _ => false,
    }
}

fn or_unspecified(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("Not specified")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

impl fmt::Display for AdRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Location:")?;
        writeln!(f, "  City: {}", or_unspecified(&self.location.city))?;
        writeln!(f, "  Metro: {}", or_unspecified(&self.location.metro))?;
        writeln!(f, "  Address: {}", or_unspecified(&self.location.address))?;
        writeln!(f, "Apartment:")?;
        writeln!(f, "  Number of rooms: {}", self.apartment.rooms)?;
        writeln!(f, "  Renovation: {}", or_unspecified(&self.apartment.renovation))?;
        writeln!(
            f,
            "  Kitchen combined with room: {}",
            yes_no(self.apartment.kitchen_combined)
        )?;
        writeln!(f, "  Isolated rooms: {}", self.apartment.isolated_rooms)?;
        writeln!(f, "  Bathroom: {}", or_unspecified(&self.apartment.bathroom))?;
        writeln!(f, "  Balcony/Loggia: {}", or_unspecified(&self.apartment.balcony))?;
        writeln!(f, "  Wardrobe: {}", yes_no(self.apartment.wardrobe))?;
        writeln!(f, "  Furnishing: {}", or_unspecified(&self.apartment.furnishing))?;
        writeln!(f, "Building:")?;
        writeln!(f, "  Parking: {}", or_unspecified(&self.building.parking))?;
        writeln!(
            f,
            "  Proximity to metro: {} minutes on foot",
            self.building.proximity_to_metro
        )?;
        writeln!(f, "  Infrastructure: {}", or_unspecified(&self.building.infrastructure))?;
        writeln!(f, "Finance:")?;
        writeln!(f, "  Price per month: {}₽", self.finance.price_per_month)?;
        writeln!(
            f,
            "  Utilities payment: {}",
            or_unspecified(&self.finance.utilities_payment)
        )?;
        writeln!(f, "  Deposit: {}", or_unspecified(&self.finance.deposit))?;
        writeln!(f, "  Commission: {}", or_unspecified(&self.finance.commission))?;
        writeln!(
            f,
            "  Living conditions: {}",
            or_unspecified(&self.finance.living_conditions)
        )?;
        write!(
            f,
            "  Contact information: {}",
            or_unspecified(&self.finance.contact_info)
        )
    }
}
