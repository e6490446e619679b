use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::categories::CategoryMetadata;

/// Untyped field map produced by the extractors, one per listing card or entity.
pub type RawFieldMap = serde_json::Map<String, Value>;

/// How the listing is offered
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SaleType {
    Sale,
    Rental,
    Auction,
    Unknown,
}

impl SaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleType::Sale => "sale",
            SaleType::Rental => "rental",
            SaleType::Auction => "auction",
            SaleType::Unknown => "unknown",
        }
    }

    /// Parse a cleaned text value. Unrecognized labels map to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "sale" => SaleType::Sale,
            "rental" => SaleType::Rental,
            "auction" => SaleType::Auction,
            _ => SaleType::Unknown,
        }
    }
}

impl fmt::Display for SaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state amenity and status flags. `None` means the source did not say.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AmenityFlags {
    pub furnished: Option<bool>,
    pub duplex: Option<bool>,
    pub ac: Option<bool>,
    pub lift: Option<bool>,
    pub maid_room: Option<bool>,
    pub driver_room: Option<bool>,
    pub pool: Option<bool>,
    pub basement: Option<bool>,
    pub backyard: Option<bool>,
    pub playground: Option<bool>,
    pub car_entrance: Option<bool>,
    pub stairs: Option<bool>,
    pub stores: Option<bool>,
    pub wells: Option<bool>,
    pub trees: Option<bool>,
    pub water_availability: Option<bool>,
    pub electrical_availability: Option<bool>,
    pub drainage_availability: Option<bool>,
    pub private_roof: Option<bool>,
    pub two_entrances: Option<bool>,
    pub special_entrance: Option<bool>,
    pub apartment_in_villa: Option<bool>,
    pub is_rental: Option<bool>,
    pub is_sale: Option<bool>,
    pub is_auction: Option<bool>,
    pub is_daily_rental: Option<bool>,
    pub verified: Option<bool>,
    pub boosted: Option<bool>,
    pub premium: Option<bool>,
    pub has_img: Option<bool>,
    pub has_video: Option<bool>,
    pub user_verified: Option<bool>,
    pub rega_licensed: Option<bool>,
}

/// One cleaned property ad.
///
/// Every field is optional: a missing or unparsable source value is `None`, never a
/// zero or an empty string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub id: Option<String>,
    pub url: Option<String>,

    pub sale_type: Option<SaleType>,
    pub category: Option<CategoryMetadata>,

    pub price: Option<f64>,
    pub meter_price: Option<f64>,
    pub price_2_payments: Option<f64>,
    pub price_4_payments: Option<f64>,
    pub price_12_payments: Option<f64>,
    pub rnpl_monthly_price: Option<f64>,

    pub area_sqm: Option<f64>,
    pub deed_area: Option<f64>,
    pub num_bedrooms: Option<f64>,
    pub num_bathrooms: Option<f64>,
    pub num_living_rooms: Option<f64>,
    pub num_kitchens: Option<f64>,
    pub num_rooms: Option<f64>,
    pub floor_level: Option<f64>,
    pub age: Option<f64>,
    pub street_width: Option<f64>,
    pub user_paid_tier: Option<f64>,

    pub city: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub direction: Option<String>,
    pub street_direction: Option<String>,
    pub city_id: Option<f64>,
    pub district_id: Option<f64>,
    pub province_id: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    #[serde(flatten)]
    pub flags: AmenityFlags,

    pub images: Option<Vec<String>>,
    pub videos: Option<Vec<String>>,

    pub title: Option<String>,
    pub description: Option<String>,
    pub zoning: Option<String>,
    pub rent_period: Option<String>,
    pub ad_license_number: Option<String>,
    pub deed_number: Option<String>,
    pub plan_no: Option<String>,
    pub parcel_no: Option<String>,
    pub user_type: Option<String>,
    pub company_name: Option<String>,

    pub create_time: Option<f64>,
    pub published_at: Option<f64>,
    pub last_update: Option<f64>,

    /// Extractor fields outside the typed schema, such as unrecognized feature icons
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl ListingRecord {
    /// Serialize back into the raw map shape the extractors produce.
    pub fn to_raw(&self) -> RawFieldMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => RawFieldMap::new(),
        }
    }
}
