//! Static category reference table, keyed by the portal's numeric category id.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Commercial intent of a category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Rent,
    Sale,
    Daily,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PropertyCategory {
    Apartment,
    Building,
    Chalet,
    Farm,
    Flat,
    Floor,
    Hall,
    House,
    Land,
    Lounge,
    Office,
    Other,
    Room,
    Store,
    Studio,
    Tent,
    Villa,
    Warehouse,
}

/// Descriptive metadata for one category.
///
/// Field names on the wire follow the portal's own table so a serialized category
/// parses back into the same value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoryMetadata {
    pub id: Option<i64>,
    /// Arabic display name
    pub name: Option<String>,
    #[serde(rename = "en")]
    pub english_name: Option<String>,
    pub plural: Option<String>,
    /// URL-safe slug
    pub uri: Option<String>,
    pub path: Option<String>,
    pub keywords: Vec<String>,
    pub description: Option<String>,
    #[serde(rename = "is_rent")]
    pub is_rental: Option<bool>,
    #[serde(rename = "ga_listing_type")]
    pub listing_type: Option<ListingType>,
    #[serde(rename = "ga_property_category")]
    pub property_category: Option<PropertyCategory>,
    pub index: Option<i64>,
}

static CATEGORY_TABLE: LazyLock<HashMap<i64, CategoryMetadata>> = LazyLock::new(|| {
    let entries: Vec<CategoryMetadata> = serde_json::from_str(include_str!("categories.json"))
        .expect("embedded category table is valid JSON");
    entries
        .into_iter()
        .filter_map(|entry| entry.id.map(|id| (id, entry)))
        .collect()
});

/// Look up a category by id. Unknown ids resolve to `None`.
pub fn resolve(category_id: i64) -> Option<&'static CategoryMetadata> {
    CATEGORY_TABLE.get(&category_id)
}
