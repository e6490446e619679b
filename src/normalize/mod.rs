//! Column cleaning and deduplication.
//!
//! Both extractors feed the same projection: a raw field map goes in, a typed
//! [`ListingRecord`] comes out. Normalizing a record that was already normalized and
//! serialized back with [`ListingRecord::to_raw`] yields the same record.

pub mod clean;
pub mod literal;

use crate::categories::CategoryMetadata;
use crate::models::{AmenityFlags, ListingRecord, RawFieldMap, SaleType};
use clean::{
    clean_bool, clean_list, clean_numeric, clean_object, clean_price, clean_text,
    clean_timestamp,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::info;

pub const PRICE_COLUMNS: [&str; 6] = [
    "price",
    "meter_price",
    "price_2_payments",
    "price_4_payments",
    "price_12_payments",
    "rnpl_monthly_price",
];

pub const NUMERIC_COLUMNS: [&str; 16] = [
    "area_sqm",
    "deed_area",
    "num_bedrooms",
    "num_bathrooms",
    "num_living_rooms",
    "num_kitchens",
    "num_rooms",
    "floor_level",
    "age",
    "street_width",
    "city_id",
    "district_id",
    "province_id",
    "latitude",
    "longitude",
    "user_paid_tier",
];

pub const BOOLEAN_COLUMNS: [&str; 33] = [
    "furnished",
    "duplex",
    "ac",
    "lift",
    "maid_room",
    "driver_room",
    "pool",
    "basement",
    "backyard",
    "playground",
    "car_entrance",
    "stairs",
    "stores",
    "wells",
    "trees",
    "water_availability",
    "electrical_availability",
    "drainage_availability",
    "private_roof",
    "two_entrances",
    "special_entrance",
    "apartment_in_villa",
    "is_rental",
    "is_sale",
    "is_auction",
    "is_daily_rental",
    "verified",
    "boosted",
    "premium",
    "has_img",
    "has_video",
    "user_verified",
    "rega_licensed",
];

pub const TEXT_COLUMNS: [&str; 18] = [
    "id",
    "title",
    "url",
    "rent_period",
    "zoning",
    "direction",
    "city",
    "district",
    "address",
    "sale_type",
    "ad_license_number",
    "deed_number",
    "plan_no",
    "parcel_no",
    "user_type",
    "company_name",
    "description",
    "street_direction",
];

pub const TIMESTAMP_COLUMNS: [&str; 3] = ["create_time", "published_at", "last_update"];

pub const LIST_COLUMNS: [&str; 2] = ["images", "videos"];

/// Alternate raw names -> canonical column
const ALIASES: [(&str, &str); 2] = [("street-width", "street_width"), ("neighborhood", "district")];

const EXTRAS_KEY: &str = "extras";

fn is_schema_column(key: &str) -> bool {
    key == "category"
        || key == EXTRAS_KEY
        || ALIASES.iter().any(|(alias, _)| *alias == key)
        || PRICE_COLUMNS
            .iter()
            .chain(NUMERIC_COLUMNS.iter())
            .chain(BOOLEAN_COLUMNS.iter())
            .chain(TEXT_COLUMNS.iter())
            .chain(TIMESTAMP_COLUMNS.iter())
            .chain(LIST_COLUMNS.iter())
            .any(|column| *column == key)
}

/// Raw value for a column, looking through its aliases when the canonical key is empty.
fn column<'a>(raw: &'a RawFieldMap, name: &str) -> &'a Value {
    let aliases = ALIASES
        .iter()
        .filter(|(_, canonical)| *canonical == name)
        .map(|(alias, _)| *alias);
    std::iter::once(name)
        .chain(aliases)
        .filter_map(|key| raw.get(key))
        .find(|value| !value.is_null())
        .unwrap_or(&Value::Null)
}

fn string_items(items: Vec<Value>) -> Option<Vec<String>> {
    let strings: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        })
        .collect();
    if strings.is_empty() {
        None
    } else {
        Some(strings)
    }
}

fn clean_category(value: &Value) -> Option<CategoryMetadata> {
    let entries = clean_object(value)?;
    serde_json::from_value(Value::Object(entries)).ok()
}

fn clean_extras(raw: &RawFieldMap) -> BTreeMap<String, String> {
    let mut extras = BTreeMap::new();
    if let Some(Value::Object(nested)) = raw.get(EXTRAS_KEY) {
        for (key, value) in nested {
            if let Some(text) = clean_text(value) {
                extras.insert(key.clone(), text);
            }
        }
    }
    for (key, value) in raw {
        if is_schema_column(key) {
            continue;
        }
        if let Some(text) = clean_text(value) {
            extras.insert(key.clone(), text);
        }
    }
    extras
}

/// Clean one raw field map into a typed record.
pub fn normalize_record(raw: &RawFieldMap) -> ListingRecord {
    let price = |name: &str| clean_price(column(raw, name));
    let number = |name: &str| clean_numeric(column(raw, name));
    let flag = |name: &str| clean_bool(column(raw, name));
    let text = |name: &str| clean_text(column(raw, name));
    let timestamp = |name: &str| clean_timestamp(column(raw, name));
    let list = |name: &str| clean_list(column(raw, name)).and_then(string_items);

    ListingRecord {
        id: text("id"),
        url: text("url"),

        sale_type: text("sale_type").map(|label| SaleType::from_label(&label)),
        category: clean_category(column(raw, "category")),

        price: price("price"),
        meter_price: price("meter_price"),
        price_2_payments: price("price_2_payments"),
        price_4_payments: price("price_4_payments"),
        price_12_payments: price("price_12_payments"),
        rnpl_monthly_price: price("rnpl_monthly_price"),

        area_sqm: number("area_sqm"),
        deed_area: number("deed_area"),
        num_bedrooms: number("num_bedrooms"),
        num_bathrooms: number("num_bathrooms"),
        num_living_rooms: number("num_living_rooms"),
        num_kitchens: number("num_kitchens"),
        num_rooms: number("num_rooms"),
        floor_level: number("floor_level"),
        age: number("age"),
        street_width: number("street_width"),
        user_paid_tier: number("user_paid_tier"),

        city: text("city"),
        district: text("district"),
        address: text("address"),
        direction: text("direction"),
        street_direction: text("street_direction"),
        city_id: number("city_id"),
        district_id: number("district_id"),
        province_id: number("province_id"),
        latitude: number("latitude"),
        longitude: number("longitude"),

        flags: AmenityFlags {
            furnished: flag("furnished"),
            duplex: flag("duplex"),
            ac: flag("ac"),
            lift: flag("lift"),
            maid_room: flag("maid_room"),
            driver_room: flag("driver_room"),
            pool: flag("pool"),
            basement: flag("basement"),
            backyard: flag("backyard"),
            playground: flag("playground"),
            car_entrance: flag("car_entrance"),
            stairs: flag("stairs"),
            stores: flag("stores"),
            wells: flag("wells"),
            trees: flag("trees"),
            water_availability: flag("water_availability"),
            electrical_availability: flag("electrical_availability"),
            drainage_availability: flag("drainage_availability"),
            private_roof: flag("private_roof"),
            two_entrances: flag("two_entrances"),
            special_entrance: flag("special_entrance"),
            apartment_in_villa: flag("apartment_in_villa"),
            is_rental: flag("is_rental"),
            is_sale: flag("is_sale"),
            is_auction: flag("is_auction"),
            is_daily_rental: flag("is_daily_rental"),
            verified: flag("verified"),
            boosted: flag("boosted"),
            premium: flag("premium"),
            has_img: flag("has_img"),
            has_video: flag("has_video"),
            user_verified: flag("user_verified"),
            rega_licensed: flag("rega_licensed"),
        },

        images: list("images"),
        videos: list("videos"),

        title: text("title"),
        description: text("description"),
        zoning: text("zoning"),
        rent_period: text("rent_period"),
        ad_license_number: text("ad_license_number"),
        deed_number: text("deed_number"),
        plan_no: text("plan_no"),
        parcel_no: text("parcel_no"),
        user_type: text("user_type"),
        company_name: text("company_name"),

        create_time: timestamp("create_time"),
        published_at: timestamp("published_at"),
        last_update: timestamp("last_update"),

        extras: clean_extras(raw),
    }
}

/// Clean every raw record, preserving order.
pub fn normalize(records: &[RawFieldMap]) -> Vec<ListingRecord> {
    records.iter().map(normalize_record).collect()
}

/// Drop records that repeat an earlier listing; the first occurrence wins.
///
/// Records are keyed by `id`. A record without an id is keyed by its `url` and is dropped
/// when any earlier kept record had that url. Records with neither are always kept.
pub fn dedupe(records: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let before = records.len();
    let mut seen_ids = HashSet::new();
    let mut seen_urls = HashSet::new();

    let kept: Vec<ListingRecord> = records
        .into_iter()
        .filter(|record| {
            let fresh = match (&record.id, &record.url) {
                (Some(id), _) => !seen_ids.contains(id),
                (None, Some(url)) => !seen_urls.contains(url),
                (None, None) => true,
            };
            if fresh {
                if let Some(id) = &record.id {
                    seen_ids.insert(id.clone());
                }
                if let Some(url) = &record.url {
                    seen_urls.insert(url.clone());
                }
            }
            fresh
        })
        .collect();

    info!(
        before,
        after = kept.len(),
        dropped = before - kept.len(),
        "Removed duplicate listings"
    );
    kept
}
