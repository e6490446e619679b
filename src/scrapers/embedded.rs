//! Listings from the page state the rendering framework serializes into the page.
//!
//! The state keeps listing entities in a normalized cache: the results query holds
//! references, and each reference names an entity stored next to it.

use crate::categories;
use crate::error::ExtractError;
use crate::models::{RawFieldMap, SaleType};
use crate::scrapers::dom::{self, SITE_ORIGIN};
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

static STATE_SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[id="__NEXT_DATA__"]"#).unwrap());

const QUERY_PREFIX: &str = r#"find({"from":"#;
const QUERY_SUFFIX: &str = "})";

/// Entity key -> record field, copied as-is
const DIRECT_FIELDS: [(&str, &str); 38] = [
    ("id", "id"),
    ("title", "title"),
    ("price", "price"),
    ("area", "area_sqm"),
    ("beds", "num_bedrooms"),
    ("wc", "num_bathrooms"),
    ("livings", "num_living_rooms"),
    ("type", "zoning"),
    ("street_width", "street-width"),
    ("city", "city"),
    ("district", "district"),
    ("address", "address"),
    ("content", "description"),
    ("meter_price", "meter_price"),
    ("price_2_payments", "price_2_payments"),
    ("price_4_payments", "price_4_payments"),
    ("price_12_payments", "price_12_payments"),
    ("rnpl_monthly_price", "rnpl_monthly_price"),
    ("deed_area", "deed_area"),
    ("ketchen", "num_kitchens"),
    ("rooms", "num_rooms"),
    ("fl", "floor_level"),
    ("age", "age"),
    ("city_id", "city_id"),
    ("district_id", "district_id"),
    ("province_id", "province_id"),
    ("rent_period", "rent_period"),
    ("direction", "direction"),
    ("street_direction", "street_direction"),
    ("ad_license_number", "ad_license_number"),
    ("deed_number", "deed_number"),
    ("plan_no", "plan_no"),
    ("parcel_no", "parcel_no"),
    ("user_type", "user_type"),
    ("create_time", "create_time"),
    ("published_at", "published_at"),
    ("last_update", "last_update"),
    ("is_auction", "is_auction"),
];

/// Amenity and status flags, entity key -> record field
const FLAG_FIELDS: [(&str, &str); 27] = [
    ("furnished", "furnished"),
    ("duplex", "duplex"),
    ("ac", "ac"),
    ("lift", "lift"),
    ("maid", "maid_room"),
    ("driver", "driver_room"),
    ("pool", "pool"),
    ("basement", "basement"),
    ("backyard", "backyard"),
    ("playground", "playground"),
    ("car_entrance", "car_entrance"),
    ("stairs", "stairs"),
    ("stores", "stores"),
    ("wells", "wells"),
    ("trees", "trees"),
    ("water_availability", "water_availability"),
    ("electrical_availability", "electrical_availability"),
    ("drainage_availability", "drainage_availability"),
    ("private_roof", "private_roof"),
    ("two_entrances", "two_entrances"),
    ("special_entrance", "special_entrance"),
    ("apartment_in_villa", "apartment_in_villa"),
    ("daily_rentable", "is_daily_rental"),
    ("verified", "verified"),
    ("boosted", "boosted"),
    ("premium", "premium"),
    ("has_img", "has_img"),
];

/// Flags read from the entity under the same name
const SAME_NAME_FLAGS: [&str; 2] = ["has_video", "rega_licensed"];

/// Extract listings from the embedded page state, falling back to the rendered cards when
/// the page carries no state script.
///
/// A state script that is present but unreadable yields no listings for the page.
pub fn extract_from_embedded_state(body: &str) -> Vec<RawFieldMap> {
    let document = Html::parse_document(body);
    let state = document
        .select(&STATE_SCRIPT)
        .next()
        .map(|script| script.text().collect::<String>());

    let Some(state) = state else {
        debug!("No embedded state script, falling back to card markup");
        return dom::extract_from_html(body);
    };

    match parse_state(&state) {
        Ok(listings) => {
            debug!(listings = listings.len(), "Parsed listings from embedded state");
            listings
        }
        Err(e) => {
            warn!(error = %e, "Error parsing embedded state");
            Vec::new()
        }
    }
}

fn parse_state(state: &str) -> Result<Vec<RawFieldMap>, ExtractError> {
    let data: Value = serde_json::from_str(state)?;

    let cache = ["props", "pageProps", "__APOLLO_STATE__"]
        .iter()
        .try_fold(&data, |node, key| {
            node.get(key)
                .ok_or_else(|| ExtractError::MissingPath(key.to_string()))
        })?;
    let web = cache
        .get("ROOT_QUERY")
        .and_then(|root| root.get("WEB"))
        .and_then(Value::as_object)
        .ok_or_else(|| ExtractError::MissingPath("ROOT_QUERY.WEB".into()))?;

    let query = find_listing_query(web).ok_or(ExtractError::MissingListingQuery)?;
    let references = web[query]
        .get("listings")
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractError::MissingPath(format!("{query}.listings")))?;

    let mut output = Vec::with_capacity(references.len());
    for reference in references {
        let Some(key) = reference_key(reference) else {
            debug!(reference = %reference, "Unreadable listing reference");
            continue;
        };
        match cache.get(key).and_then(Value::as_object) {
            Some(entity) => output.push(project_entity(entity)),
            None => debug!(reference = key, "Listing reference not in state, skipping"),
        }
    }
    Ok(output)
}

/// The results query key embeds paging parameters that change per page, so it is matched
/// by shape rather than by value.
fn find_listing_query(web: &Map<String, Value>) -> Option<&str> {
    web.keys()
        .map(String::as_str)
        .find(|key| key.starts_with(QUERY_PREFIX) && key.ends_with(QUERY_SUFFIX))
}

fn reference_key(reference: &Value) -> Option<&str> {
    match reference {
        Value::String(key) => Some(key.as_str()),
        Value::Object(link) => link.get("__ref").and_then(Value::as_str),
        _ => None,
    }
}

fn project_entity(entity: &Map<String, Value>) -> RawFieldMap {
    let field = |key: &str| entity.get(key).cloned().unwrap_or(Value::Null);
    let mut item = RawFieldMap::new();

    for &(source, target) in DIRECT_FIELDS.iter().chain(FLAG_FIELDS.iter()) {
        item.insert(target.to_string(), field(source));
    }
    for name in SAME_NAME_FLAGS {
        item.insert(name.to_string(), field(name));
    }

    let url = entity
        .get("path")
        .and_then(Value::as_str)
        .map(|path| Value::String(format!("{SITE_ORIGIN}{path}")))
        .unwrap_or(Value::Null);
    item.insert("url".into(), url);

    let location = entity.get("location");
    let coordinate = |key: &str| {
        location
            .and_then(|loc| loc.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    };
    item.insert("latitude".into(), coordinate("lat"));
    item.insert("longitude".into(), coordinate("lng"));

    let user = entity.get("user");
    let user_field = |key: &str| {
        user.and_then(|u| u.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    };
    item.insert("company_name".into(), user_field("company_name"));
    item.insert("user_paid_tier".into(), user_field("paid"));
    item.insert("user_verified".into(), user_field("iam_verified"));

    let images = entity
        .get("imgs")
        .cloned()
        .filter(|imgs| !imgs.is_null())
        .unwrap_or_else(|| Value::Array(Vec::new()));
    item.insert("images".into(), images);

    let videos: Vec<Value> = entity
        .get("videos")
        .and_then(Value::as_array)
        .map(|videos| {
            videos
                .iter()
                .map(|video| video.get("video").cloned().unwrap_or(Value::Null))
                .collect()
        })
        .unwrap_or_default();
    item.insert("videos".into(), Value::Array(videos));

    let category = entity
        .get("category")
        .and_then(category_id)
        .and_then(categories::resolve);
    item.insert(
        "category".into(),
        category
            .and_then(|c| serde_json::to_value(c).ok())
            .unwrap_or(Value::Null),
    );

    let is_auction = truthy(entity.get("is_auction"));
    let is_rental = category.and_then(|c| c.is_rental);
    let sale_type = match (is_auction, is_rental) {
        (true, _) => SaleType::Auction,
        (false, Some(true)) => SaleType::Rental,
        (false, Some(false)) => SaleType::Sale,
        (false, None) => SaleType::Unknown,
    };
    item.insert("sale_type".into(), Value::String(sale_type.to_string()));
    item.insert("is_rental".into(), opt_bool(is_rental));
    item.insert(
        "is_sale".into(),
        opt_bool(is_rental.map(|rental| !rental && !is_auction)),
    );

    item
}

/// Category ids arrive as numbers or as numeric strings.
fn category_id(value: &Value) -> Option<i64> {
    match value {
        Value::String(text) => text.trim().parse().ok(),
        other => other.as_i64(),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn opt_bool(value: Option<bool>) -> Value {
    value.map(Value::Bool).unwrap_or(Value::Null)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scrapers::dom::tests::{card, results_page};
    use serde_json::json;

    pub(crate) fn state_page(state: &Value) -> String {
        format!(
            r#"<html><head></head><body><div id="__next"></div>
            <script id="__NEXT_DATA__" type="application/json">{state}</script></body></html>"#
        )
    }

    pub(crate) fn apollo_state(query: &str, entities: &[Value], refs: &[&str]) -> Value {
        let mut cache = Map::new();
        for entity in entities {
            let key = format!("ElasticWebListing:{}", entity["id"]);
            cache.insert(key, entity.clone());
        }
        let mut web = Map::new();
        web.insert("__typename".into(), json!("WebQuery"));
        web.insert(query.into(), json!({ "listings": refs }));
        cache.insert("ROOT_QUERY".into(), json!({ "WEB": web }));
        json!({ "props": { "pageProps": { "__APOLLO_STATE__": cache } } })
    }

    pub(crate) fn entity(id: i64, category: i64) -> Value {
        json!({
            "__typename": "ElasticWebListing",
            "id": id,
            "title": "شقة للإيجار في حي العارض",
            "price": 40000,
            "area": 50,
            "beds": 2,
            "wc": 1,
            "livings": 1,
            "type": null,
            "street_width": 30,
            "category": category,
            "city": "الرياض",
            "district": "حي العارض",
            "address": "شارع اسماء بنت مالك, حي العارض",
            "content": "شقق بتشطيب فاخر",
            "location": { "__typename": "Location", "lat": 24.896124, "lng": 46.611506 },
            "imgs": ["046793280_1764844417913.jpg", "046793285_1764844437360.jpg"],
            "videos": [{ "__typename": "Video", "video": "046793286_1764686613180" }],
            "ketchen": 1,
            "lift": 1,
            "pool": null,
            "maid": 0,
            "water_availability": true,
            "has_video": 1,
            "create_time": 1764684040,
            "path": format!("/شقق-للإيجار/الرياض/{id}"),
            "user": { "paid": 5, "iam_verified": true, "company_name": "شركة كبار نجد" },
            "is_auction": null
        })
    }

    const QUERY: &str =
        r#"find({"from":20,"size":20,"sort":{"create_time":"desc","has_img":"desc"},"where":{}})"#;

    #[test]
    fn test_projects_entities_in_reference_order() {
        let state = apollo_state(
            QUERY,
            &[entity(6490057, 1), entity(6490058, 3)],
            &["ElasticWebListing:6490058", "ElasticWebListing:6490057"],
        );

        let listings = extract_from_embedded_state(&state_page(&state));
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0]["id"], 6490058);
        assert_eq!(listings[1]["id"], 6490057);

        let rental = &listings[1];
        assert_eq!(rental["area_sqm"], 50);
        assert_eq!(rental["num_bedrooms"], 2);
        assert_eq!(rental["num_bathrooms"], 1);
        assert_eq!(rental["num_kitchens"], 1);
        assert_eq!(rental["street-width"], 30);
        assert_eq!(rental["latitude"], 24.896124);
        assert_eq!(rental["longitude"], 46.611506);
        assert_eq!(rental["description"], "شقق بتشطيب فاخر");
        assert_eq!(
            rental["images"],
            json!(["046793280_1764844417913.jpg", "046793285_1764844437360.jpg"])
        );
        assert_eq!(rental["videos"], json!(["046793286_1764686613180"]));
        assert_eq!(rental["category"]["en"], "Apartment for rent");
        assert_eq!(rental["sale_type"], "rental");
        assert_eq!(rental["is_rental"], true);
        assert_eq!(rental["maid_room"], 0);
        assert_eq!(rental["user_paid_tier"], 5);
        assert_eq!(rental["company_name"], "شركة كبار نجد");
        assert_eq!(
            rental["url"],
            "https://sa.aqar.fm/شقق-للإيجار/الرياض/6490057"
        );

        assert_eq!(listings[0]["sale_type"], "sale");
        assert_eq!(listings[0]["is_sale"], true);
    }

    #[test]
    fn test_reference_objects_are_followed() {
        let mut state = apollo_state(QUERY, &[entity(7, 2)], &[]);
        state["props"]["pageProps"]["__APOLLO_STATE__"]["ROOT_QUERY"]["WEB"][QUERY]["listings"] =
            json!([{ "__ref": "ElasticWebListing:7" }]);

        let listings = extract_from_embedded_state(&state_page(&state));
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0]["id"], 7);
    }

    #[test]
    fn test_query_key_matched_by_shape() {
        let other_query = r#"find({"from":40,"size":20,"where":{"category":1}})"#;
        let state = apollo_state(other_query, &[entity(1, 1)], &["ElasticWebListing:1"]);

        let listings = extract_from_embedded_state(&state_page(&state));
        assert_eq!(listings.len(), 1);
    }

    #[test]
    fn test_missing_reference_skips_listing() {
        let state = apollo_state(
            QUERY,
            &[entity(1, 1)],
            &["ElasticWebListing:404", "ElasticWebListing:1"],
        );

        let listings = extract_from_embedded_state(&state_page(&state));
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0]["id"], 1);
    }

    #[test]
    fn test_unknown_category_and_auction() {
        let mut auction = entity(9, 777);
        auction["is_auction"] = json!(true);
        let state = apollo_state(QUERY, &[auction], &["ElasticWebListing:9"]);

        let listings = extract_from_embedded_state(&state_page(&state));
        assert_eq!(listings[0]["category"], Value::Null);
        assert_eq!(listings[0]["sale_type"], "auction");
        assert_eq!(listings[0]["is_sale"], Value::Null);
    }

    #[test]
    fn test_category_id_given_as_text() {
        let mut listing = entity(5, 1);
        listing["category"] = json!(" 1 ");
        let state = apollo_state(QUERY, &[listing], &["ElasticWebListing:5"]);

        let listings = extract_from_embedded_state(&state_page(&state));
        assert_eq!(listings[0]["category"]["en"], "Apartment for rent");
        assert_eq!(listings[0]["sale_type"], "rental");
        assert_eq!(listings[0]["is_rental"], true);
    }

    #[test]
    fn test_non_numeric_category_text_is_unknown() {
        let mut listing = entity(6, 1);
        listing["category"] = json!("apartments");
        let state = apollo_state(QUERY, &[listing], &["ElasticWebListing:6"]);

        let listings = extract_from_embedded_state(&state_page(&state));
        assert_eq!(listings[0]["category"], Value::Null);
        assert_eq!(listings[0]["sale_type"], "unknown");
    }

    #[test]
    fn test_no_query_key_yields_empty_without_fallback() {
        let state = apollo_state("search({})", &[entity(1, 1)], &["ElasticWebListing:1"]);
        // Cards in the markup must not be picked up once the state script exists
        let page = format!(
            "{}{}",
            state_page(&state),
            results_page(&[card("/ad/1", "t", "1,000", "")])
        );

        assert!(extract_from_embedded_state(&page).is_empty());
    }

    #[test]
    fn test_malformed_state_yields_empty_without_fallback() {
        let page = format!(
            r#"{}<script id="__NEXT_DATA__">{{"props": oops</script>"#,
            results_page(&[card("/ad/1", "t", "1,000", "")])
        );

        assert!(extract_from_embedded_state(&page).is_empty());
    }

    #[test]
    fn test_missing_path_yields_empty() {
        let page = state_page(&json!({ "props": { "pageProps": {} } }));
        assert!(extract_from_embedded_state(&page).is_empty());
        assert!(matches!(
            parse_state(r#"{"props": {"pageProps": {}}}"#),
            Err(ExtractError::MissingPath(_))
        ));
        assert!(matches!(parse_state("not json"), Err(ExtractError::Json(_))));
    }

    #[test]
    fn test_absent_script_falls_back_to_cards() {
        let page = results_page(&[card("/ad/5", "فيلا", "1,250,000", "")]);

        let listings = extract_from_embedded_state(&page);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0]["url"], "https://sa.aqar.fm/ad/5");
        assert!(!listings[0].contains_key("id"));
    }
}
