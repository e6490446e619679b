//! Listing cards from the server-rendered results page.
//!
//! Selectors and icon names track one version of the portal's markup and are the first
//! thing to break when the portal redesigns.

use crate::models::{RawFieldMap, SaleType};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;

pub const SITE_ORIGIN: &str = "https://sa.aqar.fm";

/// Placeholder the portal renders for feature values it does not have
const UNDEFINED: &str = "undefined";

/// Price-text tokens meaning the ad is for rent, checked before the auction token
pub const RENTAL_TOKENS: [&str; 3] = ["ايجار", "شهري", "سنوي"];
pub const AUCTION_TOKEN: &str = "مزاد";

/// Feature icon file stem -> record field
const ICON_FIELDS: [(&str, &str); 6] = [
    ("area", "area_sqm"),
    ("bed-king", "num_bedrooms"),
    ("bath", "num_bathrooms"),
    ("couch", "num_living_rooms"),
    ("pinned-note", "zoning"),
    ("street", "street-width"),
];

mod selectors {
    use scraper::Selector;
    use std::sync::LazyLock;

    pub static CARD: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "#__next > main > div > div._root__Szbd6 > div > div:nth-child(2) \
             > div._container__Lu67A > div._list__Ka30R > div",
        )
        .unwrap()
    });

    pub static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

    pub static TITLE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse("a > div > div._content__W4gas > div._titleRow__1AWv1 > h4").unwrap()
    });

    pub static PRICE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse("a > div > div._content__W4gas > div._price__X51mi").unwrap()
    });

    pub static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse("a > div > div._content__W4gas > div._description__zVaD6").unwrap()
    });

    pub static CITY: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse("a > div > div._content__W4gas > div._footer__CnldH > p > span:nth-child(1)")
            .unwrap()
    });

    pub static DISTRICT: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse("a > div > div._content__W4gas > div._footer__CnldH > p > span:nth-child(2)")
            .unwrap()
    });

    pub static FEATURE_ICON: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "a > div > div._content__W4gas > div._specs__nbsgm .icon_icon___L1OO img[src]",
        )
        .unwrap()
    });
}

/// Classify a card's price text. Rental tokens win over the auction token.
pub fn infer_sale_type(price_text: &str) -> SaleType {
    if RENTAL_TOKENS.iter().any(|token| price_text.contains(token)) {
        SaleType::Rental
    } else if price_text.contains(AUCTION_TOKEN) {
        SaleType::Auction
    } else {
        SaleType::Sale
    }
}

/// Raw (uncleaned) price for a card given its sale type.
///
/// Rentals keep only the amount token, dropping the period/unit words around it.
pub fn price_value(price_text: &str, sale_type: SaleType) -> Option<String> {
    match sale_type {
        SaleType::Auction | SaleType::Unknown => None,
        SaleType::Rental => {
            let mut tokens = price_text.split_whitespace();
            let first = tokens.clone().next()?;
            let amount = tokens
                .find(|token| token.chars().any(|c| c.is_numeric()))
                .unwrap_or(first);
            Some(amount.to_string())
        }
        SaleType::Sale if price_text.contains(AUCTION_TOKEN) => None,
        SaleType::Sale => Some(price_text.to_string()),
    }
}

/// Record field for a feature icon file stem; unknown icons keep their own name.
pub fn icon_field(icon_name: &str) -> &str {
    ICON_FIELDS
        .iter()
        .find(|(icon, _)| *icon == icon_name)
        .map(|(_, field)| *field)
        .unwrap_or(icon_name)
}

/// Extract one raw field map per listing card.
pub fn extract_from_html(body: &str) -> Vec<RawFieldMap> {
    let document = Html::parse_document(body);
    let listings: Vec<RawFieldMap> = document.select(&selectors::CARD).map(parse_card).collect();
    debug!(cards = listings.len(), "Parsed listing cards from markup");
    listings
}

fn parse_card(card: ElementRef<'_>) -> RawFieldMap {
    let mut item = RawFieldMap::new();

    let price_text = select_text(card, &selectors::PRICE);
    let sale_type = price_text.as_deref().map(infer_sale_type);

    item.insert("title".into(), opt(select_text(card, &selectors::TITLE)));

    let url = card
        .select(&selectors::LINK)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(|href| format!("{SITE_ORIGIN}{href}"));
    item.insert("url".into(), opt(url));

    let price = match (&price_text, sale_type) {
        (Some(text), Some(kind)) => price_value(text, kind),
        _ => None,
    };
    item.insert("price".into(), opt(price));

    item.insert(
        "description".into(),
        opt(select_text(card, &selectors::DESCRIPTION)),
    );
    item.insert("city".into(), opt(select_text(card, &selectors::CITY)));

    let district = select_text(card, &selectors::DISTRICT)
        .map(|text| {
            text.trim_matches(|c: char| c == '-' || c.is_whitespace())
                .to_string()
        })
        .filter(|text| !text.is_empty());
    item.insert("district".into(), opt(district));

    item.insert(
        "sale_type".into(),
        opt(sale_type.map(|kind| kind.to_string())),
    );

    for (field, value) in feature_icons(card) {
        item.insert(field, value);
    }

    item
}

/// Icon + label pairs in the card's feature row.
fn feature_icons(card: ElementRef<'_>) -> Vec<(String, Value)> {
    let mut features = Vec::new();
    for img in card.select(&selectors::FEATURE_ICON) {
        let src = img.value().attr("src").unwrap_or_default();
        if src.is_empty() {
            continue;
        }
        let file = src.rsplit('/').next().unwrap_or(src);
        let icon_name = file.split('.').next().unwrap_or(file);

        // img sits in an icon span; the label is the text of the span's parent
        let label = img
            .parent()
            .and_then(|span| span.parent())
            .and_then(ElementRef::wrap)
            .map(stripped_text);

        let value = match label {
            Some(text) if text != UNDEFINED => Value::String(text),
            _ => Value::Null,
        };
        features.push((icon_field(icon_name).to_string(), value));
    }
    features
}

fn select_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let element = scope.select(selector).next()?;
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn opt(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Wrap cards in the results-page scaffolding the card selector expects.
    pub(crate) fn results_page(cards: &[String]) -> String {
        format!(
            r#"<html><body><div id="__next"><main><div><div class="_root__Szbd6"><div>
                <div>filters</div>
                <div><div class="_container__Lu67A"><div class="_list__Ka30R">{}</div></div></div>
            </div></div></div></main></div></body></html>"#,
            cards.join("\n")
        )
    }

    pub(crate) fn card(href: &str, title: &str, price: &str, features: &str) -> String {
        format!(
            r#"<div><a href="{href}"><div><div class="_content__W4gas">
                <div class="_titleRow__1AWv1"><h4>{title}</h4></div>
                <div class="_price__X51mi">{price}</div>
                <div class="_specs__nbsgm">{features}</div>
                <div class="_description__zVaD6">  شقة   واسعة  </div>
                <div class="_footer__CnldH"><p><span>الرياض</span><span> - حي العارض</span></p></div>
            </div></div></a></div>"#
        )
    }

    fn feature(icon: &str, label: &str) -> String {
        format!(
            r#"<div><span class="icon_icon___L1OO"><img src="/icons/{icon}.svg"/></span><span>{label}</span></div>"#
        )
    }

    #[test]
    fn test_rental_keyword_beats_auction() {
        assert_eq!(infer_sale_type("ايجار 3,500"), SaleType::Rental);
        assert_eq!(infer_sale_type("مزاد سنوي"), SaleType::Rental);
        assert_eq!(infer_sale_type("مزاد"), SaleType::Auction);
        assert_eq!(infer_sale_type("1,250,000"), SaleType::Sale);
    }

    #[test]
    fn test_price_value_per_sale_type() {
        assert_eq!(
            price_value("ايجار 3,500", SaleType::Rental).as_deref(),
            Some("3,500")
        );
        assert_eq!(
            price_value("40,000 / سنوي", SaleType::Rental).as_deref(),
            Some("40,000")
        );
        assert_eq!(price_value("مزاد", SaleType::Auction), None);
        assert_eq!(price_value("على السوم مزاد", SaleType::Sale), None);
        assert_eq!(
            price_value("1,250,000", SaleType::Sale).as_deref(),
            Some("1,250,000")
        );
    }

    #[test]
    fn test_icon_field_mapping() {
        assert_eq!(icon_field("bed-king"), "num_bedrooms");
        assert_eq!(icon_field("street"), "street-width");
        assert_eq!(icon_field("elevator"), "elevator");
    }

    #[test]
    fn test_extract_rental_card() {
        let features = [
            feature("area", "250"),
            feature("bed-king", "4"),
            feature("bath", "undefined"),
            feature("elevator", "نعم"),
        ]
        .concat();
        let page = results_page(&[card("/ad/123", "شقة للإيجار", "ايجار 3,500", &features)]);

        let listings = extract_from_html(&page);
        assert_eq!(listings.len(), 1);
        let item = &listings[0];
        assert_eq!(item["title"], "شقة للإيجار");
        assert_eq!(item["url"], "https://sa.aqar.fm/ad/123");
        assert_eq!(item["sale_type"], "rental");
        assert_eq!(item["price"], "3,500");
        assert_eq!(item["city"], "الرياض");
        assert_eq!(item["district"], "حي العارض");
        assert_eq!(item["area_sqm"], "250");
        assert_eq!(item["num_bedrooms"], "4");
        assert_eq!(item["num_bathrooms"], Value::Null);
        assert_eq!(item["elevator"], "نعم");
    }

    #[test]
    fn test_extract_auction_and_sale_cards() {
        let page = results_page(&[
            card("/ad/1", "أرض", "مزاد", ""),
            card("/ad/2", "فيلا", "1,250,000", ""),
        ]);

        let listings = extract_from_html(&page);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0]["sale_type"], "auction");
        assert_eq!(listings[0]["price"], Value::Null);
        assert_eq!(listings[1]["sale_type"], "sale");
        assert_eq!(listings[1]["price"], "1,250,000");
    }

    #[test]
    fn test_missing_sub_elements_are_null() {
        let page = results_page(&[r#"<div><span>no link here</span></div>"#.to_string()]);

        let listings = extract_from_html(&page);
        assert_eq!(listings.len(), 1);
        let item = &listings[0];
        assert_eq!(item["title"], Value::Null);
        assert_eq!(item["url"], Value::Null);
        assert_eq!(item["price"], Value::Null);
        assert_eq!(item["sale_type"], Value::Null);
        assert_eq!(item["district"], Value::Null);
    }

    #[test]
    fn test_page_without_cards() {
        assert!(extract_from_html("<html><body><p>nothing</p></body></html>").is_empty());
    }
}
