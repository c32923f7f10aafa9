//! Alias resolution for scraped source records.
//!
//! Producers disagree on field names (`title` vs `name`, `url` vs
//! `productUrl`, …). Each logical field has an ordered alias list; the first
//! alias holding a non-empty scalar wins. Everything downstream works on the
//! typed [`SourceRecord`].

use serde_json::Value;

use crate::identity::SourceIdentity;
use crate::models::lenient::{scalar_to_string, value_to_number};

pub const TITLE_ALIASES: &[&str] = &["title", "name", "productTitle"];
pub const URL_ALIASES: &[&str] = &["url", "productUrl", "sourceUrl", "link", "href", "permalink"];
pub const ID_ALIASES: &[&str] = &["id", "uuid", "productId", "product_id", "entrepediaId", "_id"];
pub const SLUG_ALIASES: &[&str] = &["slug"];
pub const DESCRIPTION_ALIASES: &[&str] = &["description", "longDescription"];
pub const SHORT_DESCRIPTION_ALIASES: &[&str] = &["shortDescription", "summary"];
pub const CATEGORY_ALIASES: &[&str] = &["mainCategory", "category", "type", "inferredType"];
pub const SUBCATEGORY_ALIASES: &[&str] = &["subCategory", "subcategory"];
pub const CONTENT_TYPE_ALIASES: &[&str] = &["contentType", "meta.contentType", "format", "type"];
pub const PRICE_ALIASES: &[&str] = &["price"];
pub const COVER_ALIASES: &[&str] = &[
    "coverLocalPath",
    "coverPath",
    "coverFile",
    "coverFilename",
    "cover",
    "image",
    "imageUrl",
    "coverUrl",
    "thumbnail",
    "assets.cover",
    "assets.image",
];
pub const LINK_ID_ALIASES: &[&str] = &["externalLinkId", "payhipId"];
pub const LINK_URL_ALIASES: &[&str] = &["externalLinkUrl", "payhipUrl"];

/// A scraped record after alias resolution. Every field is optional and
/// untrusted; an empty string never survives resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecord {
    pub title: Option<String>,
    pub url: Option<String>,
    pub id: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub content_type: Option<String>,
    pub price: Option<f64>,
    pub cover: Option<String>,
    pub link_id: Option<String>,
    pub link_url: Option<String>,
}

impl SourceRecord {
    /// Resolve aliases on a raw JSON value. Non-object values resolve to an
    /// empty record, which the caller skips for lack of a title.
    pub fn from_value(raw: &Value) -> Self {
        if !raw.is_object() {
            return Self::default();
        }

        Self {
            title: first_string(raw, TITLE_ALIASES).map(|t| t.trim().to_string()),
            url: first_string(raw, URL_ALIASES),
            id: first_string(raw, ID_ALIASES),
            slug: first_string(raw, SLUG_ALIASES),
            description: first_string(raw, DESCRIPTION_ALIASES),
            short_description: first_string(raw, SHORT_DESCRIPTION_ALIASES),
            category: first_string(raw, CATEGORY_ALIASES),
            subcategory: first_string(raw, SUBCATEGORY_ALIASES),
            content_type: first_string(raw, CONTENT_TYPE_ALIASES),
            price: first_number(raw, PRICE_ALIASES),
            cover: first_string(raw, COVER_ALIASES),
            link_id: first_string(raw, LINK_ID_ALIASES),
            link_url: first_string(raw, LINK_URL_ALIASES),
        }
    }

    pub fn identity(&self) -> SourceIdentity<'_> {
        SourceIdentity {
            url: self.url.as_deref(),
            id: self.id.as_deref(),
            slug: self.slug.as_deref(),
        }
    }
}

/// Value at a dotted path (`"meta.contentType"`).
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

/// First alias holding a non-empty scalar, as a string.
pub fn first_string(value: &Value, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| lookup(value, alias))
        .filter_map(scalar_to_string)
        .find(|s| !s.trim().is_empty())
}

/// First alias holding a finite number or numeric string.
pub fn first_number(value: &Value, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .filter_map(|alias| lookup(value, alias))
        .find_map(value_to_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases_resolve_in_order() {
        let raw = json!({
            "name": "Launch Kit",
            "link": "https://app.entrepedia.co/library/product/abc",
            "productUrl": "https://app.entrepedia.co/library/product/preferred",
            "uuid": "",
            "productId": "P-9",
            "meta": {"contentType": "Template"},
            "price": "12",
            "coverPath": "covers\\launch.png"
        });
        let record = SourceRecord::from_value(&raw);
        assert_eq!(record.title.as_deref(), Some("Launch Kit"));
        assert_eq!(
            record.url.as_deref(),
            Some("https://app.entrepedia.co/library/product/preferred")
        );
        assert_eq!(record.id.as_deref(), Some("P-9"));
        assert_eq!(record.content_type.as_deref(), Some("Template"));
        assert_eq!(record.price, Some(12.0));
        assert_eq!(record.cover.as_deref(), Some("covers\\launch.png"));
    }

    #[test]
    fn test_title_is_trimmed_and_blank_is_absent() {
        let record = SourceRecord::from_value(&json!({"title": "  Growth Hacks  "}));
        assert_eq!(record.title.as_deref(), Some("Growth Hacks"));

        let record = SourceRecord::from_value(&json!({"title": "   ", "name": "Fallback"}));
        assert_eq!(record.title.as_deref(), Some("Fallback"));
    }

    #[test]
    fn test_non_object_is_empty() {
        assert_eq!(SourceRecord::from_value(&json!("just a string")), SourceRecord::default());
        assert_eq!(SourceRecord::from_value(&json!(null)), SourceRecord::default());
    }

    #[test]
    fn test_nested_lookup() {
        let raw = json!({"assets": {"cover": "x.png"}});
        assert_eq!(first_string(&raw, COVER_ALIASES).as_deref(), Some("x.png"));
        assert_eq!(lookup(&raw, "assets.missing"), None);
    }
}
