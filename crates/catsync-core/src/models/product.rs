use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::models::lenient::{self, scalar_to_string, value_to_number};

// ─── Product ────────────────────────────────────────────────

/// A catalog entry: one sellable digital product.
///
/// Known fields are written first, in declaration order; any other keys found
/// in the catalog are kept in `extra` and written after them, sorted.
/// Legacy key names (`mainCategory`, `payhipUrl`, …) are accepted on read and
/// written back under the canonical names. A record may carry both; the
/// canonical value wins when it is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct Product {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        serialize_with = "lenient::empty_if_none"
    )]
    pub description: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        serialize_with = "lenient::empty_if_none"
    )]
    pub short_description: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        serialize_with = "lenient::empty_if_none"
    )]
    pub category: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        serialize_with = "lenient::empty_if_none"
    )]
    pub subcategory: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_format",
        serialize_with = "lenient::format_or_empty"
    )]
    pub format: Option<ProductFormat>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        serialize_with = "number_or_null"
    )]
    pub price: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        serialize_with = "number_or_null"
    )]
    pub compare_at: Option<f64>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        serialize_with = "lenient::empty_if_none"
    )]
    pub cover: Option<String>,

    /// Storefront product id (`/b/<id>`). Filled once, never replaced by a merge.
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        serialize_with = "lenient::empty_if_none"
    )]
    pub external_link_id: Option<String>,

    /// Storefront product URL. Filled once, never replaced by a merge.
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        serialize_with = "lenient::empty_if_none"
    )]
    pub external_link_url: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        serialize_with = "lenient::empty_if_none"
    )]
    pub source: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

const LEGACY_TEXT_KEYS: [&str; 4] = ["mainCategory", "subCategory", "payhipId", "payhipUrl"];
const LEGACY_PRICE_KEY: &str = "oldPrice";

impl Serialize for Product {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Product::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Product {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut product = Product::deserialize(deserializer)?;
        product.absorb_legacy_keys();
        Ok(product)
    }
}

impl Product {
    /// Create a product with only identity fields set.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            short_description: None,
            category: None,
            subcategory: None,
            format: None,
            price: None,
            compare_at: None,
            cover: None,
            external_link_id: None,
            external_link_url: None,
            source: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn has_link(&self) -> bool {
        self.external_link_url.is_some() || self.external_link_id.is_some()
    }

    // Legacy keys land in `extra`; move them onto empty canonical fields and
    // drop them so they are never written back.
    fn absorb_legacy_keys(&mut self) {
        for key in LEGACY_TEXT_KEYS {
            let Some(value) = self.extra.remove(key) else {
                continue;
            };
            let slot = match key {
                "mainCategory" => &mut self.category,
                "subCategory" => &mut self.subcategory,
                "payhipId" => &mut self.external_link_id,
                _ => &mut self.external_link_url,
            };
            if slot.is_none() {
                *slot = scalar_to_string(&value).filter(|s| !s.trim().is_empty());
            }
        }
        if let Some(value) = self.extra.remove(LEGACY_PRICE_KEY) {
            if self.compare_at.is_none() {
                self.compare_at = value_to_number(&value);
            }
        }
    }
}

// Whole numbers are written as integers so `10` stays `10` on rewrite.
fn number_or_null<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 => {
            serializer.serialize_i64(*n as i64)
        }
        Some(n) if n.is_finite() => serializer.serialize_f64(*n),
        _ => serializer.serialize_none(),
    }
}

// ─── Format ─────────────────────────────────────────────────

/// Kind of content a product delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductFormat {
    Book,
    Template,
    Workbook,
    Checklist,
    PromptPack,
    Audio,
    Video,
    Guide,
    Other,
}

impl ProductFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Template => "template",
            Self::Workbook => "workbook",
            Self::Checklist => "checklist",
            Self::PromptPack => "prompt-pack",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Guide => "guide",
            Self::Other => "other",
        }
    }

    /// Parse a stored format name. Unknown names map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "book" | "ebook" => Self::Book,
            "template" => Self::Template,
            "workbook" => Self::Workbook,
            "checklist" => Self::Checklist,
            "prompt-pack" | "prompt" | "prompts" => Self::PromptPack,
            "audio" => Self::Audio,
            "video" => Self::Video,
            "guide" => Self::Guide,
            _ => Self::Other,
        }
    }

    /// Guess the format from a producer's content-type label and the first
    /// line of its description. Falls back to `Book`.
    pub fn infer(content_type: &str, first_line: &str) -> Self {
        let haystack = format!("{} {}", content_type, first_line).to_lowercase();
        const RULES: [(&str, ProductFormat); 7] = [
            ("prompt", ProductFormat::PromptPack),
            ("template", ProductFormat::Template),
            ("workbook", ProductFormat::Workbook),
            ("checklist", ProductFormat::Checklist),
            ("audio", ProductFormat::Audio),
            ("video", ProductFormat::Video),
            ("guide", ProductFormat::Guide),
        ];
        RULES
            .iter()
            .find(|(needle, _)| haystack.contains(needle))
            .map(|(_, format)| *format)
            .unwrap_or(Self::Book)
    }
}

impl std::fmt::Display for ProductFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Draft ──────────────────────────────────────────────────

/// An incoming, partially populated record awaiting a merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDraft {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub format: Option<ProductFormat>,
    pub price: Option<f64>,
    pub compare_at: Option<f64>,
    pub cover: Option<String>,
    pub external_link_id: Option<String>,
    pub external_link_url: Option<String>,
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_keys_and_lenient_values() {
        let value = json!({
            "id": "entrepedia__Growth Hacks",
            "title": "Growth Hacks",
            "mainCategory": "Marketing",
            "subCategory": "",
            "format": "prompt",
            "price": "10",
            "compareAt": null,
            "payhipId": "AbC12",
            "payhipUrl": "https://payhip.com/b/AbC12",
            "bundleLabel": "Starter",
            "info": ""
        });
        let product: Product = serde_json::from_value(value).unwrap();
        assert_eq!(product.category.as_deref(), Some("Marketing"));
        assert_eq!(product.subcategory, None);
        assert_eq!(product.format, Some(ProductFormat::PromptPack));
        assert_eq!(product.price, Some(10.0));
        assert_eq!(product.compare_at, None);
        assert_eq!(product.external_link_id.as_deref(), Some("AbC12"));
        assert_eq!(product.extra.get("bundleLabel"), Some(&json!("Starter")));
        assert!(product.has_link());
    }

    #[test]
    fn test_canonical_and_legacy_keys_together() {
        let value = json!({
            "id": "a",
            "title": "A",
            "category": "Marketing",
            "mainCategory": "Sales",
            "subcategory": "",
            "subCategory": "Funnels",
            "compareAt": 19,
            "oldPrice": 25,
            "payhipUrl": "https://payhip.com/b/AbC12"
        });
        let product: Product = serde_json::from_value(value).unwrap();
        assert_eq!(product.category.as_deref(), Some("Marketing"));
        assert_eq!(product.subcategory.as_deref(), Some("Funnels"));
        assert_eq!(product.compare_at, Some(19.0));
        assert_eq!(product.external_link_url.as_deref(), Some("https://payhip.com/b/AbC12"));
        assert!(product.extra.is_empty());

        let text = serde_json::to_string(&product).unwrap();
        assert!(!text.contains("mainCategory"));
        assert!(!text.contains("oldPrice"));
    }

    #[test]
    fn test_serialization_is_canonical_and_stable() {
        let mut product = Product::new("p1", "Growth Hacks");
        product.price = Some(10.0);
        product.compare_at = Some(19.5);
        product.extra.insert("zeta".to_string(), json!(1));
        product.extra.insert("alpha".to_string(), json!(2));

        let text = serde_json::to_string(&product).unwrap();
        assert!(text.starts_with(r#"{"id":"p1","title":"Growth Hacks","description":"""#));
        assert!(text.contains(r#""price":10,"compareAt":19.5"#));
        assert!(text.contains(r#""externalLinkUrl":"""#));
        assert!(text.find("\"alpha\"").unwrap() < text.find("\"zeta\"").unwrap());

        let back: Product = serde_json::from_str(&text).unwrap();
        assert_eq!(back, product);
    }

    #[test]
    fn test_wrong_types_degrade_to_absent() {
        let value = json!({"id": 7, "title": "T", "price": {"amount": 3}, "cover": ["x"]});
        let product: Product = serde_json::from_value(value).unwrap();
        assert_eq!(product.id, "7");
        assert_eq!(product.price, None);
        assert_eq!(product.cover, None);
    }

    #[test]
    fn test_format_parse_and_infer() {
        assert_eq!(ProductFormat::parse("Prompt-Pack"), ProductFormat::PromptPack);
        assert_eq!(ProductFormat::parse("spreadsheet"), ProductFormat::Other);
        assert_eq!(ProductFormat::infer("AI Prompts", ""), ProductFormat::PromptPack);
        assert_eq!(ProductFormat::infer("", "A printable checklist for launches"), ProductFormat::Checklist);
        assert_eq!(ProductFormat::infer("", "Learn marketing"), ProductFormat::Book);
        assert_eq!(ProductFormat::PromptPack.to_string(), "prompt-pack");
    }
}
