use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;
use uuid::Uuid;

use crate::error::{CatalogError, Result};

/// Base used to resolve relative producer URLs.
pub const DEFAULT_URL_BASE: &str = "https://app.entrepedia.co";

/// Prefix marking an id derived from a URL hash rather than a real token.
pub const HASHED_ID_PREFIX: &str = "u_";

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static APP_PRODUCT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/library/product/([^/?#]+)").unwrap());

static STOREFRONT_LINK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/b/([A-Za-z0-9]+)").unwrap());

/// The identity-bearing fields of a source record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceIdentity<'a> {
    pub url: Option<&'a str>,
    pub id: Option<&'a str>,
    pub slug: Option<&'a str>,
}

/// Derives stable ids from source records.
#[derive(Debug, Clone)]
pub struct IdExtractor {
    base: Url,
}

impl Default for IdExtractor {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_URL_BASE).expect("default URL base is valid"),
        }
    }
}

impl IdExtractor {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| CatalogError::Config(format!("invalid URL base {base:?}: {e}")))?;
        Ok(Self { base })
    }

    /// Stable id for a source record.
    ///
    /// Resolution order: explicit `id`, then `slug` (trimmed, lower-cased);
    /// the **last** UUID-shaped token in the URL; the token after
    /// `/library/product/`; finally `u_` plus the FNV-1a hash of the
    /// normalized URL. `None` only when there is no id, slug or URL.
    ///
    /// App URLs can embed a collection UUID before the product UUID, which is
    /// why the last match wins. This only holds for that URL shape.
    pub fn extract_id(&self, source: &SourceIdentity<'_>) -> Option<String> {
        if let Some(explicit) = non_empty(source.id).or_else(|| non_empty(source.slug)) {
            return Some(explicit.to_lowercase());
        }

        let url = non_empty(source.url)?;
        if let Some(uuid) = last_uuid(url) {
            return Some(uuid);
        }

        let normalized = self.normalize_url(url);
        if let Some(token) = APP_PRODUCT_TOKEN
            .captures(&normalized)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_lowercase())
            .filter(|t| !t.is_empty())
        {
            return Some(token);
        }

        Some(format!("{HASHED_ID_PREFIX}{:08x}", fnv1a_32(&normalized)))
    }

    /// Canonical app URL for a product token.
    pub fn product_url(&self, token: &str) -> String {
        self.base
            .join(&format!("/library/product/{token}"))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{DEFAULT_URL_BASE}/library/product/{token}"))
    }

    /// Absolute form of `raw` without query or fragment. Relative URLs are
    /// resolved against the configured base; unparseable input is returned
    /// trimmed.
    pub fn normalize_url(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let parsed = if has_http_scheme(trimmed) {
            Url::parse(trimmed)
        } else {
            self.base.join(trimmed)
        };

        match parsed {
            Ok(mut url) => {
                url.set_query(None);
                url.set_fragment(None);
                url.to_string()
            }
            Err(_) => trimmed.to_string(),
        }
    }
}

/// Id with the default URL base.
pub fn extract_id(source: &SourceIdentity<'_>) -> Option<String> {
    IdExtractor::default().extract_id(source)
}

/// Last UUID-shaped token in `text`, lower-cased and hyphenated.
pub fn last_uuid(text: &str) -> Option<String> {
    UUID_PATTERN
        .find_iter(text)
        .last()
        .and_then(|m| Uuid::try_parse(m.as_str()).ok())
        .map(|uuid| uuid.to_string())
}

/// Storefront product id from a `/b/<id>` link.
pub fn extract_link_id(url: &str) -> Option<String> {
    STOREFRONT_LINK_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 32-bit FNV-1a over UTF-16 code units, so hashes match ids produced by the
/// browser-side collectors.
pub fn fnv1a_32(s: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for unit in s.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

fn has_http_scheme(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = "11111111-aaaa-4bbb-8ccc-000000000001";
    const PRODUCT: &str = "22222222-dddd-4eee-8fff-000000000002";

    #[test]
    fn test_explicit_id_wins_and_is_lowercased() {
        let source = SourceIdentity {
            id: Some("  ABC-123 "),
            url: Some("https://app.entrepedia.co/library/product/22222222-dddd-4eee-8fff-000000000002"),
            slug: Some("ignored"),
        };
        assert_eq!(extract_id(&source).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_slug_used_when_id_missing() {
        let source = SourceIdentity {
            slug: Some("Growth-Hacks"),
            ..Default::default()
        };
        assert_eq!(extract_id(&source).as_deref(), Some("growth-hacks"));
    }

    #[test]
    fn test_multi_uuid_url_returns_last() {
        let url = format!("https://app.entrepedia.co/library/{COLLECTION}/product/{PRODUCT}?ref=x");
        let source = SourceIdentity {
            url: Some(&url),
            ..Default::default()
        };
        assert_eq!(extract_id(&source).as_deref(), Some(PRODUCT));
        assert_ne!(extract_id(&source).as_deref(), Some(COLLECTION));
    }

    #[test]
    fn test_uppercase_uuid_is_lowercased() {
        let url = format!("https://x.test/p/{}", PRODUCT.to_uppercase());
        let source = SourceIdentity {
            url: Some(&url),
            ..Default::default()
        };
        assert_eq!(extract_id(&source).as_deref(), Some(PRODUCT));
    }

    #[test]
    fn test_app_product_token_without_uuid() {
        let source = SourceIdentity {
            url: Some("/library/product/Launch-Kit?tab=files"),
            ..Default::default()
        };
        assert_eq!(extract_id(&source).as_deref(), Some("launch-kit"));
    }

    #[test]
    fn test_hash_fallback_is_stable_and_ignores_query() {
        let a = SourceIdentity {
            url: Some("https://example.com/items/abc-111?utm=1"),
            ..Default::default()
        };
        let b = SourceIdentity {
            url: Some("https://example.com/items/abc-111#top"),
            ..Default::default()
        };
        let id_a = extract_id(&a).unwrap();
        assert!(id_a.starts_with(HASHED_ID_PREFIX));
        assert_eq!(id_a.len(), HASHED_ID_PREFIX.len() + 8);
        assert_eq!(Some(id_a), extract_id(&b));
    }

    #[test]
    fn test_distinct_urls_hash_differently() {
        let a = SourceIdentity {
            url: Some("https://example.com/items/abc-111"),
            ..Default::default()
        };
        let b = SourceIdentity {
            url: Some("https://example.com/items/abc-222"),
            ..Default::default()
        };
        assert_ne!(extract_id(&a), extract_id(&b));
    }

    #[test]
    fn test_none_without_url_or_id() {
        assert_eq!(extract_id(&SourceIdentity::default()), None);
        let blank = SourceIdentity {
            id: Some("  "),
            url: Some(""),
            slug: None,
        };
        assert_eq!(extract_id(&blank), None);
    }

    #[test]
    fn test_normalize_url_relative_and_absolute() {
        let extractor = IdExtractor::default();
        assert_eq!(
            extractor.normalize_url("/library/product/x?y=1#z"),
            "https://app.entrepedia.co/library/product/x"
        );
        assert_eq!(
            extractor.normalize_url(" HTTPS://Example.com/a?b=c "),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a_32(""), 0x811c_9dc5);
        assert_eq!(fnv1a_32("a"), 0xe40c_292c);
    }

    #[test]
    fn test_extract_link_id() {
        assert_eq!(extract_link_id("https://payhip.com/b/AbC12").as_deref(), Some("AbC12"));
        assert_eq!(extract_link_id("https://payhip.com/b/AbC12?x=1").as_deref(), Some("AbC12"));
        assert_eq!(extract_link_id("https://payhip.com/products"), None);
    }

    #[test]
    fn test_invalid_base_is_config_error() {
        assert!(matches!(IdExtractor::new("not a url"), Err(CatalogError::Config(_))));
    }
}
