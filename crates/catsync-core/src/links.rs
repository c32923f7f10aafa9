//! Storefront link reference: title → purchase URL, as exported by the
//! storefront scraper.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::identity::{extract_link_id, normalize, title_variants};
use crate::matcher::FuzzyMatcher;
use crate::models::Product;
use crate::source::first_string;
use crate::storage::read_json;

/// Wrapper keys a link export may hide its array under, tried in order.
pub const LINK_KEYS: &[&str] = &["links", "items", "products", "data", "rows", "results"];

const LINK_TITLE_ALIASES: &[&str] = &["title", "name"];
const LINK_URL_ALIASES: &[&str] = &["url", "payhipUrl", "externalLinkUrl", "link"];
const LINK_ID_ALIASES: &[&str] = &["payhipId", "externalLinkId", "id"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub title: String,
    pub url: Option<String>,
    pub link_id: Option<String>,
}

/// Link entries keyed by normalized title. The first entry for a key wins.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    entries: IndexMap<String, LinkEntry>,
}

impl LinkIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let value = read_json(path)?;
        Self::from_value(&value, path)
    }

    /// Build the index from any accepted export shape: an array of rows, an
    /// object wrapping one (known key, or its only array), or a flat
    /// `{title: url}` map.
    pub fn from_value(value: &Value, path: &Path) -> Result<Self> {
        let Some(entries) = coerce_entries(value) else {
            let found = match value.as_object() {
                Some(object) => {
                    let keys: Vec<&str> = object.keys().take(30).map(String::as_str).collect();
                    format!("an object with keys [{}]", keys.join(", "))
                }
                None => "a non-object value".to_string(),
            };
            return Err(CatalogError::UnexpectedShape {
                path: path.to_path_buf(),
                expected: LINK_KEYS.join(", "),
                found,
            });
        };

        let mut index = Self::default();
        for entry in entries {
            index.insert(entry);
        }
        debug!(path = %path.display(), count = index.len(), "loaded link reference");
        Ok(index)
    }

    pub fn insert(&mut self, entry: LinkEntry) {
        let key = normalize(&entry.title);
        if !key.is_empty() {
            self.entries.entry(key).or_insert(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `title`: each title variant exactly, then containment on
    /// the full normalized title.
    pub fn lookup(&self, title: &str, matcher: &FuzzyMatcher) -> Option<&LinkEntry> {
        title_variants(title)
            .iter()
            .find_map(|variant| self.entries.get(variant))
            .or_else(|| matcher.find(&normalize(title), &self.entries).map(|hit| hit.value))
    }
}

fn coerce_entries(value: &Value) -> Option<Vec<LinkEntry>> {
    if let Some(rows) = value.as_array() {
        return Some(rows.iter().filter_map(entry_from_row).collect());
    }

    let object = value.as_object()?;
    let rows = LINK_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
        .or_else(|| {
            let mut arrays = object.values().filter_map(Value::as_array);
            match (arrays.next(), arrays.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        });
    if let Some(rows) = rows {
        return Some(rows.iter().filter_map(entry_from_row).collect());
    }

    if !object.is_empty() && object.values().all(Value::is_string) {
        return Some(
            object
                .iter()
                .map(|(title, url)| {
                    let url = url.as_str().map(str::trim).filter(|u| !u.is_empty());
                    LinkEntry {
                        title: title.clone(),
                        url: url.map(str::to_string),
                        link_id: url.and_then(extract_link_id),
                    }
                })
                .collect(),
        );
    }

    None
}

fn entry_from_row(row: &Value) -> Option<LinkEntry> {
    let title = first_string(row, LINK_TITLE_ALIASES)?;
    let url = first_string(row, LINK_URL_ALIASES).map(|u| u.trim().to_string());
    let link_id = first_string(row, LINK_ID_ALIASES)
        .or_else(|| url.as_deref().and_then(extract_link_id));
    Some(LinkEntry { title, url, link_id })
}

// ─── Link pass ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    /// Only fill link fields that are empty.
    #[default]
    FillEmpty,
    /// Replace link fields that differ from the reference.
    Overwrite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    pub products: usize,
    pub had_links: usize,
    pub updated: usize,
    pub unmatched: usize,
    pub with_valid_url: usize,
}

/// Copy storefront links from `index` onto matching products.
pub fn apply_links(
    products: &mut [Product],
    index: &LinkIndex,
    mode: LinkMode,
    matcher: &FuzzyMatcher,
) -> LinkSummary {
    let mut summary = LinkSummary {
        products: products.len(),
        ..Default::default()
    };

    for product in products.iter_mut() {
        if product.has_link() {
            summary.had_links += 1;
        }

        let Some(hit) = index.lookup(&product.title, matcher) else {
            summary.unmatched += 1;
            continue;
        };

        let url_changed = set_link(&mut product.external_link_url, hit.url.as_deref(), mode);
        let id_changed = set_link(&mut product.external_link_id, hit.link_id.as_deref(), mode);
        if url_changed || id_changed {
            debug!(id = %product.id, title = %product.title, "storefront link updated");
            summary.updated += 1;
        }
    }

    summary.with_valid_url = products
        .iter()
        .filter(|p| p.external_link_url.as_deref().is_some_and(|u| u.starts_with("http")))
        .count();
    summary
}

fn set_link(target: &mut Option<String>, incoming: Option<&str>, mode: LinkMode) -> bool {
    let Some(incoming) = incoming.filter(|s| !s.is_empty()) else {
        return false;
    };
    let current = target.as_deref().filter(|s| !s.trim().is_empty());
    let replace = match (current, mode) {
        (None, _) => true,
        (Some(current), LinkMode::Overwrite) => current != incoming,
        (Some(_), LinkMode::FillEmpty) => false,
    };
    if replace {
        *target = Some(incoming.to_string());
    }
    replace
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index(value: Value) -> LinkIndex {
        LinkIndex::from_value(&value, Path::new("links.json")).unwrap()
    }

    #[test]
    fn test_accepts_every_export_shape() {
        let row = json!({"name": "Growth Hacks", "payhipUrl": "https://payhip.com/b/AbC12"});

        assert_eq!(index(json!([row.clone()])).len(), 1);
        assert_eq!(index(json!({"rows": [row.clone()]})).len(), 1);
        assert_eq!(index(json!({"whatever": [row.clone()], "meta": {"n": 1}})).len(), 1);

        let flat = index(json!({"Growth Hacks": "https://payhip.com/b/AbC12?x=1"}));
        let entry = flat.lookup("Growth Hacks", &FuzzyMatcher::new()).unwrap();
        assert_eq!(entry.link_id.as_deref(), Some("AbC12"));
    }

    #[test]
    fn test_rejects_unknown_shapes() {
        let err = LinkIndex::from_value(&json!({"a": [], "b": []}), Path::new("l.json")).unwrap_err();
        assert!(matches!(err, CatalogError::UnexpectedShape { .. }));
        assert!(LinkIndex::from_value(&json!("text"), Path::new("l.json")).is_err());
    }

    #[test]
    fn test_lookup_by_variant_and_containment() {
        let idx = index(json!([
            {"title": "Growth Hacks", "url": "https://payhip.com/b/AAAA"},
            {"title": "The Complete Email Marketing Playbook", "url": "https://payhip.com/b/BBBB"}
        ]));
        let matcher = FuzzyMatcher::new();

        let hit = idx.lookup("Growth Hacks: 50 Tactics (Ebook)", &matcher).unwrap();
        assert_eq!(hit.link_id.as_deref(), Some("AAAA"));

        let hit = idx.lookup("Email Marketing Playbook", &matcher).unwrap();
        assert_eq!(hit.link_id.as_deref(), Some("BBBB"));

        assert!(idx.lookup("SEO", &matcher).is_none());
    }

    #[test]
    fn test_apply_fills_but_does_not_replace_by_default() {
        let idx = index(json!([
            {"title": "Growth Hacks", "url": "https://payhip.com/b/NEW1"},
            {"title": "Launch Checklist", "url": "https://payhip.com/b/NEW2"}
        ]));
        let mut existing = Product::new("a", "Growth Hacks");
        existing.external_link_url = Some("https://payhip.com/b/OLD1".to_string());
        let mut products = vec![
            existing,
            Product::new("b", "Launch Checklist"),
            Product::new("c", "Unknown Product"),
        ];

        let summary = apply_links(&mut products, &idx, LinkMode::FillEmpty, &FuzzyMatcher::new());
        assert_eq!(products[0].external_link_url.as_deref(), Some("https://payhip.com/b/OLD1"));
        assert_eq!(products[0].external_link_id.as_deref(), Some("NEW1"));
        assert_eq!(products[1].external_link_url.as_deref(), Some("https://payhip.com/b/NEW2"));
        assert_eq!(
            summary,
            LinkSummary {
                products: 3,
                had_links: 1,
                updated: 2,
                unmatched: 1,
                with_valid_url: 2,
            }
        );

        let again = apply_links(&mut products, &idx, LinkMode::FillEmpty, &FuzzyMatcher::new());
        assert_eq!(again.updated, 0);
    }

    #[test]
    fn test_overwrite_mode_replaces_differing_links() {
        let idx = index(json!([{"title": "Growth Hacks", "url": "https://payhip.com/b/NEW1"}]));
        let mut product = Product::new("a", "Growth Hacks");
        product.external_link_url = Some("https://payhip.com/b/OLD1".to_string());
        let mut products = vec![product];

        let summary = apply_links(&mut products, &idx, LinkMode::Overwrite, &FuzzyMatcher::new());
        assert_eq!(summary.updated, 1);
        assert_eq!(products[0].external_link_url.as_deref(), Some("https://payhip.com/b/NEW1"));
    }
}
