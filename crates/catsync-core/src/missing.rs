//! Which collected app URLs have no record in a scraped file yet.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::identity::IdExtractor;
use crate::source::SourceRecord;
use crate::storage::catalog_file::SOURCE_KEYS;

static APP_PRODUCT_UUID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/library/product/([0-9a-fA-F-]{36})").unwrap());

static BARE_UUID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F-]{36}$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingReport {
    pub unique_urls: usize,
    pub scraped_ids: usize,
    /// Canonical URLs with no scraped record, sorted.
    pub missing: Vec<String>,
}

impl MissingReport {
    pub fn to_text(&self) -> String {
        self.missing.iter().map(|url| format!("{url}\n")).collect()
    }
}

/// Compare a URL list (one per line, `#` comments allowed) with a scraped
/// document and list the product URLs it lacks.
///
/// The document may be an array, an object wrapping one, or a map of
/// records keyed by product id.
pub fn report_missing(urls_text: &str, scraped: &Value, extractor: &IdExtractor) -> MissingReport {
    let mut wanted: IndexMap<String, String> = IndexMap::new();
    for line in urls_text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(id) = APP_PRODUCT_UUID
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase())
        {
            let url = extractor.product_url(&id);
            wanted.entry(id).or_insert(url);
        }
    }

    let scraped_ids = scraped_ids(scraped, extractor);
    let missing: BTreeSet<String> = wanted
        .iter()
        .filter(|(id, _)| !scraped_ids.contains(*id))
        .map(|(_, url)| url.clone())
        .collect();

    MissingReport {
        unique_urls: wanted.len(),
        scraped_ids: scraped_ids.len(),
        missing: missing.into_iter().collect(),
    }
}

fn scraped_ids(scraped: &Value, extractor: &IdExtractor) -> HashSet<String> {
    let ids: HashSet<String> = records(scraped)
        .into_iter()
        .filter_map(|record| {
            let record = SourceRecord::from_value(record);
            extractor.extract_id(&record.identity())
        })
        .collect();
    if !ids.is_empty() {
        return ids;
    }

    // A map keyed by product id with records lacking their own id.
    scraped
        .as_object()
        .map(|object| {
            object
                .keys()
                .filter(|key| BARE_UUID.is_match(key))
                .map(|key| key.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

fn records(scraped: &Value) -> Vec<&Value> {
    if let Some(rows) = scraped.as_array() {
        return rows.iter().collect();
    }
    let Some(object) = scraped.as_object() else {
        return Vec::new();
    };
    if let Some(rows) = SOURCE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
    {
        return rows.iter().collect();
    }
    object.values().filter(|v| v.is_object()).collect()
}
