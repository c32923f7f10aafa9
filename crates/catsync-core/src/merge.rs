//! Field-by-field merge of an incoming draft into a catalog record.
//!
//! Rules:
//! - `id` never changes; `title` is filled only when blank.
//! - storefront link fields are filled only when blank, each on its own.
//! - content fields are fill-if-empty unless listed as refreshable.
//! - prices are written only over a missing or non-finite value.
//!
//! Merging the same draft twice reports no change the second time.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::identity::slugify;
use crate::models::{Product, ProductDraft, ProductFormat};

/// Cover value left behind by producers that had no file name.
pub const PLACEHOLDER_COVER: &str = "/covers/";

/// Content fields a merge may be told to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentField {
    Description,
    ShortDescription,
    Category,
    Subcategory,
    Format,
    Cover,
    Source,
}

impl ContentField {
    pub const ALL: [ContentField; 7] = [
        Self::Description,
        Self::ShortDescription,
        Self::Category,
        Self::Subcategory,
        Self::Format,
        Self::Cover,
        Self::Source,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::ShortDescription => "shortDescription",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Format => "format",
            Self::Cover => "cover",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for ContentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentField {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "description" => Ok(Self::Description),
            "shortdescription" => Ok(Self::ShortDescription),
            "category" | "maincategory" => Ok(Self::Category),
            "subcategory" => Ok(Self::Subcategory),
            "format" => Ok(Self::Format),
            "cover" => Ok(Self::Cover),
            "source" => Ok(Self::Source),
            _ => Err(CatalogError::Config(format!(
                "unknown refreshable field '{s}' (expected one of: {})",
                ContentField::ALL.map(ContentField::as_str).join(", ")
            ))),
        }
    }
}

/// What a merge may overwrite, and the defaults given to new records.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePolicy {
    pub refreshable: BTreeSet<ContentField>,
    pub default_category: Option<String>,
    pub default_format: ProductFormat,
    pub default_price: Option<f64>,
    pub default_source: Option<String>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            refreshable: BTreeSet::new(),
            default_category: Some("Uncategorized".to_string()),
            default_format: ProductFormat::Book,
            default_price: Some(10.0),
            default_source: Some("entrepedia".to_string()),
        }
    }
}

impl MergePolicy {
    pub fn with_refreshable(mut self, fields: impl IntoIterator<Item = ContentField>) -> Self {
        self.refreshable.extend(fields);
        self
    }

    pub fn refreshes(&self, field: ContentField) -> bool {
        self.refreshable.contains(&field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub record: Product,
    pub changed: bool,
}

/// Merge `incoming` into `existing`, or build a new record when there is none.
pub fn merge(existing: Option<&Product>, incoming: &ProductDraft, policy: &MergePolicy) -> MergeOutcome {
    let Some(existing) = existing else {
        return MergeOutcome {
            record: materialize(incoming, policy),
            changed: true,
        };
    };

    let mut record = existing.clone();

    if record.title.trim().is_empty() {
        if let Some(title) = non_blank(&incoming.title) {
            record.title = title.to_string();
        }
    }

    fill_text(&mut record.external_link_id, &incoming.external_link_id, false);
    fill_text(&mut record.external_link_url, &incoming.external_link_url, false);

    use ContentField as F;
    fill_text(&mut record.description, &incoming.description, policy.refreshes(F::Description));
    fill_text(
        &mut record.short_description,
        &incoming.short_description,
        policy.refreshes(F::ShortDescription),
    );
    fill_text(&mut record.category, &incoming.category, policy.refreshes(F::Category));
    fill_text(&mut record.subcategory, &incoming.subcategory, policy.refreshes(F::Subcategory));
    fill_text(&mut record.source, &incoming.source, policy.refreshes(F::Source));

    let cover_is_placeholder = record.cover.as_deref().is_some_and(is_placeholder_cover);
    fill_text(
        &mut record.cover,
        &incoming.cover,
        cover_is_placeholder || policy.refreshes(F::Cover),
    );

    if let Some(format) = incoming.format {
        if record.format.is_none() || policy.refreshes(F::Format) {
            record.format = Some(format);
        }
    }

    fill_number(&mut record.price, incoming.price);
    fill_number(&mut record.compare_at, incoming.compare_at);

    let changed = record != *existing;
    MergeOutcome { record, changed }
}

pub fn is_placeholder_cover(cover: &str) -> bool {
    cover.trim() == PLACEHOLDER_COVER
}

fn materialize(incoming: &ProductDraft, policy: &MergePolicy) -> Product {
    let title = non_blank(&incoming.title).unwrap_or_default();
    let id = non_blank(&incoming.id)
        .map(str::to_string)
        .unwrap_or_else(|| slugify(title));

    let mut record = Product::new(id, title);
    record.description = owned(&incoming.description);
    record.short_description = owned(&incoming.short_description);
    record.category = owned(&incoming.category).or_else(|| policy.default_category.clone());
    record.subcategory = owned(&incoming.subcategory);
    record.format = incoming.format.or(Some(policy.default_format));
    record.price = finite(incoming.price).or(finite(policy.default_price));
    record.compare_at = finite(incoming.compare_at);
    record.cover = owned(&incoming.cover).filter(|c| !is_placeholder_cover(c));
    record.external_link_id = owned(&incoming.external_link_id);
    record.external_link_url = owned(&incoming.external_link_url);
    record.source = owned(&incoming.source).or_else(|| policy.default_source.clone());
    record
}

fn fill_text(target: &mut Option<String>, incoming: &Option<String>, refresh: bool) {
    let Some(value) = non_blank(incoming) else {
        return;
    };
    let empty = target.as_deref().is_none_or(|s| s.trim().is_empty());
    if (empty || refresh) && target.as_deref() != Some(value) {
        *target = Some(value.to_string());
    }
}

// A non-finite stored number is treated as absent and cleared when nothing
// finite replaces it.
fn fill_number(target: &mut Option<f64>, incoming: Option<f64>) {
    if target.is_some_and(f64::is_finite) {
        return;
    }
    *target = finite(incoming);
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn owned(value: &Option<String>) -> Option<String> {
    non_blank(value).map(str::to_string)
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|n| n.is_finite())
}
