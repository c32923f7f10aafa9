//! One reconciliation pass: scraped records in, catalog updated in place.
//!
//! Each raw record goes through alias resolution, identity extraction and
//! matching against the catalog, then is merged with [`merge`]. Records
//! without a usable title or identity are counted and skipped.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::covers::{AssetIndex, cover_basename};
use crate::identity::{IdExtractor, extract_link_id, normalize};
use crate::links::LinkIndex;
use crate::matcher::FuzzyMatcher;
use crate::merge::{MergePolicy, merge};
use crate::models::{ProductDraft, ProductFormat};
use crate::source::SourceRecord;
use crate::text::{first_line, short_description, strip_isolated_zip_lines};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No title, or a title that normalizes to nothing.
    MissingTitle,
    /// Neither an id, a slug nor a URL to derive one from.
    MissingIdentity,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTitle => f.write_str("missing title"),
            Self::MissingIdentity => f.write_str("missing identity"),
        }
    }
}

/// What happened to a single source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Added(usize),
    Updated(usize),
    Unchanged(usize),
    Skipped(SkipReason),
}

/// Counters for a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// Records that gained a storefront link in this pass.
    pub linked: usize,
}

/// Merges scraped records into a [`Catalog`].
#[derive(Debug, Clone)]
pub struct Reconciler<'a> {
    policy: MergePolicy,
    matcher: FuzzyMatcher,
    extractor: IdExtractor,
    links: Option<&'a LinkIndex>,
    assets: Option<&'a AssetIndex>,
    cover_prefix: String,
}

impl<'a> Reconciler<'a> {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            matcher: FuzzyMatcher::default(),
            extractor: IdExtractor::default(),
            links: None,
            assets: None,
            cover_prefix: "/covers/".to_string(),
        }
    }

    pub fn with_matcher(mut self, matcher: FuzzyMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_extractor(mut self, extractor: IdExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Fill storefront links of records that carry none from `links`.
    pub fn with_links(mut self, links: &'a LinkIndex) -> Self {
        self.links = Some(links);
        self
    }

    /// Resolve covers against local files instead of trusting the source path.
    pub fn with_assets(mut self, assets: &'a AssetIndex) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn with_cover_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cover_prefix = prefix.into();
        self
    }

    /// Reconcile every record in `records`, in order.
    pub fn reconcile(&self, catalog: &mut Catalog, records: &[Value]) -> PassSummary {
        let mut summary = PassSummary {
            total: records.len(),
            ..Default::default()
        };

        for raw in records {
            let (outcome, linked) = self.apply(catalog, raw);
            if linked {
                summary.linked += 1;
            }
            tally(&mut summary, outcome);
        }

        info!(
            total = summary.total,
            added = summary.added,
            updated = summary.updated,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            "reconciliation pass finished"
        );
        summary
    }

    /// Reconcile a single raw record.
    pub fn reconcile_record(&self, catalog: &mut Catalog, raw: &Value) -> RecordOutcome {
        self.apply(catalog, raw).0
    }

    // The outcome, and whether the record gained a storefront link.
    fn apply(&self, catalog: &mut Catalog, raw: &Value) -> (RecordOutcome, bool) {
        let record = SourceRecord::from_value(raw);

        let Some(title) = record.title.clone().filter(|t| !normalize(t).is_empty()) else {
            warn!(reason = %SkipReason::MissingTitle, "skipping source record");
            return (RecordOutcome::Skipped(SkipReason::MissingTitle), false);
        };
        let Some(id) = self.extractor.extract_id(&record.identity()) else {
            warn!(title = %title, reason = %SkipReason::MissingIdentity, "skipping source record");
            return (RecordOutcome::Skipped(SkipReason::MissingIdentity), false);
        };

        let key = normalize(&title);
        let draft = self.draft(&record, &title, &id);

        match catalog.find(Some(&id), &key, &self.matcher) {
            Some(idx) => {
                let existing = catalog.get(idx);
                let had_link = existing.is_some_and(|p| p.has_link());
                let outcome = merge(existing, &draft, &self.policy);
                if !outcome.changed {
                    return (RecordOutcome::Unchanged(idx), false);
                }
                let linked = !had_link && outcome.record.has_link();
                debug!(id = %outcome.record.id, title = %title, linked, "updated");
                catalog.replace(idx, outcome.record);
                (RecordOutcome::Updated(idx), linked)
            }
            None => {
                let outcome = merge(None, &draft, &self.policy);
                let linked = outcome.record.has_link();
                let idx = catalog.insert(outcome.record);
                debug!(id = %id, title = %title, linked, "added");
                (RecordOutcome::Added(idx), linked)
            }
        }
    }

    /// Build the incoming draft for a resolved source record.
    pub fn draft(&self, record: &SourceRecord, title: &str, id: &str) -> ProductDraft {
        let description = record
            .description
            .as_deref()
            .map(|text| strip_isolated_zip_lines(text).0.trim().to_string())
            .filter(|text| !text.is_empty());

        let short = record
            .short_description
            .as_deref()
            .or(description.as_deref())
            .map(short_description)
            .filter(|text| !text.is_empty());

        let format = ProductFormat::infer(
            record.content_type.as_deref().unwrap_or_default(),
            first_line(short.as_deref().unwrap_or_default()),
        );

        let (link_url, link_id) = match (&record.link_url, &record.link_id) {
            (None, None) => self
                .links
                .and_then(|links| links.lookup(title, &self.matcher))
                .map(|entry| (entry.url.clone(), entry.link_id.clone()))
                .unwrap_or_default(),
            (url, link_id) => (
                url.clone(),
                link_id
                    .clone()
                    .or_else(|| url.as_deref().and_then(extract_link_id)),
            ),
        };

        ProductDraft {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            description,
            short_description: short,
            category: record.category.clone(),
            subcategory: record.subcategory.clone(),
            format: Some(format),
            price: record.price,
            compare_at: None,
            cover: self.cover(record.cover.as_deref(), title),
            external_link_id: link_id,
            external_link_url: link_url,
            source: self.policy.default_source.clone(),
        }
    }

    fn cover(&self, reference: Option<&str>, title: &str) -> Option<String> {
        let file = match self.assets {
            Some(assets) => assets.resolve(reference, title),
            None => reference.and_then(cover_basename),
        }?;
        Some(format!("{}{file}", self.cover_prefix))
    }
}

fn tally(summary: &mut PassSummary, outcome: RecordOutcome) {
    match outcome {
        RecordOutcome::Added(_) => summary.added += 1,
        RecordOutcome::Updated(_) => summary.updated += 1,
        RecordOutcome::Unchanged(_) => summary.unchanged += 1,
        RecordOutcome::Skipped(_) => summary.skipped += 1,
    }
}
