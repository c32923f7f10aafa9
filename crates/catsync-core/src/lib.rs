pub mod catalog;
pub mod config;
pub mod covers;
pub mod error;
pub mod identity;
pub mod links;
pub mod matcher;
pub mod merge;
pub mod missing;
pub mod models;
pub mod passes;
pub mod reconcile;
pub mod source;
pub mod storage;
pub mod text;

pub use catalog::Catalog;
pub use config::AppConfig;
pub use error::{CatalogError, ExitCode, Result};
pub use models::*;

pub use covers::{AssetIndex, CoverReport, resolve_covers};
pub use identity::{IdExtractor, SourceIdentity, extract_id, normalize, slugify, title_variants};
pub use links::{LinkIndex, LinkMode, LinkSummary, apply_links};
pub use matcher::{FuzzyMatcher, fuzzy_match};
pub use merge::{ContentField, MergeOutcome, MergePolicy, merge};
pub use missing::{MissingReport, report_missing};
pub use passes::{clean_descriptions, set_all_prices};
pub use reconcile::{PassSummary, Reconciler, RecordOutcome, SkipReason};
pub use source::SourceRecord;
pub use storage::{CatalogDocument, CatalogShape, load_catalog, load_source, save_catalog};
