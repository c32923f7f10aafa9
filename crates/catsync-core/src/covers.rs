//! Cover image resolution against the local asset directory.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::identity::{normalize, slugify};
use crate::merge::is_placeholder_cover;
use crate::models::Product;
use crate::text::basename;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

const MIN_TOKEN_LEN: usize = 4;
const MAX_TITLE_TOKENS: usize = 6;
const MIN_TOKEN_SCORE: usize = 2;

/// Image file names of a cover directory, sorted.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    files: Vec<String>,
}

impl AssetIndex {
    pub fn new(files: impl IntoIterator<Item = String>) -> Self {
        let mut files: Vec<String> = files.into_iter().filter(|f| is_image(f)).collect();
        files.sort();
        files.dedup();
        Self { files }
    }

    /// Index the images in `dir`. A missing directory gives an empty index.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "cover directory not found, index is empty");
            return Ok(Self::default());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(Self::new(files))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, file: &str) -> bool {
        self.files.binary_search_by(|f| f.as_str().cmp(file)).is_ok()
    }

    /// File in the index for a cover reference and product title.
    ///
    /// Tried in order: the reference's file name as-is, case-insensitively,
    /// with another image extension; the title's slug; finally the file
    /// sharing the most title words (at least two).
    pub fn resolve(&self, cover_ref: Option<&str>, title: &str) -> Option<&str> {
        if let Some(name) = cover_ref.and_then(basename) {
            if let Some(hit) = self.by_name(name) {
                return Some(hit);
            }
        }

        let slug = slugify(title);
        if !slug.is_empty() {
            if let Some(hit) = self.by_stem(&slug) {
                return Some(hit);
            }
        }

        self.by_title_tokens(title)
    }

    fn by_name(&self, name: &str) -> Option<&str> {
        if self.contains(name) {
            return self.files.iter().find(|f| *f == name).map(String::as_str);
        }
        let lowered = name.to_lowercase();
        if let Some(hit) = self.files.iter().find(|f| f.to_lowercase() == lowered) {
            return Some(hit.as_str());
        }
        self.by_stem(stem(name))
    }

    fn by_stem(&self, wanted: &str) -> Option<&str> {
        let wanted = wanted.to_lowercase();
        IMAGE_EXTENSIONS.iter().find_map(|ext| {
            let candidate = format!("{wanted}.{ext}");
            self.files
                .iter()
                .find(|f| f.to_lowercase() == candidate)
                .map(String::as_str)
        })
    }

    fn by_title_tokens(&self, title: &str) -> Option<&str> {
        let key = normalize(title);
        let tokens: Vec<&str> = key
            .split(' ')
            .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
            .take(MAX_TITLE_TOKENS)
            .collect();
        if tokens.is_empty() {
            return None;
        }

        let mut best: Option<(&str, usize)> = None;
        for file in &self.files {
            let lowered = file.to_lowercase();
            let score = tokens.iter().filter(|t| lowered.contains(**t)).count();
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((file.as_str(), score));
            }
        }
        best.filter(|(_, score)| *score >= MIN_TOKEN_SCORE)
            .map(|(file, _)| file)
    }
}

/// File name of an image reference, or `None` if it does not name an image.
pub fn cover_basename(reference: &str) -> Option<&str> {
    basename(reference).filter(|name| name.len() >= 3 && is_image(name))
}

fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn stem(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

fn is_remote(cover: &str) -> bool {
    let lowered = cover.to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://") || lowered.starts_with("//")
}

// ─── Cover pass ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingCover {
    pub id: String,
    pub title: String,
    pub cover: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverReport {
    pub fixed: usize,
    pub ok: usize,
    pub remote: usize,
    pub missing: Vec<MissingCover>,
}

impl CoverReport {
    /// Tab-separated `id, title, cover` lines, one per missing cover.
    pub fn missing_tsv(&self) -> String {
        self.missing
            .iter()
            .map(|m| {
                let title = m.title.split_whitespace().collect::<Vec<_>>().join(" ");
                format!("{}\t{}\t{}\n", m.id, title, m.cover)
            })
            .collect()
    }
}

/// Point every local cover at a file that exists in `assets`, as
/// `<prefix><file>`. Remote covers are left alone.
pub fn resolve_covers(products: &mut [Product], assets: &AssetIndex, prefix: &str) -> CoverReport {
    let mut report = CoverReport::default();

    for product in products.iter_mut() {
        let current = product
            .cover
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !is_placeholder_cover(c));

        if current.is_some_and(is_remote) {
            report.remote += 1;
            continue;
        }

        match assets.resolve(current, &product.title) {
            Some(file) => {
                let wanted = format!("{prefix}{file}");
                if current == Some(wanted.as_str()) {
                    report.ok += 1;
                } else {
                    debug!(id = %product.id, cover = %wanted, "cover path fixed");
                    product.cover = Some(wanted);
                    report.fixed += 1;
                }
            }
            None => report.missing.push(MissingCover {
                id: product.id.clone(),
                title: product.title.clone(),
                cover: current.unwrap_or_default().to_string(),
            }),
        }
    }

    report
}
