use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static DASH_EBOOK_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-–—]\s*ebook\s*$").unwrap());

static PAREN_EBOOK_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(\s*ebook\s*\)\s*$").unwrap());

// Word-bounded so "facebook" keeps its tail.
static BARE_EBOOK_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s+)ebook\s*$").unwrap());

static VARIANT_EBOOK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[-–—]\s*ebook\b").unwrap());

static TRAILING_PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());

/// Canonical matching key for a product title.
///
/// Lower-cases, folds typographic quotes and non-breaking spaces, removes a
/// trailing "ebook" marker, strips diacritics and every character outside
/// `[a-z0-9 ]`, then collapses whitespace. An empty result means the title
/// can't be matched against anything.
pub fn normalize(title: &str) -> String {
    if title.trim().is_empty() {
        return String::new();
    }

    let lowered = title
        .to_lowercase()
        .replace('\u{a0}', " ")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace("&amp;", "&");
    let collapsed = collapse_whitespace(&lowered);

    let without_suffix = strip_ebook_suffix(&collapsed);
    let cleaned: String = fold_diacritics(&without_suffix)
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();

    collapse_whitespace(&cleaned)
}

fn strip_ebook_suffix(s: &str) -> String {
    let s = DASH_EBOOK_SUFFIX.replace(s, "");
    let s = PAREN_EBOOK_SUFFIX.replace(&s, "");
    let s = BARE_EBOOK_SUFFIX.replace(&s, "");
    s.trim().to_string()
}

/// Alternative keys tried, in order, when looking a title up in a link
/// reference: the full title, the part before a colon, the part before
/// " - ", a dash-normalized form, the form without "- Ebook" and the form
/// without a trailing parenthetical. Duplicates and empty keys are dropped.
pub fn title_variants(title: &str) -> Vec<String> {
    let candidates = [
        title.to_string(),
        title.split(':').next().unwrap_or_default().to_string(),
        title.split(" - ").next().unwrap_or_default().to_string(),
        title.replace(['–', '—'], "-"),
        VARIANT_EBOOK.replace_all(title, "").into_owned(),
        TRAILING_PARENTHETICAL.replace(title, "").into_owned(),
    ];

    let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let key = normalize(candidate);
        if !key.is_empty() && !variants.contains(&key) {
            variants.push(key);
        }
    }
    variants
}

/// URL-safe slug of a title: `"Café Growth: 101"` → `"cafe-growth-101"`.
pub fn slugify(title: &str) -> String {
    let folded = fold_diacritics(&title.to_lowercase());
    let mut slug = String::with_capacity(folded.len());
    let mut pending_dash = false;

    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn fold_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
