use once_cell::sync::Lazy;
use regex::Regex;

/// Longest short description kept verbatim, in characters.
pub const SHORT_DESCRIPTION_MAX: usize = 220;

// A "ZIP" line sitting alone between blank lines, left over from the
// download-format badge on scraped pages.
static ISOLATED_ZIP_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\nZIP\n\s*\n").unwrap());

static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Remove isolated `ZIP` lines. Returns the cleaned text and the number of
/// lines removed.
pub fn strip_isolated_zip_lines(text: &str) -> (String, usize) {
    let unified = text.replace("\r\n", "\n");
    let removed = ISOLATED_ZIP_LINE.find_iter(&unified).count();
    if removed == 0 {
        return (unified, 0);
    }

    let replaced = ISOLATED_ZIP_LINE.replace_all(&unified, "\n\n");
    let cleaned = EXCESS_BLANK_LINES.replace_all(&replaced, "\n\n").into_owned();
    (cleaned, removed)
}

/// First paragraph of `text`, truncated to [`SHORT_DESCRIPTION_MAX`]
/// characters with a trailing ellipsis.
pub fn short_description(text: &str) -> String {
    let cleaned = text.replace('\r', "");
    let paragraph = cleaned.trim().split("\n\n").next().unwrap_or_default().trim();

    if paragraph.chars().count() <= SHORT_DESCRIPTION_MAX {
        return paragraph.to_string();
    }

    let head: String = paragraph.chars().take(SHORT_DESCRIPTION_MAX - 3).collect();
    format!("{}...", head.trim_end())
}

/// First line of `text`, without carriage returns.
pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim_end_matches('\r')
}

/// Last path segment of a file path or URL, without query or fragment.
/// Handles both `/` and `\` separators.
pub fn basename(reference: &str) -> Option<&str> {
    let without_fragment = reference.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();
    without_query
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_isolated_zip_lines() {
        let (cleaned, removed) = strip_isolated_zip_lines("Intro\r\n\r\nZIP\r\n\r\nBody");
        assert_eq!(removed, 1);
        assert_eq!(cleaned, "Intro\n\nBody");
    }

    #[test]
    fn test_zip_inside_sentence_is_kept() {
        let text = "Download the ZIP file\n\nZIP archive included";
        let (cleaned, removed) = strip_isolated_zip_lines(text);
        assert_eq!(removed, 0);
        assert_eq!(cleaned, text);
    }

    #[test]
    fn test_short_description_first_paragraph() {
        assert_eq!(short_description("  Para one.\r\n\nPara two."), "Para one.");
        assert_eq!(short_description(""), "");
    }

    #[test]
    fn test_short_description_truncates_on_chars() {
        let long = "é".repeat(300);
        let short = short_description(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), SHORT_DESCRIPTION_MAX);
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("/covers/a.png"), Some("a.png"));
        assert_eq!(basename(r"C:\scraper\covers\b.JPG"), Some("b.JPG"));
        assert_eq!(basename("https://cdn.test/img/c.webp?w=200#x"), Some("c.webp"));
        assert_eq!(basename("/covers/"), None);
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("Prompt pack\r\nmore"), "Prompt pack");
        assert_eq!(first_line(""), "");
    }
}
