use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::{DEFAULT_URL_BASE, IdExtractor};
use crate::matcher::{DEFAULT_MIN_FUZZY_LEN, FuzzyMatcher};
use crate::merge::{ContentField, MergePolicy};

/// Root configuration, loaded from `~/.config/catsync/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub merge: MergeConfig,
    pub sources: SourcesConfig,
    pub covers: CoversConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_price: Option<f64>,
    pub default_category: String,
    pub default_source: String,
    pub min_fuzzy_len: usize,
    /// Content fields a merge may overwrite when the source has a value.
    pub refresh: Vec<ContentField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Base URL relative source links are resolved against.
    pub url_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoversConfig {
    pub dir: String,
    pub public_prefix: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: "public/products.json".to_string(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        let policy = MergePolicy::default();
        Self {
            default_price: policy.default_price,
            default_category: policy.default_category.unwrap_or_default(),
            default_source: policy.default_source.unwrap_or_default(),
            min_fuzzy_len: DEFAULT_MIN_FUZZY_LEN,
            refresh: Vec::new(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            url_base: DEFAULT_URL_BASE.to_string(),
        }
    }
}

impl Default for CoversConfig {
    fn default() -> Self {
        Self {
            dir: "public/covers".to_string(),
            public_prefix: "/covers/".to_string(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/catsync/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CATSYNC_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("catsync")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    // ─── Derived components ────────────────────────────────

    pub fn catalog_path(&self) -> PathBuf {
        PathBuf::from(&self.catalog.path)
    }

    pub fn covers_dir(&self) -> PathBuf {
        PathBuf::from(&self.covers.dir)
    }

    pub fn merge_policy(&self) -> MergePolicy {
        let non_empty = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        MergePolicy {
            default_category: non_empty(&self.merge.default_category),
            default_price: self.merge.default_price.filter(|p| p.is_finite()),
            default_source: non_empty(&self.merge.default_source),
            ..MergePolicy::default()
        }
        .with_refreshable(self.merge.refresh.iter().copied())
    }

    pub fn matcher(&self) -> FuzzyMatcher {
        FuzzyMatcher::new().with_min_len(self.merge.min_fuzzy_len)
    }

    pub fn extractor(&self) -> Result<IdExtractor> {
        IdExtractor::new(&self.sources.url_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.merge.min_fuzzy_len, 8);
        assert_eq!(cfg.merge.default_price, Some(10.0));
        assert_eq!(cfg.covers.public_prefix, "/covers/");
        assert!(cfg.extractor().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.merge.refresh = vec![ContentField::ShortDescription, ContentField::Cover];
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.merge.refresh, cfg.merge.refresh);
        assert_eq!(loaded.catalog.path, cfg.catalog.path);
        assert_eq!(loaded.sources.url_base, cfg.sources.url_base);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[merge]\nmin_fuzzy_len = 12\nrefresh = [\"description\"]\ndefault_category = \"\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.matcher().min_len(), 12);
        assert_eq!(cfg.covers.dir, "public/covers");

        let policy = cfg.merge_policy();
        assert!(policy.refreshes(ContentField::Description));
        assert_eq!(policy.default_category, None);
        assert_eq!(policy.default_source.as_deref(), Some("entrepedia"));
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg = AppConfig::load_from(Path::new("/tmp/nonexistent_catsync_config.toml")).unwrap();
        assert_eq!(cfg.catalog.path, "public/products.json");
    }

    #[test]
    fn test_bad_url_base_is_a_config_error() {
        let mut cfg = AppConfig::default();
        cfg.sources.url_base = "not a url".to_string();
        assert!(cfg.extractor().is_err());
    }
}
