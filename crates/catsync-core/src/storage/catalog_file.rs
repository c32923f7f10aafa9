use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{CatalogError, Result};
use crate::models::Product;

/// Keys under which a catalog file may wrap its product array.
pub const CATALOG_KEYS: &[&str] = &["products", "items"];

/// Keys under which a scraped source file may wrap its record array.
pub const SOURCE_KEYS: &[&str] = &["products", "items", "data", "results", "rows", "list"];

const BACKUP_STAMP: &str = "%Y%m%d-%H%M%S";

/// How the product array sat in the file it was read from.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogShape {
    /// A bare top-level array.
    Array,
    /// An object holding the array under `key`. `object` keeps every other
    /// top-level key in file order.
    Wrapped { key: String, object: Map<String, Value> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogDocument {
    pub shape: CatalogShape,
    pub products: Vec<Product>,
}

impl CatalogDocument {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            shape: CatalogShape::Array,
            products,
        }
    }

    /// The document as JSON, in the shape it was loaded with.
    pub fn to_value(&self) -> Result<Value> {
        let products = serde_json::to_value(&self.products)?;
        Ok(match &self.shape {
            CatalogShape::Array => products,
            CatalogShape::Wrapped { key, object } => {
                let mut object = object.clone();
                object.insert(key.clone(), products);
                Value::Object(object)
            }
        })
    }
}

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(CatalogError::FileNotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|source| CatalogError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Split a parsed file into its shape and its record array.
pub fn records_from_value(value: Value, keys: &[&str], path: &Path) -> Result<(CatalogShape, Vec<Value>)> {
    match value {
        Value::Array(records) => Ok((CatalogShape::Array, records)),
        Value::Object(mut object) => {
            let Some(key) = keys
                .iter()
                .find(|key| object.get(**key).is_some_and(Value::is_array))
            else {
                return Err(unexpected_shape(path, keys, &Value::Object(object)));
            };
            let records = match object.get_mut(*key).map(Value::take) {
                Some(Value::Array(records)) => records,
                _ => Vec::new(),
            };
            Ok((
                CatalogShape::Wrapped {
                    key: key.to_string(),
                    object,
                },
                records,
            ))
        }
        other => Err(unexpected_shape(path, keys, &other)),
    }
}

/// Load the catalog. Every entry must be an object; anything else aborts the
/// load rather than being dropped on the next write.
pub fn load_catalog(path: &Path) -> Result<CatalogDocument> {
    let value = read_json(path)?;
    let (shape, records) = records_from_value(value, CATALOG_KEYS, path)?;
    let products = records
        .into_iter()
        .map(serde_json::from_value::<Product>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|source| CatalogError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), count = products.len(), "loaded catalog");
    Ok(CatalogDocument { shape, products })
}

/// Load the raw records of a scraped source file.
pub fn load_source(path: &Path) -> Result<Vec<Value>> {
    let value = read_json(path)?;
    let (_, records) = records_from_value(value, SOURCE_KEYS, path)?;
    debug!(path = %path.display(), count = records.len(), "loaded source records");
    Ok(records)
}

/// Copy `path` to `<path>.bak-<YYYYMMDD-HHMMSS>` next to it. A `-N` suffix
/// is added when a backup with that stamp already exists.
pub fn backup(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog.json".to_string());
    let stamp = Local::now().format(BACKUP_STAMP).to_string();
    let base = format!("{file_name}.bak-{stamp}");

    let mut target = path.with_file_name(&base);
    let mut n = 2;
    while target.exists() {
        target = path.with_file_name(format!("{base}-{n}"));
        n += 1;
    }

    fs::copy(path, &target).map_err(|source| CatalogError::Backup {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(target)
}

/// Write `contents` to a temp file beside `path`, then rename it over
/// `path`. Readers see either the old file or the new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let write_err = |source: std::io::Error| CatalogError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(write_err)?;
    }
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Pretty-print `value` (2-space indent, trailing newline) and write it
/// atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}

/// Back up the current catalog, then atomically replace it with `doc`.
///
/// Nothing is written if serialization or the backup fails. Returns the
/// backup path, or `None` when there was no previous file to back up.
pub fn save_catalog(path: &Path, doc: &CatalogDocument) -> Result<Option<PathBuf>> {
    let value = doc.to_value()?;

    let backup_path = if path.exists() {
        Some(backup(path)?)
    } else {
        None
    };

    write_json(path, &value)?;
    info!(
        path = %path.display(),
        products = doc.products.len(),
        backup = ?backup_path,
        "catalog written"
    );
    Ok(backup_path)
}

fn unexpected_shape(path: &Path, keys: &[&str], found: &Value) -> CatalogError {
    let found = match found {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(_) => "an array".to_string(),
        Value::Object(object) => {
            let keys: Vec<&str> = object.keys().map(String::as_str).collect();
            format!("an object with keys [{}]", keys.join(", "))
        }
    };
    CatalogError::UnexpectedShape {
        path: path.to_path_buf(),
        expected: keys.join(", "),
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(path: &Path, text: &str) {
        fs::write(path, text).unwrap();
    }

    fn backups(dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap().to_string_lossy().contains(".bak-"))
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_load_array_and_wrapped_catalogs() {
        let dir = TempDir::new().unwrap();
        let array = dir.path().join("array.json");
        write(&array, r#"[{"id":"a","title":"A"}]"#);
        let doc = load_catalog(&array).unwrap();
        assert_eq!(doc.shape, CatalogShape::Array);
        assert_eq!(doc.products[0].id, "a");

        let wrapped = dir.path().join("wrapped.json");
        write(&wrapped, r#"{"version":2,"items":[{"id":"b","title":"B"}],"zeta":true}"#);
        let doc = load_catalog(&wrapped).unwrap();
        assert!(matches!(&doc.shape, CatalogShape::Wrapped { key, .. } if key == "items"));

        let value = doc.to_value().unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["version", "items", "zeta"]);
    }

    #[test]
    fn test_load_catalog_with_canonical_and_legacy_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");
        write(
            &path,
            r#"[{"id":"a","title":"A","category":"Marketing","mainCategory":"Marketing","subcategory":"Ads","subCategory":"Ads"}]"#,
        );
        let doc = load_catalog(&path).unwrap();
        assert_eq!(doc.products[0].category.as_deref(), Some("Marketing"));
        assert_eq!(doc.products[0].subcategory.as_deref(), Some("Ads"));
        assert!(doc.products[0].extra.is_empty());
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(load_catalog(&missing), Err(CatalogError::FileNotFound(_))));

        let broken = dir.path().join("broken.json");
        write(&broken, "{ not json");
        assert!(matches!(load_catalog(&broken), Err(CatalogError::InvalidJson { .. })));

        let shaped = dir.path().join("shaped.json");
        write(&shaped, r#"{"records": []}"#);
        let err = load_catalog(&shaped).unwrap_err();
        assert!(matches!(err, CatalogError::UnexpectedShape { .. }));
        assert!(err.to_string().contains("records"));
    }

    #[test]
    fn test_load_source_accepts_more_wrappers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scrape.json");
        write(&path, r#"{"results":[{"title":"A"},"junk"]}"#);
        let records = load_source(&path).unwrap();
        assert_eq!(records.len(), 2);

        // Not a catalog wrapper key.
        assert!(load_catalog(&path).is_err());
    }

    #[test]
    fn test_save_leaves_backup_of_previous_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");
        let before = "[\n  {\"id\": \"a\", \"title\": \"A\"}\n]\n";
        write(&path, before);

        let mut doc = load_catalog(&path).unwrap();
        doc.products.push(Product::new("b", "B"));
        let backup_path = save_catalog(&path, &doc).unwrap().unwrap();

        let name = backup_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("products.json.bak-"));
        assert_eq!(fs::read_to_string(&backup_path).unwrap(), before);

        let after = fs::read_to_string(&path).unwrap();
        assert!(after.ends_with("]\n"));
        assert!(after.contains("\n  {\n    \"id\": \"b\""));
        assert_eq!(load_catalog(&path).unwrap().products.len(), 2);
    }

    #[test]
    fn test_backup_names_never_collide() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");
        write(&path, "[]");

        let first = backup(&path).unwrap();
        let second = backup(&path).unwrap();
        let third = backup(&path).unwrap();
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(backups(dir.path()).len(), 3);
    }

    #[test]
    fn test_new_file_has_no_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.json");
        let doc = CatalogDocument::new(vec![Product::new("a", "A")]);
        assert_eq!(save_catalog(&path, &doc).unwrap(), None);
        assert!(backups(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_backup_leaves_catalog_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");
        write(&path, "[]");

        // A directory cannot be copied as a file, so the backup step fails.
        let as_dir = dir.path().join("dir.json");
        fs::create_dir(&as_dir).unwrap();
        let err = save_catalog(&as_dir, &CatalogDocument::new(Vec::new())).unwrap_err();
        assert!(matches!(err, CatalogError::Backup { .. }));
        assert!(err.to_string().contains("untouched"));
        assert!(as_dir.is_dir());
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_write_json_is_pretty_with_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        write_json(&path, &json!({"missing": 2})).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n  \"missing\": 2\n}\n");
    }
}
