pub mod catalog_file;

pub use catalog_file::{
    CatalogDocument, CatalogShape, backup, load_catalog, load_source, read_json, save_catalog,
    write_atomic, write_json,
};
