use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::warn;

use crate::identity::normalize;
use crate::matcher::FuzzyMatcher;
use crate::models::Product;

/// The in-memory catalog plus its two lookup indexes.
///
/// `by_id` is keyed on the lower-cased id. `by_key` maps normalized titles to
/// positions in insertion order, which is what makes fuzzy tie-breaking
/// deterministic. On duplicate ids or keys the first record wins.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    by_id: HashMap<String, usize>,
    by_key: IndexMap<String, usize>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        let mut catalog = Self {
            products: Vec::with_capacity(products.len()),
            by_id: HashMap::with_capacity(products.len()),
            by_key: IndexMap::with_capacity(products.len()),
        };
        for product in products {
            let idx = catalog.products.len();
            if !product.id.is_empty() && catalog.by_id.contains_key(&product.id.to_lowercase()) {
                warn!(id = %product.id, "duplicate id in catalog, first entry wins for lookups");
            }
            catalog.products.push(product);
            catalog.index(idx);
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn products_mut(&mut self) -> &mut [Product] {
        &mut self.products
    }

    pub fn into_products(self) -> Vec<Product> {
        self.products
    }

    pub fn get(&self, idx: usize) -> Option<&Product> {
        self.products.get(idx)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Product> {
        self.by_id
            .get(&id.to_lowercase())
            .and_then(|&idx| self.products.get(idx))
    }

    /// Position of the record matching `id`, else the one matching the
    /// normalized title `key` (exact, then containment).
    pub fn find(&self, id: Option<&str>, key: &str, matcher: &FuzzyMatcher) -> Option<usize> {
        if let Some(&idx) = id
            .filter(|id| !id.is_empty())
            .and_then(|id| self.by_id.get(&id.to_lowercase()))
        {
            return Some(idx);
        }
        matcher.find(key, &self.by_key).map(|hit| *hit.value)
    }

    /// Append a record, renaming its id if it collides. Returns its position.
    pub fn insert(&mut self, mut product: Product) -> usize {
        product.id = self.unique_id(&product.id);
        let idx = self.products.len();
        self.products.push(product);
        self.index(idx);
        idx
    }

    /// Replace the record at `idx`. The id is kept as-is; a title that
    /// became non-empty is added to the key index.
    pub fn replace(&mut self, idx: usize, product: Product) {
        if let Some(slot) = self.products.get_mut(idx) {
            *slot = product;
            self.index(idx);
        }
    }

    /// `base` if unused, otherwise the first free `base-2`, `base-3`, ….
    pub fn unique_id(&self, base: &str) -> String {
        if !self.by_id.contains_key(&base.to_lowercase()) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.by_id.contains_key(&candidate.to_lowercase()))
            .unwrap_or_else(|| base.to_string())
    }

    fn index(&mut self, idx: usize) {
        let product = &self.products[idx];
        if !product.id.is_empty() {
            self.by_id.entry(product.id.to_lowercase()).or_insert(idx);
        }
        let key = normalize(&product.title);
        if !key.is_empty() {
            self.by_key.entry(key).or_insert(idx);
        }
    }
}
