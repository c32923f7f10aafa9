//! Whole-catalog maintenance passes.

use tracing::debug;

use crate::models::Product;
use crate::text::strip_isolated_zip_lines;

/// Set every product's price to `amount`. Storefront links are not touched.
/// Returns how many prices changed.
pub fn set_all_prices(products: &mut [Product], amount: f64) -> usize {
    let mut changed = 0;
    for product in products.iter_mut() {
        if product.price != Some(amount) {
            product.price = Some(amount);
            changed += 1;
        }
    }
    changed
}

/// Remove isolated `ZIP` lines from descriptions. Returns the number of
/// products touched and the number of lines removed.
pub fn clean_descriptions(products: &mut [Product]) -> (usize, usize) {
    let mut touched = 0;
    let mut removed = 0;

    for product in products.iter_mut() {
        let Some(description) = product.description.as_deref() else {
            continue;
        };
        let (cleaned, count) = strip_isolated_zip_lines(description);
        if count == 0 {
            continue;
        }
        debug!(id = %product.id, lines = count, "removed ZIP lines");
        product.description = Some(cleaned);
        touched += 1;
        removed += count;
    }

    (touched, removed)
}
