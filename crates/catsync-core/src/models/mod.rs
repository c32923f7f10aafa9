pub mod lenient;
pub mod product;

pub use product::{Product, ProductDraft, ProductFormat};
