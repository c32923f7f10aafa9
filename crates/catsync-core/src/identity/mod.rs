pub mod extract;
pub mod normalize;

pub use extract::{
    DEFAULT_URL_BASE, HASHED_ID_PREFIX, IdExtractor, SourceIdentity, extract_id, extract_link_id,
    last_uuid,
};
pub use normalize::{normalize, slugify, title_variants};
