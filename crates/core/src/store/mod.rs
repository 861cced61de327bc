//! Key-value store contract backing the tag index.

mod store_model;
mod store_traits;

pub use store_model::*;
pub use store_traits::*;
