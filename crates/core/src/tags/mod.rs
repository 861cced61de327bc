//! Bidirectional tag ↔ link index.

mod tag_index_service;
mod tags_model;
mod tags_traits;

pub use tag_index_service::*;
pub use tags_model::*;
pub use tags_traits::*;
