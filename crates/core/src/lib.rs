//! # linktag-core
//!
//! Core of the link tagging service:
//! - [`tags::TagIndex`]: the bidirectional tag ↔ link index over a [`store::KeyValueStore`]
//! - [`events::AuditEvent`] and the [`events::AuditSink`] it is published through
//! - [`retry::RetryPolicy`]: bounded quadratic backoff shared by networked components
//! - [`pagination::PageWindow`]: page offsets for listings

pub mod errors;
pub mod events;
pub mod pagination;
pub mod retry;
pub mod store;
pub mod tags;
pub mod utils;

pub use errors::{Error, Result, StoreError};
pub use events::{AuditEvent, AuditFailurePolicy, AuditSink, NoOpAuditSink};
pub use pagination::PageWindow;
pub use retry::RetryPolicy;
pub use store::{KeyValueStore, Pipeline, StoreCommand, StoreReply};
pub use tags::{LinkPage, TagIndex, TagIndexServiceTrait};
pub use utils::time::{Clock, SystemClock};
