use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::LinkPage;
use crate::errors::Result;

/// Trait defining the contract for tag index operations.
#[async_trait]
pub trait TagIndexServiceTrait: Send + Sync {
    /// Replace every tag of `link_id` with `tags`.
    async fn replace_tags(&self, link_id: &str, tags: &[String]) -> Result<()>;

    /// Tag `link_id` with `tags`, refreshing the timestamp of tags it already carries.
    async fn add_tags(&self, link_id: &str, tags: &[String]) -> Result<()>;

    /// Remove `tags` from `link_id`.
    async fn remove_tags(&self, link_id: &str, tags: &[String]) -> Result<()>;

    /// Tag each of `link_ids` with `tag`.
    async fn add_links(&self, tag: &str, link_ids: &[String]) -> Result<()>;

    /// Remove each of `link_ids` from `tag`.
    async fn remove_links(&self, tag: &str, link_ids: &[String]) -> Result<()>;

    /// Tags currently attached to `link_id`.
    async fn list_tags(&self, link_id: &str) -> Result<BTreeSet<String>>;

    /// Number of links carrying `tag`.
    async fn count_links(&self, tag: &str) -> Result<u64>;

    /// Links of `tag` over the inclusive rank range `[start, stop]`, newest first.
    async fn list_links(&self, tag: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    /// One page of the links of `tag`.
    async fn list_links_page(&self, tag: &str, page: i64, per_page: u64) -> Result<LinkPage>;

    /// When `link_id` was last tagged with `tag`, if it is.
    async fn tagged_at(&self, link_id: &str, tag: &str) -> Result<Option<DateTime<Utc>>>;
}
