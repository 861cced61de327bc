//! Tag index domain models and key layout.

use serde::{Deserialize, Serialize};

use crate::pagination::PageWindow;

/// Key prefix of the score-ordered link set kept per tag.
pub const TAG_KEY_PREFIX: &str = "tag:";

/// Key prefix of the tag set kept per link.
pub const LINK_KEY_PREFIX: &str = "link-tags:";

/// Store key holding the links of `tag`, scored by tagging time.
pub fn tag_key(tag: &str) -> String {
    format!("{}{}", TAG_KEY_PREFIX, tag)
}

/// Store key holding the tags of `link_id`.
pub fn link_key(link_id: &str) -> String {
    format!("{}{}", LINK_KEY_PREFIX, link_id)
}

/// One page of a tag's links, most recently tagged first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPage {
    pub links: Vec<String>,
    pub window: PageWindow,
    pub count: u64,
}
