//! Audit event model published for external consumption.

use serde::{Deserialize, Serialize};

/// A structured record of one mutation or read against the index.
///
/// Serialized as a flat JSON object with an `action` discriminator, e.g.
/// `{"action":"tagged","link_id":"42","tags":["rust"]}`. The emission time is added by the
/// publisher, not stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum AuditEvent {
    #[serde(rename = "tagged")]
    Tagged { link_id: String, tags: Vec<String> },

    #[serde(rename = "untagged")]
    Untagged { link_id: String, tags: Vec<String> },

    #[serde(rename = "retagged")]
    Retagged {
        link_id: String,
        old_tags: Vec<String>,
        new_tags: Vec<String>,
    },

    #[serde(rename = "viewed:tag")]
    ViewedTag { tag: String },

    #[serde(rename = "viewed:link")]
    ViewedLink { link_id: String },
}

impl AuditEvent {
    pub fn tagged(link_id: &str, tags: &[String]) -> Self {
        Self::Tagged {
            link_id: link_id.to_string(),
            tags: tags.to_vec(),
        }
    }

    pub fn untagged(link_id: &str, tags: &[String]) -> Self {
        Self::Untagged {
            link_id: link_id.to_string(),
            tags: tags.to_vec(),
        }
    }

    pub fn retagged(link_id: &str, old_tags: Vec<String>, new_tags: &[String]) -> Self {
        Self::Retagged {
            link_id: link_id.to_string(),
            old_tags,
            new_tags: new_tags.to_vec(),
        }
    }

    pub fn viewed_tag(tag: &str) -> Self {
        Self::ViewedTag {
            tag: tag.to_string(),
        }
    }

    pub fn viewed_link(link_id: &str) -> Self {
        Self::ViewedLink {
            link_id: link_id.to_string(),
        }
    }

    /// Wire name of the event's action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Tagged { .. } => "tagged",
            Self::Untagged { .. } => "untagged",
            Self::Retagged { .. } => "retagged",
            Self::ViewedTag { .. } => "viewed:tag",
            Self::ViewedLink { .. } => "viewed:link",
        }
    }
}
