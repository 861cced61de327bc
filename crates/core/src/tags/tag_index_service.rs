use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{link_key, tag_key, LinkPage, TagIndexServiceTrait};
use crate::errors::{Error, Result};
use crate::events::{AuditEvent, AuditFailurePolicy, AuditSink, NoOpAuditSink};
use crate::pagination::PageWindow;
use crate::store::{KeyValueStore, Pipeline, StoreCommand};
use crate::utils::time::{now_rfc3339, rfc3339_to_score, Clock, SystemClock};

/// The tag ↔ link index.
///
/// Every association is written to both projections in the same pipeline: the tag joins the
/// link's tag set and the link joins the tag's sorted link set, scored by tagging time. Audit
/// events are emitted only after the store acknowledged the batch.
pub struct TagIndex {
    store: Arc<dyn KeyValueStore>,
    audit_sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    audit_failure_policy: AuditFailurePolicy,
}

impl TagIndex {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            audit_sink: Arc::new(NoOpAuditSink),
            clock: Arc::new(SystemClock),
            audit_failure_policy: AuditFailurePolicy::default(),
        }
    }

    /// Sets the sink receiving audit events.
    pub fn with_audit_sink(mut self, audit_sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = audit_sink;
        self
    }

    /// Sets the clock used to timestamp associations.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_audit_failure_policy(mut self, policy: AuditFailurePolicy) -> Self {
        self.audit_failure_policy = policy;
        self
    }

    fn require_tags(tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Err(Error::invalid_argument("At least one tag must be specified"));
        }
        Ok(())
    }

    fn require_links(link_ids: &[String]) -> Result<()> {
        if link_ids.is_empty() {
            return Err(Error::invalid_argument(
                "At least one link_id must be specified",
            ));
        }
        Ok(())
    }

    /// Queue both halves of a new or refreshed association.
    fn tag_link(&self, pipe: &mut Pipeline, tag: &str, link_id: &str) -> Result<()> {
        let score = rfc3339_to_score(&now_rfc3339(self.clock.as_ref()))?;
        pipe.zadd(tag_key(tag), score, link_id)
            .sadd(link_key(link_id), tag);
        Ok(())
    }

    /// Queue removal of both halves of an association.
    fn tag_unlink(pipe: &mut Pipeline, tag: &str, link_id: &str) {
        pipe.srem(link_key(link_id), tag).zrem(tag_key(tag), link_id);
    }

    async fn read_tags(&self, link_id: &str) -> Result<BTreeSet<String>> {
        let members = self
            .store
            .execute(StoreCommand::SetMembers {
                key: link_key(link_id),
            })
            .await?
            .into_members("SMEMBERS")?;
        Ok(members.into_iter().collect())
    }

    async fn run(&self, pipe: Pipeline) -> Result<()> {
        let commands = pipe.len();
        self.store.execute_pipeline(pipe).await?;
        debug!("[TagIndex] pipeline of {} commands applied", commands);
        Ok(())
    }

    async fn audit(&self, event: AuditEvent) -> Result<()> {
        let action = event.action();
        match self.audit_sink.emit(event.clone()).await {
            Ok(()) => Ok(()),
            Err(err) => match self.audit_failure_policy {
                AuditFailurePolicy::LogAndContinue => {
                    error!(
                        "[TagIndex] audit event '{}' lost after successful operation: {} ({:?})",
                        action, err, event
                    );
                    Ok(())
                }
                AuditFailurePolicy::Fail => Err(Error::audit(format!(
                    "failed to emit '{}' audit event: {}",
                    action, err
                ))),
            },
        }
    }
}

#[async_trait]
impl TagIndexServiceTrait for TagIndex {
    async fn replace_tags(&self, link_id: &str, tags: &[String]) -> Result<()> {
        Self::require_tags(tags)?;

        let existing_tags = self.read_tags(link_id).await?;

        let mut pipe = Pipeline::new().atomic();
        for tag in &existing_tags {
            Self::tag_unlink(&mut pipe, tag, link_id);
        }
        for tag in tags {
            self.tag_link(&mut pipe, tag, link_id)?;
        }
        self.run(pipe).await?;

        self.audit(AuditEvent::retagged(
            link_id,
            existing_tags.into_iter().collect(),
            tags,
        ))
        .await
    }

    async fn add_tags(&self, link_id: &str, tags: &[String]) -> Result<()> {
        Self::require_tags(tags)?;

        let mut pipe = Pipeline::new();
        for tag in tags {
            self.tag_link(&mut pipe, tag, link_id)?;
        }
        self.run(pipe).await?;

        self.audit(AuditEvent::tagged(link_id, tags)).await
    }

    async fn remove_tags(&self, link_id: &str, tags: &[String]) -> Result<()> {
        Self::require_tags(tags)?;

        let mut pipe = Pipeline::new();
        for tag in tags {
            Self::tag_unlink(&mut pipe, tag, link_id);
        }
        self.run(pipe).await?;

        self.audit(AuditEvent::untagged(link_id, tags)).await
    }

    async fn add_links(&self, tag: &str, link_ids: &[String]) -> Result<()> {
        Self::require_links(link_ids)?;

        let mut pipe = Pipeline::new();
        for link_id in link_ids {
            self.tag_link(&mut pipe, tag, link_id)?;
        }
        self.run(pipe).await?;

        let tags = [tag.to_string()];
        for link_id in link_ids {
            self.audit(AuditEvent::tagged(link_id, &tags)).await?;
        }
        Ok(())
    }

    async fn remove_links(&self, tag: &str, link_ids: &[String]) -> Result<()> {
        Self::require_links(link_ids)?;

        // Both halves go, so a link never keeps a tag whose link set no longer lists it.
        let mut pipe = Pipeline::new();
        for link_id in link_ids {
            Self::tag_unlink(&mut pipe, tag, link_id);
        }
        self.run(pipe).await?;

        let tags = [tag.to_string()];
        for link_id in link_ids {
            self.audit(AuditEvent::untagged(link_id, &tags)).await?;
        }
        Ok(())
    }

    async fn list_tags(&self, link_id: &str) -> Result<BTreeSet<String>> {
        let tags = self.read_tags(link_id).await?;
        self.audit(AuditEvent::viewed_link(link_id)).await?;
        Ok(tags)
    }

    async fn count_links(&self, tag: &str) -> Result<u64> {
        let count = self
            .store
            .execute(StoreCommand::SortedSetCard { key: tag_key(tag) })
            .await?
            .into_integer("ZCARD")?;
        Ok(count.max(0) as u64)
    }

    async fn list_links(&self, tag: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let links = self
            .store
            .execute(StoreCommand::SortedSetRevRange {
                key: tag_key(tag),
                start,
                stop,
            })
            .await?
            .into_members("ZREVRANGE")?;
        self.audit(AuditEvent::viewed_tag(tag)).await?;
        Ok(links)
    }

    async fn list_links_page(&self, tag: &str, page: i64, per_page: u64) -> Result<LinkPage> {
        let count = self.count_links(tag).await?;
        let window = PageWindow::compute(count, per_page, page);
        let links = self.list_links(tag, window.start, window.stop).await?;
        Ok(LinkPage {
            links,
            window,
            count,
        })
    }

    async fn tagged_at(&self, link_id: &str, tag: &str) -> Result<Option<DateTime<Utc>>> {
        let score = self
            .store
            .execute(StoreCommand::SortedSetScore {
                key: tag_key(tag),
                member: link_id.to_string(),
            })
            .await?
            .into_score("ZSCORE")?;
        Ok(score.and_then(|s| DateTime::from_timestamp_micros((s * 1_000_000.0).round() as i64)))
    }
}
