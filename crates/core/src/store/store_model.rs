//! Commands, replies and pipelines understood by a [`super::KeyValueStore`].

use crate::errors::StoreError;

/// A single store command over sets and score-ordered sets.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    /// Add `member` to the set at `key`. Replies with 1 if added, 0 if already present.
    SetAdd { key: String, member: String },
    /// Remove `member` from the set at `key`. Replies with 1 if removed, 0 otherwise.
    SetRemove { key: String, member: String },
    /// All members of the set at `key`.
    SetMembers { key: String },
    /// Add or rescore `member` in the sorted set at `key`. Replies with 1 if newly added.
    SortedSetAdd {
        key: String,
        score: f64,
        member: String,
    },
    /// Remove `member` from the sorted set at `key`. Replies with 1 if removed.
    SortedSetRemove { key: String, member: String },
    /// Number of members in the sorted set at `key`.
    SortedSetCard { key: String },
    /// Score of `member` in the sorted set at `key`, if present.
    SortedSetScore { key: String, member: String },
    /// Members ranked by descending score over the inclusive rank range `[start, stop]`.
    /// Negative ranks count from the end (-1 is the last member).
    SortedSetRevRange { key: String, start: i64, stop: i64 },
}

impl StoreCommand {
    /// Command name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetAdd { .. } => "SADD",
            Self::SetRemove { .. } => "SREM",
            Self::SetMembers { .. } => "SMEMBERS",
            Self::SortedSetAdd { .. } => "ZADD",
            Self::SortedSetRemove { .. } => "ZREM",
            Self::SortedSetCard { .. } => "ZCARD",
            Self::SortedSetScore { .. } => "ZSCORE",
            Self::SortedSetRevRange { .. } => "ZREVRANGE",
        }
    }

    /// Key the command addresses.
    pub fn key(&self) -> &str {
        match self {
            Self::SetAdd { key, .. }
            | Self::SetRemove { key, .. }
            | Self::SetMembers { key }
            | Self::SortedSetAdd { key, .. }
            | Self::SortedSetRemove { key, .. }
            | Self::SortedSetCard { key }
            | Self::SortedSetScore { key, .. }
            | Self::SortedSetRevRange { key, .. } => key,
        }
    }
}

/// Reply to a [`StoreCommand`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreReply {
    Integer(i64),
    Score(Option<f64>),
    Members(Vec<String>),
}

impl StoreReply {
    pub fn into_integer(self, command: &str) -> Result<i64, StoreError> {
        match self {
            Self::Integer(value) => Ok(value),
            other => Err(StoreError::unexpected_reply(command, other)),
        }
    }

    pub fn into_score(self, command: &str) -> Result<Option<f64>, StoreError> {
        match self {
            Self::Score(value) => Ok(value),
            other => Err(StoreError::unexpected_reply(command, other)),
        }
    }

    pub fn into_members(self, command: &str) -> Result<Vec<String>, StoreError> {
        match self {
            Self::Members(value) => Ok(value),
            other => Err(StoreError::unexpected_reply(command, other)),
        }
    }
}

/// An ordered batch of commands submitted to the store in one round-trip.
///
/// A plain pipeline only guarantees ordering; an atomic pipeline asks the store to apply the
/// whole batch or none of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    commands: Vec<StoreCommand>,
    atomic: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request all-or-nothing execution.
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub fn push(&mut self, command: StoreCommand) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(StoreCommand::SetAdd {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(StoreCommand::SetRemove {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn zadd(
        &mut self,
        key: impl Into<String>,
        score: f64,
        member: impl Into<String>,
    ) -> &mut Self {
        self.push(StoreCommand::SortedSetAdd {
            key: key.into(),
            score,
            member: member.into(),
        })
    }

    pub fn zrem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(StoreCommand::SortedSetRemove {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[StoreCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<StoreCommand> {
        self.commands
    }
}
