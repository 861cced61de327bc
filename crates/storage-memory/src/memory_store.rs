use async_trait::async_trait;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use linktag_core::store::{KeyValueStore, Pipeline, StoreCommand, StoreReply};
use linktag_core::StoreError;

use crate::sorted_set::SortedSet;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Set(HashSet<String>),
    SortedSet(SortedSet),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::Set(set) => set.is_empty(),
            Value::SortedSet(set) => set.is_empty(),
        }
    }
}

type Keyspace = HashMap<String, Value>;

/// In-process key-value store with set and sorted-set values.
///
/// Every pipeline runs under one write lock, so batches never interleave. Atomic pipelines
/// are rolled back if any command fails; plain pipelines stop at the first failing command
/// and keep what was already applied. Keys whose collection becomes empty are deleted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: RwLock<Keyspace>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent command fail with [`StoreError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of keys currently holding a value.
    pub fn key_count(&self) -> usize {
        self.keyspace.read().map(|ks| ks.len()).unwrap_or(0)
    }

    /// Whether `key` currently holds a value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.keyspace
            .read()
            .map(|ks| ks.contains_key(key))
            .unwrap_or(false)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("memory store marked unavailable"));
        }
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::unavailable("memory store lock poisoned")
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

fn set_mut<'a>(keyspace: &'a mut Keyspace, key: &str) -> Result<&'a mut HashSet<String>, StoreError> {
    match keyspace
        .entry(key.to_string())
        .or_insert_with(|| Value::Set(HashSet::new()))
    {
        Value::Set(set) => Ok(set),
        Value::SortedSet(_) => Err(wrong_type(key)),
    }
}

fn sorted_set_mut<'a>(keyspace: &'a mut Keyspace, key: &str) -> Result<&'a mut SortedSet, StoreError> {
    match keyspace
        .entry(key.to_string())
        .or_insert_with(|| Value::SortedSet(SortedSet::default()))
    {
        Value::SortedSet(set) => Ok(set),
        Value::Set(_) => Err(wrong_type(key)),
    }
}

fn set_ref<'a>(keyspace: &'a Keyspace, key: &str) -> Result<Option<&'a HashSet<String>>, StoreError> {
    match keyspace.get(key) {
        None => Ok(None),
        Some(Value::Set(set)) => Ok(Some(set)),
        Some(Value::SortedSet(_)) => Err(wrong_type(key)),
    }
}

fn sorted_set_ref<'a>(keyspace: &'a Keyspace, key: &str) -> Result<Option<&'a SortedSet>, StoreError> {
    match keyspace.get(key) {
        None => Ok(None),
        Some(Value::SortedSet(set)) => Ok(Some(set)),
        Some(Value::Set(_)) => Err(wrong_type(key)),
    }
}

/// Drop `key` if its collection is empty (or was created empty by a failed write).
fn prune(keyspace: &mut Keyspace, key: &str) {
    if keyspace.get(key).is_some_and(Value::is_empty) {
        keyspace.remove(key);
    }
}

fn apply(keyspace: &mut Keyspace, command: &StoreCommand) -> Result<StoreReply, StoreError> {
    let key = command.key();
    let reply = match command {
        StoreCommand::SetAdd { member, .. } => {
            let result = set_mut(keyspace, key).map(|set| set.insert(member.clone()));
            prune(keyspace, key);
            StoreReply::Integer(i64::from(result?))
        }
        StoreCommand::SetRemove { member, .. } => {
            if set_ref(keyspace, key)?.is_none() {
                return Ok(StoreReply::Integer(0));
            }
            let removed = set_mut(keyspace, key)?.remove(member);
            prune(keyspace, key);
            StoreReply::Integer(i64::from(removed))
        }
        StoreCommand::SetMembers { .. } => {
            let mut members: Vec<String> = set_ref(keyspace, key)?
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();
            members.sort();
            StoreReply::Members(members)
        }
        StoreCommand::SortedSetAdd { score, member, .. } => {
            if score.is_nan() {
                return Err(StoreError::InvalidValue {
                    key: key.to_string(),
                    reason: "score is not a number".to_string(),
                });
            }
            let result = sorted_set_mut(keyspace, key).map(|set| set.insert(member.clone(), *score));
            prune(keyspace, key);
            StoreReply::Integer(i64::from(result?))
        }
        StoreCommand::SortedSetRemove { member, .. } => {
            if sorted_set_ref(keyspace, key)?.is_none() {
                return Ok(StoreReply::Integer(0));
            }
            let removed = sorted_set_mut(keyspace, key)?.remove(member);
            prune(keyspace, key);
            StoreReply::Integer(i64::from(removed))
        }
        StoreCommand::SortedSetCard { .. } => StoreReply::Integer(
            sorted_set_ref(keyspace, key)?.map_or(0, |set| set.len() as i64),
        ),
        StoreCommand::SortedSetScore { member, .. } => {
            StoreReply::Score(sorted_set_ref(keyspace, key)?.and_then(|set| set.score(member)))
        }
        StoreCommand::SortedSetRevRange { start, stop, .. } => StoreReply::Members(
            sorted_set_ref(keyspace, key)?
                .map(|set| set.rev_range(*start, *stop))
                .unwrap_or_default(),
        ),
    };
    Ok(reply)
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn execute(&self, command: StoreCommand) -> Result<StoreReply, StoreError> {
        self.check_available()?;
        let mut keyspace = self.keyspace.write().map_err(|_| poisoned())?;
        apply(&mut keyspace, &command)
    }

    async fn execute_pipeline(&self, pipeline: Pipeline) -> Result<Vec<StoreReply>, StoreError> {
        self.check_available()?;
        let atomic = pipeline.is_atomic();
        let commands = pipeline.into_commands();
        let mut keyspace = self.keyspace.write().map_err(|_| poisoned())?;

        // Prior values of every touched key, restored if an atomic batch fails midway.
        let backup: Option<HashMap<String, Option<Value>>> = atomic.then(|| {
            commands
                .iter()
                .map(|c| (c.key().to_string(), keyspace.get(c.key()).cloned()))
                .collect()
        });

        let mut replies = Vec::with_capacity(commands.len());
        for command in &commands {
            match apply(&mut keyspace, command) {
                Ok(reply) => replies.push(reply),
                Err(err) => {
                    if let Some(backup) = backup {
                        for (key, value) in backup {
                            match value {
                                Some(value) => keyspace.insert(key, value),
                                None => keyspace.remove(&key),
                            };
                        }
                        debug!(
                            "[MemoryStore] atomic pipeline rolled back at {}: {}",
                            command.name(),
                            err
                        );
                    }
                    return Err(err);
                }
            }
        }
        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sadd(key: &str, member: &str) -> StoreCommand {
        StoreCommand::SetAdd {
            key: key.to_string(),
            member: member.to_string(),
        }
    }

    fn zadd(key: &str, score: f64, member: &str) -> StoreCommand {
        StoreCommand::SortedSetAdd {
            key: key.to_string(),
            score,
            member: member.to_string(),
        }
    }

    #[tokio::test]
    async fn set_add_reports_new_members_only() {
        let store = MemoryStore::new();
        assert_eq!(
            store.execute(sadd("s", "a")).await.unwrap(),
            StoreReply::Integer(1)
        );
        assert_eq!(
            store.execute(sadd("s", "a")).await.unwrap(),
            StoreReply::Integer(0)
        );
        let members = store
            .execute(StoreCommand::SetMembers {
                key: "s".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(members, StoreReply::Members(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn removing_last_member_deletes_key() {
        let store = MemoryStore::new();
        store.execute(sadd("s", "a")).await.unwrap();
        store.execute(zadd("z", 1.0, "a")).await.unwrap();
        assert_eq!(store.key_count(), 2);

        store
            .execute(StoreCommand::SetRemove {
                key: "s".to_string(),
                member: "a".to_string(),
            })
            .await
            .unwrap();
        store
            .execute(StoreCommand::SortedSetRemove {
                key: "z".to_string(),
                member: "a".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn removing_from_missing_key_creates_nothing() {
        let store = MemoryStore::new();
        let reply = store
            .execute(StoreCommand::SetRemove {
                key: "missing".to_string(),
                member: "a".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(reply, StoreReply::Integer(0));
        assert!(!store.contains_key("missing"));
    }

    #[tokio::test]
    async fn wrong_type_is_rejected() {
        let store = MemoryStore::new();
        store.execute(sadd("k", "a")).await.unwrap();
        let err = store.execute(zadd("k", 1.0, "a")).await.unwrap_err();
        assert!(matches!(err, StoreError::WrongType { .. }));
    }

    #[tokio::test]
    async fn nan_score_is_rejected() {
        let store = MemoryStore::new();
        let err = store.execute(zadd("z", f64::NAN, "a")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { .. }));
        assert!(!store.contains_key("z"));
    }

    #[tokio::test]
    async fn atomic_pipeline_rolls_back_on_failure() {
        let store = MemoryStore::new();
        store.execute(sadd("taken", "x")).await.unwrap();

        let mut pipe = Pipeline::new().atomic();
        pipe.sadd("fresh", "a").zadd("taken", 1.0, "x");
        let err = store.execute_pipeline(pipe).await.unwrap_err();

        assert!(matches!(err, StoreError::WrongType { .. }));
        assert!(!store.contains_key("fresh"));
        assert!(store.contains_key("taken"));
    }

    #[tokio::test]
    async fn plain_pipeline_keeps_applied_prefix() {
        let store = MemoryStore::new();
        store.execute(sadd("taken", "x")).await.unwrap();

        let mut pipe = Pipeline::new();
        pipe.sadd("fresh", "a").zadd("taken", 1.0, "x");
        assert!(store.execute_pipeline(pipe).await.is_err());
        assert!(store.contains_key("fresh"));
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_command() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.execute(sadd("s", "a")).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.execute(sadd("s", "a")).await.is_ok());
    }

    #[tokio::test]
    async fn pipeline_returns_reply_per_command() {
        let store = MemoryStore::new();
        let mut pipe = Pipeline::new();
        pipe.zadd("z", 2.0, "b").zadd("z", 1.0, "a").zadd("z", 3.0, "a");
        let replies = store.execute_pipeline(pipe).await.unwrap();
        assert_eq!(
            replies,
            vec![
                StoreReply::Integer(1),
                StoreReply::Integer(1),
                StoreReply::Integer(0)
            ]
        );
        let range = store
            .execute(StoreCommand::SortedSetRevRange {
                key: "z".to_string(),
                start: 0,
                stop: -1,
            })
            .await
            .unwrap();
        assert_eq!(
            range,
            StoreReply::Members(vec!["a".to_string(), "b".to_string()])
        );
    }
}
