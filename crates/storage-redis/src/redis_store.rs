use async_trait::async_trait;
use log::{debug, info};
use redis::aio::ConnectionManager;
use redis::{Cmd, RedisError, Value};

use linktag_core::store::{KeyValueStore, Pipeline, StoreCommand, StoreReply};
use linktag_core::StoreError;

/// [`KeyValueStore`] backed by a Redis server.
///
/// The connection manager reconnects on its own after a dropped connection; a command
/// issued while the server is unreachable fails with [`StoreError::Unavailable`].
///
/// Pipelines always run inside MULTI/EXEC so batches never interleave with other clients.
/// Redis applies the rest of a transaction when one command fails at execution time, so an
/// atomic pipeline here guarantees isolation but not rollback.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to the server at `url` (`redis://host:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::unavailable(format!("Invalid Redis URL: {}", e)))?;
        let address = client.get_connection_info().addr.to_string();
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| store_error(e, "CONNECT", &address))?;
        info!("[RedisStore] Connected to {}", address);
        Ok(Self { connection })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn execute(&self, command: StoreCommand) -> Result<StoreReply, StoreError> {
        let cmd = encode(&command)?;
        let mut connection = self.connection.clone();
        let value: Value = cmd
            .query_async(&mut connection)
            .await
            .map_err(|e| store_error(e, command.name(), command.key()))?;
        decode(&command, value)
    }

    async fn execute_pipeline(&self, pipeline: Pipeline) -> Result<Vec<StoreReply>, StoreError> {
        if pipeline.is_empty() {
            return Ok(Vec::new());
        }
        let commands = pipeline.into_commands();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in &commands {
            pipe.add_command(encode(command)?);
        }

        let mut connection = self.connection.clone();
        let values: Vec<Value> = pipe.query_async(&mut connection).await.map_err(|e| {
            // The server does not say which command failed
            let key = commands.first().map(StoreCommand::key).unwrap_or_default();
            store_error(e, "EXEC", key)
        })?;
        debug!("[RedisStore] Transaction of {} command(s) applied", commands.len());

        if values.len() != commands.len() {
            return Err(StoreError::unexpected_reply("EXEC", values));
        }
        commands
            .iter()
            .zip(values)
            .map(|(command, value)| decode(command, value))
            .collect()
    }
}

fn encode(command: &StoreCommand) -> Result<Cmd, StoreError> {
    let mut cmd = redis::cmd(command.name());
    cmd.arg(command.key());
    match command {
        StoreCommand::SetAdd { member, .. }
        | StoreCommand::SetRemove { member, .. }
        | StoreCommand::SortedSetRemove { member, .. }
        | StoreCommand::SortedSetScore { member, .. } => {
            cmd.arg(member);
        }
        StoreCommand::SetMembers { .. } | StoreCommand::SortedSetCard { .. } => {}
        StoreCommand::SortedSetAdd { score, member, .. } => {
            if score.is_nan() {
                return Err(StoreError::InvalidValue {
                    key: command.key().to_string(),
                    reason: "score is not a number".to_string(),
                });
            }
            cmd.arg(*score).arg(member);
        }
        StoreCommand::SortedSetRevRange { start, stop, .. } => {
            cmd.arg(*start).arg(*stop);
        }
    }
    Ok(cmd)
}

fn decode(command: &StoreCommand, value: Value) -> Result<StoreReply, StoreError> {
    let reply = match command {
        StoreCommand::SetAdd { .. }
        | StoreCommand::SetRemove { .. }
        | StoreCommand::SortedSetAdd { .. }
        | StoreCommand::SortedSetRemove { .. }
        | StoreCommand::SortedSetCard { .. } => {
            redis::from_redis_value::<i64>(&value).map(StoreReply::Integer)
        }
        StoreCommand::SortedSetScore { .. } => {
            redis::from_redis_value::<Option<f64>>(&value).map(StoreReply::Score)
        }
        StoreCommand::SetMembers { .. } => {
            redis::from_redis_value::<Vec<String>>(&value).map(|mut members| {
                members.sort();
                StoreReply::Members(members)
            })
        }
        StoreCommand::SortedSetRevRange { .. } => {
            redis::from_redis_value::<Vec<String>>(&value).map(StoreReply::Members)
        }
    };
    reply.map_err(|_| StoreError::unexpected_reply(command.name(), &value))
}

fn store_error(err: RedisError, command: &str, key: &str) -> StoreError {
    if err.code() == Some("WRONGTYPE") {
        return StoreError::WrongType {
            key: key.to_string(),
        };
    }
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        return StoreError::unavailable(err.to_string());
    }
    StoreError::unexpected_reply(command, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ErrorKind;

    fn packed(command: StoreCommand) -> String {
        String::from_utf8(encode(&command).unwrap().get_packed_command()).unwrap()
    }

    #[test]
    fn commands_encode_name_key_and_arguments() {
        let zadd = packed(StoreCommand::SortedSetAdd {
            key: "tag:rust".to_string(),
            score: 1.5,
            member: "42".to_string(),
        });
        assert!(zadd.starts_with("*4\r\n$4\r\nZADD\r\n$8\r\ntag:rust\r\n"));
        assert!(zadd.contains("1.5\r\n"));
        assert!(zadd.ends_with("$2\r\n42\r\n"));

        let range = packed(StoreCommand::SortedSetRevRange {
            key: "tag:rust".to_string(),
            start: 0,
            stop: -1,
        });
        assert!(range.contains("ZREVRANGE"));
        assert!(range.ends_with("$1\r\n0\r\n$2\r\n-1\r\n"));

        let card = packed(StoreCommand::SortedSetCard {
            key: "tag:rust".to_string(),
        });
        assert!(card.starts_with("*2\r\n"));
    }

    #[test]
    fn nan_scores_are_rejected_before_sending() {
        let err = encode(&StoreCommand::SortedSetAdd {
            key: "tag:rust".to_string(),
            score: f64::NAN,
            member: "42".to_string(),
        })
        .err()
        .expect("NaN score should be rejected");
        assert!(matches!(err, StoreError::InvalidValue { ref key, .. } if key == "tag:rust"));
    }

    #[test]
    fn replies_decode_per_command() {
        let card = StoreCommand::SortedSetCard {
            key: "tag:rust".to_string(),
        };
        assert_eq!(decode(&card, Value::Int(3)).unwrap(), StoreReply::Integer(3));

        let score = StoreCommand::SortedSetScore {
            key: "tag:rust".to_string(),
            member: "42".to_string(),
        };
        assert_eq!(decode(&score, Value::Nil).unwrap(), StoreReply::Score(None));
        assert_eq!(
            decode(&score, Value::BulkString(b"1.25".to_vec())).unwrap(),
            StoreReply::Score(Some(1.25))
        );

        let members = StoreCommand::SetMembers {
            key: "link-tags:42".to_string(),
        };
        let value = Value::Array(vec![
            Value::BulkString(b"web".to_vec()),
            Value::BulkString(b"async".to_vec()),
        ]);
        assert_eq!(
            decode(&members, value).unwrap(),
            StoreReply::Members(vec!["async".to_string(), "web".to_string()])
        );
    }

    #[test]
    fn mismatched_replies_are_unexpected() {
        let card = StoreCommand::SortedSetCard {
            key: "tag:rust".to_string(),
        };
        let err = decode(&card, Value::Array(Vec::new())).unwrap_err();
        assert!(matches!(err, StoreError::UnexpectedReply { ref command, .. } if command == "ZCARD"));
    }

    #[test]
    fn transport_and_server_failures_map_to_store_errors() {
        let io = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(
            store_error(io, "ZCARD", "tag:rust"),
            StoreError::Unavailable(_)
        ));

        let rejected = RedisError::from((
            ErrorKind::ResponseError,
            "An error was signalled by the server",
            "value is not a valid float".to_string(),
        ));
        assert!(matches!(
            store_error(rejected, "ZADD", "tag:rust"),
            StoreError::UnexpectedReply { ref command, .. } if command == "ZADD"
        ));
    }
}
