//! Redis storage for the tag index.
//!
//! [`RedisStore`] maps the index's sets and score-ordered sets onto the Redis types of the
//! same name and sends every pipeline as one MULTI/EXEC transaction.

mod redis_store;

pub use redis_store::RedisStore;
