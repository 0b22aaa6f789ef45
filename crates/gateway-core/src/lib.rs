//! Shared types, error taxonomy, and key-value adapter for the LLM gateway.
//!
//! Every other `gateway-*` crate depends on this one for [`error::GatewayError`],
//! the [`kv::KvStore`] trait, and the wire types in [`model`].

pub mod error;
pub mod kv;
pub mod kv_memory;
pub mod kv_redis;
pub mod model;
pub mod money;

pub use error::GatewayError;
pub use kv::KvStore;
pub use kv_memory::InMemoryKv;
pub use kv_redis::RedisKv;
pub use model::{CompletionResult, Request};
pub use money::Cost;
