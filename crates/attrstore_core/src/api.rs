use std::collections::HashMap;

use async_trait::async_trait;

use crate::AttrResult;

/// Single-level string map. Writes are update-or-insert; `get` on an absent
/// key yields `AttrError::NotFound`.
#[async_trait]
pub trait KeyValueApi {
    async fn set(&self, key: &str, value: &str) -> AttrResult<()>;
    async fn get(&self, key: &str) -> AttrResult<String>;
    async fn has(&self, key: &str) -> AttrResult<bool>;
    async fn del(&self, key: &str) -> AttrResult<()>;
    async fn all(&self) -> AttrResult<Vec<String>>;
    async fn count(&self) -> AttrResult<u64>;
    /// Adds one to the stored integer (absent or unparsable counts as zero)
    /// and returns the new value. Concurrent callers can lose updates.
    async fn inc(&self, key: &str) -> AttrResult<String>;
    async fn dec(&self, key: &str) -> AttrResult<String>;
    async fn clear(&self) -> AttrResult<()>;
}

#[async_trait]
pub trait SetApi {
    async fn add(&self, value: &str) -> AttrResult<()>;
    async fn has(&self, value: &str) -> AttrResult<bool>;
    async fn all(&self) -> AttrResult<Vec<String>>;
    async fn del(&self, value: &str) -> AttrResult<()>;
    async fn count(&self) -> AttrResult<u64>;
    async fn clear(&self) -> AttrResult<()>;
}

/// Two-level map: owner -> property -> value.
#[async_trait]
pub trait AttributeMapApi {
    async fn get(&self, owner: &str, property: &str) -> AttrResult<String>;
    async fn has(&self, owner: &str, property: &str) -> AttrResult<bool>;
    async fn exists(&self, owner: &str) -> AttrResult<bool>;
    async fn set(&self, owner: &str, property: &str, value: &str) -> AttrResult<()>;
    async fn set_map(&self, owner: &str, properties: &HashMap<String, String>)
    -> AttrResult<()>;
    async fn get_map(
        &self,
        owner: &str,
        properties: &[String],
    ) -> AttrResult<HashMap<String, String>>;
    async fn keys(&self, owner: &str) -> AttrResult<Vec<String>>;
    async fn owners(&self) -> AttrResult<Vec<String>>;
    async fn count(&self) -> AttrResult<u64>;
    async fn all_where(&self, property: &str, value: &str) -> AttrResult<Vec<String>>;
    async fn all_encountered_keys(&self) -> AttrResult<Vec<String>>;
    async fn del_key(&self, owner: &str, property: &str) -> AttrResult<()>;
    async fn del(&self, owner: &str) -> AttrResult<()>;
    async fn clear(&self) -> AttrResult<()>;
}
