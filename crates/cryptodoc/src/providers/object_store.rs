//! Object storage provider trait for raw document bytes

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Trait for object storage
///
/// Implementations:
/// - `LocalObjectStore`: Local filesystem with signed preview URLs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Retrieve the object stored under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Time-limited URL through which the object can be fetched
    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
