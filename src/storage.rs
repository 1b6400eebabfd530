use crate::domain::{Options, PaginatedResponse, Risk};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Storage trait for persisting risks
#[async_trait]
pub trait RiskStore: Send + Sync {
    /// Insert a full record. Duplicate ids are left to the store's constraints.
    async fn add(&self, risk: &Risk) -> Result<()>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Risk>>;

    /// Count the whole table, then read one ordered page.
    async fn get_all(&self, options: &Options) -> Result<PaginatedResponse>;

    /// Deleting an id that does not exist is not an error.
    async fn delete_by_id(&self, id: Uuid) -> Result<()>;
}
