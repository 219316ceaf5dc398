pub mod client;
pub mod facade;
pub mod messages;

pub use client::RpcClient;
pub use facade::Facade;

use async_trait::async_trait;
use messages::*;
use thiserror::Error;

/// Transport-class faults. Domain failures never take this path; they
/// travel inside the structured responses.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("RPC timeout during {0}")]
    Timeout(&'static str),
    #[error("RPC transport error: {0}")]
    Transport(String),
}

/// Abstract request/response contract of the record service. The facade
/// implements it in-process; any wire transport would implement the same
/// trait on the far side of a channel.
#[async_trait]
pub trait RecordRpc: Send + Sync {
    async fn create_record(&self, request: CreateRecordRequest) -> Result<CreateRecordResponse, RpcError>;
    async fn get_record(&self, request: GetRecordRequest) -> Result<GetRecordResponse, RpcError>;
    async fn update_record(&self, request: UpdateRecordRequest) -> Result<AckResponse, RpcError>;
    async fn delete_record(&self, request: DeleteRecordRequest) -> Result<AckResponse, RpcError>;
    async fn list_records(&self, request: ListRecordsRequest) -> Result<ListRecordsResponse, RpcError>;
    async fn run_migration(&self, request: RunMigrationRequest) -> Result<RunMigrationResponse, RpcError>;
    async fn get_migration_status(&self) -> Result<MigrationStatusResponse, RpcError>;
    async fn create_table(&self, request: CreateTableRequest) -> Result<AckResponse, RpcError>;
    async fn add_column(&self, request: AddColumnRequest) -> Result<AckResponse, RpcError>;
    async fn drop_column(&self, request: DropColumnRequest) -> Result<AckResponse, RpcError>;
    async fn health_check(&self) -> Result<HealthCheckResponse, RpcError>;
}
