use crate::error::app_error::AppError;
use crate::rpc::messages::*;
use crate::rpc::{RecordRpc, RpcError};
use crate::store::engine::RecordMap;
use crate::store::{FilterExpr, MigrationCoordinator, MigrationDirection, RecordStore};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Per-call budgets. Migrations get a longer leash, health checks a
/// shorter one.
#[derive(Debug, Clone, Copy)]
pub struct RpcTimeouts {
    pub call: Duration,
    pub migration: Duration,
    pub health: Duration,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self {
            call: Duration::from_secs(10),
            migration: Duration::from_secs(120),
            health: Duration::from_secs(2),
        }
    }
}

/// Server side of the record service: decode request, call the engine or
/// the migration coordinator, encode a structured result. Domain faults
/// never escape as transport faults; only a blown per-call budget does.
pub struct Facade {
    store: RecordStore,
    migrator: MigrationCoordinator,
    timeouts: RpcTimeouts,
}

impl Facade {
    pub fn new(store: RecordStore, migrator: MigrationCoordinator, timeouts: RpcTimeouts) -> Self {
        Self {
            store,
            migrator,
            timeouts,
        }
    }

    async fn bounded<T, F>(&self, op: &'static str, budget: Duration, call: F) -> Result<T, RpcError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(budget, call).await.map_err(|_| {
            warn!(operation = op, budget_ms = budget.as_millis() as u64, "RPC call exceeded its budget");
            RpcError::Timeout(op)
        })
    }
}

fn parse_fields(data: &str) -> Result<RecordMap, AppError> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::BadRequest("Record data must be a JSON object".to_string())),
        Err(e) => Err(AppError::BadRequest(format!("Invalid record data: {}", e))),
    }
}

fn parse_filter(filter: Option<&str>) -> Result<FilterExpr, AppError> {
    match filter {
        Some(text) if !text.trim().is_empty() => FilterExpr::parse(text),
        _ => Ok(FilterExpr::new()),
    }
}

fn encode_record(map: &RecordMap) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}

#[async_trait]
impl RecordRpc for Facade {
    async fn create_record(&self, request: CreateRecordRequest) -> Result<CreateRecordResponse, RpcError> {
        self.bounded("CreateRecord", self.timeouts.call, async {
            let result: Result<Uuid, AppError> = async {
                let fields = parse_fields(&request.data)?;
                self.store.create(&request.table_name, &fields).await
            }
            .await;

            match result {
                Ok(record_id) => CreateRecordResponse {
                    success: true,
                    message: "Record created successfully".to_string(),
                    record_id: Some(record_id),
                },
                Err(e) => CreateRecordResponse {
                    success: false,
                    message: format!("Failed to create record: {}", e),
                    record_id: None,
                },
            }
        })
        .await
    }

    async fn get_record(&self, request: GetRecordRequest) -> Result<GetRecordResponse, RpcError> {
        self.bounded("GetRecord", self.timeouts.call, async {
            match self.store.get(&request.table_name, request.record_id).await {
                Ok(Some(record)) => GetRecordResponse {
                    success: true,
                    message: "Record retrieved successfully".to_string(),
                    data: Some(encode_record(&record)),
                },
                Ok(None) => GetRecordResponse {
                    success: false,
                    message: "Record not found".to_string(),
                    data: None,
                },
                Err(e) => GetRecordResponse {
                    success: false,
                    message: format!("Failed to get record: {}", e),
                    data: None,
                },
            }
        })
        .await
    }

    async fn update_record(&self, request: UpdateRecordRequest) -> Result<AckResponse, RpcError> {
        self.bounded("UpdateRecord", self.timeouts.call, async {
            let result: Result<bool, AppError> = async {
                let fields = parse_fields(&request.data)?;
                self.store.update(&request.table_name, request.record_id, &fields).await
            }
            .await;

            match result {
                Ok(true) => AckResponse::ok("Record updated successfully"),
                Ok(false) => AckResponse::fail("Record not found"),
                Err(e) => AckResponse::fail(format!("Failed to update record: {}", e)),
            }
        })
        .await
    }

    async fn delete_record(&self, request: DeleteRecordRequest) -> Result<AckResponse, RpcError> {
        self.bounded("DeleteRecord", self.timeouts.call, async {
            match self.store.delete(&request.table_name, request.record_id).await {
                Ok(true) => AckResponse::ok("Record deleted successfully"),
                Ok(false) => AckResponse::fail("Record not found"),
                Err(e) => AckResponse::fail(format!("Failed to delete record: {}", e)),
            }
        })
        .await
    }

    async fn list_records(&self, request: ListRecordsRequest) -> Result<ListRecordsResponse, RpcError> {
        self.bounded("ListRecords", self.timeouts.call, async {
            let result: Result<(Vec<RecordMap>, i64), AppError> = async {
                let filter = parse_filter(request.filter.as_deref())?;
                self.store.list(&request.table_name, request.page, request.page_size, &filter).await
            }
            .await;

            match result {
                Ok((records, total_count)) => ListRecordsResponse {
                    success: true,
                    message: format!("Retrieved {} records", records.len()),
                    records: records.iter().map(encode_record).collect(),
                    total_count,
                },
                Err(e) => ListRecordsResponse {
                    success: false,
                    message: format!("Failed to list records: {}", e),
                    records: Vec::new(),
                    total_count: 0,
                },
            }
        })
        .await
    }

    async fn run_migration(&self, request: RunMigrationRequest) -> Result<RunMigrationResponse, RpcError> {
        self.bounded("RunMigration", self.timeouts.migration, async {
            let result: Result<String, AppError> = async {
                let direction: MigrationDirection = request.direction.parse()?;
                self.migrator.migrate(direction, request.target_revision.as_deref()).await
            }
            .await;

            match result {
                Ok(current_revision) => RunMigrationResponse {
                    success: true,
                    message: format!("Migration {} completed successfully", request.direction),
                    current_revision,
                },
                Err(e) => RunMigrationResponse {
                    success: false,
                    message: format!("Migration failed: {}", e),
                    current_revision: self.migrator.current_revision().await,
                },
            }
        })
        .await
    }

    async fn get_migration_status(&self) -> Result<MigrationStatusResponse, RpcError> {
        self.bounded("GetMigrationStatus", self.timeouts.call, async {
            MigrationStatusResponse {
                success: true,
                current_revision: self.migrator.current_revision().await,
                pending_migrations: self.migrator.pending_revisions().await,
            }
        })
        .await
    }

    async fn create_table(&self, request: CreateTableRequest) -> Result<AckResponse, RpcError> {
        self.bounded("CreateTable", self.timeouts.call, async {
            if self.store.registry().lookup(&request.table_name).is_err() {
                return if request.schema.is_some() {
                    AckResponse::fail("Dynamic table creation from schema is not supported")
                } else {
                    AckResponse::fail(format!("Table {} not found in registry and no schema provided", request.table_name))
                };
            }
            match self.store.create_table(&request.table_name).await {
                Ok(()) => AckResponse::ok(format!("Table {} created successfully", request.table_name)),
                Err(e) => AckResponse::fail(format!("Failed to create table: {}", e)),
            }
        })
        .await
    }

    async fn add_column(&self, request: AddColumnRequest) -> Result<AckResponse, RpcError> {
        self.bounded("AddColumn", self.timeouts.call, async {
            let result: Result<(), AppError> = async {
                let ty = request.column_type.parse()?;
                self.store
                    .add_column(
                        &request.table_name,
                        &request.column_name,
                        ty,
                        request.nullable,
                        request.default_value.as_deref(),
                    )
                    .await
            }
            .await;

            match result {
                Ok(()) => AckResponse::ok(format!("Column {} added to {}", request.column_name, request.table_name)),
                Err(e) => AckResponse::fail(format!("Failed to add column: {}", e)),
            }
        })
        .await
    }

    async fn drop_column(&self, request: DropColumnRequest) -> Result<AckResponse, RpcError> {
        self.bounded("DropColumn", self.timeouts.call, async {
            match self.store.drop_column(&request.table_name, &request.column_name).await {
                Ok(()) => AckResponse::ok(format!("Column {} dropped from {}", request.column_name, request.table_name)),
                Err(e) => AckResponse::fail(format!("Failed to drop column: {}", e)),
            }
        })
        .await
    }

    async fn health_check(&self) -> Result<HealthCheckResponse, RpcError> {
        self.bounded("HealthCheck", self.timeouts.health, async {
            match self.store.ping().await {
                Ok(()) => HealthCheckResponse {
                    healthy: true,
                    message: "Database connection healthy".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                Err(e) => HealthCheckResponse {
                    healthy: false,
                    message: format!("Health check failed: {}", e),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            }
        })
        .await
    }
}
