use crate::error::app_error::AppError;
use crate::rpc::messages::*;
use crate::rpc::{RecordRpc, RpcError};
use crate::store::FilterExpr;
use crate::store::engine::RecordMap;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

/// Client edge of the record service. Transport faults are retried here
/// with exponential backoff, bounded attempts; the server never retries
/// internally, and structured domain failures are never retried at all.
#[derive(Clone)]
pub struct RpcClient {
    service: Arc<dyn RecordRpc>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl RpcClient {
    pub fn new(service: Arc<dyn RecordRpc>, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            service,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T, RpcError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        error!(operation = op, attempts = attempt, error = %e, "RPC call failed after retries");
                        return Err(e);
                    }
                    let delay = self.retry_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(operation = op, attempt = attempt, retry_in_ms = delay.as_millis() as u64, error = %e, "RPC call failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub async fn create_record(&self, request: CreateRecordRequest) -> Result<CreateRecordResponse, RpcError> {
        self.with_retry("CreateRecord", || self.service.create_record(request.clone())).await
    }

    pub async fn get_record(&self, request: GetRecordRequest) -> Result<GetRecordResponse, RpcError> {
        self.with_retry("GetRecord", || self.service.get_record(request.clone())).await
    }

    pub async fn update_record(&self, request: UpdateRecordRequest) -> Result<AckResponse, RpcError> {
        self.with_retry("UpdateRecord", || self.service.update_record(request.clone())).await
    }

    pub async fn delete_record(&self, request: DeleteRecordRequest) -> Result<AckResponse, RpcError> {
        self.with_retry("DeleteRecord", || self.service.delete_record(request.clone())).await
    }

    pub async fn list_records(&self, request: ListRecordsRequest) -> Result<ListRecordsResponse, RpcError> {
        self.with_retry("ListRecords", || self.service.list_records(request.clone())).await
    }

    pub async fn run_migration(&self, request: RunMigrationRequest) -> Result<RunMigrationResponse, RpcError> {
        self.with_retry("RunMigration", || self.service.run_migration(request.clone())).await
    }

    pub async fn get_migration_status(&self) -> Result<MigrationStatusResponse, RpcError> {
        self.with_retry("GetMigrationStatus", || self.service.get_migration_status()).await
    }

    pub async fn create_table(&self, request: CreateTableRequest) -> Result<AckResponse, RpcError> {
        self.with_retry("CreateTable", || self.service.create_table(request.clone())).await
    }

    pub async fn add_column(&self, request: AddColumnRequest) -> Result<AckResponse, RpcError> {
        self.with_retry("AddColumn", || self.service.add_column(request.clone())).await
    }

    pub async fn drop_column(&self, request: DropColumnRequest) -> Result<AckResponse, RpcError> {
        self.with_retry("DropColumn", || self.service.drop_column(request.clone())).await
    }

    pub async fn health_check(&self) -> Result<HealthCheckResponse, RpcError> {
        self.with_retry("HealthCheck", || self.service.health_check()).await
    }

    // ── Typed convenience calls used by the services ─────────────────────

    pub async fn create(&self, table: &str, fields: &RecordMap) -> Result<Uuid, AppError> {
        let response = self
            .create_record(CreateRecordRequest {
                table_name: table.to_string(),
                data: serde_json::to_string(fields).unwrap_or_else(|_| "{}".to_string()),
            })
            .await?;
        if !response.success {
            return Err(AppError::Upstream(response.message));
        }
        response.record_id.ok_or_else(|| AppError::Upstream("Create succeeded without a record id".to_string()))
    }

    pub async fn get_map(&self, table: &str, id: Uuid) -> Result<Option<RecordMap>, AppError> {
        let response = self
            .get_record(GetRecordRequest {
                table_name: table.to_string(),
                record_id: id,
            })
            .await?;
        if response.success {
            let data = response.data.ok_or_else(|| AppError::Upstream("Get succeeded without data".to_string()))?;
            Ok(Some(parse_record(&data)?))
        } else if response.message == "Record not found" {
            Ok(None)
        } else {
            Err(AppError::Upstream(response.message))
        }
    }

    pub async fn update(&self, table: &str, id: Uuid, fields: &RecordMap) -> Result<bool, AppError> {
        let response = self
            .update_record(UpdateRecordRequest {
                table_name: table.to_string(),
                record_id: id,
                data: serde_json::to_string(fields).unwrap_or_else(|_| "{}".to_string()),
            })
            .await?;
        ack_to_found(response)
    }

    pub async fn delete(&self, table: &str, id: Uuid) -> Result<bool, AppError> {
        let response = self
            .delete_record(DeleteRecordRequest {
                table_name: table.to_string(),
                record_id: id,
            })
            .await?;
        ack_to_found(response)
    }

    pub async fn list_maps(&self, table: &str, page: i64, page_size: i64, filter: &FilterExpr) -> Result<(Vec<RecordMap>, i64), AppError> {
        let response = self
            .list_records(ListRecordsRequest {
                table_name: table.to_string(),
                page,
                page_size,
                filter: if filter.is_empty() { None } else { Some(filter.to_wire()) },
            })
            .await?;
        if !response.success {
            return Err(AppError::Upstream(response.message));
        }
        let records = response
            .records
            .iter()
            .map(|text| parse_record(text))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, response.total_count))
    }

    pub async fn find_one(&self, table: &str, filter: &FilterExpr) -> Result<Option<RecordMap>, AppError> {
        let (mut records, _) = self.list_maps(table, 1, 1, filter).await?;
        Ok(records.pop())
    }
}

fn parse_record(text: &str) -> Result<RecordMap, AppError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(AppError::Upstream("Malformed record payload".to_string())),
    }
}

/// Contract quirk: a missing row travels as `success = false` with the
/// fixed "Record not found" message, everything else is a real failure.
fn ack_to_found(response: AckResponse) -> Result<bool, AppError> {
    if response.success {
        Ok(true)
    } else if response.message == "Record not found" {
        Ok(false)
    } else {
        Err(AppError::Upstream(response.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls with a transport fault, then
    /// answers every operation with a canned success.
    struct FlakyService {
        failures: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyService {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }

        fn check(&self) -> Result<(), RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                Err(RpcError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RecordRpc for FlakyService {
        async fn create_record(&self, _: CreateRecordRequest) -> Result<CreateRecordResponse, RpcError> {
            self.check()?;
            Ok(CreateRecordResponse {
                success: true,
                message: "Record created successfully".to_string(),
                record_id: Some(Uuid::new_v4()),
            })
        }

        async fn get_record(&self, _: GetRecordRequest) -> Result<GetRecordResponse, RpcError> {
            self.check()?;
            Ok(GetRecordResponse {
                success: false,
                message: "Record not found".to_string(),
                data: None,
            })
        }

        async fn update_record(&self, _: UpdateRecordRequest) -> Result<AckResponse, RpcError> {
            self.check()?;
            Ok(AckResponse::fail("Record not found"))
        }

        async fn delete_record(&self, _: DeleteRecordRequest) -> Result<AckResponse, RpcError> {
            self.check()?;
            Ok(AckResponse::ok("Record deleted successfully"))
        }

        async fn list_records(&self, _: ListRecordsRequest) -> Result<ListRecordsResponse, RpcError> {
            self.check()?;
            Ok(ListRecordsResponse {
                success: true,
                message: "Retrieved 0 records".to_string(),
                records: Vec::new(),
                total_count: 0,
            })
        }

        async fn run_migration(&self, _: RunMigrationRequest) -> Result<RunMigrationResponse, RpcError> {
            self.check()?;
            Ok(RunMigrationResponse {
                success: true,
                message: "ok".to_string(),
                current_revision: "none".to_string(),
            })
        }

        async fn get_migration_status(&self) -> Result<MigrationStatusResponse, RpcError> {
            self.check()?;
            Ok(MigrationStatusResponse {
                success: true,
                current_revision: "none".to_string(),
                pending_migrations: Vec::new(),
            })
        }

        async fn create_table(&self, _: CreateTableRequest) -> Result<AckResponse, RpcError> {
            self.check()?;
            Ok(AckResponse::ok("ok"))
        }

        async fn add_column(&self, _: AddColumnRequest) -> Result<AckResponse, RpcError> {
            self.check()?;
            Ok(AckResponse::ok("ok"))
        }

        async fn drop_column(&self, _: DropColumnRequest) -> Result<AckResponse, RpcError> {
            self.check()?;
            Ok(AckResponse::ok("ok"))
        }

        async fn health_check(&self) -> Result<HealthCheckResponse, RpcError> {
            self.check()?;
            Ok(HealthCheckResponse {
                healthy: true,
                message: "ok".to_string(),
                version: "test".to_string(),
            })
        }
    }

    fn client(failures: u32, max_attempts: u32) -> (RpcClient, Arc<FlakyService>) {
        let service = Arc::new(FlakyService::new(failures));
        let client = RpcClient::new(service.clone(), max_attempts, Duration::from_millis(1));
        (client, service)
    }

    #[rocket::async_test]
    async fn transport_faults_are_retried_until_success() {
        let (client, service) = client(2, 3);
        let response = client.health_check().await.expect("third attempt succeeds");
        assert!(response.healthy);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[rocket::async_test]
    async fn retries_are_bounded() {
        let (client, service) = client(5, 3);
        let err = client.health_check().await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[rocket::async_test]
    async fn successful_call_is_not_retried() {
        let (client, service) = client(0, 3);
        client.delete("users", Uuid::new_v4()).await.unwrap();
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[rocket::async_test]
    async fn structured_not_found_is_not_a_transport_fault() {
        let (client, service) = client(0, 3);
        let found = client.get_map("users", Uuid::new_v4()).await.unwrap();
        assert!(found.is_none());
        let updated = client.update("users", Uuid::new_v4(), &{
            let mut m = RecordMap::new();
            m.insert("is_active".to_string(), serde_json::json!(false));
            m
        })
        .await
        .unwrap();
        assert!(!updated);
        // One call each; structured failures never trigger the backoff loop.
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }
}
