use crate::error::app_error::AppError;
use crate::models::session::CredentialPair;
use crate::rpc::messages::*;
use crate::rpc::{RecordRpc, RpcClient, RpcError};
use crate::service::auth::AuthOrchestrator;
use crate::service::cache::TokenCache;
use crate::service::oauth::{OAuthProfile, OAuthProvider};
use crate::service::session::SessionManager;
use crate::service::token::TokenService;
use crate::service::user::UserService;
use crate::store::{Condition, FilterExpr, FilterOp};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

type Table = BTreeMap<Uuid, serde_json::Map<String, Value>>;

/// In-memory stand-in for the record service. Tables are plain maps;
/// `fail_next` injects transport faults for retry paths.
pub struct MockRpc {
    tables: Mutex<HashMap<String, Table>>,
    fail_next: AtomicU32,
}

impl MockRpc {
    pub fn new() -> Self {
        let mut tables = HashMap::new();
        tables.insert("users".to_string(), Table::new());
        tables.insert("user_sessions".to_string(), Table::new());
        Self {
            tables: Mutex::new(tables),
            fail_next: AtomicU32::new(0),
        }
    }

    pub fn fail_next_calls(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Direct row surgery for scenarios the public API forbids.
    pub fn set_field(&self, table: &str, id: Uuid, field: &str, value: Value) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(record) = tables.get_mut(table).and_then(|t| t.get_mut(&id)) {
            record.insert(field.to_string(), value);
        }
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().unwrap().get(table).map(|t| t.len()).unwrap_or(0)
    }

    fn check_transport(&self) -> Result<(), RpcError> {
        let left = self.fail_next.load(Ordering::SeqCst);
        if left > 0 {
            self.fail_next.store(left - 1, Ordering::SeqCst);
            return Err(RpcError::Transport("injected fault".to_string()));
        }
        Ok(())
    }
}

impl Default for MockRpc {
    fn default() -> Self {
        Self::new()
    }
}

fn condition_matches(record: &serde_json::Map<String, Value>, condition: &Condition) -> bool {
    let Some(actual) = record.get(&condition.field) else {
        return false;
    };
    match condition.op {
        FilterOp::Eq => actual == &condition.value,
        FilterOp::Ne => actual != &condition.value,
        FilterOp::Like => match (actual.as_str(), condition.value.as_str()) {
            (Some(actual), Some(pattern)) => actual.contains(pattern.trim_matches('%')),
            _ => false,
        },
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            let ordering = match (actual.as_f64(), condition.value.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => actual.as_str().zip(condition.value.as_str()).map(|(a, b)| a.cmp(b)),
            };
            let Some(ordering) = ordering else { return false };
            match condition.op {
                FilterOp::Gt => ordering.is_gt(),
                FilterOp::Gte => ordering.is_ge(),
                FilterOp::Lt => ordering.is_lt(),
                FilterOp::Lte => ordering.is_le(),
                _ => unreachable!(),
            }
        }
    }
}

#[async_trait]
impl RecordRpc for MockRpc {
    async fn create_record(&self, request: CreateRecordRequest) -> Result<CreateRecordResponse, RpcError> {
        self.check_transport()?;
        let Ok(Value::Object(mut fields)) = serde_json::from_str::<Value>(&request.data) else {
            return Ok(CreateRecordResponse {
                success: false,
                message: "Failed to create record: Invalid record data".to_string(),
                record_id: None,
            });
        };

        let mut tables = self.tables.lock().unwrap();
        let Some(table) = tables.get_mut(&request.table_name) else {
            return Ok(CreateRecordResponse {
                success: false,
                message: format!("Failed to create record: Table {} not found", request.table_name),
                record_id: None,
            });
        };

        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        fields.insert("id".to_string(), Value::String(id.to_string()));
        table.insert(id, fields);

        Ok(CreateRecordResponse {
            success: true,
            message: "Record created successfully".to_string(),
            record_id: Some(id),
        })
    }

    async fn get_record(&self, request: GetRecordRequest) -> Result<GetRecordResponse, RpcError> {
        self.check_transport()?;
        let tables = self.tables.lock().unwrap();
        match tables.get(&request.table_name).and_then(|t| t.get(&request.record_id)) {
            Some(record) => Ok(GetRecordResponse {
                success: true,
                message: "Record retrieved successfully".to_string(),
                data: Some(Value::Object(record.clone()).to_string()),
            }),
            None => Ok(GetRecordResponse {
                success: false,
                message: "Record not found".to_string(),
                data: None,
            }),
        }
    }

    async fn update_record(&self, request: UpdateRecordRequest) -> Result<AckResponse, RpcError> {
        self.check_transport()?;
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&request.data) else {
            return Ok(AckResponse::fail("Failed to update record: Invalid record data"));
        };

        let mut tables = self.tables.lock().unwrap();
        match tables.get_mut(&request.table_name).and_then(|t| t.get_mut(&request.record_id)) {
            Some(record) => {
                for (key, value) in fields {
                    record.insert(key, value);
                }
                Ok(AckResponse::ok("Record updated successfully"))
            }
            None => Ok(AckResponse::fail("Record not found")),
        }
    }

    async fn delete_record(&self, request: DeleteRecordRequest) -> Result<AckResponse, RpcError> {
        self.check_transport()?;
        let mut tables = self.tables.lock().unwrap();
        match tables.get_mut(&request.table_name).map(|t| t.remove(&request.record_id)) {
            Some(Some(_)) => Ok(AckResponse::ok("Record deleted successfully")),
            _ => Ok(AckResponse::fail("Record not found")),
        }
    }

    async fn list_records(&self, request: ListRecordsRequest) -> Result<ListRecordsResponse, RpcError> {
        self.check_transport()?;
        let filter = match request.filter.as_deref() {
            Some(text) => match FilterExpr::parse(text) {
                Ok(filter) => filter,
                Err(e) => {
                    return Ok(ListRecordsResponse {
                        success: false,
                        message: format!("Failed to list records: {}", e),
                        records: Vec::new(),
                        total_count: 0,
                    });
                }
            },
            None => FilterExpr::new(),
        };

        let tables = self.tables.lock().unwrap();
        let Some(table) = tables.get(&request.table_name) else {
            return Ok(ListRecordsResponse {
                success: false,
                message: format!("Failed to list records: Table {} not found", request.table_name),
                records: Vec::new(),
                total_count: 0,
            });
        };

        let matching: Vec<_> = table
            .values()
            .filter(|record| filter.conditions.iter().all(|c| condition_matches(record, c)))
            .collect();
        let total_count = matching.len() as i64;

        let page = request.page.max(1);
        let page_size = request.page_size.clamp(1, 1000);
        let offset = usize::try_from((page - 1).saturating_mul(page_size)).unwrap_or(usize::MAX);
        let records = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .map(|record| Value::Object((*record).clone()).to_string())
            .collect::<Vec<_>>();

        Ok(ListRecordsResponse {
            success: true,
            message: format!("Retrieved {} records", records.len()),
            records,
            total_count,
        })
    }

    async fn run_migration(&self, request: RunMigrationRequest) -> Result<RunMigrationResponse, RpcError> {
        self.check_transport()?;
        Ok(RunMigrationResponse {
            success: true,
            message: format!("Migration {} completed successfully", request.direction),
            current_revision: "a1e6b2947f3d".to_string(),
        })
    }

    async fn get_migration_status(&self) -> Result<MigrationStatusResponse, RpcError> {
        self.check_transport()?;
        Ok(MigrationStatusResponse {
            success: true,
            current_revision: "a1e6b2947f3d".to_string(),
            pending_migrations: Vec::new(),
        })
    }

    async fn create_table(&self, request: CreateTableRequest) -> Result<AckResponse, RpcError> {
        self.check_transport()?;
        Ok(AckResponse::ok(format!("Table {} created successfully", request.table_name)))
    }

    async fn add_column(&self, request: AddColumnRequest) -> Result<AckResponse, RpcError> {
        self.check_transport()?;
        Ok(AckResponse::ok(format!("Column {} added to {}", request.column_name, request.table_name)))
    }

    async fn drop_column(&self, request: DropColumnRequest) -> Result<AckResponse, RpcError> {
        self.check_transport()?;
        Ok(AckResponse::ok(format!("Column {} dropped from {}", request.column_name, request.table_name)))
    }

    async fn health_check(&self) -> Result<HealthCheckResponse, RpcError> {
        self.check_transport()?;
        Ok(HealthCheckResponse {
            healthy: true,
            message: "Database connection healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

/// In-memory token cache. TTLs are accepted and ignored; tests drive
/// expiry by deleting entries.
pub struct InMemoryTokenCache {
    tokens: Mutex<HashMap<Uuid, CredentialPair>>,
    data: Mutex<HashMap<Uuid, Value>>,
    fail_writes: AtomicBool,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            data: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn has_tokens(&self, session_id: Uuid) -> bool {
        self.tokens.lock().unwrap().contains_key(&session_id)
    }

    pub fn session_data(&self, session_id: Uuid) -> Option<Value> {
        self.data.lock().unwrap().get(&session_id).cloned()
    }
}

impl Default for InMemoryTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn put_tokens(&self, session_id: Uuid, pair: &CredentialPair, _ttl_secs: u64) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::cache("injected cache failure"));
        }
        self.tokens.lock().unwrap().insert(session_id, pair.clone());
        Ok(())
    }

    async fn get_tokens(&self, session_id: Uuid) -> Result<Option<CredentialPair>, AppError> {
        Ok(self.tokens.lock().unwrap().get(&session_id).cloned())
    }

    async fn delete_tokens(&self, session_id: Uuid) -> Result<(), AppError> {
        self.tokens.lock().unwrap().remove(&session_id);
        Ok(())
    }

    async fn put_session_data(&self, session_id: Uuid, data: &Value, _ttl_secs: u64) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::cache("injected cache failure"));
        }
        self.data.lock().unwrap().insert(session_id, data.clone());
        Ok(())
    }
}

/// Scripted provider for OAuth flow tests.
pub struct MockOAuthProvider {
    pub profile: OAuthProfile,
}

#[async_trait]
impl OAuthProvider for MockOAuthProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://idp.test/authorize?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthProfile, AppError> {
        if code == "bad-code" {
            return Err(AppError::Upstream("Token exchange rejected".to_string()));
        }
        Ok(self.profile.clone())
    }
}

/// Fully wired service graph over the mocks.
pub struct Harness {
    pub mock: Arc<MockRpc>,
    pub cache: Arc<InMemoryTokenCache>,
    pub tokens: TokenService,
    pub users: UserService,
    pub sessions: SessionManager,
    pub auth: AuthOrchestrator,
}

pub fn harness() -> Harness {
    harness_with_oauth(None)
}

pub fn harness_with_oauth(oauth: Option<Arc<dyn OAuthProvider>>) -> Harness {
    let mock = Arc::new(MockRpc::new());
    let cache = Arc::new(InMemoryTokenCache::new());
    let rpc = RpcClient::new(mock.clone(), 3, Duration::from_millis(1));
    let tokens = TokenService::new("test-secret", 30, 7);
    let users = UserService::new(rpc.clone());
    let sessions = SessionManager::new(rpc, cache.clone(), tokens.access_ttl_secs());
    let auth = AuthOrchestrator::new(users.clone(), sessions.clone(), tokens.clone(), oauth);

    Harness {
        mock,
        cache,
        tokens,
        users,
        sessions,
        auth,
    }
}

pub fn register_request(email: &str, username: &str) -> crate::models::user::RegisterRequest {
    crate::models::user::RegisterRequest {
        email: email.to_string(),
        username: username.to_string(),
        password: "correct horse battery staple".to_string(),
        full_name: None,
    }
}
