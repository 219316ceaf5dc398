use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateRecordRequest {
    pub table_name: String,
    /// Record fields as JSON text.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateRecordResponse {
    pub success: bool,
    pub message: String,
    pub record_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetRecordRequest {
    pub table_name: String,
    pub record_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetRecordResponse {
    pub success: bool,
    pub message: String,
    /// Serialized record, all declared columns, timestamps in RFC 3339.
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateRecordRequest {
    pub table_name: String,
    pub record_id: Uuid,
    /// Partial field set as JSON text; absent fields stay untouched.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteRecordRequest {
    pub table_name: String,
    pub record_id: Uuid,
}

/// Shared success/message response for operations with no payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListRecordsRequest {
    pub table_name: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// Structured filter in wire form (equality map or condition array).
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListRecordsResponse {
    pub success: bool,
    pub message: String,
    pub records: Vec<String>,
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunMigrationRequest {
    /// "upgrade" or "downgrade".
    pub direction: String,
    pub target_revision: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunMigrationResponse {
    pub success: bool,
    pub message: String,
    pub current_revision: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MigrationStatusResponse {
    pub success: bool,
    pub current_revision: String,
    pub pending_migrations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateTableRequest {
    pub table_name: String,
    /// Accepted for contract compatibility; schema-from-payload creation
    /// is unsupported and always fails.
    pub schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AddColumnRequest {
    pub table_name: String,
    pub column_name: String,
    pub column_type: String,
    #[serde(default)]
    pub nullable: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DropColumnRequest {
    pub table_name: String,
    pub column_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthCheckResponse {
    pub healthy: bool,
    pub message: String,
    pub version: String,
}

impl AckResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
