use crate::auth::Superuser;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::models::pagination::PaginatedResponse;
use crate::rpc::RpcClient;
use crate::rpc::messages::*;
use crate::store::FilterExpr;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put};
use rocket_okapi::openapi;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Admin pass-through to the record service. Every handler speaks the
/// same structured contract the services use internally; a failure
/// message from the backend surfaces as the matching HTTP status.

#[derive(Serialize, Debug, JsonSchema)]
pub struct RecordCreatedResponse {
    pub record_id: Uuid,
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct MigrationRequest {
    /// "upgrade" or "downgrade".
    pub direction: String,
    pub target_revision: Option<String>,
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct AddColumnBody {
    pub column_name: String,
    pub column_type: String,
    #[serde(default)]
    pub nullable: bool,
    pub default_value: Option<String>,
}

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid record id", e))
}

/// The backend reports domain failures as structured messages; map the
/// well-known ones back onto the error taxonomy.
fn fail_to_error(message: String) -> AppError {
    if message == "Record not found" {
        AppError::RecordNotFound
    } else if message.contains("not found in registry") || message.contains("Table") && message.contains("not found") {
        AppError::NotFound(message)
    } else if message.contains("Schema violation") || message.contains("Invalid filter") || message.contains("Invalid record data") {
        AppError::BadRequest(message)
    } else {
        AppError::Upstream(message)
    }
}

/// Create a record in a registered table
#[openapi(tag = "Records")]
#[post("/<table>", data = "<payload>")]
pub async fn create_record(
    rpc: &State<RpcClient>,
    _admin: Superuser,
    table: &str,
    payload: JsonBody<Value>,
) -> Result<(Status, Json<RecordCreatedResponse>), AppError> {
    let response = rpc
        .create_record(CreateRecordRequest {
            table_name: table.to_string(),
            data: payload.0.to_string(),
        })
        .await?;
    if !response.success {
        return Err(fail_to_error(response.message));
    }
    let record_id = response
        .record_id
        .ok_or_else(|| AppError::Upstream("Create succeeded without a record id".to_string()))?;
    Ok((Status::Created, Json(RecordCreatedResponse { record_id })))
}

/// Fetch one record
#[openapi(tag = "Records")]
#[get("/<table>/<id>")]
pub async fn get_record(rpc: &State<RpcClient>, _admin: Superuser, table: &str, id: &str) -> Result<Json<Value>, AppError> {
    let record_id = parse_id(id)?;
    let response = rpc
        .get_record(GetRecordRequest {
            table_name: table.to_string(),
            record_id,
        })
        .await?;
    if !response.success {
        return Err(fail_to_error(response.message));
    }
    let data = response.data.ok_or_else(|| AppError::Upstream("Get succeeded without data".to_string()))?;
    let record: Value = serde_json::from_str(&data).map_err(|_| AppError::Upstream("Malformed record payload".to_string()))?;
    Ok(Json(record))
}

/// Update fields of one record
#[openapi(tag = "Records")]
#[put("/<table>/<id>", data = "<payload>")]
pub async fn update_record(
    rpc: &State<RpcClient>,
    _admin: Superuser,
    table: &str,
    id: &str,
    payload: JsonBody<Value>,
) -> Result<Json<AckResponse>, AppError> {
    let record_id = parse_id(id)?;
    let response = rpc
        .update_record(UpdateRecordRequest {
            table_name: table.to_string(),
            record_id,
            data: payload.0.to_string(),
        })
        .await?;
    if !response.success {
        return Err(fail_to_error(response.message));
    }
    Ok(Json(response))
}

/// Delete one record
#[openapi(tag = "Records")]
#[delete("/<table>/<id>")]
pub async fn delete_record(rpc: &State<RpcClient>, _admin: Superuser, table: &str, id: &str) -> Result<Json<AckResponse>, AppError> {
    let record_id = parse_id(id)?;
    let response = rpc
        .delete_record(DeleteRecordRequest {
            table_name: table.to_string(),
            record_id,
        })
        .await?;
    if !response.success {
        return Err(fail_to_error(response.message));
    }
    Ok(Json(response))
}

/// List records with optional structured filter
#[openapi(tag = "Records")]
#[get("/<table>?<page>&<page_size>&<filter>")]
pub async fn list_records(
    rpc: &State<RpcClient>,
    _admin: Superuser,
    table: &str,
    page: Option<i64>,
    page_size: Option<i64>,
    filter: Option<String>,
) -> Result<Json<PaginatedResponse<Value>>, AppError> {
    let page = page.unwrap_or(1);
    let page_size = page_size.unwrap_or(50);
    // Parse up front so a malformed filter fails as a 400 here rather
    // than as a backend failure message.
    if let Some(text) = filter.as_deref() {
        FilterExpr::parse(text)?;
    }

    let response = rpc
        .list_records(ListRecordsRequest {
            table_name: table.to_string(),
            page,
            page_size,
            filter,
        })
        .await?;
    if !response.success {
        return Err(fail_to_error(response.message));
    }

    let records = response
        .records
        .iter()
        .map(|text| serde_json::from_str(text).map_err(|_| AppError::Upstream("Malformed record payload".to_string())))
        .collect::<Result<Vec<Value>, _>>()?;
    Ok(Json(PaginatedResponse::new(records, page, page_size, response.total_count)))
}

/// Run schema migrations in either direction
#[openapi(tag = "Migrations")]
#[post("/migrations", data = "<payload>")]
pub async fn run_migration(
    rpc: &State<RpcClient>,
    _admin: Superuser,
    payload: JsonBody<MigrationRequest>,
) -> Result<Json<RunMigrationResponse>, AppError> {
    let response = rpc
        .run_migration(RunMigrationRequest {
            direction: payload.direction.clone(),
            target_revision: payload.target_revision.clone(),
        })
        .await?;
    if !response.success {
        return Err(fail_to_error(response.message));
    }
    Ok(Json(response))
}

/// Current and pending schema revisions
#[openapi(tag = "Migrations")]
#[get("/migrations")]
pub async fn migration_status(rpc: &State<RpcClient>, _admin: Superuser) -> Result<Json<MigrationStatusResponse>, AppError> {
    Ok(Json(rpc.get_migration_status().await?))
}

/// Create a registered table that does not exist yet
#[openapi(tag = "Tables")]
#[post("/tables/<table>")]
pub async fn create_table(rpc: &State<RpcClient>, _admin: Superuser, table: &str) -> Result<Json<AckResponse>, AppError> {
    let response = rpc
        .create_table(CreateTableRequest {
            table_name: table.to_string(),
            schema: None,
        })
        .await?;
    if !response.success {
        return Err(fail_to_error(response.message));
    }
    Ok(Json(response))
}

/// Add a column to a registered table
#[openapi(tag = "Tables")]
#[post("/tables/<table>/columns", data = "<payload>")]
pub async fn add_column(
    rpc: &State<RpcClient>,
    _admin: Superuser,
    table: &str,
    payload: JsonBody<AddColumnBody>,
) -> Result<Json<AckResponse>, AppError> {
    let response = rpc
        .add_column(AddColumnRequest {
            table_name: table.to_string(),
            column_name: payload.column_name.clone(),
            column_type: payload.column_type.clone(),
            nullable: payload.nullable,
            default_value: payload.default_value.clone(),
        })
        .await?;
    if !response.success {
        return Err(fail_to_error(response.message));
    }
    Ok(Json(response))
}

/// Drop a column from a registered table
#[openapi(tag = "Tables")]
#[delete("/tables/<table>/columns/<column>")]
pub async fn drop_column(rpc: &State<RpcClient>, _admin: Superuser, table: &str, column: &str) -> Result<Json<AckResponse>, AppError> {
    let response = rpc
        .drop_column(DropColumnRequest {
            table_name: table.to_string(),
            column_name: column.to_string(),
        })
        .await?;
    if !response.success {
        return Err(fail_to_error(response.message));
    }
    Ok(Json(response))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![
        create_record,
        get_record,
        update_record,
        delete_record,
        list_records,
        run_migration,
        migration_status,
        create_table,
        add_column,
        drop_column
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_messages_map_to_the_taxonomy() {
        assert!(matches!(fail_to_error("Record not found".to_string()), AppError::RecordNotFound));
        assert!(matches!(
            fail_to_error("Failed to list records: Schema violation: Unknown filter field x for table users".to_string()),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            fail_to_error("Table widgets not found in registry and no schema provided".to_string()),
            AppError::NotFound(_)
        ));
        assert!(matches!(fail_to_error("Migration failed: boom".to_string()), AppError::Upstream(_)));
    }
}
