use crate::error::app_error::AppError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Column types the record store understands. Each maps to exactly one
/// Postgres type; the textual form is what AddColumn requests carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Integer,
    BigInt,
    Double,
    Boolean,
    Timestamp,
    Json,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Uuid => "uuid",
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::BigInt => "bigint",
            ColumnType::Double => "double precision",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamptz",
            ColumnType::Json => "jsonb",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

impl FromStr for ColumnType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uuid" => Ok(ColumnType::Uuid),
            "text" | "string" | "varchar" => Ok(ColumnType::Text),
            "integer" | "int" => Ok(ColumnType::Integer),
            "bigint" => Ok(ColumnType::BigInt),
            "double" | "double precision" | "float" => Ok(ColumnType::Double),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "timestamp" | "timestamptz" | "datetime" => Ok(ColumnType::Timestamp),
            "json" | "jsonb" => Ok(ColumnType::Json),
            other => Err(AppError::SchemaViolation(format!("Unknown column type: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    /// Raw SQL default expression used when the table is created from
    /// the registry shape.
    pub default: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            primary_key: false,
            unique: false,
            default: None,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn default_expr(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }
}

/// Declared shape of one registered table, columns in declaration order.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> &ColumnDef {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .expect("registered table without a primary key")
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

/// Static table-name-to-shape mapping driving the record store. Built once
/// at startup and shared; there is no mutation API, so schema evolution at
/// the backend leaves a registry/backend skew until the process restarts.
#[derive(Debug)]
pub struct SchemaRegistry {
    tables: HashMap<&'static str, TableSchema>,
}

impl SchemaRegistry {
    pub fn builtin() -> Self {
        let mut tables = HashMap::new();
        for schema in [users_schema(), user_sessions_schema()] {
            tables.insert(schema.name, schema);
        }
        Self { tables }
    }

    pub fn lookup(&self, table: &str) -> Result<&TableSchema, AppError> {
        self.tables.get(table).ok_or_else(|| AppError::TableNotFound(table.to_string()))
    }

    pub fn table_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tables.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

fn users_schema() -> TableSchema {
    TableSchema {
        name: "users",
        columns: vec![
            ColumnDef::new("id", ColumnType::Uuid).primary_key().default_expr("gen_random_uuid()"),
            ColumnDef::new("email", ColumnType::Text).unique(),
            ColumnDef::new("username", ColumnType::Text).unique(),
            ColumnDef::new("full_name", ColumnType::Text).nullable(),
            // Null for OAuth-only accounts.
            ColumnDef::new("hashed_password", ColumnType::Text).nullable(),
            ColumnDef::new("is_active", ColumnType::Boolean).default_expr("true"),
            ColumnDef::new("is_superuser", ColumnType::Boolean).default_expr("false"),
            ColumnDef::new("oauth_provider", ColumnType::Text).nullable(),
            ColumnDef::new("oauth_id", ColumnType::Text).nullable(),
            ColumnDef::new("created_at", ColumnType::Timestamp).default_expr("now()"),
            ColumnDef::new("updated_at", ColumnType::Timestamp).nullable(),
            ColumnDef::new("last_login", ColumnType::Timestamp).nullable(),
        ],
    }
}

fn user_sessions_schema() -> TableSchema {
    TableSchema {
        name: "user_sessions",
        columns: vec![
            ColumnDef::new("id", ColumnType::Uuid).primary_key().default_expr("gen_random_uuid()"),
            ColumnDef::new("user_id", ColumnType::Uuid),
            ColumnDef::new("is_active", ColumnType::Boolean).default_expr("true"),
            ColumnDef::new("created_at", ColumnType::Timestamp).default_expr("now()"),
            ColumnDef::new("expires_at", ColumnType::Timestamp),
            ColumnDef::new("user_agent", ColumnType::Text).nullable(),
            ColumnDef::new("ip_address", ColumnType::Text).nullable(),
        ],
    }
}
