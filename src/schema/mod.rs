pub mod registry;

pub use registry::{ColumnDef, ColumnType, SchemaRegistry, TableSchema};
