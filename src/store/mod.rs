pub mod engine;
pub mod filter;
pub mod migrations;

pub use engine::RecordStore;
pub use filter::{Condition, FilterExpr, FilterOp};
pub use migrations::{MigrationCoordinator, MigrationDirection};
