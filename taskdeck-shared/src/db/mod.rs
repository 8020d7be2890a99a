/// Database layer for TaskDeck
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Embedded migration runner
/// - `pagination`: Page requests and page metadata shared by list queries
/// - `soft_delete`: `deleted_at` marking, restoring and query filters
///
/// Models live in the `models` module at crate root level.

pub mod migrations;
pub mod pagination;
pub mod pool;
pub mod soft_delete;
