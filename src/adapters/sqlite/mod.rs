//! SQLite database adapters for the curveshift engine.

pub mod change_repository;
pub mod connection;
pub mod decision_log_repository;
pub mod migrations;
pub mod planned_test_repository;
pub mod result_repository;

pub use change_repository::SqliteChangeRepository;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use decision_log_repository::SqliteDecisionLogRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use planned_test_repository::SqlitePlannedTestRepository;
pub use result_repository::SqliteResultRepository;
