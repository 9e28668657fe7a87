//! SQLite storage: connection pool and the repository implementation.

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteRepository;
