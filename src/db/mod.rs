//! Database module for PostgreSQL connection and query execution

pub mod connection;
pub mod postgres;

pub use connection::{init_pool, DbPool};
pub use postgres::PgDatabase;
