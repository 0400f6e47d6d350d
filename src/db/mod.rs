//! SQLite connection provider, executor and demo data

pub mod seed;
pub mod sqlite;

pub use seed::seed_sample_database;
pub use sqlite::SqliteDatabase;
