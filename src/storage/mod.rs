mod repository;

pub use repository::*;

/// SQL migration creating one table per sheet
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
