//! Nurture Storage - Database access for the engagement core
//!
//! This crate provides the connection pool, row models, and repositories.
//! Engine-owned tables (campaigns, steps, enrollments, executions) and
//! collaborator stores owned by the wider CRM (leads, engagement feeds,
//! tasks, activities, settings) are both reached through repository traits
//! so callers never touch SQL directly.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
