//! Repository layer for data access

pub mod activities;
pub mod campaigns;
pub mod engagement;
pub mod enrollments;
pub mod executions;
pub mod leads;
pub mod settings;
pub mod tasks;

pub use activities::{ActivityRepository, DbActivityRepository};
pub use campaigns::{CampaignRepository, DbCampaignRepository};
pub use engagement::{
    DbDemoViewRepository, DbEmailEventRepository, DemoViewRepository, EmailEventRepository,
};
pub use enrollments::{DbEnrollmentRepository, EnrollmentRepository};
pub use executions::{DbExecutionRepository, ExecutionRepository};
pub use leads::{DbLeadRepository, LeadRepository};
pub use settings::{DbSettingsRepository, SettingsRepository};
pub use tasks::{DbTaskRepository, TaskRepository};
