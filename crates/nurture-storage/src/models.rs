//! Database models

use chrono::{DateTime, Duration, Utc};
use nurture_common::types::{
    CampaignId, ChannelPreference, EnrollmentId, ExecutionId, LeadId, StepId, TenantId,
    PIPELINE_CUSTOMER,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
}

/// Campaign step model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignStep {
    pub id: StepId,
    pub campaign_id: CampaignId,
    pub step_number: i32,
    pub channel: String,
    pub message_template: String,
    pub subject_template: Option<String>,
    pub conditions: serde_json::Value,
    pub delay_days: i32,
    pub delay_hours: i32,
    pub created_at: DateTime<Utc>,
}

impl CampaignStep {
    /// Get channel enum
    pub fn channel_enum(&self) -> Option<nurture_common::types::Channel> {
        self.channel.parse().ok()
    }

    /// Offset from the previous step's completion to this step's due time
    pub fn delay(&self) -> Duration {
        Duration::days(i64::from(self.delay_days)) + Duration::hours(i64::from(self.delay_hours))
    }
}

/// Create campaign step input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignStep {
    pub campaign_id: CampaignId,
    pub step_number: i32,
    pub channel: String,
    pub message_template: String,
    pub subject_template: Option<String>,
    pub conditions: Option<serde_json::Value>,
    pub delay_days: i32,
    pub delay_hours: i32,
}

/// Enrollment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Stopped,
}

impl EnrollmentStatus {
    /// Valid transitions: an active enrollment resolves exactly once and is
    /// never resumed
    pub fn can_transition_to(self, next: EnrollmentStatus) -> bool {
        matches!(
            (self, next),
            (EnrollmentStatus::Active, EnrollmentStatus::Completed)
                | (EnrollmentStatus::Active, EnrollmentStatus::Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, EnrollmentStatus::Active)
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollmentStatus::Active => write!(f, "active"),
            EnrollmentStatus::Completed => write!(f, "completed"),
            EnrollmentStatus::Stopped => write!(f, "stopped"),
        }
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentStatus::Active),
            "completed" => Ok(EnrollmentStatus::Completed),
            "stopped" => Ok(EnrollmentStatus::Stopped),
            _ => Err(format!("Invalid enrollment status: {}", s)),
        }
    }
}

/// Campaign enrollment model - one lead's run through one campaign
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignEnrollment {
    pub id: EnrollmentId,
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
    pub status: String,
    pub current_step: i32,
    pub stopped_reason: Option<String>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignEnrollment {
    /// Get status enum
    pub fn status_enum(&self) -> Option<EnrollmentStatus> {
        self.status.parse().ok()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status_enum(), Some(EnrollmentStatus::Active))
    }
}

/// Create enrollment input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEnrollment {
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
}

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

impl ExecutionStatus {
    /// A resolved execution is never re-dispatched
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Pending)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Sent => write!(f, "sent"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "sent" => Ok(ExecutionStatus::Sent),
            "failed" => Ok(ExecutionStatus::Failed),
            "skipped" => Ok(ExecutionStatus::Skipped),
            _ => Err(format!("Invalid execution status: {}", s)),
        }
    }
}

/// Campaign execution model - one scheduled unit of work
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CampaignExecution {
    pub id: ExecutionId,
    pub enrollment_id: EnrollmentId,
    pub step_id: StepId,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    pub executed_at: Option<DateTime<Utc>>,
    /// Failure detail or human-readable skip reason
    pub error_message: Option<String>,
    pub external_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignExecution {
    /// Get status enum
    pub fn status_enum(&self) -> Option<ExecutionStatus> {
        self.status.parse().ok()
    }
}

/// Create execution input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExecution {
    pub enrollment_id: EnrollmentId,
    pub step_id: StepId,
    pub scheduled_for: DateTime<Utc>,
}

/// Lead record, owned by the wider CRM
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub tenant_id: TenantId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub pipeline_status: String,
    pub quiet_mode: bool,
    pub learned_best_days: Option<serde_json::Value>,
    pub learned_best_times: Option<serde_json::Value>,
    pub learned_optimal_gap_hours: Option<f64>,
    pub learned_channel_preference: Option<String>,
    pub learning_confidence: Option<i32>,
    pub last_pattern_analysis: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Whether the lead has been won as a customer
    pub fn is_converted(&self) -> bool {
        self.pipeline_status == PIPELINE_CUSTOMER
    }

    /// First and last name joined, skipping missing parts
    pub fn full_name(&self) -> String {
        let mut parts = Vec::new();
        if let Some(first) = self.first_name.as_deref() {
            if !first.is_empty() {
                parts.push(first);
            }
        }
        if let Some(last) = self.last_name.as_deref() {
            if !last.is_empty() {
                parts.push(last);
            }
        }
        parts.join(" ")
    }
}

/// Learned engagement profile written back onto a lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedProfile {
    pub best_days: Vec<String>,
    pub best_times: Vec<String>,
    pub optimal_gap_hours: f64,
    pub channel_preference: ChannelPreference,
    pub confidence: i32,
}

/// Raw email engagement event (open/reply feed)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailEvent {
    pub id: uuid::Uuid,
    pub lead_id: LeadId,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
}

/// Raw CRM activity record (call/sms/email interactions plus audit entries)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CrmActivity {
    pub id: uuid::Uuid,
    pub lead_id: LeadId,
    pub kind: String,
    pub body: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Raw demo view record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DemoView {
    pub id: uuid::Uuid,
    pub lead_id: LeadId,
    pub watch_seconds: i32,
    pub viewed_at: DateTime<Utc>,
}

/// Create task input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub lead_id: LeadId,
    pub title: String,
    pub description: String,
    pub due_at: DateTime<Utc>,
}
