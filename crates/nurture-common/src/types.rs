//! Common types for Nurture

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for tenants
pub type TenantId = Uuid;

/// Unique identifier for leads
pub type LeadId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for campaign steps
pub type StepId = Uuid;

/// Unique identifier for enrollments
pub type EnrollmentId = Uuid;

/// Unique identifier for executions
pub type ExecutionId = Uuid;

/// Unique identifier for tasks
pub type TaskId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Pipeline status value marking a lead that has become a customer
pub const PIPELINE_CUSTOMER: &str = "customer";

/// Outreach channel for a campaign step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    CallReminder,
    Task,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Sms => write!(f, "sms"),
            Channel::CallReminder => write!(f, "call_reminder"),
            Channel::Task => write!(f, "task"),
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            "call_reminder" => Ok(Channel::CallReminder),
            "task" => Ok(Channel::Task),
            _ => Err(format!("Invalid channel: {}", s)),
        }
    }
}

/// Communication channel an engagement event arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementChannel {
    Email,
    Sms,
    Phone,
}

impl std::fmt::Display for EngagementChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngagementChannel::Email => write!(f, "email"),
            EngagementChannel::Sms => write!(f, "sms"),
            EngagementChannel::Phone => write!(f, "phone"),
        }
    }
}

impl std::str::FromStr for EngagementChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(EngagementChannel::Email),
            "sms" => Ok(EngagementChannel::Sms),
            "phone" => Ok(EngagementChannel::Phone),
            _ => Err(format!("Invalid engagement channel: {}", s)),
        }
    }
}

/// Kind of engagement event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    EmailOpen,
    EmailReply,
    SmsReply,
    CallAnswered,
    DemoView,
}

impl EngagementKind {
    /// Whether this event counts as a response rather than a passive view
    pub fn is_success(self) -> bool {
        matches!(
            self,
            EngagementKind::EmailReply | EngagementKind::SmsReply | EngagementKind::CallAnswered
        )
    }
}

/// A normalized engagement event, the analyzer's unit of input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub occurred_at: DateTime<Utc>,
    pub kind: EngagementKind,
    /// Absent for events with no outbound channel (demo views)
    pub channel: Option<EngagementChannel>,
}

impl EngagementEvent {
    pub fn day_of_week(&self) -> Weekday {
        self.occurred_at.weekday()
    }

    pub fn hour_of_day(&self) -> u32 {
        self.occurred_at.hour()
    }
}

/// Fixed time-of-day buckets used by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSlot {
    Morning,
    Midday,
    Afternoon,
    Evening,
    OffHours,
}

impl TimeSlot {
    /// Bucket an hour of day (0-23)
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            8..=11 => TimeSlot::Morning,
            12..=13 => TimeSlot::Midday,
            14..=16 => TimeSlot::Afternoon,
            17..=19 => TimeSlot::Evening,
            _ => TimeSlot::OffHours,
        }
    }

    /// Human-readable label, as shown on lead profiles
    pub fn label(self) -> &'static str {
        match self {
            TimeSlot::Morning => "8am-12pm",
            TimeSlot::Midday => "12pm-2pm",
            TimeSlot::Afternoon => "2pm-5pm",
            TimeSlot::Evening => "5pm-8pm",
            TimeSlot::OffHours => "off-hours",
        }
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Learned channel preference for a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPreference {
    Email,
    Sms,
    Phone,
    Mixed,
}

impl std::fmt::Display for ChannelPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelPreference::Email => write!(f, "email"),
            ChannelPreference::Sms => write!(f, "sms"),
            ChannelPreference::Phone => write!(f, "phone"),
            ChannelPreference::Mixed => write!(f, "mixed"),
        }
    }
}

impl From<EngagementChannel> for ChannelPreference {
    fn from(channel: EngagementChannel) -> Self {
        match channel {
            EngagementChannel::Email => ChannelPreference::Email,
            EngagementChannel::Sms => ChannelPreference::Sms,
            EngagementChannel::Phone => ChannelPreference::Phone,
        }
    }
}

/// Full English name for a weekday, as stored on lead profiles
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
