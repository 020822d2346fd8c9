//! Nurture Engine - Campaign execution and pattern analysis
//!
//! This crate provides the engagement automation core: the drip-campaign
//! execution pipeline (enrollment lifecycle, condition gating, channel
//! dispatch, periodic scheduling) and the engagement pattern analyzer that
//! mines historical events into per-lead outreach profiles.

pub mod analyzer;
pub mod campaign;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::{AnalysisStats, AnalysisWorker, EngagementProfile};
pub use campaign::{
    CampaignError, CampaignManager, ChannelDispatcher, DispatchResult, ExecutionWorker,
    MailTransport, SmtpMailer, TickStats,
};
