//! Campaign Module - Drip-campaign execution

mod conditions;
mod dispatcher;
mod manager;
mod template;
mod worker;

pub use conditions::{conditions_met, parse_conditions, LeadFacts, StepCondition};
pub use dispatcher::{ChannelDispatcher, DispatchResult, MailTransport, SmtpMailer};
pub use manager::{CampaignError, CampaignManager};
pub use template::{render_subject, render_template};
pub use worker::{ExecutionWorker, TickStats};
