//! Analyzer Module - Engagement pattern learning

mod events;
mod profile;
mod worker;

pub use events::{collect_events, normalize_activity, normalize_demo_view, normalize_email_event};
pub use profile::{EngagementProfile, MIN_EVENTS, PERSIST_CONFIDENCE_FLOOR};
pub use worker::{AnalysisStats, AnalysisWorker, ML_LEARNING_FLAG};
