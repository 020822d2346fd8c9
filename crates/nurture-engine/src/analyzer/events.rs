//! Event normalization - folds the three raw feeds into engagement events
//!
//! Rows a feed produced that this module does not recognize are dropped
//! rather than aborting the per-lead pass.

use nurture_common::types::{EngagementChannel, EngagementEvent, EngagementKind};
use nurture_storage::models::{CrmActivity, DemoView, EmailEvent};

/// Normalize an email open/reply feed row
pub fn normalize_email_event(event: &EmailEvent) -> Option<EngagementEvent> {
    let kind = match event.event_type.as_str() {
        "open" => EngagementKind::EmailOpen,
        "reply" => EngagementKind::EmailReply,
        _ => return None,
    };

    Some(EngagementEvent {
        occurred_at: event.occurred_at,
        kind,
        channel: Some(EngagementChannel::Email),
    })
}

/// Normalize a CRM activity record
pub fn normalize_activity(activity: &CrmActivity) -> Option<EngagementEvent> {
    let (kind, channel) = match activity.kind.as_str() {
        "call_answered" => (EngagementKind::CallAnswered, EngagementChannel::Phone),
        "sms_reply" => (EngagementKind::SmsReply, EngagementChannel::Sms),
        "email_reply" => (EngagementKind::EmailReply, EngagementChannel::Email),
        _ => return None,
    };

    Some(EngagementEvent {
        occurred_at: activity.occurred_at,
        kind,
        channel: Some(channel),
    })
}

/// Normalize a demo view record
///
/// Demo views have no outbound channel, so they never feed the channel
/// preference statistic.
pub fn normalize_demo_view(view: &DemoView) -> Option<EngagementEvent> {
    if view.watch_seconds < 0 {
        return None;
    }

    Some(EngagementEvent {
        occurred_at: view.viewed_at,
        kind: EngagementKind::DemoView,
        channel: None,
    })
}

/// Merge the three feeds into one chronologically sorted event stream
pub fn collect_events(
    email_events: &[EmailEvent],
    activities: &[CrmActivity],
    demo_views: &[DemoView],
) -> Vec<EngagementEvent> {
    let mut events: Vec<EngagementEvent> = email_events
        .iter()
        .filter_map(normalize_email_event)
        .chain(activities.iter().filter_map(normalize_activity))
        .chain(demo_views.iter().filter_map(normalize_demo_view))
        .collect();

    events.sort_by_key(|e| e.occurred_at);
    events
}
