//! Analysis worker - periodic engagement pattern learning over stale leads

use super::events::collect_events;
use super::profile::EngagementProfile;
use chrono::{DateTime, Duration, Utc};
use nurture_common::types::LeadId;
use nurture_common::Result;
use nurture_storage::models::Lead;
use nurture_storage::repository::{
    ActivityRepository, DemoViewRepository, EmailEventRepository, LeadRepository,
    SettingsRepository,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info};

/// Global kill switch read once per run
pub const ML_LEARNING_FLAG: &str = "ml_learning_enabled";

/// A profile older than this is recomputed
const STALE_AFTER_HOURS: i64 = 24;

/// Event history window
const LOOKBACK_DAYS: i64 = 180;

/// Stale leads fetched per page within one run
const STALE_PAGE: i64 = 100;

/// Aggregate counters for one analysis run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    pub scanned: u32,
    pub persisted: u32,
    pub marked_only: u32,
    pub failed: u32,
}

/// Analysis worker - recomputes engagement profiles for stale leads
pub struct AnalysisWorker {
    leads: Arc<dyn LeadRepository>,
    email_events: Arc<dyn EmailEventRepository>,
    activities: Arc<dyn ActivityRepository>,
    demo_views: Arc<dyn DemoViewRepository>,
    settings: Arc<dyn SettingsRepository>,
    /// Interval between runs (seconds)
    poll_interval_secs: u64,
}

impl AnalysisWorker {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        email_events: Arc<dyn EmailEventRepository>,
        activities: Arc<dyn ActivityRepository>,
        demo_views: Arc<dyn DemoViewRepository>,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            leads,
            email_events,
            activities,
            demo_views,
            settings,
            poll_interval_secs: 3600,
        }
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Run the worker loop
    pub async fn run(&self) {
        let mut ticker = interval(TokioDuration::from_secs(self.poll_interval_secs));

        info!(
            interval_secs = self.poll_interval_secs,
            "Pattern analysis worker started"
        );

        loop {
            ticker.tick().await;

            match self.analyze_stale(Utc::now()).await {
                Ok(stats) if stats.scanned > 0 => {
                    info!(
                        scanned = stats.scanned,
                        persisted = stats.persisted,
                        marked_only = stats.marked_only,
                        failed = stats.failed,
                        "Analysis run complete"
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Error running pattern analysis: {}", e),
            }
        }
    }

    /// Analyze every lead stale as of `now`, sequentially with per-lead
    /// fault isolation
    pub async fn analyze_stale(&self, now: DateTime<Utc>) -> Result<AnalysisStats> {
        let enabled = self
            .settings
            .get_bool(ML_LEARNING_FLAG)
            .await?
            .unwrap_or(true);
        if !enabled {
            info!("Pattern learning disabled; skipping run");
            return Ok(AnalysisStats::default());
        }

        let cutoff = now - Duration::hours(STALE_AFTER_HOURS);
        let since = now - Duration::days(LOOKBACK_DAYS);

        let mut stats = AnalysisStats::default();
        let mut seen: HashSet<LeadId> = HashSet::new();

        loop {
            let page = self.leads.list_stale(cutoff, STALE_PAGE).await?;
            // A lead that failed to update stays stale; the seen guard keeps
            // one run from spinning on it
            let fresh: Vec<Lead> = page
                .into_iter()
                .filter(|lead| seen.insert(lead.id))
                .collect();
            if fresh.is_empty() {
                break;
            }

            for lead in fresh {
                stats.scanned += 1;
                match self.analyze_lead(&lead, since, now).await {
                    Ok(true) => stats.persisted += 1,
                    Ok(false) => stats.marked_only += 1,
                    Err(e) => {
                        error!(lead_id = %lead.id, error = %e, "Lead analysis failed");
                        stats.failed += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Returns whether a profile was written back
    async fn analyze_lead(
        &self,
        lead: &Lead,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let email_events = self.email_events.list_since(lead.id, since).await?;
        let activities = self.activities.list_since(lead.id, since).await?;
        let demo_views = self.demo_views.list_since(lead.id, since).await?;

        let events = collect_events(&email_events, &activities, &demo_views);

        match EngagementProfile::compute(&events, now) {
            Some(profile) if profile.should_persist() => {
                info!(
                    lead_id = %lead.id,
                    confidence = profile.confidence,
                    sample_size = profile.sample_size,
                    "Engagement profile persisted"
                );
                self.leads
                    .save_profile(lead.id, &profile.into_learned(), now)
                    .await?;
                Ok(true)
            }
            // Low confidence: stamp the run but keep prior learned fields,
            // so a noisy period never erases a reliable profile
            Some(_) | None => {
                self.leads.mark_analyzed(lead.id, now).await?;
                Ok(false)
            }
        }
    }
}
