//! Execution worker - the periodic driver for due campaign executions

use super::conditions::{conditions_met, needs_demo_views, parse_conditions, LeadFacts};
use super::dispatcher::{ChannelDispatcher, DispatchResult};
use chrono::{DateTime, Duration, Utc};
use nurture_common::config::{ConditionPolicy, RetryPolicy};
use nurture_common::Result;
use nurture_storage::models::{CampaignEnrollment, CampaignExecution, CampaignStep, CreateExecution};
use nurture_storage::repository::{
    ActivityRepository, CampaignRepository, DemoViewRepository, EnrollmentRepository,
    ExecutionRepository, LeadRepository,
};
use std::sync::Arc;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info, warn};

/// Enrollment stop reason recorded when a lead converts mid-sequence
const STOP_REASON_CONVERTED: &str = "converted";

/// Aggregate counters for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub processed: u32,
    pub sent: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// How a single execution resolved
enum Outcome {
    Sent,
    Failed,
    Skipped,
}

/// Execution worker - processes due campaign executions in bounded batches
pub struct ExecutionWorker {
    executions: Arc<dyn ExecutionRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    leads: Arc<dyn LeadRepository>,
    demo_views: Arc<dyn DemoViewRepository>,
    activities: Arc<dyn ActivityRepository>,
    dispatcher: ChannelDispatcher,
    condition_policy: ConditionPolicy,
    retry: RetryPolicy,
    /// Maximum executions per tick
    batch_size: i64,
    /// Interval between ticks (seconds)
    poll_interval_secs: u64,
}

impl ExecutionWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executions: Arc<dyn ExecutionRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        leads: Arc<dyn LeadRepository>,
        demo_views: Arc<dyn DemoViewRepository>,
        activities: Arc<dyn ActivityRepository>,
        dispatcher: ChannelDispatcher,
    ) -> Self {
        Self {
            executions,
            enrollments,
            campaigns,
            leads,
            demo_views,
            activities,
            dispatcher,
            condition_policy: ConditionPolicy::default(),
            retry: RetryPolicy::default(),
            batch_size: 50,
            poll_interval_secs: 60,
        }
    }

    /// Set batch size
    pub fn with_batch_size(mut self, size: i64) -> Self {
        self.batch_size = size;
        self
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Set the unknown-condition policy
    pub fn with_condition_policy(mut self, policy: ConditionPolicy) -> Self {
        self.condition_policy = policy;
        self
    }

    /// Set the retry policy for failed dispatches
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the worker loop
    pub async fn run(&self) {
        let mut ticker = interval(TokioDuration::from_secs(self.poll_interval_secs));

        info!(
            batch_size = self.batch_size,
            interval_secs = self.poll_interval_secs,
            "Campaign execution worker started"
        );

        loop {
            ticker.tick().await;

            match self.process_due(Utc::now()).await {
                Ok(stats) if stats.processed > 0 => {
                    info!(
                        processed = stats.processed,
                        sent = stats.sent,
                        failed = stats.failed,
                        skipped = stats.skipped,
                        "Execution tick complete"
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Error processing due executions: {}", e),
            }
        }
    }

    /// Process one bounded batch of due executions
    ///
    /// Items run sequentially; an error on one item resolves that execution
    /// as failed and never aborts the rest of the batch.
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<TickStats> {
        let batch = self.executions.due_batch(now, self.batch_size).await?;
        let mut stats = TickStats::default();

        for execution in batch {
            stats.processed += 1;

            match self.process_one(&execution, now).await {
                Ok(Outcome::Sent) => stats.sent += 1,
                Ok(Outcome::Failed) => stats.failed += 1,
                Ok(Outcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    error!(
                        execution_id = %execution.id,
                        error = %e,
                        "Unexpected error processing execution"
                    );
                    if let Err(mark_err) = self
                        .executions
                        .mark_failed(execution.id, now, &e.to_string())
                        .await
                    {
                        error!(
                            execution_id = %execution.id,
                            error = %mark_err,
                            "Failed to record execution failure"
                        );
                    }
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn process_one(
        &self,
        execution: &CampaignExecution,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let enrollment = match self.enrollments.get(execution.enrollment_id).await? {
            Some(enrollment) if enrollment.is_active() => enrollment,
            _ => {
                self.executions
                    .mark_skipped(execution.id, now, "Enrollment already resolved")
                    .await?;
                return Ok(Outcome::Skipped);
            }
        };

        let Some(step) = self.campaigns.get_step_by_id(execution.step_id).await? else {
            self.executions
                .mark_failed(execution.id, now, "Step not found")
                .await?;
            return Ok(Outcome::Failed);
        };

        let Some(lead) = self.leads.get(enrollment.lead_id).await? else {
            self.executions
                .mark_failed(execution.id, now, "Lead not found")
                .await?;
            return Ok(Outcome::Failed);
        };

        if lead.is_converted() {
            self.enrollments
                .mark_stopped(enrollment.id, STOP_REASON_CONVERTED, now)
                .await?;
            self.executions
                .mark_skipped(execution.id, now, "Lead converted")
                .await?;
            info!(enrollment_id = %enrollment.id, "Enrollment auto-stopped: lead converted");
            return Ok(Outcome::Skipped);
        }

        // Quiet mode pauses this touch only; the sequence itself stays live
        if lead.quiet_mode {
            self.executions
                .mark_skipped(execution.id, now, "Lead in quiet mode")
                .await?;
            return Ok(Outcome::Skipped);
        }

        let conditions = parse_conditions(&step.conditions);
        let facts = if needs_demo_views(&conditions) {
            LeadFacts {
                demo_views: self.demo_views.count_for_lead(lead.id).await?,
            }
        } else {
            LeadFacts::default()
        };

        if !conditions_met(&conditions, &facts, self.condition_policy) {
            self.executions
                .mark_skipped(execution.id, now, "Step conditions not met")
                .await?;
            return Ok(Outcome::Skipped);
        }

        match self.dispatcher.dispatch(&step, &lead, now).await {
            DispatchResult::Sent { external_id } => {
                let resolved = self
                    .executions
                    .mark_sent(execution.id, now, external_id.as_deref())
                    .await?;
                if !resolved {
                    warn!(
                        execution_id = %execution.id,
                        "Execution resolved elsewhere after dispatch"
                    );
                    return Ok(Outcome::Skipped);
                }

                let record = format!(
                    "Campaign step {} sent via {}",
                    step.step_number, step.channel
                );
                if let Err(e) = self.activities.append(lead.id, "campaign", &record).await {
                    warn!(lead_id = %lead.id, error = %e, "Failed to append activity record");
                }

                self.advance(&enrollment, &step, now).await?;
                Ok(Outcome::Sent)
            }
            DispatchResult::Skipped { reason } => {
                self.executions
                    .mark_skipped(execution.id, now, &reason)
                    .await?;
                Ok(Outcome::Skipped)
            }
            DispatchResult::Failed { error } => {
                self.executions
                    .mark_failed(execution.id, now, &error)
                    .await?;

                if let RetryPolicy::FixedBackoff { delay_hours } = self.retry {
                    self.executions
                        .create(CreateExecution {
                            enrollment_id: enrollment.id,
                            step_id: step.id,
                            scheduled_for: now + Duration::hours(delay_hours),
                        })
                        .await?;
                }

                Ok(Outcome::Failed)
            }
        }
    }

    /// After a successful dispatch: complete the enrollment at the last step,
    /// otherwise schedule the next step using its own delay
    async fn advance(
        &self,
        enrollment: &CampaignEnrollment,
        step: &CampaignStep,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let max_step = self.campaigns.max_step_number(step.campaign_id).await?;

        if step.step_number >= max_step {
            self.enrollments.mark_completed(enrollment.id, now).await?;
            info!(enrollment_id = %enrollment.id, "Enrollment completed");
            return Ok(());
        }

        let next = self
            .campaigns
            .get_step(step.campaign_id, step.step_number + 1)
            .await?;

        let Some(next) = next else {
            warn!(
                campaign_id = %step.campaign_id,
                step = step.step_number + 1,
                "Step sequence has a gap; completing enrollment"
            );
            self.enrollments.mark_completed(enrollment.id, now).await?;
            return Ok(());
        };

        self.executions
            .create(CreateExecution {
                enrollment_id: enrollment.id,
                step_id: next.id,
                scheduled_for: now + next.delay(),
            })
            .await?;
        self.enrollments
            .advance_step(enrollment.id, next.step_number)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        test_campaign, test_lead, test_step, MemActivityRepository, MemCampaignRepository,
        MemDemoViewRepository, MemEnrollmentRepository, MemExecutionRepository, MemLeadRepository,
        MemMailTransport, MemTaskRepository,
    };
    use nurture_storage::models::{
        Campaign, CampaignEnrollment, CreateEnrollment, DemoView, EnrollmentStatus,
        ExecutionStatus, Lead,
    };
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    struct Fixture {
        worker: ExecutionWorker,
        campaigns: Arc<MemCampaignRepository>,
        enrollments: Arc<MemEnrollmentRepository>,
        executions: Arc<MemExecutionRepository>,
        leads: Arc<MemLeadRepository>,
        demo_views: Arc<MemDemoViewRepository>,
        activities: Arc<MemActivityRepository>,
        mailer: Arc<MemMailTransport>,
    }

    fn fixture() -> Fixture {
        let campaigns = Arc::new(MemCampaignRepository::default());
        let enrollments = Arc::new(MemEnrollmentRepository::default());
        let executions = Arc::new(MemExecutionRepository::default());
        let leads = Arc::new(MemLeadRepository::default());
        let demo_views = Arc::new(MemDemoViewRepository::default());
        let activities = Arc::new(MemActivityRepository::default());
        let mailer = Arc::new(MemMailTransport::default());
        let tasks = Arc::new(MemTaskRepository::default());

        let dispatcher = ChannelDispatcher::new(mailer.clone(), tasks);
        let worker = ExecutionWorker::new(
            executions.clone(),
            enrollments.clone(),
            campaigns.clone(),
            leads.clone(),
            demo_views.clone(),
            activities.clone(),
            dispatcher,
        );

        Fixture {
            worker,
            campaigns,
            enrollments,
            executions,
            leads,
            demo_views,
            activities,
            mailer,
        }
    }

    impl Fixture {
        /// Campaign with two email steps (step 2 delayed 3 days), one
        /// enrolled lead, and a due execution for step 1
        async fn seed_two_step(&self) -> (Campaign, Lead, CampaignEnrollment, CampaignExecution) {
            let campaign = self.campaigns.insert(test_campaign());
            let step1 = self.campaigns.insert_step(test_step(campaign.id, 1, "email", 0));
            self.campaigns.insert_step(test_step(campaign.id, 2, "email", 3));

            let lead = self.leads.insert(test_lead());
            let enrollment = self
                .enrollments
                .create(CreateEnrollment {
                    campaign_id: campaign.id,
                    lead_id: lead.id,
                })
                .await
                .unwrap();
            let execution = self
                .executions
                .create(CreateExecution {
                    enrollment_id: enrollment.id,
                    step_id: step1.id,
                    scheduled_for: Utc::now() - Duration::minutes(1),
                })
                .await
                .unwrap();

            (campaign, lead, enrollment, execution)
        }

        fn execution_status(&self, id: Uuid) -> ExecutionStatus {
            self.executions
                .all()
                .iter()
                .find(|e| e.id == id)
                .unwrap()
                .status_enum()
                .unwrap()
        }

        fn enrollment(&self, id: Uuid) -> CampaignEnrollment {
            self.enrollments
                .all()
                .into_iter()
                .find(|e| e.id == id)
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_successful_email_advances_to_next_step() {
        let f = fixture();
        let (campaign, _, enrollment, execution) = f.seed_two_step().await;

        let now = Utc::now();
        let stats = f.worker.process_due(now).await.unwrap();
        assert_eq!(stats, TickStats { processed: 1, sent: 1, failed: 0, skipped: 0 });

        assert_eq!(f.execution_status(execution.id), ExecutionStatus::Sent);

        // Next step materialized lazily with its own delay
        let step2 = f.campaigns.get_step(campaign.id, 2).await.unwrap().unwrap();
        let all = f.executions.all();
        assert_eq!(all.len(), 2);
        let next = all.iter().find(|e| e.id != execution.id).unwrap();
        assert_eq!(next.step_id, step2.id);
        assert_eq!(next.scheduled_for, now + Duration::days(3));
        assert_eq!(next.status_enum(), Some(ExecutionStatus::Pending));

        let enrollment = f.enrollment(enrollment.id);
        assert_eq!(enrollment.current_step, 2);
        assert_eq!(enrollment.status_enum(), Some(EnrollmentStatus::Active));

        assert_eq!(f.mailer.sent().len(), 1);
        assert_eq!(f.activities.all().len(), 1);
    }

    #[tokio::test]
    async fn test_unmet_condition_skips_without_reschedule() {
        let f = fixture();
        let campaign = f.campaigns.insert(test_campaign());
        f.campaigns.insert_step(test_step(campaign.id, 1, "email", 0));
        let mut step2 = test_step(campaign.id, 2, "email", 0);
        step2.conditions = serde_json::json!({"demo_viewed": true});
        let step2 = f.campaigns.insert_step(step2);

        let lead = f.leads.insert(test_lead());
        let enrollment = f
            .enrollments
            .create(CreateEnrollment { campaign_id: campaign.id, lead_id: lead.id })
            .await
            .unwrap();
        let execution = f
            .executions
            .create(CreateExecution {
                enrollment_id: enrollment.id,
                step_id: step2.id,
                scheduled_for: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats, TickStats { processed: 1, sent: 0, failed: 0, skipped: 1 });

        assert_eq!(f.execution_status(execution.id), ExecutionStatus::Skipped);
        // Sequence pauses here: no follow-up execution is created
        assert_eq!(f.executions.all().len(), 1);

        let enrollment = f.enrollment(enrollment.id);
        assert_eq!(enrollment.status_enum(), Some(EnrollmentStatus::Active));
        assert_eq!(enrollment.current_step, 0);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_met_condition_dispatches() {
        let f = fixture();
        let campaign = f.campaigns.insert(test_campaign());
        let mut step1 = test_step(campaign.id, 1, "email", 0);
        step1.conditions = serde_json::json!({"demo_viewed": true});
        let step1 = f.campaigns.insert_step(step1);

        let lead = f.leads.insert(test_lead());
        f.demo_views.insert(DemoView {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            watch_seconds: 240,
            viewed_at: Utc::now() - Duration::days(2),
        });

        let enrollment = f
            .enrollments
            .create(CreateEnrollment { campaign_id: campaign.id, lead_id: lead.id })
            .await
            .unwrap();
        f.executions
            .create(CreateExecution {
                enrollment_id: enrollment.id,
                step_id: step1.id,
                scheduled_for: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats.sent, 1);
        assert_eq!(f.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_quiet_mode_pauses_touch_only() {
        let f = fixture();
        let (_, _, enrollment, execution) = f.seed_two_step().await;

        let mut quiet = f.leads.all()[0].clone();
        quiet.quiet_mode = true;
        f.leads.replace(quiet);

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats, TickStats { processed: 1, sent: 0, failed: 0, skipped: 1 });

        assert_eq!(f.execution_status(execution.id), ExecutionStatus::Skipped);
        let enrollment = f.enrollment(enrollment.id);
        assert_eq!(enrollment.status_enum(), Some(EnrollmentStatus::Active));
        assert_eq!(enrollment.current_step, 0);
        assert_eq!(f.executions.all().len(), 1);
    }

    #[tokio::test]
    async fn test_converted_lead_auto_stops_enrollment() {
        let f = fixture();
        let (_, _, enrollment, execution) = f.seed_two_step().await;

        let mut converted = f.leads.all()[0].clone();
        converted.pipeline_status = nurture_common::types::PIPELINE_CUSTOMER.to_string();
        f.leads.replace(converted);

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats.skipped, 1);

        assert_eq!(f.execution_status(execution.id), ExecutionStatus::Skipped);
        let enrollment = f.enrollment(enrollment.id);
        assert_eq!(enrollment.status_enum(), Some(EnrollmentStatus::Stopped));
        assert_eq!(enrollment.stopped_reason.as_deref(), Some("converted"));
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_resolved_enrollment_skips_execution() {
        let f = fixture();
        let (_, _, enrollment, execution) = f.seed_two_step().await;
        f.enrollments
            .mark_stopped(enrollment.id, "operator request", Utc::now())
            .await
            .unwrap();

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(f.execution_status(execution.id), ExecutionStatus::Skipped);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_step_fails_execution() {
        let f = fixture();
        let campaign = f.campaigns.insert(test_campaign());
        let lead = f.leads.insert(test_lead());
        let enrollment = f
            .enrollments
            .create(CreateEnrollment { campaign_id: campaign.id, lead_id: lead.id })
            .await
            .unwrap();
        let execution = f
            .executions
            .create(CreateExecution {
                enrollment_id: enrollment.id,
                step_id: Uuid::new_v4(),
                scheduled_for: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(f.execution_status(execution.id), ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_enrollment_active() {
        let f = fixture();
        let (_, _, enrollment, execution) = f.seed_two_step().await;
        f.mailer.fail_with("connection refused");

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats, TickStats { processed: 1, sent: 0, failed: 1, skipped: 0 });

        assert_eq!(f.execution_status(execution.id), ExecutionStatus::Failed);
        let enrollment = f.enrollment(enrollment.id);
        assert_eq!(enrollment.status_enum(), Some(EnrollmentStatus::Active));
        assert_eq!(enrollment.current_step, 0);
        // Default retry policy schedules nothing
        assert_eq!(f.executions.all().len(), 1);
    }

    #[tokio::test]
    async fn test_fixed_backoff_schedules_fresh_attempt() {
        let f = fixture();
        let (_, _, _, execution) = f.seed_two_step().await;
        f.mailer.fail_with("connection refused");

        let worker = f.worker.with_retry(RetryPolicy::FixedBackoff { delay_hours: 6 });
        let now = Utc::now();
        let stats = worker.process_due(now).await.unwrap();
        assert_eq!(stats.failed, 1);

        let all = f.executions.all();
        assert_eq!(all.len(), 2);
        let retry = all.iter().find(|e| e.id != execution.id).unwrap();
        assert_eq!(retry.step_id, execution.step_id);
        assert_eq!(retry.scheduled_for, now + Duration::hours(6));
        assert_eq!(retry.status_enum(), Some(ExecutionStatus::Pending));
    }

    #[tokio::test]
    async fn test_last_step_completes_enrollment() {
        let f = fixture();
        let campaign = f.campaigns.insert(test_campaign());
        let step = f.campaigns.insert_step(test_step(campaign.id, 1, "email", 0));

        let lead = f.leads.insert(test_lead());
        let enrollment = f
            .enrollments
            .create(CreateEnrollment { campaign_id: campaign.id, lead_id: lead.id })
            .await
            .unwrap();
        f.executions
            .create(CreateExecution {
                enrollment_id: enrollment.id,
                step_id: step.id,
                scheduled_for: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats.sent, 1);

        let enrollment = f.enrollment(enrollment.id);
        assert_eq!(enrollment.status_enum(), Some(EnrollmentStatus::Completed));
        assert!(enrollment.completed_at.is_some());
        // No execution beyond the last step
        assert_eq!(f.executions.all().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_with_no_due_work_is_a_noop() {
        let f = fixture();
        let (_, _, _, execution) = f.seed_two_step().await;
        f.executions
            .mark_skipped(execution.id, Utc::now(), "resolved earlier")
            .await
            .unwrap();
        let before = f.executions.all();

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats, TickStats::default());
        assert_eq!(f.executions.all(), before);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failure_isolation_within_batch() {
        let f = fixture();
        let campaign = f.campaigns.insert(test_campaign());
        let step = f.campaigns.insert_step(test_step(campaign.id, 1, "email", 0));

        // First execution references a missing lead, second one is healthy
        let orphan = f
            .enrollments
            .create(CreateEnrollment { campaign_id: campaign.id, lead_id: Uuid::new_v4() })
            .await
            .unwrap();
        f.executions
            .create(CreateExecution {
                enrollment_id: orphan.id,
                step_id: step.id,
                scheduled_for: Utc::now() - Duration::minutes(2),
            })
            .await
            .unwrap();

        let lead = f.leads.insert(test_lead());
        let healthy = f
            .enrollments
            .create(CreateEnrollment { campaign_id: campaign.id, lead_id: lead.id })
            .await
            .unwrap();
        f.executions
            .create(CreateExecution {
                enrollment_id: healthy.id,
                step_id: step.id,
                scheduled_for: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();

        let stats = f.worker.process_due(Utc::now()).await.unwrap();
        assert_eq!(stats, TickStats { processed: 2, sent: 1, failed: 1, skipped: 0 });
        assert_eq!(f.mailer.sent().len(), 1);
    }
}
