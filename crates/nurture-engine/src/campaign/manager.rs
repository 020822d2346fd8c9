//! Campaign Manager - campaign administration and enrollment lifecycle

use chrono::{DateTime, Utc};
use nurture_common::types::{Channel, CampaignId, EnrollmentId, LeadId};
use nurture_storage::models::{
    Campaign, CampaignEnrollment, CampaignStep, CreateCampaign, CreateCampaignStep,
    CreateEnrollment, CreateExecution, EnrollmentStatus,
};
use nurture_storage::repository::{CampaignRepository, EnrollmentRepository, ExecutionRepository};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Campaign manager errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Campaign is not active")]
    Inactive,

    #[error("Campaign has no steps")]
    NoSteps,

    #[error("Lead already has an active enrollment in this campaign")]
    AlreadyEnrolled,

    #[error("Enrollment not found")]
    EnrollmentNotFound,

    #[error("Enrollment is already resolved")]
    AlreadyResolved,

    #[error("Step numbers must be dense: expected {expected}, got {got}")]
    NonSequentialStep { expected: i32, got: i32 },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error(transparent)]
    Storage(#[from] nurture_common::Error),
}

/// Campaign Manager - owns campaign setup and the enrollment state machine
pub struct CampaignManager {
    campaigns: Arc<dyn CampaignRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    executions: Arc<dyn ExecutionRepository>,
}

impl CampaignManager {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        executions: Arc<dyn ExecutionRepository>,
    ) -> Self {
        Self {
            campaigns,
            enrollments,
            executions,
        }
    }

    /// Create a new campaign
    pub async fn create_campaign(&self, input: CreateCampaign) -> Result<Campaign, CampaignError> {
        let campaign = self.campaigns.create(input).await?;
        info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign created");
        Ok(campaign)
    }

    /// Append a step to a campaign
    ///
    /// Step numbers must stay dense from 1, so the last step is always
    /// `max(step_number)`.
    pub async fn add_step(
        &self,
        input: CreateCampaignStep,
    ) -> Result<CampaignStep, CampaignError> {
        if input.channel.parse::<Channel>().is_err() {
            return Err(CampaignError::UnknownChannel(input.channel.clone()));
        }

        self.campaigns
            .get(input.campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let expected = self.campaigns.max_step_number(input.campaign_id).await? + 1;
        if input.step_number != expected {
            return Err(CampaignError::NonSequentialStep {
                expected,
                got: input.step_number,
            });
        }

        Ok(self.campaigns.add_step(input).await?)
    }

    /// Enroll a lead into a campaign
    ///
    /// Creates the enrollment and eagerly schedules step 1; later steps are
    /// only materialized as their predecessors dispatch, because lead state
    /// can change between steps.
    pub async fn enroll(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
        now: DateTime<Utc>,
    ) -> Result<CampaignEnrollment, CampaignError> {
        let campaign = self
            .campaigns
            .get(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        if !campaign.active {
            return Err(CampaignError::Inactive);
        }

        if self
            .enrollments
            .find_active(campaign_id, lead_id)
            .await?
            .is_some()
        {
            return Err(CampaignError::AlreadyEnrolled);
        }

        let first_step = self
            .campaigns
            .get_step(campaign_id, 1)
            .await?
            .ok_or(CampaignError::NoSteps)?;

        let enrollment = self
            .enrollments
            .create(CreateEnrollment {
                campaign_id,
                lead_id,
            })
            .await?;

        self.executions
            .create(CreateExecution {
                enrollment_id: enrollment.id,
                step_id: first_step.id,
                scheduled_for: now + first_step.delay(),
            })
            .await?;

        info!(
            enrollment_id = %enrollment.id,
            campaign_id = %campaign_id,
            lead_id = %lead_id,
            "Lead enrolled"
        );

        Ok(enrollment)
    }

    /// Manually stop an active enrollment
    pub async fn stop(
        &self,
        enrollment_id: EnrollmentId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CampaignError> {
        let enrollment = self
            .enrollments
            .get(enrollment_id)
            .await?
            .ok_or(CampaignError::EnrollmentNotFound)?;

        let status = enrollment
            .status_enum()
            .ok_or(CampaignError::AlreadyResolved)?;
        if !status.can_transition_to(EnrollmentStatus::Stopped) {
            return Err(CampaignError::AlreadyResolved);
        }

        if !self.enrollments.mark_stopped(enrollment_id, reason, now).await? {
            return Err(CampaignError::AlreadyResolved);
        }

        info!(enrollment_id = %enrollment_id, reason = %reason, "Enrollment stopped");
        Ok(())
    }
}
