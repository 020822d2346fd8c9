//! In-memory collaborators and fixtures for engine tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_common::types::{CampaignId, EnrollmentId, ExecutionId, LeadId, StepId, TaskId};
use nurture_common::{Error, Result};
use nurture_storage::models::{
    Campaign, CampaignEnrollment, CampaignExecution, CampaignStep, CreateCampaign,
    CreateCampaignStep, CreateEnrollment, CreateExecution, CreateTask, CrmActivity, DemoView,
    EmailEvent, Lead, LearnedProfile,
};
use nurture_storage::repository::{
    ActivityRepository, CampaignRepository, DemoViewRepository, EmailEventRepository,
    EnrollmentRepository, ExecutionRepository, LeadRepository, SettingsRepository, TaskRepository,
};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::campaign::MailTransport;

pub fn test_campaign() -> Campaign {
    let now = Utc::now();
    Campaign {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        name: "Onboarding drip".to_string(),
        description: None,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_step(campaign_id: CampaignId, step_number: i32, channel: &str, delay_days: i32) -> CampaignStep {
    CampaignStep {
        id: Uuid::new_v4(),
        campaign_id,
        step_number,
        channel: channel.to_string(),
        message_template: "Hi {{first_name}}, checking in".to_string(),
        subject_template: None,
        conditions: serde_json::json!({}),
        delay_days,
        delay_hours: 0,
        created_at: Utc::now(),
    }
}

pub fn test_lead() -> Lead {
    let now = Utc::now();
    Lead {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        first_name: Some("Jane".to_string()),
        last_name: Some("Doe".to_string()),
        company: Some("Acme Corp".to_string()),
        email: Some("jane@acme.example".to_string()),
        phone: Some("+15550100".to_string()),
        pipeline_status: "qualified".to_string(),
        quiet_mode: false,
        learned_best_days: None,
        learned_best_times: None,
        learned_optimal_gap_hours: None,
        learned_channel_preference: None,
        learning_confidence: None,
        last_pattern_analysis: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct MemCampaignRepository {
    campaigns: Mutex<Vec<Campaign>>,
    steps: Mutex<Vec<CampaignStep>>,
}

impl MemCampaignRepository {
    pub fn insert(&self, campaign: Campaign) -> Campaign {
        self.campaigns.lock().unwrap().push(campaign.clone());
        campaign
    }

    pub fn insert_step(&self, step: CampaignStep) -> CampaignStep {
        self.steps.lock().unwrap().push(step.clone());
        step
    }
}

#[async_trait]
impl CampaignRepository for MemCampaignRepository {
    async fn create(&self, input: CreateCampaign) -> Result<Campaign> {
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            name: input.name,
            description: input.description,
            active: true,
            created_at: now,
            updated_at: now,
        };
        Ok(self.insert(campaign))
    }

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn add_step(&self, input: CreateCampaignStep) -> Result<CampaignStep> {
        let step = CampaignStep {
            id: Uuid::new_v4(),
            campaign_id: input.campaign_id,
            step_number: input.step_number,
            channel: input.channel,
            message_template: input.message_template,
            subject_template: input.subject_template,
            conditions: input.conditions.unwrap_or_else(|| serde_json::json!({})),
            delay_days: input.delay_days,
            delay_hours: input.delay_hours,
            created_at: Utc::now(),
        };
        Ok(self.insert_step(step))
    }

    async fn get_step(
        &self,
        campaign_id: CampaignId,
        step_number: i32,
    ) -> Result<Option<CampaignStep>> {
        Ok(self
            .steps
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.campaign_id == campaign_id && s.step_number == step_number)
            .cloned())
    }

    async fn get_step_by_id(&self, id: StepId) -> Result<Option<CampaignStep>> {
        Ok(self.steps.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn max_step_number(&self, campaign_id: CampaignId) -> Result<i32> {
        Ok(self
            .steps
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.campaign_id == campaign_id)
            .map(|s| s.step_number)
            .max()
            .unwrap_or(0))
    }
}

#[derive(Default)]
pub struct MemEnrollmentRepository {
    enrollments: Mutex<Vec<CampaignEnrollment>>,
}

impl MemEnrollmentRepository {
    pub fn insert(&self, enrollment: CampaignEnrollment) -> CampaignEnrollment {
        self.enrollments.lock().unwrap().push(enrollment.clone());
        enrollment
    }

    pub fn all(&self) -> Vec<CampaignEnrollment> {
        self.enrollments.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnrollmentRepository for MemEnrollmentRepository {
    async fn create(&self, input: CreateEnrollment) -> Result<CampaignEnrollment> {
        let now = Utc::now();
        let enrollment = CampaignEnrollment {
            id: Uuid::new_v4(),
            campaign_id: input.campaign_id,
            lead_id: input.lead_id,
            status: "active".to_string(),
            current_step: 0,
            stopped_reason: None,
            stopped_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        Ok(self.insert(enrollment))
    }

    async fn get(&self, id: EnrollmentId) -> Result<Option<CampaignEnrollment>> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn find_active(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> Result<Option<CampaignEnrollment>> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.campaign_id == campaign_id && e.lead_id == lead_id && e.status == "active")
            .cloned())
    }

    async fn mark_completed(&self, id: EnrollmentId, at: DateTime<Utc>) -> Result<bool> {
        let mut enrollments = self.enrollments.lock().unwrap();
        match enrollments.iter_mut().find(|e| e.id == id && e.status == "active") {
            Some(e) => {
                e.status = "completed".to_string();
                e.completed_at = Some(at);
                e.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_stopped(
        &self,
        id: EnrollmentId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut enrollments = self.enrollments.lock().unwrap();
        match enrollments.iter_mut().find(|e| e.id == id && e.status == "active") {
            Some(e) => {
                e.status = "stopped".to_string();
                e.stopped_reason = Some(reason.to_string());
                e.stopped_at = Some(at);
                e.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn advance_step(&self, id: EnrollmentId, step_number: i32) -> Result<bool> {
        let mut enrollments = self.enrollments.lock().unwrap();
        match enrollments
            .iter_mut()
            .find(|e| e.id == id && e.status == "active" && e.current_step < step_number)
        {
            Some(e) => {
                e.current_step = step_number;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemExecutionRepository {
    executions: Mutex<Vec<CampaignExecution>>,
}

impl MemExecutionRepository {
    pub fn insert(&self, execution: CampaignExecution) -> CampaignExecution {
        self.executions.lock().unwrap().push(execution.clone());
        execution
    }

    pub fn all(&self) -> Vec<CampaignExecution> {
        self.executions.lock().unwrap().clone()
    }

    fn resolve(&self, id: ExecutionId, at: DateTime<Utc>, status: &str, detail: Option<&str>) -> bool {
        let mut executions = self.executions.lock().unwrap();
        match executions.iter_mut().find(|e| e.id == id && e.status == "pending") {
            Some(e) => {
                e.status = status.to_string();
                e.executed_at = Some(at);
                e.error_message = detail.map(str::to_string);
                e.updated_at = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ExecutionRepository for MemExecutionRepository {
    async fn create(&self, input: CreateExecution) -> Result<CampaignExecution> {
        let now = Utc::now();
        let execution = CampaignExecution {
            id: Uuid::new_v4(),
            enrollment_id: input.enrollment_id,
            step_id: input.step_id,
            scheduled_for: input.scheduled_for,
            status: "pending".to_string(),
            executed_at: None,
            error_message: None,
            external_message_id: None,
            created_at: now,
            updated_at: now,
        };
        Ok(self.insert(execution))
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<CampaignExecution>> {
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn due_batch(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<CampaignExecution>> {
        let mut due: Vec<CampaignExecution> = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.status == "pending" && e.scheduled_for <= now)
            .cloned()
            .collect();
        due.sort_by_key(|e| e.scheduled_for);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn mark_sent(
        &self,
        id: ExecutionId,
        at: DateTime<Utc>,
        external_message_id: Option<&str>,
    ) -> Result<bool> {
        let resolved = self.resolve(id, at, "sent", None);
        if resolved {
            let mut executions = self.executions.lock().unwrap();
            if let Some(e) = executions.iter_mut().find(|e| e.id == id) {
                e.external_message_id = external_message_id.map(str::to_string);
            }
        }
        Ok(resolved)
    }

    async fn mark_failed(&self, id: ExecutionId, at: DateTime<Utc>, error: &str) -> Result<bool> {
        Ok(self.resolve(id, at, "failed", Some(error)))
    }

    async fn mark_skipped(
        &self,
        id: ExecutionId,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool> {
        Ok(self.resolve(id, at, "skipped", Some(reason)))
    }
}

#[derive(Default)]
pub struct MemLeadRepository {
    leads: Mutex<Vec<Lead>>,
    profiles: Mutex<HashMap<LeadId, LearnedProfile>>,
}

impl MemLeadRepository {
    pub fn insert(&self, lead: Lead) -> Lead {
        self.leads.lock().unwrap().push(lead.clone());
        lead
    }

    pub fn all(&self) -> Vec<Lead> {
        self.leads.lock().unwrap().clone()
    }

    pub fn replace(&self, lead: Lead) {
        let mut leads = self.leads.lock().unwrap();
        if let Some(slot) = leads.iter_mut().find(|l| l.id == lead.id) {
            *slot = lead;
        }
    }

    pub fn saved_profile(&self, id: LeadId) -> Option<LearnedProfile> {
        self.profiles.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl LeadRepository for MemLeadRepository {
    async fn get(&self, id: LeadId) -> Result<Option<Lead>> {
        Ok(self.leads.lock().unwrap().iter().find(|l| l.id == id).cloned())
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<Lead>> {
        let mut stale: Vec<Lead> = self
            .leads
            .lock()
            .unwrap()
            .iter()
            .filter(|l| match l.last_pattern_analysis {
                None => true,
                Some(at) => at < cutoff,
            })
            .cloned()
            .collect();
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn save_profile(
        &self,
        id: LeadId,
        profile: &LearnedProfile,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.profiles.lock().unwrap().insert(id, profile.clone());
        self.mark_analyzed(id, analyzed_at).await
    }

    async fn mark_analyzed(&self, id: LeadId, analyzed_at: DateTime<Utc>) -> Result<()> {
        let mut leads = self.leads.lock().unwrap();
        if let Some(lead) = leads.iter_mut().find(|l| l.id == id) {
            lead.last_pattern_analysis = Some(analyzed_at);
            lead.updated_at = analyzed_at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemEmailEventRepository {
    events: Mutex<Vec<EmailEvent>>,
}

impl MemEmailEventRepository {
    pub fn insert(&self, event: EmailEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl EmailEventRepository for MemEmailEventRepository {
    async fn list_since(&self, lead_id: LeadId, since: DateTime<Utc>) -> Result<Vec<EmailEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.lead_id == lead_id && e.occurred_at >= since)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemDemoViewRepository {
    views: Mutex<Vec<DemoView>>,
}

impl MemDemoViewRepository {
    pub fn insert(&self, view: DemoView) {
        self.views.lock().unwrap().push(view);
    }
}

#[async_trait]
impl DemoViewRepository for MemDemoViewRepository {
    async fn list_since(&self, lead_id: LeadId, since: DateTime<Utc>) -> Result<Vec<DemoView>> {
        Ok(self
            .views
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.lead_id == lead_id && v.viewed_at >= since)
            .cloned()
            .collect())
    }

    async fn count_for_lead(&self, lead_id: LeadId) -> Result<i64> {
        Ok(self
            .views
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.lead_id == lead_id)
            .count() as i64)
    }
}

#[derive(Default)]
pub struct MemActivityRepository {
    activities: Mutex<Vec<CrmActivity>>,
}

impl MemActivityRepository {
    pub fn insert(&self, activity: CrmActivity) {
        self.activities.lock().unwrap().push(activity);
    }

    pub fn all(&self) -> Vec<CrmActivity> {
        self.activities.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivityRepository for MemActivityRepository {
    async fn append(&self, lead_id: LeadId, kind: &str, body: &str) -> Result<()> {
        self.insert(CrmActivity {
            id: Uuid::new_v4(),
            lead_id,
            kind: kind.to_string(),
            body: Some(body.to_string()),
            occurred_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_since(
        &self,
        lead_id: LeadId,
        since: DateTime<Utc>,
    ) -> Result<Vec<CrmActivity>> {
        Ok(self
            .activities
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.lead_id == lead_id && a.occurred_at >= since)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemTaskRepository {
    tasks: Mutex<Vec<CreateTask>>,
}

impl MemTaskRepository {
    pub fn created(&self) -> Vec<CreateTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskRepository for MemTaskRepository {
    async fn create(&self, input: CreateTask) -> Result<TaskId> {
        self.tasks.lock().unwrap().push(input);
        Ok(Uuid::new_v4())
    }
}

#[derive(Default)]
pub struct MemSettingsRepository {
    flags: Mutex<HashMap<String, bool>>,
}

impl MemSettingsRepository {
    pub fn set(&self, key: &str, value: bool) {
        self.flags.lock().unwrap().insert(key.to_string(), value);
    }
}

#[async_trait]
impl SettingsRepository for MemSettingsRepository {
    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.flags.lock().unwrap().get(key).copied())
    }
}

#[derive(Default)]
pub struct MemMailTransport {
    sent: Mutex<Vec<(String, String, String)>>,
    failure: Mutex<Option<String>>,
}

impl MemMailTransport {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_with(&self, error: &str) {
        *self.failure.lock().unwrap() = Some(error.to_string());
    }
}

#[async_trait]
impl MailTransport for MemMailTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(Error::Transport(error));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(format!("<{}@nurture>", Uuid::new_v4()))
    }
}
