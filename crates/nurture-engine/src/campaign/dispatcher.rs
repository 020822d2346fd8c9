//! Channel dispatch - sends one outreach unit through the right collaborator

use super::template::{render_subject, render_template};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use nurture_common::config::SmtpConfig;
use nurture_common::types::Channel;
use nurture_common::{Error, Result};
use nurture_storage::models::{CampaignStep, CreateTask, Lead};
use nurture_storage::repository::TaskRepository;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info};
use uuid::Uuid;

/// Subject used when a step has no subject template
const DEFAULT_SUBJECT: &str = "Quick follow-up";

/// Plain-text opt-out footer appended to campaign email
const UNSUBSCRIBE_FOOTER: &str = "\n\nReply STOP to unsubscribe.";

/// Result of one dispatch attempt
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// Delivered (or handed to the collaborator); provider id when one exists
    Sent { external_id: Option<String> },
    /// A precondition was not met (missing contact field); expected
    /// steady-state outcome, not a defect
    Skipped { reason: String },
    /// The transport failed
    Failed { error: String },
}

/// Outbound mail contract
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send a message, returning the provider message id
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String>;
}

/// SMTP mail transport over lettre
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn from_mailbox(&self) -> Result<Mailbox> {
        let raw = match &self.config.from_name {
            Some(name) => format!("{} <{}>", name, self.config.from_address),
            None => self.config.from_address.clone(),
        };
        raw.parse()
            .map_err(|e| Error::Config(format!("Invalid from address: {}", e)))
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| Error::Transport(format!("Failed to create SMTP transport: {}", e)))?
        } else if self.config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| Error::Transport(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };

        let mut transport = builder.port(self.config.port);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            transport = transport.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(transport
            .timeout(Some(StdDuration::from_secs(30)))
            .build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| Error::Transport(format!("Invalid recipient address: {}", e)))?;

        let message_id = format!("<{}@nurture>", Uuid::new_v4());

        let email = Message::builder()
            .from(self.from_mailbox()?)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Transport(format!("Failed to build email: {}", e)))?;

        let mailer = self.build_transport()?;

        mailer
            .send(email)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        debug!(message_id = %message_id, "Email handed to relay");
        Ok(message_id)
    }
}

/// Channel dispatcher - stateless fan-out to the channel collaborators
pub struct ChannelDispatcher {
    mailer: Arc<dyn MailTransport>,
    tasks: Arc<dyn TaskRepository>,
}

impl ChannelDispatcher {
    pub fn new(mailer: Arc<dyn MailTransport>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { mailer, tasks }
    }

    /// Dispatch one step to one lead
    pub async fn dispatch(
        &self,
        step: &CampaignStep,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> DispatchResult {
        let Some(channel) = step.channel_enum() else {
            return DispatchResult::Failed {
                error: format!("Unknown channel: {}", step.channel),
            };
        };

        let body = render_template(&step.message_template, lead);

        match channel {
            Channel::Email => self.dispatch_email(step, lead, &body).await,
            Channel::Sms => self.dispatch_sms(lead, &body),
            Channel::CallReminder => {
                let title = format!("Call {}", lead.full_name());
                self.create_task(lead, title.trim_end().to_string(), body, now)
                    .await
            }
            Channel::Task => {
                let title: String = body.chars().take(100).collect();
                self.create_task(lead, title, body, now).await
            }
        }
    }

    async fn dispatch_email(
        &self,
        step: &CampaignStep,
        lead: &Lead,
        body: &str,
    ) -> DispatchResult {
        let Some(to) = lead.email.as_deref() else {
            return DispatchResult::Skipped {
                reason: "Lead has no email address".to_string(),
            };
        };

        let subject = match &step.subject_template {
            Some(template) => render_subject(template, lead),
            None => DEFAULT_SUBJECT.to_string(),
        };

        let body = format!("{}{}", body, UNSUBSCRIBE_FOOTER);

        match self.mailer.send(to, &subject, &body).await {
            Ok(message_id) => DispatchResult::Sent {
                external_id: Some(message_id),
            },
            Err(e) => DispatchResult::Failed {
                error: e.to_string(),
            },
        }
    }

    /// SMS transport is an external collaborator; this path renders and logs
    /// so the rest of the pipeline is unaffected by the transport choice
    fn dispatch_sms(&self, lead: &Lead, body: &str) -> DispatchResult {
        if lead.phone.is_none() {
            return DispatchResult::Skipped {
                reason: "Lead has no phone number".to_string(),
            };
        }

        info!(lead_id = %lead.id, body = %body, "SMS dispatch (stub transport)");
        DispatchResult::Sent { external_id: None }
    }

    async fn create_task(
        &self,
        lead: &Lead,
        title: String,
        description: String,
        now: DateTime<Utc>,
    ) -> DispatchResult {
        let input = CreateTask {
            lead_id: lead.id,
            title,
            description,
            due_at: now,
        };

        match self.tasks.create(input).await {
            Ok(task_id) => DispatchResult::Sent {
                external_id: Some(task_id.to_string()),
            },
            Err(e) => DispatchResult::Failed {
                error: e.to_string(),
            },
        }
    }
}
