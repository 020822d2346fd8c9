//! Nurture - engagement automation worker entry point

use anyhow::Result;
use nurture_common::config::Config;
use nurture_engine::{AnalysisWorker, ChannelDispatcher, ExecutionWorker, SmtpMailer};
use nurture_storage::db::DatabasePool;
use nurture_storage::repository::{
    DbActivityRepository, DbCampaignRepository, DbDemoViewRepository, DbEmailEventRepository,
    DbEnrollmentRepository, DbExecutionRepository, DbLeadRepository, DbSettingsRepository,
    DbTaskRepository,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting Nurture engagement worker...");

    let config = Config::load()?;

    let db_pool = DatabasePool::new(&config.database).await?;
    db_pool.migrate().await?;

    let campaigns = Arc::new(DbCampaignRepository::new(db_pool.clone()));
    let enrollments = Arc::new(DbEnrollmentRepository::new(db_pool.clone()));
    let executions = Arc::new(DbExecutionRepository::new(db_pool.clone()));
    let leads = Arc::new(DbLeadRepository::new(db_pool.clone()));
    let email_events = Arc::new(DbEmailEventRepository::new(db_pool.clone()));
    let demo_views = Arc::new(DbDemoViewRepository::new(db_pool.clone()));
    let activities = Arc::new(DbActivityRepository::new(db_pool.clone()));
    let tasks = Arc::new(DbTaskRepository::new(db_pool.clone()));
    let settings = Arc::new(DbSettingsRepository::new(db_pool.clone()));

    let mailer = Arc::new(SmtpMailer::new(config.smtp.clone()));
    let dispatcher = ChannelDispatcher::new(mailer, tasks);

    let execution_worker = Arc::new(
        ExecutionWorker::new(
            executions,
            enrollments,
            campaigns,
            leads.clone(),
            demo_views.clone(),
            activities.clone(),
            dispatcher,
        )
        .with_batch_size(config.scheduler.batch_size)
        .with_poll_interval(config.scheduler.poll_interval_secs)
        .with_condition_policy(config.scheduler.condition_policy)
        .with_retry(config.scheduler.retry),
    );

    let analysis_worker = Arc::new(
        AnalysisWorker::new(leads, email_events, activities, demo_views, settings)
            .with_poll_interval(config.analyzer.poll_interval_secs),
    );

    let execution_handle = {
        let worker = execution_worker.clone();
        tokio::spawn(async move {
            worker.run().await;
        })
    };

    let analysis_handle = {
        let worker = analysis_worker.clone();
        tokio::spawn(async move {
            worker.run().await;
        })
    };

    info!("Nurture worker started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    execution_handle.abort();
    analysis_handle.abort();

    info!("Nurture worker shutdown complete");

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nurture=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
