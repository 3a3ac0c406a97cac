//! 引擎组装
//!
//! 根据配置把仓储、外部协作方与各服务组装在一起，API 层与启动程序共用。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use helpdesk_core::{config::AppConfig, AiTextService, Notifier};
use helpdesk_infrastructure::{MetricsCollector, Repositories};

use crate::assignment::{strategy_from_config, AssignmentEngine};
use crate::auto_close::AutoCloseJob;
use crate::call_router::CallRouter;
use crate::category_service::CategoryService;
use crate::directory_service::DirectoryService;
use crate::feedback_service::FeedbackService;
use crate::job_runner::{JobRunner, SlaCheckJob};
use crate::notification_dispatcher::{NotificationDispatcher, NotificationWorker};
use crate::reassignment::ReassignmentJob;
use crate::rotation::AvailabilityRotation;
use crate::sla_monitor::{BreachNotifier, SlaMonitor};
use crate::ticket_service::TicketService;

pub struct HelpdeskEngine {
    pub tickets: Arc<TicketService>,
    pub assignment: Arc<AssignmentEngine>,
    pub categories: Arc<CategoryService>,
    pub feedback: Arc<FeedbackService>,
    pub calls: Arc<CallRouter>,
    pub directory: Arc<DirectoryService>,
    pub notifications: NotificationDispatcher,
    pub sla_job: Arc<JobRunner>,
    pub auto_close_job: Arc<JobRunner>,
    pub reassignment_job: Arc<JobRunner>,
}

impl HelpdeskEngine {
    /// 组装引擎，返回的 worker 需要由调用方启动
    pub fn build(
        config: &AppConfig,
        repos: &Repositories,
        notifier: Arc<dyn Notifier>,
        ai: Arc<dyn AiTextService>,
        metrics: Arc<MetricsCollector>,
    ) -> (Self, NotificationWorker) {
        let fallback = config.assignment.fallback_category.clone();

        let (notifications, worker) = NotificationDispatcher::new(
            &config.notifications,
            repos.notifications.clone(),
            notifier,
            metrics.clone(),
        );

        let categories = Arc::new(CategoryService::new(repos.categories.clone(), &fallback));

        let tickets = Arc::new(TicketService::new(
            repos.tickets.clone(),
            repos.agents.clone(),
            categories.clone(),
            ai,
            notifications.clone(),
            &fallback,
        ));

        let assignment = Arc::new(AssignmentEngine::new(
            repos.tickets.clone(),
            repos.agents.clone(),
            strategy_from_config(&config.assignment, repos.rotation.clone()),
            notifications.clone(),
            metrics.clone(),
            &fallback,
        ));

        let feedback = Arc::new(FeedbackService::new(
            repos.tickets.clone(),
            repos.feedback.clone(),
            notifications.clone(),
        ));

        let calls = Arc::new(CallRouter::new(
            repos.agents.clone(),
            metrics.clone(),
            &fallback,
        ));

        let directory = Arc::new(DirectoryService::new(
            repos.agents.clone(),
            repos.candidate_pools.clone(),
            repos.sla_rules.clone(),
            repos.reassignment_logs.clone(),
            repos.tickets.clone(),
            repos.notifications.clone(),
        ));

        let sla_job = SlaCheckJob::new(
            SlaMonitor::new(
                repos.tickets.clone(),
                repos.sla_rules.clone(),
                config.jobs.sla_closed_lookback_hours,
            ),
            BreachNotifier::new(
                repos.breach_markers.clone(),
                notifications.clone(),
                metrics.clone(),
                &config.notifications.admin_recipient,
            ),
        );

        let auto_close_job = AutoCloseJob::new(
            repos.tickets.clone(),
            notifications.clone(),
            metrics.clone(),
            config.jobs.auto_close_idle_days,
        );

        let reassignment_job = ReassignmentJob::new(
            repos.tickets.clone(),
            repos.agents.clone(),
            repos.candidate_pools.clone(),
            AvailabilityRotation::new(
                repos.rotation.clone(),
                config.assignment.rotation_max_retries,
            ),
            notifications.clone(),
            metrics.clone(),
            &fallback,
        );

        let engine = Self {
            tickets,
            assignment,
            categories,
            feedback,
            calls,
            directory,
            notifications,
            sla_job: Arc::new(JobRunner::new(Arc::new(sla_job), metrics.clone())),
            auto_close_job: Arc::new(JobRunner::new(Arc::new(auto_close_job), metrics.clone())),
            reassignment_job: Arc::new(JobRunner::new(Arc::new(reassignment_job), metrics)),
        };

        (engine, worker)
    }

    /// 启动三个定时任务循环
    pub fn spawn_jobs(
        &self,
        config: &AppConfig,
        shutdown: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        let jobs = [
            (&self.sla_job, config.jobs.sla_check_interval_seconds),
            (&self.auto_close_job, config.jobs.auto_close_interval_seconds),
            (&self.reassignment_job, config.jobs.reassignment_interval_seconds),
        ];

        info!("启动 {} 个定时任务", jobs.len());
        jobs.into_iter()
            .map(|(runner, seconds)| {
                runner
                    .clone()
                    .spawn_periodic(Duration::from_secs(seconds), shutdown.subscribe())
            })
            .collect()
    }
}
