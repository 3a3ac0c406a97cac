//! 定时任务运行器
//!
//! 每个任务一次执行是一个有界的批处理；同一任务上一次执行未结束时，
//! 新的触发直接跳过。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use helpdesk_core::HelpdeskResult;
use helpdesk_infrastructure::MetricsCollector;

use crate::auto_close::AutoCloseJob;
use crate::reassignment::ReassignmentJob;
use crate::sla_monitor::{BreachNotifier, SlaMonitor};

/// 单次执行的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub scanned: usize,
    pub affected: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl JobSummary {
    pub fn scanned(scanned: usize) -> Self {
        Self {
            scanned,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobRunStatus {
    Completed(JobSummary),
    /// 上一次执行仍在进行
    Skipped,
}

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_once(&self, now: DateTime<Utc>) -> HelpdeskResult<JobSummary>;
}

#[async_trait]
impl ScheduledJob for AutoCloseJob {
    fn name(&self) -> &'static str {
        "auto_close"
    }

    async fn run_once(&self, now: DateTime<Utc>) -> HelpdeskResult<JobSummary> {
        self.run_at(now).await
    }
}

#[async_trait]
impl ScheduledJob for ReassignmentJob {
    fn name(&self) -> &'static str {
        "reassignment"
    }

    async fn run_once(&self, now: DateTime<Utc>) -> HelpdeskResult<JobSummary> {
        self.run_at(now).await
    }
}

/// SLA检查与违约通知组合成一个定时任务
pub struct SlaCheckJob {
    monitor: SlaMonitor,
    notifier: BreachNotifier,
}

impl SlaCheckJob {
    pub fn new(monitor: SlaMonitor, notifier: BreachNotifier) -> Self {
        Self { monitor, notifier }
    }
}

#[async_trait]
impl ScheduledJob for SlaCheckJob {
    fn name(&self) -> &'static str {
        "sla_check"
    }

    async fn run_once(&self, now: DateTime<Utc>) -> HelpdeskResult<JobSummary> {
        let reports = self.monitor.check_at(now).await?;
        let breached = reports.iter().filter(|r| r.has_breach()).count();
        let notified = self.notifier.notify_at(&reports, now).await;

        Ok(JobSummary {
            scanned: reports.len(),
            affected: notified,
            skipped: breached.saturating_sub(notified),
            failed: 0,
        })
    }
}

/// 执行结束时释放运行标记，包括出错返回的情况
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct JobRunner {
    job: Arc<dyn ScheduledJob>,
    running: AtomicBool,
    metrics: Arc<MetricsCollector>,
}

impl JobRunner {
    pub fn new(job: Arc<dyn ScheduledJob>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            job,
            running: AtomicBool::new(false),
            metrics,
        }
    }

    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn trigger(&self) -> HelpdeskResult<JobRunStatus> {
        self.trigger_at(Utc::now()).await
    }

    /// 执行一次，上一次执行未结束时跳过
    pub async fn trigger_at(&self, now: DateTime<Utc>) -> HelpdeskResult<JobRunStatus> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("任务 {} 上一次执行尚未结束，跳过本次触发", self.name());
            self.metrics.record_job_run(self.name(), "skipped");
            return Ok(JobRunStatus::Skipped);
        }
        let _guard = RunningGuard(&self.running);

        debug!("开始执行任务 {}", self.name());
        match self.job.run_once(now).await {
            Ok(summary) => {
                self.metrics.record_job_run(self.name(), "completed");
                debug!("任务 {} 执行完成: {:?}", self.name(), summary);
                Ok(JobRunStatus::Completed(summary))
            }
            Err(e) => {
                self.metrics.record_job_run(self.name(), "failed");
                Err(e)
            }
        }
    }

    /// 按固定间隔执行直到收到关闭信号
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("定时任务 {} 已启动，间隔 {} 秒", self.name(), interval.as_secs());

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.trigger().await {
                            error!("定时任务 {} 执行失败: {}", self.name(), e);
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("收到停止信号，定时任务 {} 退出", self.name());
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    /// 等待外部放行的任务，用来制造重叠执行
    struct BlockingJob {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ScheduledJob for BlockingJob {
        fn name(&self) -> &'static str {
            "blocking"
        }

        async fn run_once(&self, _now: DateTime<Utc>) -> HelpdeskResult<JobSummary> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(JobSummary::scanned(1))
        }
    }

    struct FailingJob;

    #[async_trait]
    impl ScheduledJob for FailingJob {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run_once(&self, _now: DateTime<Utc>) -> HelpdeskResult<JobSummary> {
            Err(helpdesk_core::HelpdeskError::Internal("boom".into()))
        }
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let job = Arc::new(BlockingJob {
            started: Notify::new(),
            release: Notify::new(),
        });
        let runner = Arc::new(JobRunner::new(job.clone(), Arc::new(MetricsCollector::new())));

        let first = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.trigger().await })
        };
        job.started.notified().await;
        assert!(runner.is_running());

        assert_eq!(runner.trigger().await.unwrap(), JobRunStatus::Skipped);

        job.release.notify_one();
        let status = first.await.unwrap().unwrap();
        assert_eq!(status, JobRunStatus::Completed(JobSummary::scanned(1)));
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_failed_run_releases_guard() {
        let runner = JobRunner::new(Arc::new(FailingJob), Arc::new(MetricsCollector::new()));

        assert!(runner.trigger().await.is_err());
        assert!(!runner.is_running());
        assert!(runner.trigger().await.is_err());
    }

    #[tokio::test]
    async fn test_periodic_loop_stops_on_shutdown() {
        let runner = Arc::new(JobRunner::new(
            Arc::new(FailingJob),
            Arc::new(MetricsCollector::new()),
        ));
        let (tx, rx) = broadcast::channel(1);

        let handle = runner.spawn_periodic(Duration::from_secs(3600), rx);
        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
