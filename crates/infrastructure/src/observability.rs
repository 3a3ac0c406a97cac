use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{counter, Counter};
use tracing::info;

/// 引擎指标
///
/// 所有计数器以 `helpdesk_` 为前缀，未安装导出器时记录为空操作。
#[derive(Clone)]
pub struct MetricsCollector {
    tickets_assigned_total: Counter,
    assignment_conflicts_total: Counter,
    no_agent_available_total: Counter,
    tickets_reassigned_total: Counter,
    tickets_auto_closed_total: Counter,
    sla_breaches_total: Counter,
    calls_routed_total: Counter,
    notifications_sent_total: Counter,
    notifications_failed_total: Counter,
    notifications_dropped_total: Counter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tickets_assigned_total: counter!("helpdesk_tickets_assigned_total"),
            assignment_conflicts_total: counter!("helpdesk_assignment_conflicts_total"),
            no_agent_available_total: counter!("helpdesk_no_agent_available_total"),
            tickets_reassigned_total: counter!("helpdesk_tickets_reassigned_total"),
            tickets_auto_closed_total: counter!("helpdesk_tickets_auto_closed_total"),
            sla_breaches_total: counter!("helpdesk_sla_breaches_total"),
            calls_routed_total: counter!("helpdesk_calls_routed_total"),
            notifications_sent_total: counter!("helpdesk_notifications_sent_total"),
            notifications_failed_total: counter!("helpdesk_notifications_failed_total"),
            notifications_dropped_total: counter!("helpdesk_notifications_dropped_total"),
        }
    }

    pub fn record_assignment(&self) {
        self.tickets_assigned_total.increment(1);
    }

    pub fn record_assignment_conflict(&self) {
        self.assignment_conflicts_total.increment(1);
    }

    pub fn record_no_agent_available(&self) {
        self.no_agent_available_total.increment(1);
    }

    pub fn record_reassignments(&self, count: u64) {
        self.tickets_reassigned_total.increment(count);
    }

    pub fn record_auto_closed(&self, count: u64) {
        self.tickets_auto_closed_total.increment(count);
    }

    pub fn record_sla_breaches(&self, count: u64) {
        self.sla_breaches_total.increment(count);
    }

    pub fn record_call_routed(&self) {
        self.calls_routed_total.increment(1);
    }

    pub fn record_notification_sent(&self) {
        self.notifications_sent_total.increment(1);
    }

    pub fn record_notification_failed(&self) {
        self.notifications_failed_total.increment(1);
    }

    pub fn record_notification_dropped(&self) {
        self.notifications_dropped_total.increment(1);
    }

    /// 定时任务执行结果，按任务名与结果打标签
    pub fn record_job_run(&self, job: &'static str, outcome: &'static str) {
        counter!("helpdesk_job_runs_total", "job" => job, "outcome" => outcome).increment(1);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// 安装 Prometheus 导出器并在指定地址提供 /metrics
pub fn install_prometheus_exporter(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("指标监听地址无效: {bind_address}"))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus导出器失败: {e}"))?;

    info!("Prometheus指标导出器已启动: {}", addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder_are_noop() {
        let metrics = MetricsCollector::new();
        metrics.record_assignment();
        metrics.record_reassignments(3);
        metrics.record_job_run("sla_monitor", "completed");
    }

    #[test]
    fn test_invalid_bind_address() {
        assert!(install_prometheus_exporter("not-an-address").is_err());
    }
}
