//! 可用性轮询
//!
//! 在有序候选列表上做有界的循环扫描，指针按路由主体持久化，
//! 只能通过版本号CAS推进。工单分配（round_robin 策略）与改派任务共用。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use helpdesk_core::{models::Agent, HelpdeskError, HelpdeskResult, RotationRepository};

/// 客户专属坐席池的路由主体
pub fn customer_subject(customer_id: &str) -> String {
    format!("customer:{customer_id}")
}

/// 租户分类队列的路由主体
pub fn queue_subject(tenant_id: &str, category: &str) -> String {
    format!("queue:{tenant_id}:{category}")
}

/// 从 `last_index` 之后开始扫描，最多扫描 N 个候选人
///
/// 位置从 1 开始计数，返回命中的位置与坐席。
pub fn scan<'a>(
    candidates: &'a [Agent],
    last_index: i64,
    now: DateTime<Utc>,
) -> Option<(i64, &'a Agent)> {
    let n = candidates.len() as i64;
    if n == 0 {
        return None;
    }

    let start = last_index.rem_euclid(n);
    (0..n)
        .map(|offset| (start + offset) % n)
        .find(|&idx| candidates[idx as usize].is_available(now))
        .map(|idx| (idx + 1, &candidates[idx as usize]))
}

pub struct AvailabilityRotation {
    rotation_repo: Arc<dyn RotationRepository>,
    max_retries: u32,
}

impl AvailabilityRotation {
    pub fn new(rotation_repo: Arc<dyn RotationRepository>, max_retries: u32) -> Self {
        Self {
            rotation_repo,
            max_retries,
        }
    }

    /// 选出下一个可用坐席并推进指针
    ///
    /// 全部候选人都不可用时返回 `None`，指针保持不变。
    /// CAS 失败会基于最新指针重新扫描，超过重试次数返回 Conflict。
    pub async fn next_available(
        &self,
        subject_key: &str,
        candidates: &[Agent],
        now: DateTime<Utc>,
    ) -> HelpdeskResult<Option<Agent>> {
        for attempt in 0..=self.max_retries {
            let pointer = self.rotation_repo.get(subject_key).await?;
            let (last_index, version) = pointer
                .map(|p| (p.last_index, p.version))
                .unwrap_or((0, 0));

            let Some((position, agent)) = scan(candidates, last_index, now) else {
                debug!(
                    "轮询主体 {} 的 {} 个候选坐席均不可用",
                    subject_key,
                    candidates.len()
                );
                return Ok(None);
            };

            if self
                .rotation_repo
                .compare_and_set(subject_key, version, position)
                .await?
            {
                debug!(
                    "轮询主体 {} 选中坐席 {} (位置: {}/{})",
                    subject_key,
                    agent.id,
                    position,
                    candidates.len()
                );
                return Ok(Some(agent.clone()));
            }

            warn!(
                "轮询指针 {} 版本 {} 已过期，重新扫描 (第 {} 次)",
                subject_key,
                version,
                attempt + 1
            );
        }

        Err(HelpdeskError::conflict(format!(
            "轮询指针 {subject_key} 竞争失败，已重试 {} 次",
            self.max_retries
        )))
    }
}
