use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use helpdesk_core::{
    models::{Agent, Principal},
    AgentRepository, HelpdeskError, HelpdeskResult,
};
use helpdesk_infrastructure::MetricsCollector;

/// 来电分配结果
#[derive(Debug, Clone)]
pub enum CallRouteOutcome {
    Routed(Agent),
    NoAgentAvailable,
}

/// 优先级降序，最久未接来电者优先，从未接过的排最前
pub fn compare_for_call(a: &Agent, b: &Agent) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.last_call_at, b.last_call_at) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y),
        })
        .then_with(|| a.id.cmp(&b.id))
}

pub struct CallRouter {
    agent_repo: Arc<dyn AgentRepository>,
    metrics: Arc<MetricsCollector>,
    fallback_category: String,
}

impl CallRouter {
    pub fn new(
        agent_repo: Arc<dyn AgentRepository>,
        metrics: Arc<MetricsCollector>,
        fallback_category: impl Into<String>,
    ) -> Self {
        Self {
            agent_repo,
            metrics,
            fallback_category: fallback_category.into(),
        }
    }

    pub async fn route_call(
        &self,
        principal: &Principal,
        category: &str,
    ) -> HelpdeskResult<CallRouteOutcome> {
        self.route_call_at(&principal.tenant_id, category, Utc::now())
            .await
    }

    /// 为来电选择坐席，选中即通过条件更新占用
    pub async fn route_call_at(
        &self,
        tenant_id: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> HelpdeskResult<CallRouteOutcome> {
        let category = category.trim().to_lowercase();

        if let Some(agent) = self.try_category(tenant_id, &category, now).await? {
            return Ok(CallRouteOutcome::Routed(agent));
        }

        if category != self.fallback_category {
            debug!("分类 {} 下没有空闲坐席，退回分类 {}", category, self.fallback_category);
            if let Some(agent) = self
                .try_category(tenant_id, &self.fallback_category, now)
                .await?
            {
                return Ok(CallRouteOutcome::Routed(agent));
            }
        }

        info!("租户 {} 的来电没有空闲坐席 (分类: {})", tenant_id, category);
        self.metrics.record_no_agent_available();
        Ok(CallRouteOutcome::NoAgentAvailable)
    }

    async fn try_category(
        &self,
        tenant_id: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> HelpdeskResult<Option<Agent>> {
        let mut candidates: Vec<Agent> = self
            .agent_repo
            .list_by_tenant(tenant_id)
            .await?
            .into_iter()
            .filter(|agent| agent.can_take_call(category))
            .collect();
        candidates.sort_by(compare_for_call);

        for mut agent in candidates {
            // 竞争失败说明坐席刚被占用，继续尝试下一个
            if self.agent_repo.try_mark_busy(&agent.id, category, now).await? {
                agent.is_busy = true;
                agent.last_call_at = Some(now);
                self.metrics.record_call_routed();
                info!("来电分配给坐席 {} (分类: {})", agent.id, category);
                return Ok(Some(agent));
            }
            debug!("坐席 {} 已被占用，尝试下一个", agent.id);
        }

        Ok(None)
    }

    /// 通话结束，释放坐席
    pub async fn release(&self, principal: &Principal, agent_id: &str) -> HelpdeskResult<bool> {
        let agent = self
            .agent_repo
            .get_by_id(agent_id)
            .await?
            .ok_or_else(|| HelpdeskError::agent_not_found(agent_id))?;
        principal.ensure_tenant(&agent.tenant_id)?;

        let released = self.agent_repo.release(agent_id).await?;
        if released {
            debug!("坐席 {} 通话结束，已释放", agent_id);
        }
        Ok(released)
    }
}
