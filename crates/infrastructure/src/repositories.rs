use std::sync::Arc;

use helpdesk_core::{
    AgentRepository, BreachMarkerRepository, CandidatePoolRepository, CategoryRepository,
    FeedbackRepository, NotificationRepository, ReassignmentLogRepository, RotationRepository,
    SlaRuleRepository, TicketRepository,
};
use sqlx::SqlitePool;

use crate::database::sqlite::*;
use crate::in_memory_store::InMemoryStore;

/// 全部仓储的集合，供服务层按需取用
#[derive(Clone)]
pub struct Repositories {
    pub tickets: Arc<dyn TicketRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub rotation: Arc<dyn RotationRepository>,
    pub candidate_pools: Arc<dyn CandidatePoolRepository>,
    pub reassignment_logs: Arc<dyn ReassignmentLogRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub sla_rules: Arc<dyn SlaRuleRepository>,
    pub breach_markers: Arc<dyn BreachMarkerRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
}

impl Repositories {
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            tickets: Arc::new(SqliteTicketRepository::new(pool.clone())),
            agents: Arc::new(SqliteAgentRepository::new(pool.clone())),
            rotation: Arc::new(SqliteRotationRepository::new(pool.clone())),
            candidate_pools: Arc::new(SqliteCandidatePoolRepository::new(pool.clone())),
            reassignment_logs: Arc::new(SqliteReassignmentLogRepository::new(pool.clone())),
            notifications: Arc::new(SqliteNotificationRepository::new(pool.clone())),
            sla_rules: Arc::new(SqliteSlaRuleRepository::new(pool.clone())),
            breach_markers: Arc::new(SqliteBreachMarkerRepository::new(pool.clone())),
            categories: Arc::new(SqliteCategoryRepository::new(pool.clone())),
            feedback: Arc::new(SqliteFeedbackRepository::new(pool)),
        }
    }

    pub fn in_memory(store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            tickets: store.clone(),
            agents: store.clone(),
            rotation: store.clone(),
            candidate_pools: store.clone(),
            reassignment_logs: store.clone(),
            notifications: store.clone(),
            sla_rules: store.clone(),
            breach_markers: store.clone(),
            categories: store.clone(),
            feedback: store,
        }
    }
}
