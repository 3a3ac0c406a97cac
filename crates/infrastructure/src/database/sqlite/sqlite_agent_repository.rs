use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helpdesk_core::{models::Agent, AgentRepository, HelpdeskResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::database::mapping::MappingHelpers;

const AGENT_COLUMNS: &str = "id, tenant_id, name, is_active, on_leave, holidays, categories, priority, \
     is_online, is_busy, last_call_at, last_assigned_at, created_at";

pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_agent(row: &sqlx::sqlite::SqliteRow) -> HelpdeskResult<Agent> {
        Ok(Agent {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            is_active: row.try_get("is_active")?,
            on_leave: row.try_get("on_leave")?,
            holidays: MappingHelpers::parse_json_list(row, "holidays")?,
            categories: MappingHelpers::parse_json_list(row, "categories")?,
            priority: row.try_get("priority")?,
            is_online: row.try_get("is_online")?,
            is_busy: row.try_get("is_busy")?,
            last_call_at: MappingHelpers::parse_optional_timestamp(row, "last_call_at")?,
            last_assigned_at: MappingHelpers::parse_optional_timestamp(row, "last_assigned_at")?,
            created_at: MappingHelpers::parse_timestamp(row, "created_at")?,
        })
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn upsert(&self, agent: &Agent) -> HelpdeskResult<()> {
        let holidays = MappingHelpers::to_json_list(&agent.holidays)?;
        let categories = MappingHelpers::to_json_list(&agent.categories)?;

        sqlx::query(
            r#"
            INSERT INTO agents (id, tenant_id, name, is_active, on_leave, holidays, categories, priority,
                                is_online, is_busy, last_call_at, last_assigned_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                is_active = excluded.is_active,
                on_leave = excluded.on_leave,
                holidays = excluded.holidays,
                categories = excluded.categories,
                priority = excluded.priority,
                is_online = excluded.is_online
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.tenant_id)
        .bind(&agent.name)
        .bind(agent.is_active)
        .bind(agent.on_leave)
        .bind(holidays)
        .bind(categories)
        .bind(agent.priority)
        .bind(agent.is_online)
        .bind(agent.is_busy)
        .bind(MappingHelpers::opt_to_millis(agent.last_call_at))
        .bind(MappingHelpers::opt_to_millis(agent.last_assigned_at))
        .bind(MappingHelpers::to_millis(agent.created_at))
        .execute(&self.pool)
        .await?;

        debug!("保存坐席成功: {}", agent.id);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> HelpdeskResult<Option<Agent>> {
        let sql = format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_agent).transpose()
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<Agent>> {
        let sql = format!("SELECT {AGENT_COLUMNS} FROM agents WHERE tenant_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_agent).collect()
    }

    async fn touch_last_assigned(&self, id: &str, at: DateTime<Utc>) -> HelpdeskResult<()> {
        sqlx::query("UPDATE agents SET last_assigned_at = $1 WHERE id = $2")
            .bind(MappingHelpers::to_millis(at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn try_mark_busy(
        &self,
        id: &str,
        category: &str,
        at: DateTime<Utc>,
    ) -> HelpdeskResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE agents
            SET is_busy = 1, last_call_at = $1
            WHERE id = $2 AND is_online = 1 AND is_busy = 0
              AND EXISTS (SELECT 1 FROM json_each(agents.categories) WHERE json_each.value = $3)
            "#,
        )
        .bind(MappingHelpers::to_millis(at))
        .bind(id)
        .bind(category)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, id: &str) -> HelpdeskResult<bool> {
        let result = sqlx::query("UPDATE agents SET is_busy = 0 WHERE id = $1 AND is_busy = 1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
