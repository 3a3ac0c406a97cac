use async_trait::async_trait;
use helpdesk_core::{models::ReassignmentLog, HelpdeskResult, ReassignmentLogRepository};
use sqlx::{Row, SqlitePool};

use crate::database::mapping::MappingHelpers;

const LOG_COLUMNS: &str =
    "id, tenant_id, ticket_id, from_agent, to_agent, reason, triggered_by, reassigned_at";

pub struct SqliteReassignmentLogRepository {
    pool: SqlitePool,
}

impl SqliteReassignmentLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_log(row: &sqlx::sqlite::SqliteRow) -> HelpdeskResult<ReassignmentLog> {
        Ok(ReassignmentLog {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            ticket_id: row.try_get("ticket_id")?,
            from_agent: row.try_get("from_agent")?,
            to_agent: row.try_get("to_agent")?,
            reason: row.try_get("reason")?,
            triggered_by: row.try_get("triggered_by")?,
            reassigned_at: MappingHelpers::parse_timestamp(row, "reassigned_at")?,
        })
    }
}

#[async_trait]
impl ReassignmentLogRepository for SqliteReassignmentLogRepository {
    async fn list_by_ticket(&self, ticket_id: i64) -> HelpdeskResult<Vec<ReassignmentLog>> {
        let sql = format!("SELECT {LOG_COLUMNS} FROM reassignment_logs WHERE ticket_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(ticket_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_log).collect()
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<ReassignmentLog>> {
        let sql = format!("SELECT {LOG_COLUMNS} FROM reassignment_logs WHERE tenant_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_log).collect()
    }
}
