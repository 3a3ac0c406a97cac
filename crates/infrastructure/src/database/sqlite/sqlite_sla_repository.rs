use async_trait::async_trait;
use helpdesk_core::{
    models::{SlaBreachMarker, SlaRule, TicketPriority},
    BreachMarkerRepository, HelpdeskResult, SlaRuleRepository,
};
use sqlx::{Row, SqlitePool};

use crate::database::mapping::MappingHelpers;

pub struct SqliteSlaRuleRepository {
    pool: SqlitePool,
}

impl SqliteSlaRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlaRuleRepository for SqliteSlaRuleRepository {
    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<SlaRule>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, priority, response_hours, resolution_hours FROM sla_rules WHERE tenant_id = $1 ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SlaRule {
                    id: row.try_get("id")?,
                    tenant_id: row.try_get("tenant_id")?,
                    priority: row.try_get::<Option<TicketPriority>, _>("priority")?,
                    response_hours: row.try_get("response_hours")?,
                    resolution_hours: row.try_get("resolution_hours")?,
                })
            })
            .collect()
    }

    async fn create(&self, rule: &SlaRule) -> HelpdeskResult<SlaRule> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sla_rules (tenant_id, priority, response_hours, resolution_hours)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&rule.tenant_id)
        .bind(rule.priority)
        .bind(rule.response_hours)
        .bind(rule.resolution_hours)
        .fetch_one(&self.pool)
        .await?;

        let mut created = rule.clone();
        created.id = id;
        Ok(created)
    }
}

pub struct SqliteBreachMarkerRepository {
    pool: SqlitePool,
}

impl SqliteBreachMarkerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BreachMarkerRepository for SqliteBreachMarkerRepository {
    async fn try_mark(&self, marker: &SlaBreachMarker) -> HelpdeskResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sla_breach_markers (ticket_id, kind, rule_id, notified_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(ticket_id, kind, rule_id) DO NOTHING
            "#,
        )
        .bind(marker.ticket_id)
        .bind(marker.kind)
        .bind(marker.rule_id)
        .bind(MappingHelpers::to_millis(marker.notified_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unmark(&self, marker: &SlaBreachMarker) -> HelpdeskResult<()> {
        sqlx::query(
            "DELETE FROM sla_breach_markers WHERE ticket_id = $1 AND kind = $2 AND rule_id = $3",
        )
        .bind(marker.ticket_id)
        .bind(marker.kind)
        .bind(marker.rule_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_ticket(&self, ticket_id: i64) -> HelpdeskResult<Vec<SlaBreachMarker>> {
        let rows = sqlx::query(
            "SELECT ticket_id, kind, rule_id, notified_at FROM sla_breach_markers WHERE ticket_id = $1 ORDER BY notified_at",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SlaBreachMarker {
                    ticket_id: row.try_get("ticket_id")?,
                    kind: row.try_get("kind")?,
                    rule_id: row.try_get("rule_id")?,
                    notified_at: MappingHelpers::parse_timestamp(row, "notified_at")?,
                })
            })
            .collect()
    }
}
