use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helpdesk_core::{
    models::{
        ReassignmentLog, Ticket, TicketFilter, TicketMessage, TicketPriority, TicketStatus,
    },
    HelpdeskError, HelpdeskResult, TicketRepository,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use crate::database::mapping::MappingHelpers;

const TICKET_COLUMNS: &str = "id, tenant_id, customer_id, agent_id, subject, category, priority, status, \
     sla_due, created_at, closed_at, last_agent_reply_at, last_customer_reply_at, auto_closed";

pub struct SqliteTicketRepository {
    pool: SqlitePool,
}

impl SqliteTicketRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_ticket(row: &sqlx::sqlite::SqliteRow) -> HelpdeskResult<Ticket> {
        Ok(Ticket {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            customer_id: row.try_get("customer_id")?,
            agent_id: row.try_get("agent_id")?,
            subject: row.try_get("subject")?,
            category: row.try_get("category")?,
            priority: row.try_get("priority")?,
            status: row.try_get("status")?,
            sla_due: MappingHelpers::parse_optional_timestamp(row, "sla_due")?,
            created_at: MappingHelpers::parse_timestamp(row, "created_at")?,
            closed_at: MappingHelpers::parse_optional_timestamp(row, "closed_at")?,
            last_agent_reply_at: MappingHelpers::parse_optional_timestamp(
                row,
                "last_agent_reply_at",
            )?,
            last_customer_reply_at: MappingHelpers::parse_optional_timestamp(
                row,
                "last_customer_reply_at",
            )?,
            auto_closed: row.try_get("auto_closed")?,
            messages: Vec::new(),
        })
    }

    async fn load_messages(&self, ticket_id: i64) -> HelpdeskResult<Vec<TicketMessage>> {
        let rows = sqlx::query(
            "SELECT sender_id, text, created_at FROM ticket_messages WHERE ticket_id = $1 ORDER BY created_at, id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TicketMessage {
                    sender_id: row.try_get("sender_id")?,
                    text: row.try_get("text")?,
                    created_at: MappingHelpers::parse_timestamp(row, "created_at")?,
                })
            })
            .collect()
    }

    async fn rows_to_tickets(
        &self,
        rows: Vec<sqlx::sqlite::SqliteRow>,
    ) -> HelpdeskResult<Vec<Ticket>> {
        let mut tickets = Vec::with_capacity(rows.len());
        for row in rows {
            let mut ticket = Self::row_to_ticket(&row)?;
            ticket.messages = self.load_messages(ticket.id).await?;
            tickets.push(ticket);
        }
        Ok(tickets)
    }
}

#[async_trait]
impl TicketRepository for SqliteTicketRepository {
    async fn create(&self, ticket: &Ticket) -> HelpdeskResult<Ticket> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tickets (tenant_id, customer_id, agent_id, subject, category, priority, status,
                                 sla_due, created_at, closed_at, last_agent_reply_at, last_customer_reply_at, auto_closed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(&ticket.tenant_id)
        .bind(&ticket.customer_id)
        .bind(&ticket.agent_id)
        .bind(&ticket.subject)
        .bind(&ticket.category)
        .bind(ticket.priority)
        .bind(ticket.status)
        .bind(MappingHelpers::opt_to_millis(ticket.sla_due))
        .bind(MappingHelpers::to_millis(ticket.created_at))
        .bind(MappingHelpers::opt_to_millis(ticket.closed_at))
        .bind(MappingHelpers::opt_to_millis(ticket.last_agent_reply_at))
        .bind(MappingHelpers::opt_to_millis(ticket.last_customer_reply_at))
        .bind(ticket.auto_closed)
        .fetch_one(&mut *tx)
        .await?;

        for message in &ticket.messages {
            sqlx::query(
                "INSERT INTO ticket_messages (ticket_id, sender_id, text, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(&message.sender_id)
            .bind(&message.text)
            .bind(MappingHelpers::to_millis(message.created_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut created = ticket.clone();
        created.id = id;
        debug!("创建工单成功: {}", created.entity_description());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> HelpdeskResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut ticket = Self::row_to_ticket(&row)?;
                ticket.messages = self.load_messages(id).await?;
                Ok(Some(ticket))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &TicketFilter) -> HelpdeskResult<Vec<Ticket>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE tenant_id = "));
        builder.push_bind(filter.tenant_id.clone());

        if let Some(customer_id) = &filter.customer_id {
            builder.push(" AND customer_id = ").push_bind(customer_id.clone());
        }
        if let Some(agent_id) = &filter.agent_id {
            builder.push(" AND agent_id = ").push_bind(agent_id.clone());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status);
        }
        builder.push(" ORDER BY created_at, id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        self.rows_to_tickets(rows).await
    }

    async fn list_pending_assigned(&self) -> HelpdeskResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE status IN ('open', 'assigned') AND agent_id IS NOT NULL ORDER BY id"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        self.rows_to_tickets(rows).await
    }

    async fn list_for_sla(&self, closed_since: DateTime<Utc>) -> HelpdeskResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE status != 'closed' OR (closed_at IS NOT NULL AND closed_at >= $1) ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(MappingHelpers::to_millis(closed_since))
            .fetch_all(&self.pool)
            .await?;
        self.rows_to_tickets(rows).await
    }

    async fn list_idle_pending(&self, cutoff: DateTime<Utc>) -> HelpdeskResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE status IN ('open', 'assigned') \
               AND last_agent_reply_at IS NOT NULL AND last_agent_reply_at < $1 \
             ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(MappingHelpers::to_millis(cutoff))
            .fetch_all(&self.pool)
            .await?;

        // 自动关闭只需要工单头信息
        rows.iter().map(Self::row_to_ticket).collect()
    }

    async fn assign_if_unassigned(
        &self,
        id: i64,
        agent_id: &str,
        priority: TicketPriority,
        sla_due: DateTime<Utc>,
    ) -> HelpdeskResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET agent_id = $1, priority = $2, status = 'assigned', sla_due = $3
            WHERE id = $4 AND agent_id IS NULL AND status = 'open'
            "#,
        )
        .bind(agent_id)
        .bind(priority)
        .bind(MappingHelpers::to_millis(sla_due))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reassign_with_log(
        &self,
        id: i64,
        expected_agent: Option<&str>,
        log: &ReassignmentLog,
    ) -> HelpdeskResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET agent_id = $1
            WHERE id = $2 AND agent_id IS $3 AND status IN ('open', 'assigned')
            "#,
        )
        .bind(&log.to_agent)
        .bind(id)
        .bind(expected_agent)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO reassignment_logs (tenant_id, ticket_id, from_agent, to_agent, reason, triggered_by, reassigned_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&log.tenant_id)
        .bind(id)
        .bind(&log.from_agent)
        .bind(&log.to_agent)
        .bind(log.reason)
        .bind(log.triggered_by)
        .bind(MappingHelpers::to_millis(log.reassigned_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn update_status(
        &self,
        id: i64,
        expected: TicketStatus,
        next: TicketStatus,
        at: DateTime<Utc>,
    ) -> HelpdeskResult<bool> {
        let closed_at = (next == TicketStatus::Closed).then(|| MappingHelpers::to_millis(at));

        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $1, closed_at = COALESCE($2, closed_at)
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(next)
        .bind(closed_at)
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn close_if_idle(
        &self,
        id: i64,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> HelpdeskResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'closed', auto_closed = 1, closed_at = $1
            WHERE id = $2 AND status IN ('open', 'assigned')
              AND last_agent_reply_at IS NOT NULL AND last_agent_reply_at < $3
            "#,
        )
        .bind(MappingHelpers::to_millis(now))
        .bind(id)
        .bind(MappingHelpers::to_millis(cutoff))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn append_message(
        &self,
        id: i64,
        message: &TicketMessage,
        from_agent: bool,
    ) -> HelpdeskResult<()> {
        let mut tx = self.pool.begin().await?;
        let created_at = MappingHelpers::to_millis(message.created_at);

        let update_sql = if from_agent {
            "UPDATE tickets SET last_agent_reply_at = $1 WHERE id = $2"
        } else {
            "UPDATE tickets SET last_customer_reply_at = $1 WHERE id = $2"
        };
        let result = sqlx::query(update_sql)
            .bind(created_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(HelpdeskError::ticket_not_found(id));
        }

        sqlx::query(
            "INSERT INTO ticket_messages (ticket_id, sender_id, text, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(&message.sender_id)
        .bind(&message.text)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
