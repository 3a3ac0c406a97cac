use async_trait::async_trait;
use helpdesk_core::{models::Feedback, FeedbackRepository, HelpdeskResult};
use sqlx::{Row, SqlitePool};

use crate::database::mapping::MappingHelpers;

pub struct SqliteFeedbackRepository {
    pool: SqlitePool,
}

impl SqliteFeedbackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackRepository for SqliteFeedbackRepository {
    async fn create(&self, feedback: &Feedback) -> HelpdeskResult<Feedback> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO feedback (ticket_id, tenant_id, customer_id, agent_id, rating, comment, sentiment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(feedback.ticket_id)
        .bind(&feedback.tenant_id)
        .bind(&feedback.customer_id)
        .bind(&feedback.agent_id)
        .bind(i64::from(feedback.rating))
        .bind(&feedback.comment)
        .bind(feedback.sentiment)
        .bind(MappingHelpers::to_millis(feedback.created_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MappingHelpers::map_unique_violation(
                e,
                format!("工单 {} 已提交过满意度反馈", feedback.ticket_id),
            )
        })?;

        let mut created = feedback.clone();
        created.id = id;
        Ok(created)
    }

    async fn get_by_ticket(&self, ticket_id: i64) -> HelpdeskResult<Option<Feedback>> {
        let row = sqlx::query(
            r#"
            SELECT id, ticket_id, tenant_id, customer_id, agent_id, rating, comment, sentiment, created_at
            FROM feedback WHERE ticket_id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let rating: i64 = row.try_get("rating")?;
                Ok(Some(Feedback {
                    id: row.try_get("id")?,
                    ticket_id: row.try_get("ticket_id")?,
                    tenant_id: row.try_get("tenant_id")?,
                    customer_id: row.try_get("customer_id")?,
                    agent_id: row.try_get("agent_id")?,
                    rating: u8::try_from(rating).unwrap_or_default(),
                    comment: row.try_get("comment")?,
                    sentiment: row.try_get("sentiment")?,
                    created_at: MappingHelpers::parse_timestamp(&row, "created_at")?,
                }))
            }
            None => Ok(None),
        }
    }
}
