use async_trait::async_trait;
use helpdesk_core::{models::Notification, HelpdeskResult, NotificationRepository};
use sqlx::{Row, SqlitePool};

use crate::database::mapping::MappingHelpers;

pub struct SqliteNotificationRepository {
    pool: SqlitePool,
}

impl SqliteNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> HelpdeskResult<Notification> {
        Ok(Notification {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            recipient_id: row.try_get("recipient_id")?,
            notification_type: row.try_get("notification_type")?,
            ticket_id: row.try_get("ticket_id")?,
            message: row.try_get("message")?,
            read: row.try_get("is_read")?,
            created_at: MappingHelpers::parse_timestamp(row, "created_at")?,
        })
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn create(&self, notification: &Notification) -> HelpdeskResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, tenant_id, recipient_id, notification_type, ticket_id, message, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.tenant_id)
        .bind(&notification.recipient_id)
        .bind(notification.notification_type)
        .bind(notification.ticket_id)
        .bind(&notification.message)
        .bind(notification.read)
        .bind(MappingHelpers::to_millis(notification.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_recipient(
        &self,
        tenant_id: &str,
        recipient_id: &str,
    ) -> HelpdeskResult<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, recipient_id, notification_type, ticket_id, message, is_read, created_at
            FROM notifications
            WHERE tenant_id = $1 AND recipient_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_notification).collect()
    }

    async fn mark_read(&self, id: &str) -> HelpdeskResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
