use async_trait::async_trait;
use helpdesk_core::{models::Category, CategoryRepository, HelpdeskError, HelpdeskResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::database::mapping::MappingHelpers;

pub struct SqliteCategoryRepository {
    pool: SqlitePool,
}

impl SqliteCategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_category(row: &sqlx::sqlite::SqliteRow) -> HelpdeskResult<Category> {
        Ok(Category {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            kind: row.try_get("kind")?,
            created_at: MappingHelpers::parse_timestamp(row, "created_at")?,
        })
    }
}

#[async_trait]
impl CategoryRepository for SqliteCategoryRepository {
    async fn list_by_tenant(&self, tenant_id: &str) -> HelpdeskResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, name, kind, created_at FROM categories WHERE tenant_id = $1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_category).collect()
    }

    async fn get_by_name(&self, tenant_id: &str, name: &str) -> HelpdeskResult<Option<Category>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, kind, created_at FROM categories WHERE tenant_id = $1 AND name = $2",
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_category).transpose()
    }

    async fn create(&self, category: &Category) -> HelpdeskResult<Category> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO categories (tenant_id, name, kind, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&category.tenant_id)
        .bind(&category.name)
        .bind(category.kind)
        .bind(MappingHelpers::to_millis(category.created_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            MappingHelpers::map_unique_violation(
                e,
                format!("分类已存在: {}/{}", category.tenant_id, category.name),
            )
        })?;

        let mut created = category.clone();
        created.id = id;
        Ok(created)
    }

    async fn delete_with_fallback(
        &self,
        tenant_id: &str,
        name: &str,
        fallback: &str,
    ) -> HelpdeskResult<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM categories WHERE tenant_id = $1 AND name = $2")
            .bind(tenant_id)
            .bind(name)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(HelpdeskError::category_not_found(name));
        }

        let moved = sqlx::query("UPDATE tickets SET category = $1 WHERE tenant_id = $2 AND category = $3")
            .bind(fallback)
            .bind(tenant_id)
            .bind(name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            "删除分类 {}/{}，{} 个工单迁移到 {}",
            tenant_id,
            name,
            moved.rows_affected(),
            fallback
        );
        Ok(moved.rows_affected())
    }
}
