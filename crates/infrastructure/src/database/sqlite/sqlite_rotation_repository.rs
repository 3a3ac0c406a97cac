use async_trait::async_trait;
use helpdesk_core::{
    models::{CandidatePool, RotationPointer},
    CandidatePoolRepository, HelpdeskResult, RotationRepository,
};
use sqlx::{Row, SqlitePool};

use crate::database::mapping::MappingHelpers;

pub struct SqliteRotationRepository {
    pool: SqlitePool,
}

impl SqliteRotationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RotationRepository for SqliteRotationRepository {
    async fn get(&self, subject_key: &str) -> HelpdeskResult<Option<RotationPointer>> {
        let row = sqlx::query(
            "SELECT subject_key, last_index, version FROM rotation_pointers WHERE subject_key = $1",
        )
        .bind(subject_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(RotationPointer {
                subject_key: row.try_get("subject_key")?,
                last_index: row.try_get("last_index")?,
                version: row.try_get("version")?,
            })),
            None => Ok(None),
        }
    }

    async fn compare_and_set(
        &self,
        subject_key: &str,
        expected_version: i64,
        last_index: i64,
    ) -> HelpdeskResult<bool> {
        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO rotation_pointers (subject_key, last_index, version)
                VALUES ($1, $2, 1)
                ON CONFLICT(subject_key) DO NOTHING
                "#,
            )
            .bind(subject_key)
            .bind(last_index)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE rotation_pointers
                SET last_index = $1, version = version + 1
                WHERE subject_key = $2 AND version = $3
                "#,
            )
            .bind(last_index)
            .bind(subject_key)
            .bind(expected_version)
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected() == 1)
    }
}

pub struct SqliteCandidatePoolRepository {
    pool: SqlitePool,
}

impl SqliteCandidatePoolRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandidatePoolRepository for SqliteCandidatePoolRepository {
    async fn get(
        &self,
        tenant_id: &str,
        customer_id: &str,
    ) -> HelpdeskResult<Option<CandidatePool>> {
        let row = sqlx::query(
            "SELECT tenant_id, customer_id, agent_ids FROM candidate_pools WHERE tenant_id = $1 AND customer_id = $2",
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(CandidatePool {
                tenant_id: row.try_get("tenant_id")?,
                customer_id: row.try_get("customer_id")?,
                agent_ids: MappingHelpers::parse_json_list(&row, "agent_ids")?,
            })),
            None => Ok(None),
        }
    }

    async fn upsert(&self, pool: &CandidatePool) -> HelpdeskResult<()> {
        let agent_ids = MappingHelpers::to_json_list(&pool.agent_ids)?;
        sqlx::query(
            r#"
            INSERT INTO candidate_pools (tenant_id, customer_id, agent_ids)
            VALUES ($1, $2, $3)
            ON CONFLICT(tenant_id, customer_id) DO UPDATE SET agent_ids = excluded.agent_ids
            "#,
        )
        .bind(&pool.tenant_id)
        .bind(&pool.customer_id)
        .bind(agent_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
