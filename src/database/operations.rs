use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use super::Database;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::OperationRecord;
use crate::repositories::OperationStore;

#[async_trait]
impl OperationStore for Database {
    fn max_write_group_size(&self) -> usize {
        self.write_group_size
    }

    async fn commit_group(&self, records: &[OperationRecord]) -> RepositoryResult<usize> {
        if records.len() > self.write_group_size {
            return Err(RepositoryError::WriteGroupTooLarge {
                size: records.len(),
                max: self.write_group_size,
            });
        }
        if records.is_empty() {
            return Ok(0);
        }

        let payloads = records
            .iter()
            .map(|record| serde_json::to_string(record).map(|payload| (record, payload)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;

        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO operations (id, team_id, fecha_reserva, estado, payload, imported_from_csv, created_at) ",
        );
        query_builder.push_values(payloads, |mut b, (record, payload)| {
            b.push_bind(record.id.to_string())
                .push_bind(record.team_id.clone())
                .push_bind(record.fecha_reserva.to_string())
                .push_bind(record.estado.as_str())
                .push_bind(payload)
                .push_bind(record.imported_from_csv)
                .push_bind(record.created_at.to_rfc3339());
        });
        query_builder.build().execute(&mut *tx).await?;

        tx.commit().await?;
        debug!("Committed {} operations", records.len());

        Ok(records.len())
    }

    async fn list_team_operations(&self, team_id: &str) -> RepositoryResult<Vec<OperationRecord>> {
        let rows = sqlx::query(
            "SELECT payload FROM operations WHERE team_id = ? ORDER BY fecha_reserva, created_at",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let payload: String = row.get("payload");
                serde_json::from_str(&payload).map_err(RepositoryError::from)
            })
            .collect()
    }
}
