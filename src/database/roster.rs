use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::Database;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Account, TeamMembership};
use crate::repositories::RosterStore;

fn account_from_row(row: &SqliteRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        team_id: row.get("team_id"),
        is_team_lead: row.get("is_team_lead"),
    }
}

fn membership_from_row(row: &SqliteRow) -> TeamMembership {
    TeamMembership {
        id: row.get("id"),
        team_lead_id: row.get("team_lead_id"),
        email: row.get("email"),
        name: row.get("name"),
    }
}

#[async_trait]
impl RosterStore for Database {
    fn membership_query_limit(&self) -> usize {
        self.membership_query_limit
    }

    async fn find_account(&self, account_id: &str) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query("SELECT id, email, team_id, is_team_lead FROM accounts WHERE id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_accounts_by_emails(&self, emails: &[String]) -> RepositoryResult<Vec<Account>> {
        if emails.len() > self.membership_query_limit {
            return Err(RepositoryError::MembershipQueryTooLarge {
                size: emails.len(),
                max: self.membership_query_limit,
            });
        }
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, email, team_id, is_team_lead FROM accounts WHERE lower(email) IN (",
        );
        let mut separated = query_builder.separated(", ");
        for email in emails {
            separated.push_bind(email.trim().to_lowercase());
        }
        separated.push_unseparated(")");

        let rows = query_builder.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(account_from_row).collect())
    }

    async fn team_exists_for_lead(&self, team_lead_id: &str) -> RepositoryResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM team_members WHERE team_lead_id = ?",
        )
        .bind(team_lead_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn find_membership_by_email(
        &self,
        email: &str,
    ) -> RepositoryResult<Option<TeamMembership>> {
        let row = sqlx::query(
            "SELECT id, team_lead_id, email, name FROM team_members
             WHERE lower(email) = ? LIMIT 1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(membership_from_row))
    }

    async fn list_team_members(&self, team_lead_id: &str) -> RepositoryResult<Vec<TeamMembership>> {
        let rows = sqlx::query(
            "SELECT id, team_lead_id, email, name FROM team_members
             WHERE team_lead_id = ? ORDER BY email",
        )
        .bind(team_lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(membership_from_row).collect())
    }
}
