use async_trait::async_trait;

use crate::errors::RepositoryResult;
use crate::models::{Account, OperationRecord, TeamMembership};

/// Read access to accounts and team rosters
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Largest key list accepted by [`RosterStore::find_accounts_by_emails`]
    fn membership_query_limit(&self) -> usize;

    async fn find_account(&self, account_id: &str) -> RepositoryResult<Option<Account>>;

    /// Accounts whose email (case-insensitive) is in `emails`
    ///
    /// Fails with `MembershipQueryTooLarge` above the query limit.
    async fn find_accounts_by_emails(&self, emails: &[String]) -> RepositoryResult<Vec<Account>>;

    /// Whether any roster entry names `team_lead_id` as its lead
    async fn team_exists_for_lead(&self, team_lead_id: &str) -> RepositoryResult<bool>;

    async fn find_membership_by_email(&self, email: &str)
        -> RepositoryResult<Option<TeamMembership>>;

    async fn list_team_members(&self, team_lead_id: &str) -> RepositoryResult<Vec<TeamMembership>>;
}

/// Write access to operations
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Largest group [`OperationStore::commit_group`] writes atomically
    fn max_write_group_size(&self) -> usize;

    /// Write every record or none of them; returns the number written
    async fn commit_group(&self, records: &[OperationRecord]) -> RepositoryResult<usize>;

    async fn list_team_operations(&self, team_id: &str) -> RepositoryResult<Vec<OperationRecord>>;
}
