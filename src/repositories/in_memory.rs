//! In-process store for tests and local runs

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::config::defaults::{DEFAULT_MEMBERSHIP_QUERY_LIMIT, DEFAULT_WRITE_GROUP_SIZE};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Account, OperationRecord, TeamMembership};
use crate::repositories::traits::{OperationStore, RosterStore};

#[derive(Debug)]
pub struct InMemoryStore {
    accounts: RwLock<Vec<Account>>,
    members: RwLock<Vec<TeamMembership>>,
    operations: RwLock<Vec<OperationRecord>>,
    membership_query_limit: usize,
    write_group_limit: usize,
    /// Zero-based commit call that fails, if any
    fail_on_commit: Option<usize>,
    commits: AtomicUsize,
    membership_queries: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
            members: RwLock::new(Vec::new()),
            operations: RwLock::new(Vec::new()),
            membership_query_limit: DEFAULT_MEMBERSHIP_QUERY_LIMIT,
            write_group_limit: DEFAULT_WRITE_GROUP_SIZE,
            fail_on_commit: None,
            commits: AtomicUsize::new(0),
            membership_queries: AtomicUsize::new(0),
        }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.get_mut().push(account);
        self
    }

    pub fn with_member(mut self, member: TeamMembership) -> Self {
        self.members.get_mut().push(member);
        self
    }

    pub fn with_limits(mut self, membership_query_limit: usize, write_group_limit: usize) -> Self {
        self.membership_query_limit = membership_query_limit;
        self.write_group_limit = write_group_limit;
        self
    }

    pub fn failing_on_commit(mut self, commit_index: usize) -> Self {
        self.fail_on_commit = Some(commit_index);
        self
    }

    pub async fn operations(&self) -> Vec<OperationRecord> {
        self.operations.read().await.clone()
    }

    pub fn commit_calls(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn membership_queries(&self) -> usize {
        self.membership_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RosterStore for InMemoryStore {
    fn membership_query_limit(&self) -> usize {
        self.membership_query_limit
    }

    async fn find_account(&self, account_id: &str) -> RepositoryResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .find(|a| a.id == account_id)
            .cloned())
    }

    async fn find_accounts_by_emails(&self, emails: &[String]) -> RepositoryResult<Vec<Account>> {
        if emails.len() > self.membership_query_limit {
            return Err(RepositoryError::MembershipQueryTooLarge {
                size: emails.len(),
                max: self.membership_query_limit,
            });
        }
        self.membership_queries.fetch_add(1, Ordering::SeqCst);

        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .filter(|a| emails.iter().any(|e| same_email(e, &a.email)))
            .cloned()
            .collect())
    }

    async fn team_exists_for_lead(&self, team_lead_id: &str) -> RepositoryResult<bool> {
        Ok(self
            .members
            .read()
            .await
            .iter()
            .any(|m| m.team_lead_id == team_lead_id))
    }

    async fn find_membership_by_email(
        &self,
        email: &str,
    ) -> RepositoryResult<Option<TeamMembership>> {
        Ok(self
            .members
            .read()
            .await
            .iter()
            .find(|m| same_email(&m.email, email))
            .cloned())
    }

    async fn list_team_members(&self, team_lead_id: &str) -> RepositoryResult<Vec<TeamMembership>> {
        Ok(self
            .members
            .read()
            .await
            .iter()
            .filter(|m| m.team_lead_id == team_lead_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OperationStore for InMemoryStore {
    fn max_write_group_size(&self) -> usize {
        self.write_group_limit
    }

    async fn commit_group(&self, records: &[OperationRecord]) -> RepositoryResult<usize> {
        let call = self.commits.fetch_add(1, Ordering::SeqCst);
        if records.len() > self.write_group_limit {
            return Err(RepositoryError::WriteGroupTooLarge {
                size: records.len(),
                max: self.write_group_limit,
            });
        }
        if self.fail_on_commit == Some(call) {
            return Err(RepositoryError::ConnectionFailed {
                message: "store unavailable".to_string(),
            });
        }

        self.operations.write().await.extend_from_slice(records);
        Ok(records.len())
    }

    async fn list_team_operations(&self, team_id: &str) -> RepositoryResult<Vec<OperationRecord>> {
        Ok(self
            .operations
            .read()
            .await
            .iter()
            .filter(|op| op.team_id == team_id)
            .cloned()
            .collect())
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
