//! Team roster resolution for advisor emails
//!
//! Rows name their advisor by email. Resolving each one with its own store
//! query would cost a round trip per row, so a job first builds a
//! [`TeamRosterCache`] with a handful of bounded membership queries and then
//! resolves rows with map lookups. When the cache cannot be built the job
//! falls back to [`UncachedResolver`], which queries per email.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::errors::RepositoryResult;
use crate::repositories::RosterStore;

/// Canonical form used as the cache key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Team lead that owns `team_id` from the point of view of `caller_id`
///
/// `team_id` is used as is when some roster entry names it as lead. Otherwise
/// the caller decides: a lead owns their own team, a member belongs to their
/// lead's. Anything else keeps `team_id`.
pub async fn resolve_team_lead(
    store: &dyn RosterStore,
    team_id: &str,
    caller_id: &str,
) -> RepositoryResult<String> {
    if store.team_exists_for_lead(team_id).await? {
        return Ok(team_id.to_string());
    }

    if let Some(account) = store.find_account(caller_id).await? {
        if account.is_team_lead {
            return Ok(account.id);
        }
        if let Some(membership) = store.find_membership_by_email(&account.email).await? {
            return Ok(membership.team_lead_id);
        }
    }

    Ok(team_id.to_string())
}

/// Team an import is filed under when the upload names none
///
/// Lookup failures fall back to the caller's own id.
pub async fn resolve_effective_team_id(
    store: &dyn RosterStore,
    caller_id: &str,
    requested: Option<&str>,
) -> String {
    if let Some(team_id) = requested.map(str::trim).filter(|t| !t.is_empty()) {
        return team_id.to_string();
    }

    let account = match store.find_account(caller_id).await {
        Ok(Some(account)) => account,
        Ok(None) => return caller_id.to_string(),
        Err(e) => {
            warn!("Account lookup for {} failed: {}", caller_id, e);
            return caller_id.to_string();
        }
    };

    if let Some(team_id) = account.team_id.filter(|t| !t.trim().is_empty()) {
        return team_id;
    }
    if account.is_team_lead {
        return account.id;
    }

    match store.find_membership_by_email(&account.email).await {
        Ok(Some(membership)) => membership.team_lead_id,
        Ok(None) => caller_id.to_string(),
        Err(e) => {
            warn!("Membership lookup for {} failed: {}", caller_id, e);
            caller_id.to_string()
        }
    }
}

/// Snapshot of one team's email -> account id mapping, built once per job
#[derive(Debug, Clone)]
pub struct TeamRosterCache {
    team_lead_id: String,
    email_to_account_id: HashMap<String, String>,
    is_loaded: bool,
}

impl TeamRosterCache {
    pub async fn load(
        store: &dyn RosterStore,
        team_id: &str,
        caller_id: &str,
    ) -> RepositoryResult<Self> {
        let team_lead_id = resolve_team_lead(store, team_id, caller_id).await?;
        let mut email_to_account_id = HashMap::new();

        if let Some(lead) = store.find_account(&team_lead_id).await? {
            email_to_account_id.insert(normalize_email(&lead.email), lead.id);
        }

        let mut emails: Vec<String> = store
            .list_team_members(&team_lead_id)
            .await?
            .iter()
            .map(|member| normalize_email(&member.email))
            .filter(|email| !email.is_empty())
            .collect();
        emails.sort();
        emails.dedup();

        let query_limit = store.membership_query_limit().max(1);
        for chunk in emails.chunks(query_limit) {
            for account in store.find_accounts_by_emails(chunk).await? {
                email_to_account_id.insert(normalize_email(&account.email), account.id);
            }
        }

        info!(
            "Roster cache for team lead {} loaded: {} members, {} resolvable emails",
            team_lead_id,
            emails.len(),
            email_to_account_id.len()
        );

        Ok(Self {
            team_lead_id,
            email_to_account_id,
            is_loaded: true,
        })
    }

    pub fn lookup(&self, email: &str) -> Option<&str> {
        self.email_to_account_id
            .get(&normalize_email(email))
            .map(String::as_str)
    }

    pub fn team_lead_id(&self) -> &str {
        &self.team_lead_id
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn len(&self) -> usize {
        self.email_to_account_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.email_to_account_id.is_empty()
    }
}

/// Maps an advisor email to an account id; `None` leaves the link unset
#[async_trait]
pub trait AdvisorResolver: Send + Sync {
    async fn resolve(&self, email: &str) -> Option<String>;

    fn strategy(&self) -> &'static str;
}

pub struct CachedResolver {
    cache: TeamRosterCache,
}

impl CachedResolver {
    pub fn new(cache: TeamRosterCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl AdvisorResolver for CachedResolver {
    async fn resolve(&self, email: &str) -> Option<String> {
        self.cache.lookup(email).map(str::to_string)
    }

    fn strategy(&self) -> &'static str {
        "cached"
    }
}

/// Per-email store lookups, used when the roster cache could not be built
pub struct UncachedResolver {
    store: Arc<dyn RosterStore>,
    team_id: String,
    caller_id: String,
    team_lead_id: OnceCell<String>,
}

impl UncachedResolver {
    pub fn new(store: Arc<dyn RosterStore>, team_id: &str, caller_id: &str) -> Self {
        Self {
            store,
            team_id: team_id.to_string(),
            caller_id: caller_id.to_string(),
            team_lead_id: OnceCell::new(),
        }
    }

    async fn try_resolve(&self, email: &str) -> RepositoryResult<Option<String>> {
        let team_lead_id = self
            .team_lead_id
            .get_or_try_init(|| resolve_team_lead(self.store.as_ref(), &self.team_id, &self.caller_id))
            .await?;

        let email = normalize_email(email);
        let Some(account) = self
            .store
            .find_accounts_by_emails(std::slice::from_ref(&email))
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        if &account.id == team_lead_id {
            return Ok(Some(account.id));
        }

        let is_member = self
            .store
            .list_team_members(team_lead_id)
            .await?
            .iter()
            .any(|member| normalize_email(&member.email) == email);
        Ok(is_member.then_some(account.id))
    }
}

#[async_trait]
impl AdvisorResolver for UncachedResolver {
    async fn resolve(&self, email: &str) -> Option<String> {
        match self.try_resolve(email).await {
            Ok(account_id) => account_id,
            Err(e) => {
                warn!("Advisor lookup for '{}' failed: {}", email, e);
                None
            }
        }
    }

    fn strategy(&self) -> &'static str {
        "uncached"
    }
}

/// Pick the resolution strategy for one job
pub async fn select_resolver(
    store: Arc<dyn RosterStore>,
    team_id: &str,
    caller_id: &str,
) -> Box<dyn AdvisorResolver> {
    match TeamRosterCache::load(store.as_ref(), team_id, caller_id).await {
        Ok(cache) => {
            debug!("Using cached advisor resolution for team {}", team_id);
            Box::new(CachedResolver::new(cache))
        }
        Err(e) => {
            warn!(
                "Roster cache for team {} could not be built, resolving advisors per row: {}",
                team_id, e
            );
            Box::new(UncachedResolver::new(store, team_id, caller_id))
        }
    }
}
