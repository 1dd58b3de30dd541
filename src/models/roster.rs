use serde::{Deserialize, Serialize};

/// A platform account as seen by the roster resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    /// Team the account was assigned to, if any
    pub team_id: Option<String>,
    pub is_team_lead: bool,
}

/// An advisor listed on a team lead's roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub id: String,
    pub team_lead_id: String,
    pub email: String,
    pub name: Option<String>,
}
