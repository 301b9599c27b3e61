use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cluster agent token; `token` is only present in the create response
#[derive(Debug, Clone, Deserialize)]
pub struct AgentToken {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub agent_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub created_by_user_id: i64,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentTokenOptions {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
