use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SharedGroup {
    pub group_id: i64,
    pub group_name: String,
    pub group_access_level: i64,
}

/// The parts of `GET /projects/:id` the provider reads
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: i64,
    #[serde(default)]
    pub shared_with_groups: Vec<SharedGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareWithGroupOptions {
    pub group_id: i64,
    pub group_access: i64,
}
