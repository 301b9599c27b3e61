use serde::{Deserialize, Serialize};

/// `GET /projects/:id/repository/files/:file_path`
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryFile {
    pub file_name: String,
    pub file_path: String,
    pub size: i64,
    pub encoding: String,
    pub content: String,
    pub content_sha256: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub blob_id: String,
    pub commit_id: String,
    pub last_commit_id: String,
    #[serde(default)]
    pub execute_filemode: bool,
}

/// Answer to a create or update
#[derive(Debug, Clone, Deserialize)]
pub struct FileCommit {
    pub file_path: String,
    pub branch: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FileOptions {
    pub branch: String,
    pub commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execute_filemode: Option<bool>,
}
