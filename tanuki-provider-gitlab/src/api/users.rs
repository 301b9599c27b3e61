use serde::Deserialize;

/// `GET /user`, used to verify the token at startup
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}
