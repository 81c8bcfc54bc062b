use serde::{Deserialize, Serialize};

/// The authenticated user record the server returns alongside a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Response of `POST /auth/refresh-token`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<AuthUser>,
}
