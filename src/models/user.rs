use serde::{Deserialize, Serialize};

/// Public view of an account.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// What the store keeps for an account.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredUser {
    #[serde(flatten)]
    pub user: User,
    pub password_hash: String,
    #[serde(default)]
    pub jobs: Vec<String>,  // job ids, oldest first
}

impl StoredUser {
    pub fn email(&self) -> &str {
        &self.user.email
    }
}
