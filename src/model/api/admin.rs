use serde::{Deserialize, Serialize};

use crate::model::{
    auth::{hash_password, MIN_PASSWORD_LENGTH},
    db::admin::NewAdmin,
};

/// Raw admin credentials, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = String;

    /// Convert [`AdminCredentials`] to a new [`Admin`](crate::model::db::admin::Admin) by
    /// hashing the password. This enforces that the username is non-empty, and the password
    /// meets minimum length.
    fn try_from(cred: AdminCredentials) -> Result<Self, Self::Error> {
        let username = cred.username.trim().to_string();
        if username.is_empty() {
            return Err("Username is required".to_string());
        }
        if cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            ));
        }
        let password_hash = hash_password(&cred.password).map_err(|e| e.to_string())?;
        Ok(Self {
            username,
            password_hash,
        })
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCredentials {
        pub fn example() -> Self {
            Self {
                username: "adviser".into(),
                password: "council4lyfe".into(),
            }
        }

        pub fn empty() -> Self {
            Self {
                username: "".into(),
                password: "".into(),
            }
        }
    }
}
