use std::ops::{Deref, DerefMut};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::model::{api::admin::AdminCredentials, mongodb::Id};
use crate::store::{Store, StoreResult};

/// Core admin user data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        crate::model::auth::verify_password(&self.password_hash, password)
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// If no administrator exists, create the default one from the config, so
/// that a fresh deployment can be managed at all.
pub async fn ensure_admin_exists(store: &dyn Store, config: &Config) -> StoreResult<()> {
    if store.count_admins().await? > 0 {
        return Ok(());
    }

    let credentials = AdminCredentials {
        username: config.default_admin_username().to_string(),
        password: config.default_admin_password().to_string(),
    };
    match NewAdmin::try_from(credentials) {
        Ok(admin) => {
            store.insert_admin(admin).await?;
            info!(
                "Created default administrator '{}'",
                config.default_admin_username()
            );
        }
        Err(_) => warn!("Default administrator credentials are unacceptable; none created"),
    }
    Ok(())
}
