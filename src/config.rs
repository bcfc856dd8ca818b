use chrono::Duration;
use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::db::admin::ensure_admin_exists;
use crate::store::{Db, MemoryStore, MongoStore};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    default_admin_username: String,
    // secrets
    jwt_secret: String,
    default_admin_password: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Username of the administrator created when there are none.
    pub fn default_admin_username(&self) -> &str {
        &self.default_admin_username
    }

    /// Password of the administrator created when there are none.
    pub fn default_admin_password(&self) -> &str {
        &self.default_admin_password
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Mongodb,
    Memory,
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    store: StoreKind,
    // secrets
    db_uri: Option<String>,
    db_name: Option<String>,
}

/// A fairing that loads the store config, connects to the store, performs
/// any setup necessary, and places a [`Db`] handle into managed state.
///
/// Must be attached after [`ConfigFairing`].
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Construct the connection.
        let db = match config.store {
            StoreKind::Memory => {
                info!("Using in-memory store, data will not persist");
                Db::new(MemoryStore::new())
            }
            StoreKind::Mongodb => {
                let (Some(uri), Some(name)) = (config.db_uri, config.db_name) else {
                    error!("`db_uri` and `db_name` must be set for the MongoDB store");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&uri, &name).await {
                    Ok(store) => Db::new(store),
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        // Ensure there is at least one admin user.
        let Some(app_config) = rocket.state::<Config>() else {
            error!("Store fairing attached before config fairing");
            return Err(rocket);
        };
        let setup = ensure_admin_exists(&*db, app_config).await;
        if let Err(e) = setup {
            error!("Failed to set up the store: {e}");
            return Err(rocket);
        }
        info!("...store online!");

        // Manage the state.
        rocket = rocket.manage(db);
        Ok(rocket)
    }
}
