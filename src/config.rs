use std::sync::Arc;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::engine::branching::MultipleChoiceBranching;
use crate::model::{common::voter::VoterKey, mongodb::ensure_indexes_exist};
use crate::oracle::{HttpOracle, Oracle, StaticOracle};
use crate::store::{MemoryStore, MongoStore, Store};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default)]
    multiple_choice_branching: MultipleChoiceBranching,
    // secrets
    voter_key_secret: String,
}

impl Config {
    /// Whether multiple-choice questions may gate survey branches.
    pub fn multiple_choice_branching(&self) -> MultipleChoiceBranching {
        self.multiple_choice_branching
    }

    /// Secret key used to derive stored voter keys.
    pub fn voter_key_secret(&self) -> &[u8] {
        self.voter_key_secret.as_bytes()
    }

    /// The key under which a voter's responses are stored.
    pub fn voter_key(&self, voter_id: &str) -> VoterKey {
        VoterKey::derive(voter_id, self.voter_key_secret())
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
        info!(
            "Multiple-choice branching: {:?}",
            config.multiple_choice_branching()
        );

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which response store backs the server.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoreKind {
    #[default]
    Mongodb,
    Memory,
}

/// Configuration for the response store.
#[derive(Deserialize)]
struct StoreConfig {
    // non-secrets
    #[serde(default)]
    store: StoreKind,
    // secrets
    db_uri: Option<String>,
}

/// A fairing that loads the store config, connects to the database if there
/// is one, performs any setup necessary, and places a [`Store`] into managed
/// state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Response store",
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

        let store: Store = match config.store {
            StoreKind::Memory => {
                warn!("Using the in-memory store; responses will not survive a restart");
                Arc::new(MemoryStore::new())
            }
            StoreKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set to use the mongodb store");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                // Construct the connection.
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(DATABASE_NAME);

                // Ensure the required indexes exist.
                if let Err(e) = ensure_indexes_exist(&db).await {
                    error!("Failed to connect to database: {e}");
                    return Err(rocket);
                }
                info!("...database connection online!");
                Arc::new(MongoStore::new(client, &db))
            }
        };

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Name of the database holding instruments and responses.
const DATABASE_NAME: &str = "geopoll";

/// Configuration for the identity oracle.
#[derive(Deserialize)]
struct OracleConfig {
    // non-secrets
    identity_oracle_url: Option<String>,
}

/// A fairing that places an [`Oracle`] into managed state: the HTTP oracle
/// if one is configured, otherwise one that verifies everybody.
pub struct OracleFairing;

#[rocket::async_trait]
impl Fairing for OracleFairing {
    fn info(&self) -> Info {
        Info {
            name: "Identity oracle",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<OracleConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load identity oracle config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let oracle: Oracle = match config.identity_oracle_url {
            Some(url) => match HttpOracle::new(&url) {
                Ok(oracle) => {
                    info!("Using identity oracle at {url}");
                    Arc::new(oracle)
                }
                Err(e) => {
                    error!("Failed to construct identity oracle client: {e}");
                    return Err(rocket);
                }
            },
            None => {
                warn!("No `identity_oracle_url` set; every voter will be treated as verified");
                Arc::new(StaticOracle::allow_all())
            }
        };

        // Manage the state.
        rocket = rocket.manage(oracle);
        Ok(rocket)
    }
}
