#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, OracleFairing, StoreFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod oracle;
pub mod store;

/// Build the server. Configuration, the response store and the identity
/// oracle are all set up by fairings at ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(OracleFairing)
}

/// A voter the test oracle refuses to verify.
#[cfg(test)]
pub(crate) const UNVERIFIED_VOTER: &str = "unverified";

/// Build a server over the given in-memory store, with the example config
/// and an oracle that verifies everybody except [`UNVERIFIED_VOTER`].
#[cfg(test)]
pub(crate) fn rocket_for_store(store: store::MemoryStore) -> Rocket<Build> {
    use std::sync::Arc;

    let store: store::Store = Arc::new(store);
    let oracle: oracle::Oracle = Arc::new(oracle::StaticOracle::allow_all().deny(UNVERIFIED_VOTER));
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .manage(config::Config::example())
        .manage(store)
        .manage(oracle)
}
