//! The identity oracle, consulted before any write to check that a voter is
//! who they claim to be.

use std::{collections::HashSet, sync::Arc, time::Duration};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::common::instrument::VoterId;

/// The oracle held in Rocket's managed state.
pub type Oracle = Arc<dyn IdentityOracle>;

#[rocket::async_trait]
pub trait IdentityOracle: Send + Sync {
    /// Is the voter's identity verified? A `false` answer is a denial the
    /// caller must surface; an `Err` means the oracle could not be asked.
    async fn verify(&self, voter_id: &str) -> Result<bool>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    voter_id: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    verified: bool,
}

/// An oracle reached over HTTP: `POST <url>` with `{"voterId": ...}`,
/// answered with `{"verified": bool}`.
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpOracle {
    pub fn new(url: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[rocket::async_trait]
impl IdentityOracle for HttpOracle {
    async fn verify(&self, voter_id: &str) -> Result<bool> {
        let response: VerifyResponse = self
            .client
            .post(&self.url)
            .json(&VerifyRequest { voter_id })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Identity oracle verified={} for voter", response.verified);
        Ok(response.verified)
    }
}

/// An oracle with a fixed answer: everybody is verified except the voters
/// explicitly denied. Used when no oracle is configured, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    denied: HashSet<VoterId>,
}

impl StaticOracle {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny(mut self, voter_id: impl Into<VoterId>) -> Self {
        self.denied.insert(voter_id.into());
        self
    }
}

#[rocket::async_trait]
impl IdentityOracle for StaticOracle {
    async fn verify(&self, voter_id: &str) -> Result<bool> {
        Ok(!self.denied.contains(voter_id))
    }
}
