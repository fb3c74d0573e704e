use std::fmt::{Display, Formatter};

use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub type HmacSha256 = Hmac<Sha256>;

/// The key under which a voter's responses are stored: the HMAC of their
/// external voter ID, hex encoded. Raw voter IDs never reach the database.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterKey(String);

impl VoterKey {
    /// Derive the key for a voter ID.
    pub fn derive(voter_id: &str, secret: &[u8]) -> Self {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take a key of any size");
        mac.update(voter_id.as_bytes());
        Self(HEXLOWER.encode(&mac.finalize().into_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VoterKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&VoterKey> for Bson {
    fn from(key: &VoterKey) -> Self {
        Bson::String(key.0.clone())
    }
}
