use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::{instrument::InstrumentId, record::CanonicalRecord, voter::VoterKey};

/// A canonical record as stored in the database: one row per selected option,
/// or one row per ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    /// Foreign Key instrument ID.
    pub instrument_id: InstrumentId,
    pub voter_key: VoterKey,
    #[serde(flatten)]
    pub record: CanonicalRecord,
    pub created_at: DateTime<Utc>,
}

impl ResponseRecord {
    pub fn new(
        instrument_id: InstrumentId,
        voter_key: VoterKey,
        record: CanonicalRecord,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            instrument_id,
            voter_key,
            record,
            created_at,
        }
    }
}

impl Deref for ResponseRecord {
    type Target = CanonicalRecord;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}

/// The first-response marker. There is at most one per `(instrument, voter)`,
/// enforced by a unique index, and it is what makes the duplicate check and
/// the write a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub instrument_id: InstrumentId,
    pub voter_key: VoterKey,
    /// When the voter first responded. The edit window runs from here and
    /// is not reset by replacements.
    pub first_created_at: DateTime<Utc>,
}
