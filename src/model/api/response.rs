use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::record::CanonicalRecord, db::ResponseRecord};

/// API-friendly representation of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDesc {
    #[serde(flatten)]
    pub record: CanonicalRecord,
    pub created_at: DateTime<Utc>,
}

impl From<ResponseRecord> for ResponseDesc {
    fn from(record: ResponseRecord) -> Self {
        Self {
            record: record.record,
            created_at: record.created_at,
        }
    }
}
