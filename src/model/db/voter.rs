use serde::{Deserialize, Serialize};

use crate::model::common::instrument::{VoterId, VoterLocation};

/// A voter's last known location, written by the location service.
///
/// This collection belongs to the location service and is keyed by its
/// voter ID. Response data is only ever keyed by [`VoterKey`].
///
/// [`VoterKey`]: crate::model::common::voter::VoterKey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterProfile {
    #[serde(rename = "_id")]
    pub voter_id: VoterId,
    pub location: VoterLocation,
}
