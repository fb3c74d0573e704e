use serde::{Deserialize, Serialize};

use crate::engine::{
    normalize::{RawAnswer, SurveyAnswer},
    writer::{SubmitStatus, Submitted},
};
use crate::model::{api::response::ResponseDesc, common::instrument::VoterId, db::ResponseRecord};

/// A vote on a flat instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub voter_id: VoterId,
    pub raw: RawAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResult {
    pub status: SubmitStatus,
    pub response: Vec<ResponseDesc>,
}

impl From<Submitted> for VoteResult {
    fn from(submitted: Submitted) -> Self {
        Self {
            status: submitted.status,
            response: submitted.response.into_iter().map(Into::into).collect(),
        }
    }
}

/// A complete response to a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRequest {
    pub voter_id: VoterId,
    pub answers: Vec<SurveyAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResult {
    pub responses: Vec<ResponseDesc>,
}

impl From<Vec<ResponseRecord>> for SurveyResult {
    fn from(records: Vec<ResponseRecord>) -> Self {
        Self {
            responses: records.into_iter().map(Into::into).collect(),
        }
    }
}
