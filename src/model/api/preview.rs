use serde::{Deserialize, Serialize};

use crate::engine::{normalize::SurveyAnswer, writer::Preview};
use crate::model::common::instrument::QuestionId;

/// In-progress answers to a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub answers: Vec<SurveyAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewDesc {
    /// Questions to show, in order.
    pub visible: Vec<QuestionId>,
    /// Questions whose answers should be discarded.
    pub dropped: Vec<QuestionId>,
}

impl From<Preview> for PreviewDesc {
    fn from(preview: Preview) -> Self {
        Self {
            visible: preview.visible,
            dropped: preview.dropped,
        }
    }
}
