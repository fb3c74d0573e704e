use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::common::instrument::{AnswerId, QuestionId};

/// The normalised representation of one voter's answer to one question or option.
///
/// Exactly one of `answer_id` and `ordered_value` is set. `question_id` is
/// `None` for flat instruments, whose options are not grouped into questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub question_id: Option<QuestionId>,
    pub answer_id: Option<AnswerId>,
    pub ordered_value: Option<Vec<AnswerId>>,
}

impl CanonicalRecord {
    /// A record selecting a single answer.
    pub fn selection(question_id: Option<QuestionId>, answer_id: AnswerId) -> Self {
        Self {
            question_id,
            answer_id: Some(answer_id),
            ordered_value: None,
        }
    }

    /// A record holding a complete ordering.
    pub fn ordering(question_id: Option<QuestionId>, ordered_value: Vec<AnswerId>) -> Self {
        Self {
            question_id,
            answer_id: None,
            ordered_value: Some(ordered_value),
        }
    }
}

/// The canonical records of an in-progress survey response, grouped by question.
pub type AnswerSet = HashMap<QuestionId, Vec<CanonicalRecord>>;
