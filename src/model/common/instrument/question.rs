use serde::{Deserialize, Serialize};

use super::{AnswerId, QuestionId, QuestionType};

/// One selectable option of a flat poll, or one answer of a survey question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    /// Unique within its instrument (options) or question (answers).
    pub id: AnswerId,
    /// Display text.
    pub text: String,
    /// Dense 0-based rank, used for tie-breaks and default ordering.
    pub order: u32,
}

/// An option of a flat poll.
pub type PollOption = Choice;
/// An answer of a survey question.
pub type Answer = Choice;

/// A single survey question, stored flat with its parent links.
///
/// A question with `parent_id` set is only shown once the voter has picked
/// `parent_answer_id` on the parent question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub required: bool,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<QuestionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_answer_id: Option<AnswerId>,
    pub answers: Vec<Answer>,
}

impl Question {
    /// Get the answer with the given ID, if it belongs to this question.
    pub fn answer(&self, answer_id: AnswerId) -> Option<&Answer> {
        self.answers.iter().find(|a| a.id == answer_id)
    }
}
