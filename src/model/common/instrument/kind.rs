use serde::{Deserialize, Serialize};

/// What sort of instrument a poll is.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstrumentKind {
    /// Pick exactly one option.
    SingleChoice,
    /// Pick any number of options.
    MultipleChoice,
    /// Order every option.
    Ranking,
    /// A tree of conditionally-branching questions.
    Survey,
}

impl InstrumentKind {
    /// The question type that a flat instrument's options behave like.
    /// Surveys have no single answer shape, so they return `None`.
    pub fn flat_question_type(self) -> Option<QuestionType> {
        match self {
            Self::SingleChoice => Some(QuestionType::SingleChoice),
            Self::MultipleChoice => Some(QuestionType::MultipleChoice),
            Self::Ranking => Some(QuestionType::Ordering),
            Self::Survey => None,
        }
    }

    pub fn is_survey(self) -> bool {
        self == Self::Survey
    }
}

/// The answer shape of a single survey question.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    Ordering,
}
