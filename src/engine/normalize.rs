//! Turning raw answer submissions into canonical records.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        instrument::{AnswerId, Choice, Question, QuestionId, QuestionType},
        record::CanonicalRecord,
    },
    db::Instrument,
};

/// An answer as submitted: either a single ID, or an array of IDs whose
/// meaning (selection or ordering) depends on the question type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAnswer {
    One(AnswerId),
    Many(Vec<AnswerId>),
}

/// One entry of a survey submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAnswer {
    pub question_id: QuestionId,
    pub answer: RawAnswer,
}

/// Normalise an answer to a survey question.
pub fn normalize(raw: &RawAnswer, question: &Question) -> Result<Vec<CanonicalRecord>> {
    normalize_choices(
        raw,
        question.question_type,
        question.required,
        &question.answers,
        Some(question.id),
    )
}

/// Normalise a vote on a flat instrument. Its options play the role of the
/// answers of a single implicit, required question.
pub fn normalize_flat(raw: &RawAnswer, instrument: &Instrument) -> Result<Vec<CanonicalRecord>> {
    let question_type = instrument.kind.flat_question_type().ok_or_else(|| {
        Error::ShapeMismatch(format!(
            "instrument {} is a survey; submit a survey response instead",
            instrument.id
        ))
    })?;
    normalize_choices(raw, question_type, true, &instrument.options, None)
}

fn normalize_choices(
    raw: &RawAnswer,
    question_type: QuestionType,
    required: bool,
    choices: &[Choice],
    question_id: Option<QuestionId>,
) -> Result<Vec<CanonicalRecord>> {
    let subject = describe(question_id);
    let known: HashSet<AnswerId> = choices.iter().map(|c| c.id).collect();
    let check_known = |id: &AnswerId| {
        if known.contains(id) {
            Ok(())
        } else {
            Err(Error::ShapeMismatch(format!(
                "answer {id} does not belong to {subject}"
            )))
        }
    };

    match (question_type, raw) {
        (QuestionType::SingleChoice, RawAnswer::One(id)) => {
            check_known(id)?;
            Ok(vec![CanonicalRecord::selection(question_id, *id)])
        }
        (QuestionType::MultipleChoice, RawAnswer::Many(ids)) => {
            ids.iter().try_for_each(check_known)?;
            let mut seen = HashSet::with_capacity(ids.len());
            let records: Vec<_> = ids
                .iter()
                .filter(|id| seen.insert(**id))
                .map(|id| CanonicalRecord::selection(question_id, *id))
                .collect();
            if records.is_empty() && required {
                return Err(Error::RequiredQuestionMissing(format!(
                    "{subject} needs at least one selection"
                )));
            }
            Ok(records)
        }
        (QuestionType::Ordering, RawAnswer::Many(ids)) => {
            ids.iter().try_for_each(check_known)?;
            let distinct: HashSet<AnswerId> = ids.iter().copied().collect();
            if distinct.len() != ids.len() || distinct.len() != known.len() {
                return Err(Error::IncompleteOrdering(format!(
                    "{subject} must order each of its {} answers exactly once",
                    known.len()
                )));
            }
            Ok(vec![CanonicalRecord::ordering(question_id, ids.clone())])
        }
        (question_type, raw) => Err(Error::ShapeMismatch(format!(
            "{} cannot answer {subject}, which is {question_type:?}",
            match raw {
                RawAnswer::One(_) => "a single ID",
                RawAnswer::Many(_) => "an array of IDs",
            }
        ))),
    }
}

fn describe(question_id: Option<QuestionId>) -> String {
    match question_id {
        Some(id) => format!("question {id}"),
        None => "the instrument".to_string(),
    }
}

/// Parse a ranking that the legacy system serialised into a free-text field,
/// e.g. `"[3, 1, 2]"` or `"3,1,2"`. Only used to migrate old exports.
pub fn parse_legacy_ordering(text: &str) -> Option<Vec<AnswerId>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.starts_with('[') {
        return rocket::serde::json::serde_json::from_str(text).ok();
    }
    text.split(',')
        .map(|part| part.trim().parse::<AnswerId>().ok())
        .collect()
}
