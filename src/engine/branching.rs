//! Survey question trees and the resolution of which questions a voter sees.
//!
//! Questions are stored flat, each optionally gated on a `(parent_id,
//! parent_answer_id)` pair. [`QuestionTree`] loads them into an arena with an
//! adjacency index keyed by that pair, validating the structure on the way.

use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        instrument::{AnswerId, Question, QuestionId, QuestionType},
        record::{AnswerSet, CanonicalRecord},
    },
    db::validate_choices,
};

/// Whether multiple-choice questions may gate child questions.
///
/// With `FanOut`, selecting several answers opens every branch gated on any
/// of them. With `Disallowed`, questions parented to a multiple-choice
/// question are rejected when the survey is authored.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MultipleChoiceBranching {
    #[default]
    FanOut,
    Disallowed,
}

/// Authoring-time problems with a question tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),
    #[error("question {question} has invalid answers: {reason}")]
    InvalidAnswers {
        question: QuestionId,
        reason: String,
    },
    #[error("question {0} has a parent but no parent answer")]
    MissingParentAnswer(QuestionId),
    #[error("question {0} has a parent answer but no parent")]
    MissingParent(QuestionId),
    #[error("question {question} refers to unknown parent {parent}")]
    UnknownParent {
        question: QuestionId,
        parent: QuestionId,
    },
    #[error("question {question} is gated on answer {answer}, which question {parent} does not have")]
    UnknownParentAnswer {
        question: QuestionId,
        parent: QuestionId,
        answer: AnswerId,
    },
    #[error("question {question} is gated on ordering question {parent}, which cannot branch")]
    OrderingParent {
        question: QuestionId,
        parent: QuestionId,
    },
    #[error("question {question} is gated on multiple-choice question {parent}, but multiple-choice branching is disabled")]
    MultipleChoiceParent {
        question: QuestionId,
        parent: QuestionId,
    },
    #[error("question {0} is not reachable from any root question")]
    Cycle(QuestionId),
}

/// The result of dropping answers that no longer lie on a visible path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pruned {
    /// Answers to questions that are still visible.
    pub kept: AnswerSet,
    /// Questions whose answers were dropped, in ascending ID order.
    pub dropped: Vec<QuestionId>,
}

/// A validated question forest.
#[derive(Debug, Clone)]
pub struct QuestionTree {
    questions: HashMap<QuestionId, Question>,
    /// Root questions in display order.
    roots: Vec<QuestionId>,
    /// Children gated on each `(question, answer)`, in display order.
    children: HashMap<(QuestionId, AnswerId), Vec<QuestionId>>,
}

impl QuestionTree {
    /// Load and validate a flat list of questions.
    pub fn new(
        questions: &[Question],
        branching: MultipleChoiceBranching,
    ) -> std::result::Result<Self, StructureError> {
        let mut arena = HashMap::with_capacity(questions.len());
        for question in questions {
            validate_choices(&question.answers).map_err(|reason| {
                StructureError::InvalidAnswers {
                    question: question.id,
                    reason,
                }
            })?;
            if arena.insert(question.id, question.clone()).is_some() {
                return Err(StructureError::DuplicateQuestion(question.id));
            }
        }

        let mut roots = Vec::new();
        let mut children: HashMap<_, Vec<_>> = HashMap::new();
        for question in questions {
            match (question.parent_id, question.parent_answer_id) {
                (None, None) => roots.push(question.id),
                (Some(_), None) => return Err(StructureError::MissingParentAnswer(question.id)),
                (None, Some(_)) => return Err(StructureError::MissingParent(question.id)),
                (Some(parent_id), Some(answer_id)) => {
                    let parent =
                        arena
                            .get(&parent_id)
                            .ok_or(StructureError::UnknownParent {
                                question: question.id,
                                parent: parent_id,
                            })?;
                    if parent.answer(answer_id).is_none() {
                        return Err(StructureError::UnknownParentAnswer {
                            question: question.id,
                            parent: parent_id,
                            answer: answer_id,
                        });
                    }
                    match parent.question_type {
                        QuestionType::Ordering => {
                            return Err(StructureError::OrderingParent {
                                question: question.id,
                                parent: parent_id,
                            })
                        }
                        QuestionType::MultipleChoice
                            if branching == MultipleChoiceBranching::Disallowed =>
                        {
                            return Err(StructureError::MultipleChoiceParent {
                                question: question.id,
                                parent: parent_id,
                            })
                        }
                        _ => {}
                    }
                    children
                        .entry((parent_id, answer_id))
                        .or_default()
                        .push(question.id);
                }
            }
        }

        let mut tree = Self {
            questions: arena,
            roots,
            children,
        };
        let mut roots = std::mem::take(&mut tree.roots);
        tree.sort_by_order(&mut roots);
        tree.roots = roots;
        let mut children = std::mem::take(&mut tree.children);
        for siblings in children.values_mut() {
            tree.sort_by_order(siblings);
        }
        tree.children = children;

        // Every question has at most one parent, so anything not reachable
        // from a root must sit on (or below) a parent cycle.
        let reachable: HashSet<QuestionId> = tree.preorder().iter().map(|q| q.id).collect();
        let mut unreachable: Vec<_> = tree
            .questions
            .keys()
            .filter(|id| !reachable.contains(id))
            .copied()
            .collect();
        unreachable.sort_unstable();
        if let Some(id) = unreachable.first() {
            return Err(StructureError::Cycle(*id));
        }

        Ok(tree)
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.get(&id)
    }

    /// Every question, depth-first in display order, ignoring answers.
    pub fn preorder(&self) -> Vec<&Question> {
        let mut order = Vec::with_capacity(self.questions.len());
        let mut stack: Vec<QuestionId> = self.roots.iter().rev().copied().collect();
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            let Some(question) = self.questions.get(&id) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            order.push(question);
            let mut next: Vec<QuestionId> = question
                .answers
                .iter()
                .filter_map(|a| self.children.get(&(id, a.id)))
                .flatten()
                .copied()
                .collect();
            self.sort_by_order(&mut next);
            stack.extend(next.into_iter().rev());
        }
        order
    }

    /// The questions currently visible to a voter who has given `answers`,
    /// depth-first from each root in display order.
    ///
    /// A question is visible once its parent is visible and answered with its
    /// gating answer. Answers to questions that are not visible are ignored.
    pub fn visible_questions(&self, answers: &AnswerSet) -> Result<Vec<&Question>> {
        let mut visible = Vec::new();
        for root in &self.roots {
            self.visit(*root, answers, &mut visible)?;
        }
        Ok(visible)
    }

    fn visit<'a>(
        &'a self,
        id: QuestionId,
        answers: &AnswerSet,
        visible: &mut Vec<&'a Question>,
    ) -> Result<()> {
        let question = self
            .questions
            .get(&id)
            .ok_or_else(|| Error::Integrity(format!("question {id} missing from its tree")))?;
        visible.push(question);

        let records = match answers.get(&id) {
            Some(records) if !records.is_empty() => records,
            _ => return Ok(()),
        };
        let mut next: Vec<QuestionId> = selected_answers(question, records)?
            .into_iter()
            .filter_map(|answer| self.children.get(&(id, answer)))
            .flatten()
            .copied()
            .collect();
        self.sort_by_order(&mut next);
        for child in next {
            self.visit(child, answers, visible)?;
        }
        Ok(())
    }

    /// Drop answers to questions that are no longer visible. Because hidden
    /// questions never gate anything, this removes the whole subtree below a
    /// changed gating answer.
    pub fn prune(&self, mut answers: AnswerSet) -> Result<Pruned> {
        let visible: HashSet<QuestionId> = self
            .visible_questions(&answers)?
            .iter()
            .map(|q| q.id)
            .collect();
        let mut dropped: Vec<QuestionId> = answers
            .keys()
            .filter(|id| !visible.contains(id))
            .copied()
            .collect();
        dropped.sort_unstable();
        for id in &dropped {
            answers.remove(id);
        }
        if !dropped.is_empty() {
            debug!("Pruned answers to hidden questions {dropped:?}");
        }
        Ok(Pruned {
            kept: answers,
            dropped,
        })
    }

    fn sort_by_order(&self, ids: &mut [QuestionId]) {
        ids.sort_by_key(|id| (self.questions.get(id).map_or(u32::MAX, |q| q.order), *id));
    }
}

/// The answers a voter selected on `question`, which gate its children.
/// Orderings have no selected answer and gate nothing.
fn selected_answers(question: &Question, records: &[CanonicalRecord]) -> Result<Vec<AnswerId>> {
    if question.question_type == QuestionType::Ordering {
        return Ok(Vec::new());
    }
    let mut selected = Vec::with_capacity(records.len());
    for record in records {
        let answer = record
            .answer_id
            .filter(|_| record.question_id == Some(question.id))
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "record {record:?} is not a selection on question {}",
                    question.id
                ))
            })?;
        if question.answer(answer).is_none() {
            return Err(Error::Integrity(format!(
                "answer {answer} does not belong to question {}",
                question.id
            )));
        }
        if !selected.contains(&answer) {
            selected.push(answer);
        }
    }
    if question.question_type == QuestionType::SingleChoice && selected.len() > 1 {
        return Err(Error::Integrity(format!(
            "single-choice question {} has {} selected answers",
            question.id,
            selected.len()
        )));
    }
    Ok(selected)
}
