//! Aggregation of stored canonical records into per-option statistics.

use std::{
    collections::{HashMap, HashSet},
    fmt::{Display, Formatter},
};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::engine::branching::{MultipleChoiceBranching, QuestionTree};
use crate::error::{Error, Result};
use crate::model::{
    common::{
        instrument::{AnswerId, Choice, InstrumentKind, QuestionId, QuestionType},
        voter::VoterKey,
    },
    db::{Instrument, ResponseRecord},
};

/// Results of a whole instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Tally {
    SingleChoice(ChoiceTally),
    MultipleChoice(ChoiceTally),
    Ranking(RankingTally),
    Survey { questions: Vec<QuestionTally> },
}

/// Distinct-voter counts for a single- or multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceTally {
    /// Voters who selected at least one option. This is the percentage
    /// denominator, so a voter picking several options still counts once.
    pub total_voters: u64,
    /// In option order.
    pub options: Vec<OptionCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionCount {
    pub option_id: AnswerId,
    pub text: String,
    pub count: u64,
    pub percentage: f64,
}

/// Positional scores for a ranking instrument or ordering question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingTally {
    pub total_responses: u64,
    /// By descending score, ties in option order.
    pub options: Vec<RankedOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedOption {
    pub option_id: AnswerId,
    pub text: String,
    /// Sum over responses of `option_count - 1 - position`, so first place
    /// earns `option_count - 1` points and last place none.
    pub score: u64,
    /// Mean 1-based position, or 0 if nobody ranked it.
    pub average_rank: f64,
    pub percentage: f64,
}

/// Results of one survey question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTally {
    pub question_id: QuestionId,
    pub text: String,
    #[serde(flatten)]
    pub results: QuestionResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QuestionResults {
    SingleChoice(ChoiceTally),
    MultipleChoice(ChoiceTally),
    Ordering(RankingTally),
}

/// Tally all `records` of `instrument`. Records belonging to other
/// instruments must already have been filtered out.
pub fn tally(instrument: &Instrument, records: &[ResponseRecord]) -> Result<Tally> {
    let flat = || records.iter().filter(|r| r.question_id.is_none());
    Ok(match instrument.kind {
        InstrumentKind::SingleChoice => {
            Tally::SingleChoice(count_choices(&instrument.options, flat()))
        }
        InstrumentKind::MultipleChoice => {
            Tally::MultipleChoice(count_choices(&instrument.options, flat()))
        }
        InstrumentKind::Ranking => Tally::Ranking(score_orderings(&instrument.options, flat())),
        InstrumentKind::Survey => {
            // Stored trees were validated on write; fan-out accepts any tree
            // the stricter policy does.
            let tree = QuestionTree::new(&instrument.questions, MultipleChoiceBranching::FanOut)
                .map_err(|e| {
                    Error::Integrity(format!("stored survey {} is malformed: {e}", instrument.id))
                })?;
            let mut by_question: HashMap<QuestionId, Vec<&ResponseRecord>> = HashMap::new();
            for record in records {
                if let Some(question_id) = record.question_id {
                    by_question.entry(question_id).or_default().push(record);
                }
            }
            let questions = tree
                .preorder()
                .into_iter()
                .map(|question| {
                    let records = by_question.remove(&question.id).unwrap_or_default();
                    let records = records.into_iter();
                    let results = match question.question_type {
                        QuestionType::SingleChoice => {
                            QuestionResults::SingleChoice(count_choices(&question.answers, records))
                        }
                        QuestionType::MultipleChoice => QuestionResults::MultipleChoice(
                            count_choices(&question.answers, records),
                        ),
                        QuestionType::Ordering => {
                            QuestionResults::Ordering(score_orderings(&question.answers, records))
                        }
                    };
                    QuestionTally {
                        question_id: question.id,
                        text: question.text.clone(),
                        results,
                    }
                })
                .collect();
            for question_id in by_question.keys() {
                warn!(
                    "Survey {} has responses to unknown question {question_id}",
                    instrument.id
                );
            }
            Tally::Survey { questions }
        }
    })
}

fn count_choices<'a>(
    choices: &[Choice],
    records: impl Iterator<Item = &'a ResponseRecord>,
) -> ChoiceTally {
    let mut voters: HashMap<AnswerId, HashSet<&VoterKey>> =
        choices.iter().map(|c| (c.id, HashSet::new())).collect();
    let mut all_voters = HashSet::new();
    for record in records {
        let Some(answer_id) = record.answer_id else {
            warn!("Skipping non-selection record in choice tally: {record:?}");
            continue;
        };
        match voters.get_mut(&answer_id) {
            Some(option_voters) => {
                option_voters.insert(&record.voter_key);
                all_voters.insert(&record.voter_key);
            }
            None => warn!("Skipping record for unknown option {answer_id}"),
        }
    }

    let total_voters = all_voters.len() as u64;
    let mut options: Vec<&Choice> = choices.iter().collect();
    options.sort_by_key(|c| c.order);
    ChoiceTally {
        total_voters,
        options: options
            .into_iter()
            .map(|choice| {
                let count = voters.get(&choice.id).map_or(0, |v| v.len() as u64);
                OptionCount {
                    option_id: choice.id,
                    text: choice.text.clone(),
                    count,
                    percentage: percentage(count as f64, total_voters as f64),
                }
            })
            .collect(),
    }
}

fn score_orderings<'a>(
    choices: &[Choice],
    records: impl Iterator<Item = &'a ResponseRecord>,
) -> RankingTally {
    let option_count = choices.len();
    let option_ids: HashSet<AnswerId> = choices.iter().map(|c| c.id).collect();
    // Per option: (score, sum of 1-based positions, times ranked).
    let mut stats: HashMap<AnswerId, (u64, u64, u64)> =
        choices.iter().map(|c| (c.id, (0, 0, 0))).collect();
    let mut total_responses = 0u64;

    for record in records {
        let Some(ordering) = &record.ordered_value else {
            warn!("Skipping non-ordering record in ranking tally: {record:?}");
            continue;
        };
        let distinct: HashSet<AnswerId> = ordering.iter().copied().collect();
        if ordering.len() != option_count || distinct != option_ids {
            warn!("Skipping ranking that is not a permutation of the options: {ordering:?}");
            continue;
        }
        total_responses += 1;
        for (position, option_id) in ordering.iter().enumerate() {
            if let Some((score, rank_sum, ranked)) = stats.get_mut(option_id) {
                *score += (option_count - 1 - position) as u64;
                *rank_sum += position as u64 + 1;
                *ranked += 1;
            }
        }
    }

    let mut options: Vec<&Choice> = choices.iter().collect();
    options.sort_by_key(|c| c.order);
    let mut options: Vec<RankedOption> = options
        .into_iter()
        .map(|choice| {
            let (score, rank_sum, ranked) = stats.get(&choice.id).copied().unwrap_or_default();
            RankedOption {
                option_id: choice.id,
                text: choice.text.clone(),
                score,
                average_rank: if ranked == 0 {
                    0.0
                } else {
                    round2(rank_sum as f64 / ranked as f64)
                },
                percentage: percentage(
                    score as f64,
                    total_responses as f64 * option_count as f64,
                ),
            }
        })
        .collect();
    // Stable, so equal scores stay in option order.
    options.sort_by(|a, b| b.score.cmp(&a.score));

    RankingTally {
        total_responses,
        options,
    }
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        round2(part / whole * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Display for ChoiceTally {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} voter(s)", self.total_voters)?;
        for option in &self.options {
            writeln!(
                f,
                "  {}: {} ({:.2}%)",
                option.text, option.count, option.percentage
            )?;
        }
        Ok(())
    }
}

impl Display for RankingTally {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} response(s)", self.total_responses)?;
        for (place, option) in self.options.iter().enumerate() {
            writeln!(
                f,
                "  {}. {}: score {}, average rank {:.2} ({:.2}%)",
                place + 1,
                option.text,
                option.score,
                option.average_rank,
                option.percentage
            )?;
        }
        Ok(())
    }
}

impl Display for Tally {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleChoice(tally) | Self::MultipleChoice(tally) => write!(f, "{tally}"),
            Self::Ranking(tally) => write!(f, "{tally}"),
            Self::Survey { questions } => {
                for question in questions {
                    write!(f, "Q{} {}: ", question.question_id, question.text)?;
                    match &question.results {
                        QuestionResults::SingleChoice(tally)
                        | QuestionResults::MultipleChoice(tally) => write!(f, "{tally}")?,
                        QuestionResults::Ordering(tally) => write!(f, "{tally}")?,
                    }
                }
                Ok(())
            }
        }
    }
}
