//! Admission and persistence of votes and survey responses.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::engine::{
    branching::{Pruned, QuestionTree},
    geo::{self, Eligibility},
    normalize::{normalize, normalize_flat, RawAnswer, SurveyAnswer},
};
use crate::error::{Error, Result};
use crate::model::{
    common::{
        instrument::{InstrumentId, Question, QuestionId, VoterLocation},
        record::AnswerSet,
    },
    db::{Instrument, ResponseRecord, Submission},
};
use crate::oracle::IdentityOracle;
use crate::store::{FirstWrite, ResponseStore};

/// Whether a flat-instrument vote was new or replaced an earlier one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    Created,
    Replaced,
}

/// The outcome of [`ResponseWriter::submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub status: SubmitStatus,
    /// The voter's records as now stored.
    pub response: Vec<ResponseRecord>,
}

/// What a voter with some in-progress survey answers should be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// Visible questions in display order.
    pub visible: Vec<QuestionId>,
    /// Answered questions that are no longer reachable.
    pub dropped: Vec<QuestionId>,
}

/// Checks submissions against an instrument and writes them to a store.
///
/// The writer holds no state of its own between calls; everything it knows
/// comes from the store.
pub struct ResponseWriter<'a> {
    store: &'a dyn ResponseStore,
    oracle: &'a dyn IdentityOracle,
    config: &'a Config,
}

impl<'a> ResponseWriter<'a> {
    pub fn new(
        store: &'a dyn ResponseStore,
        oracle: &'a dyn IdentityOracle,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            oracle,
            config,
        }
    }

    async fn instrument(&self, instrument_id: InstrumentId) -> Result<Instrument> {
        let instrument = self
            .store
            .instrument(instrument_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Instrument {instrument_id}")))?;
        instrument.validate().map_err(Error::Integrity)?;
        Ok(instrument)
    }

    fn question_tree(&self, survey: &Instrument) -> Result<QuestionTree> {
        QuestionTree::new(&survey.questions, self.config.multiple_choice_branching()).map_err(
            |e| Error::Integrity(format!("stored survey {} is malformed: {e}", survey.id)),
        )
    }

    async fn evaluate(&self, instrument: &Instrument, voter_id: &str) -> Result<Eligibility> {
        let location = self
            .store
            .voter_location(voter_id)
            .await?
            .unwrap_or_else(VoterLocation::unknown);
        let eligibility = geo::evaluate(
            &instrument.location_policy,
            &location,
            instrument.is_owner(voter_id),
        );
        debug!("Eligibility for instrument {}: {eligibility:?}", instrument.id);
        Ok(eligibility)
    }

    /// Is the voter geographically eligible to respond?
    pub async fn eligibility(
        &self,
        instrument_id: InstrumentId,
        voter_id: &str,
    ) -> Result<Eligibility> {
        let instrument = self.instrument(instrument_id).await?;
        self.evaluate(&instrument, voter_id).await
    }

    /// Everything that must hold before a voter's answers are even looked at.
    async fn admit(
        &self,
        instrument: &Instrument,
        voter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !instrument.is_open(now) {
            return Err(Error::InstrumentClosed(instrument.id));
        }
        if !self.oracle.verify(voter_id).await? {
            return Err(Error::IdentityUnverified);
        }
        match self.evaluate(instrument, voter_id).await? {
            Eligibility::Eligible { .. } => Ok(()),
            Eligibility::Ineligible(reason) => Err(Error::NotEligible(reason)),
        }
    }

    /// Cast or replace a vote on a flat instrument.
    ///
    /// A second vote inside the edit window atomically replaces the first;
    /// the window runs from the first vote and is not extended by replacing.
    pub async fn submit(
        &self,
        instrument_id: InstrumentId,
        voter_id: &str,
        raw: &RawAnswer,
        now: DateTime<Utc>,
    ) -> Result<Submitted> {
        let instrument = self.instrument(instrument_id).await?;
        if instrument.kind.is_survey() {
            return Err(Error::ShapeMismatch(format!(
                "instrument {instrument_id} is a survey; submit a survey response instead"
            )));
        }
        self.admit(&instrument, voter_id, now).await?;

        let voter_key = self.config.voter_key(voter_id);
        let response: Vec<ResponseRecord> = normalize_flat(raw, &instrument)?
            .into_iter()
            .map(|record| ResponseRecord::new(instrument_id, voter_key.clone(), record, now))
            .collect();
        let marker = Submission {
            instrument_id,
            voter_key: voter_key.clone(),
            first_created_at: now,
        };

        let status = match self.store.insert_first(marker, response.clone()).await? {
            FirstWrite::Inserted => SubmitStatus::Created,
            FirstWrite::Conflict(existing) => {
                if now - existing.first_created_at > instrument.edit_window() {
                    return Err(Error::EditWindowExpired);
                }
                self.store
                    .replace_responses(instrument_id, &voter_key, response.clone())
                    .await?;
                SubmitStatus::Replaced
            }
        };
        info!("Vote {status:?} on instrument {instrument_id}");
        Ok(Submitted { status, response })
    }

    /// Normalise survey answers into an [`AnswerSet`], checking that each
    /// question exists and is answered at most once.
    ///
    /// Answers that fail to normalise are returned separately with their
    /// error. They only count against the voter if their question turns out
    /// to be visible; an answer to a hidden question is unknown regardless
    /// of its shape.
    fn answer_set(
        &self,
        tree: &QuestionTree,
        answers: &[SurveyAnswer],
    ) -> Result<(AnswerSet, HashMap<QuestionId, Error>)> {
        let mut set = HashMap::with_capacity(answers.len());
        let mut rejected = HashMap::new();
        for answer in answers {
            let question = tree
                .question(answer.question_id)
                .ok_or(Error::UnknownQuestion(answer.question_id))?;
            if set.contains_key(&question.id) || rejected.contains_key(&question.id) {
                return Err(Error::ShapeMismatch(format!(
                    "question {} is answered more than once",
                    question.id
                )));
            }
            match normalize(&answer.answer, question) {
                Ok(records) => {
                    set.insert(question.id, records);
                }
                Err(e) => {
                    rejected.insert(question.id, e);
                }
            }
        }
        Ok((set, rejected))
    }

    /// Record a voter's one and only response to a survey.
    ///
    /// Visibility is recomputed from the answers themselves: every answer
    /// must be to a question that is visible, and every visible required
    /// question must be answered.
    pub async fn respond(
        &self,
        instrument_id: InstrumentId,
        voter_id: &str,
        answers: &[SurveyAnswer],
        now: DateTime<Utc>,
    ) -> Result<Vec<ResponseRecord>> {
        let survey = self.instrument(instrument_id).await?;
        if !survey.kind.is_survey() {
            return Err(Error::ShapeMismatch(format!(
                "instrument {instrument_id} is not a survey; submit a vote instead"
            )));
        }
        self.admit(&survey, voter_id, now).await?;

        let tree = self.question_tree(&survey)?;
        let (mut answer_set, mut rejected) = self.answer_set(&tree, answers)?;
        let visible = tree.visible_questions(&answer_set)?;
        if let Some(err) = visible.iter().find_map(|q| rejected.remove(&q.id)) {
            return Err(err);
        }

        let visible_ids: HashSet<QuestionId> = visible.iter().map(|q| q.id).collect();
        let mut hidden: Vec<QuestionId> = answer_set
            .keys()
            .chain(rejected.keys())
            .filter(|id| !visible_ids.contains(id))
            .copied()
            .collect();
        hidden.sort_unstable();
        if let Some(id) = hidden.first() {
            return Err(Error::UnknownQuestion(*id));
        }
        if let Some(missing) = visible.iter().find(|q| {
            q.required && answer_set.get(&q.id).map_or(true, |records| records.is_empty())
        }) {
            return Err(Error::RequiredQuestionMissing(format!(
                "question {} must be answered",
                missing.id
            )));
        }

        let voter_key = self.config.voter_key(voter_id);
        let records: Vec<ResponseRecord> = visible
            .iter()
            .filter_map(|q| answer_set.remove(&q.id))
            .flatten()
            .map(|record| ResponseRecord::new(instrument_id, voter_key.clone(), record, now))
            .collect();
        let marker = Submission {
            instrument_id,
            voter_key,
            first_created_at: now,
        };

        match self.store.insert_first(marker, records.clone()).await? {
            FirstWrite::Inserted => {
                info!(
                    "Survey response with {} record(s) on instrument {instrument_id}",
                    records.len()
                );
                Ok(records)
            }
            FirstWrite::Conflict(_) => Err(Error::AlreadyResponded(instrument_id)),
        }
    }

    /// Work out what a voter with the given in-progress answers should see,
    /// and which of their answers no longer apply. Nothing is written.
    pub async fn preview(
        &self,
        instrument_id: InstrumentId,
        answers: &[SurveyAnswer],
    ) -> Result<Preview> {
        let survey = self.instrument(instrument_id).await?;
        if !survey.kind.is_survey() {
            return Err(Error::ShapeMismatch(format!(
                "instrument {instrument_id} is not a survey"
            )));
        }
        let tree = self.question_tree(&survey)?;
        let (answer_set, mut rejected) = self.answer_set(&tree, answers)?;
        let Pruned { kept, mut dropped } = tree.prune(answer_set)?;
        let visible = tree.visible_questions(&kept)?;
        if let Some(err) = visible.iter().find_map(|q| rejected.remove(&q.id)) {
            return Err(err);
        }
        dropped.extend(rejected.into_keys());
        dropped.sort_unstable();
        Ok(Preview {
            visible: visible.into_iter().map(|q| q.id).collect(),
            dropped,
        })
    }

    /// Replace a survey's question tree. Only allowed until the first response.
    pub async fn replace_questions(
        &self,
        instrument_id: InstrumentId,
        questions: Vec<Question>,
    ) -> Result<()> {
        let survey = self.instrument(instrument_id).await?;
        if !survey.kind.is_survey() {
            return Err(Error::InvalidStructure(format!(
                "instrument {instrument_id} is not a survey"
            )));
        }
        // Instruments stored before the lock flag existed only have markers.
        if survey.responded || self.store.has_responses(instrument_id).await? {
            return Err(Error::StructureLocked(instrument_id));
        }
        if questions.is_empty() {
            return Err(Error::InvalidStructure("a survey needs questions".to_string()));
        }
        QuestionTree::new(&questions, self.config.multiple_choice_branching())
            .map_err(|e| Error::InvalidStructure(e.to_string()))?;
        self.store.replace_questions(instrument_id, questions).await?;
        info!("Replaced the questions of survey {instrument_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::engine::geo::IneligibleReason;
    use crate::model::{
        common::{instrument::QuestionType, record::CanonicalRecord},
        db::CREATOR,
    };
    use crate::oracle::StaticOracle;
    use crate::store::MemoryStore;

    const VOTER: &str = "voter";
    const UNVERIFIED: &str = "unverified";

    struct Fixture {
        store: MemoryStore,
        oracle: StaticOracle,
        config: Config,
    }

    impl Fixture {
        async fn with(instrument: Instrument) -> Self {
            let store = MemoryStore::new();
            store.insert_instrument(instrument).await;
            store
                .set_voter_location(VOTER, VoterLocation::inside_example())
                .await;
            store
                .set_voter_location(UNVERIFIED, VoterLocation::inside_example())
                .await;
            Self {
                store,
                oracle: StaticOracle::allow_all().deny(UNVERIFIED),
                config: Config::example(),
            }
        }

        fn writer(&self) -> ResponseWriter<'_> {
            ResponseWriter::new(&self.store, &self.oracle, &self.config)
        }

        async fn stored(&self, instrument_id: InstrumentId) -> Vec<CanonicalRecord> {
            self.store
                .read_responses(instrument_id, None)
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.record)
                .collect()
        }
    }

    fn answer(question_id: QuestionId, answer: RawAnswer) -> SurveyAnswer {
        SurveyAnswer {
            question_id,
            answer,
        }
    }

    #[rocket::async_test]
    async fn vote_then_replace_inside_window() {
        let fixture = Fixture::with(Instrument::multiple_choice_example(1)).await;
        let writer = fixture.writer();
        let start = Utc::now();

        let first = writer
            .submit(1, VOTER, &RawAnswer::Many(vec![1, 3, 3]), start)
            .await
            .unwrap();
        assert_eq!(first.status, SubmitStatus::Created);
        assert_eq!(first.response.len(), 2);

        let again = writer
            .submit(1, VOTER, &RawAnswer::Many(vec![1, 3]), start + Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(again.status, SubmitStatus::Replaced);
        assert_eq!(
            fixture.stored(1).await,
            vec![
                CanonicalRecord::selection(None, 1),
                CanonicalRecord::selection(None, 3)
            ]
        );

        let changed = writer
            .submit(1, VOTER, &RawAnswer::Many(vec![5]), start + Duration::minutes(60))
            .await
            .unwrap();
        assert_eq!(changed.status, SubmitStatus::Replaced);
        assert_eq!(fixture.stored(1).await, vec![CanonicalRecord::selection(None, 5)]);

        let late = writer
            .submit(1, VOTER, &RawAnswer::Many(vec![2]), start + Duration::minutes(61))
            .await;
        assert!(matches!(late, Err(Error::EditWindowExpired)));
        assert_eq!(fixture.stored(1).await, vec![CanonicalRecord::selection(None, 5)]);
    }

    #[rocket::async_test]
    async fn concurrent_first_votes_insert_once() {
        let fixture = Fixture::with(Instrument::single_choice_example(1)).await;
        let writer = fixture.writer();
        let now = Utc::now();
        let (yes, no) = (RawAnswer::One(1), RawAnswer::One(2));

        let (first, second) = rocket::tokio::join!(
            writer.submit(1, VOTER, &yes, now),
            writer.submit(1, VOTER, &no, now)
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        let (created, replaced) = match (first.status, second.status) {
            (SubmitStatus::Created, SubmitStatus::Replaced) => (first, second),
            (SubmitStatus::Replaced, SubmitStatus::Created) => (second, first),
            statuses => panic!("expected one create and one replace, got {statuses:?}"),
        };
        assert_ne!(created.response, replaced.response);

        // The later write wins outright; nothing of the earlier one is left.
        let stored = fixture.store.read_responses(1, None).await.unwrap();
        assert_eq!(stored, replaced.response);
        assert_eq!(stored.len(), 1);
    }

    #[rocket::async_test]
    async fn bad_shapes_write_nothing() {
        let fixture = Fixture::with(Instrument::ranking_example(3)).await;
        let writer = fixture.writer();
        let now = Utc::now();

        assert!(matches!(
            writer.submit(3, VOTER, &RawAnswer::One(1), now).await,
            Err(Error::ShapeMismatch(_))
        ));
        assert!(matches!(
            writer.submit(3, VOTER, &RawAnswer::Many(vec![1, 2]), now).await,
            Err(Error::IncompleteOrdering(_))
        ));
        assert!(fixture.stored(3).await.is_empty());
        assert!(!fixture.store.has_responses(3).await.unwrap());

        writer
            .submit(3, VOTER, &RawAnswer::Many(vec![3, 1, 2]), now)
            .await
            .unwrap();
        assert_eq!(
            fixture.stored(3).await,
            vec![CanonicalRecord::ordering(None, vec![3, 1, 2])]
        );
    }

    #[rocket::async_test]
    async fn closed_instruments_refuse_votes() {
        let mut poll = Instrument::single_choice_example(1);
        poll.active = false;
        let fixture = Fixture::with(poll).await;
        let writer = fixture.writer();
        let now = Utc::now();
        assert!(matches!(
            writer.submit(1, VOTER, &RawAnswer::One(1), now).await,
            Err(Error::InstrumentClosed(1))
        ));

        let fixture = Fixture::with(Instrument::single_choice_example(2)).await;
        let poll = fixture.store.instrument(2).await.unwrap().unwrap();
        let writer = fixture.writer();
        assert!(matches!(
            writer
                .submit(2, VOTER, &RawAnswer::One(1), poll.end_at + Duration::seconds(1))
                .await,
            Err(Error::InstrumentClosed(2))
        ));
        assert!(matches!(
            writer
                .submit(2, VOTER, &RawAnswer::One(1), poll.start_at - Duration::seconds(1))
                .await,
            Err(Error::InstrumentClosed(2))
        ));
    }

    #[rocket::async_test]
    async fn eligibility_gates_votes() {
        let fixture = Fixture::with(Instrument::single_choice_example(1).geofenced()).await;
        fixture
            .store
            .set_voter_location("far", VoterLocation::outside_example())
            .await;
        let writer = fixture.writer();
        let now = Utc::now();

        match writer.submit(1, "far", &RawAnswer::One(1), now).await {
            Err(Error::NotEligible(IneligibleReason::OutOfRadius { shortfall_km, .. })) => {
                assert!((shortfall_km - 3.9).abs() < 0.1, "shortfall {shortfall_km}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(
            writer.submit(1, "nowhere", &RawAnswer::One(1), now).await,
            Err(Error::NotEligible(IneligibleReason::NeedsLocationDetection))
        ));
        assert!(fixture.stored(1).await.is_empty());

        // The creator may always vote, wherever they are.
        let created = writer.submit(1, CREATOR, &RawAnswer::One(2), now).await.unwrap();
        assert_eq!(created.status, SubmitStatus::Created);
        assert!(writer.submit(1, VOTER, &RawAnswer::One(1), now).await.is_ok());

        assert!(writer.eligibility(1, VOTER).await.unwrap().is_eligible());
        assert!(!writer.eligibility(1, "far").await.unwrap().is_eligible());
        assert!(matches!(
            writer.eligibility(9, VOTER).await,
            Err(Error::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn identity_denial_writes_nothing() {
        let fixture = Fixture::with(Instrument::single_choice_example(1)).await;
        let writer = fixture.writer();
        assert!(matches!(
            writer.submit(1, UNVERIFIED, &RawAnswer::One(1), Utc::now()).await,
            Err(Error::IdentityUnverified)
        ));
        assert!(!fixture.store.has_responses(1).await.unwrap());
    }

    #[rocket::async_test]
    async fn survey_response_follows_branches() {
        let fixture = Fixture::with(Instrument::survey_example(4)).await;
        let writer = fixture.writer();
        let answers = [
            answer(1, RawAnswer::One(10)),
            answer(2, RawAnswer::Many(vec![20, 21])),
            answer(5, RawAnswer::Many(vec![51, 50, 52])),
            answer(6, RawAnswer::One(61)),
        ];
        let records = writer.respond(4, VOTER, &answers, Utc::now()).await.unwrap();
        let stored: Vec<_> = records.into_iter().map(|r| r.record).collect();
        assert_eq!(
            stored,
            vec![
                CanonicalRecord::selection(Some(1), 10),
                CanonicalRecord::selection(Some(2), 20),
                CanonicalRecord::selection(Some(2), 21),
                CanonicalRecord::ordering(Some(5), vec![51, 50, 52]),
                CanonicalRecord::selection(Some(6), 61),
            ]
        );
        assert_eq!(fixture.stored(4).await, stored);

        let other = [answer(1, RawAnswer::One(11)), answer(3, RawAnswer::One(30))];
        assert!(matches!(
            writer.respond(4, VOTER, &other, Utc::now()).await,
            Err(Error::AlreadyResponded(4))
        ));
        assert_eq!(fixture.stored(4).await, stored);
    }

    #[rocket::async_test]
    async fn survey_rejects_hidden_and_missing_answers() {
        let fixture = Fixture::with(Instrument::survey_example(4)).await;
        let writer = fixture.writer();
        let now = Utc::now();

        // Q3 is only shown after answering Q1 with 11.
        let hidden = [answer(1, RawAnswer::One(10)), answer(3, RawAnswer::One(30))];
        assert!(matches!(
            writer.respond(4, VOTER, &hidden, now).await,
            Err(Error::UnknownQuestion(3))
        ));

        let unknown = [answer(1, RawAnswer::One(10)), answer(42, RawAnswer::One(1))];
        assert!(matches!(
            writer.respond(4, VOTER, &unknown, now).await,
            Err(Error::UnknownQuestion(42))
        ));

        // Q3 is required once visible.
        let missing = [answer(1, RawAnswer::One(11))];
        assert!(matches!(
            writer.respond(4, VOTER, &missing, now).await,
            Err(Error::RequiredQuestionMissing(_))
        ));

        let twice = [answer(1, RawAnswer::One(10)), answer(1, RawAnswer::One(10))];
        assert!(matches!(
            writer.respond(4, VOTER, &twice, now).await,
            Err(Error::ShapeMismatch(_))
        ));

        assert!(!fixture.store.has_responses(4).await.unwrap());

        let minimal = [answer(1, RawAnswer::One(11)), answer(3, RawAnswer::One(31))];
        assert_eq!(writer.respond(4, VOTER, &minimal, now).await.unwrap().len(), 2);
    }

    #[rocket::async_test]
    async fn hidden_answers_are_unknown_whatever_their_shape() {
        let fixture = Fixture::with(Instrument::survey_example(4)).await;
        let writer = fixture.writer();
        let now = Utc::now();

        // Q3 is single choice, and hidden unless Q1 is answered with 11.
        let hidden = [
            answer(1, RawAnswer::One(10)),
            answer(3, RawAnswer::Many(vec![30, 31])),
        ];
        assert!(matches!(
            writer.respond(4, VOTER, &hidden, now).await,
            Err(Error::UnknownQuestion(3))
        ));
        let preview = writer.preview(4, &hidden).await.unwrap();
        assert_eq!(preview.visible, vec![1, 2, 6]);
        assert_eq!(preview.dropped, vec![3]);

        let shown = [
            answer(1, RawAnswer::One(11)),
            answer(3, RawAnswer::Many(vec![30, 31])),
        ];
        assert!(matches!(
            writer.respond(4, VOTER, &shown, now).await,
            Err(Error::ShapeMismatch(_))
        ));
        assert!(matches!(
            writer.preview(4, &shown).await,
            Err(Error::ShapeMismatch(_))
        ));
        assert!(!fixture.store.has_responses(4).await.unwrap());
    }

    #[rocket::async_test]
    async fn surveys_and_polls_are_not_interchangeable() {
        let fixture = Fixture::with(Instrument::survey_example(4)).await;
        fixture
            .store
            .insert_instrument(Instrument::single_choice_example(1))
            .await;
        let writer = fixture.writer();
        let now = Utc::now();
        assert!(matches!(
            writer.submit(4, VOTER, &RawAnswer::One(10), now).await,
            Err(Error::ShapeMismatch(_))
        ));
        assert!(matches!(
            writer.respond(1, VOTER, &[answer(1, RawAnswer::One(1))], now).await,
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[rocket::async_test]
    async fn preview_reports_dropped_answers() {
        let fixture = Fixture::with(Instrument::survey_example(4)).await;
        let writer = fixture.writer();

        let preview = writer
            .preview(4, &[answer(1, RawAnswer::One(10)), answer(2, RawAnswer::Many(vec![20]))])
            .await
            .unwrap();
        assert_eq!(preview.visible, vec![1, 2, 4, 6]);
        assert!(preview.dropped.is_empty());

        let preview = writer
            .preview(
                4,
                &[
                    answer(1, RawAnswer::One(11)),
                    answer(2, RawAnswer::Many(vec![20])),
                    answer(4, RawAnswer::One(41)),
                ],
            )
            .await
            .unwrap();
        assert_eq!(preview.visible, vec![1, 3, 6]);
        assert_eq!(preview.dropped, vec![2, 4]);
    }

    #[rocket::async_test]
    async fn question_edits_lock_after_first_response() {
        let fixture = Fixture::with(Instrument::survey_example(4)).await;
        let writer = fixture.writer();

        let mut questions = Question::survey_example();
        questions.push(Question::example_child(
            7,
            QuestionType::SingleChoice,
            0,
            3,
            30,
            70,
            2,
        ));
        writer.replace_questions(4, questions.clone()).await.unwrap();

        let mut broken = questions.clone();
        broken.push(Question::example_child(
            8,
            QuestionType::SingleChoice,
            0,
            5,
            50,
            80,
            2,
        ));
        assert!(matches!(
            writer.replace_questions(4, broken).await,
            Err(Error::InvalidStructure(_))
        ));
        assert!(matches!(
            writer.replace_questions(4, Vec::new()).await,
            Err(Error::InvalidStructure(_))
        ));

        let answers = [
            answer(1, RawAnswer::One(11)),
            answer(3, RawAnswer::One(30)),
            answer(7, RawAnswer::One(71)),
        ];
        writer.respond(4, VOTER, &answers, Utc::now()).await.unwrap();
        assert!(matches!(
            writer.replace_questions(4, questions).await,
            Err(Error::StructureLocked(4))
        ));
    }

    #[rocket::async_test]
    async fn markers_lock_questions_without_the_flag() {
        let fixture = Fixture::with(Instrument::survey_example(4)).await;
        let marker = Submission {
            instrument_id: 4,
            voter_key: fixture.config.voter_key(VOTER),
            first_created_at: Utc::now(),
        };
        fixture.store.insert_first(marker, Vec::new()).await.unwrap();
        // As stored before the lock flag was introduced.
        fixture
            .store
            .insert_instrument(Instrument::survey_example(4))
            .await;

        assert!(matches!(
            fixture
                .writer()
                .replace_questions(4, Question::survey_example())
                .await,
            Err(Error::StructureLocked(4))
        ));
    }
}
