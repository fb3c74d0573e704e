use log::{debug, warn};
use mongodb::{
    bson::{doc, to_bson, Document},
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::CountOptions,
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use super::{FirstWrite, ResponseStore};
use crate::error::{Error, Result};
use crate::model::{
    common::{
        instrument::{InstrumentId, Question, VoterLocation},
        voter::VoterKey,
    },
    db::{Instrument, ResponseRecord, Submission, VoterProfile},
    mongodb::{is_duplicate_key_error, Coll},
};

/// How many times a transaction is attempted before a transient failure is
/// passed on to the caller.
const MAX_ATTEMPTS: u32 = 5;

/// The production store. Multi-document writes run in session transactions,
/// and the unique index on submissions turns concurrent first responses from
/// the same voter into exactly one insert plus one conflict.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    instruments: Coll<Instrument>,
    responses: Coll<ResponseRecord>,
    submissions: Coll<Submission>,
    voters: Coll<VoterProfile>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            instruments: Coll::from_db(db),
            responses: Coll::from_db(db),
            submissions: Coll::from_db(db),
            voters: Coll::from_db(db),
        }
    }

    fn voter_filter(instrument_id: InstrumentId, voter_key: &VoterKey) -> Document {
        doc! {
            "instrumentId": instrument_id,
            "voterKey": voter_key,
        }
    }

    async fn try_insert_first(
        &self,
        session: &mut ClientSession,
        submission: &Submission,
        records: &[ResponseRecord],
    ) -> std::result::Result<(), DbError> {
        // Fails with a duplicate key error if the voter already responded.
        self.submissions
            .insert_one_with_session(submission, None, session)
            .await?;
        if !records.is_empty() {
            self.responses
                .insert_many_with_session(records, None, session)
                .await?;
        }
        // Only the very first response writes the instrument. This makes a
        // concurrent structure edit conflict with it.
        let filter = doc! {
            "_id": submission.instrument_id,
            "responded": { "$ne": true },
        };
        self.instruments
            .update_one_with_session(filter, doc! {"$set": {"responded": true}}, None, session)
            .await?;
        Ok(())
    }

    async fn try_replace(
        &self,
        session: &mut ClientSession,
        instrument_id: InstrumentId,
        voter_key: &VoterKey,
        records: &[ResponseRecord],
    ) -> std::result::Result<(), DbError> {
        let deleted = self
            .responses
            .delete_many_with_session(Self::voter_filter(instrument_id, voter_key), None, session)
            .await?;
        debug!(
            "Deleted {} prior record(s) of instrument {instrument_id}",
            deleted.deleted_count
        );
        if !records.is_empty() {
            self.responses
                .insert_many_with_session(records, None, session)
                .await?;
        }
        Ok(())
    }
}

/// Commit, retrying while the outcome of the commit is unknown.
async fn commit(session: &mut ClientSession) -> std::result::Result<(), DbError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) && attempt < MAX_ATTEMPTS =>
            {
                warn!("Transaction commit result unknown, retrying: {e}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn abort(session: &mut ClientSession) {
    if let Err(e) = session.abort_transaction().await {
        // The server may already have aborted it.
        debug!("Failed to abort transaction: {e}");
    }
}

/// Should a failed transaction be run again from the start?
fn should_retry(err: &DbError, attempt: u32) -> bool {
    let transient = err.contains_label(TRANSIENT_TRANSACTION_ERROR);
    if transient && attempt < MAX_ATTEMPTS {
        warn!("Transient transaction error on attempt {attempt}, retrying: {err}");
        return true;
    }
    false
}

#[rocket::async_trait]
impl ResponseStore for MongoStore {
    async fn instrument(&self, id: InstrumentId) -> Result<Option<Instrument>> {
        Ok(self.instruments.find_one(doc! {"_id": id}, None).await?)
    }

    async fn voter_location(&self, voter_id: &str) -> Result<Option<VoterLocation>> {
        let profile = self.voters.find_one(doc! {"_id": voter_id}, None).await?;
        Ok(profile.map(|p| p.location))
    }

    async fn read_responses(
        &self,
        instrument_id: InstrumentId,
        voter_key: Option<&VoterKey>,
    ) -> Result<Vec<ResponseRecord>> {
        let filter = match voter_key {
            Some(voter_key) => Self::voter_filter(instrument_id, voter_key),
            None => doc! {"instrumentId": instrument_id},
        };
        Ok(self.responses.find(filter, None).await?.try_collect().await?)
    }

    async fn has_responses(&self, instrument_id: InstrumentId) -> Result<bool> {
        let options = CountOptions::builder().limit(1).build();
        let count = self
            .submissions
            .count_documents(doc! {"instrumentId": instrument_id}, options)
            .await?;
        Ok(count > 0)
    }

    async fn insert_first(
        &self,
        submission: Submission,
        records: Vec<ResponseRecord>,
    ) -> Result<FirstWrite> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            session.start_transaction(None).await?;
            let result = match self
                .try_insert_first(&mut session, &submission, &records)
                .await
            {
                Ok(()) => commit(&mut session).await,
                Err(e) => {
                    abort(&mut session).await;
                    Err(e)
                }
            };
            match result {
                Ok(()) => return Ok(FirstWrite::Inserted),
                Err(e) if is_duplicate_key_error::<()>(Err(&e)) => break,
                Err(e) if should_retry(&e, attempt) => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }

        // Lost the race against an earlier response; report the marker that won.
        let filter = Self::voter_filter(submission.instrument_id, &submission.voter_key);
        let existing = self.submissions.find_one(filter, None).await?.ok_or_else(|| {
            Error::Integrity(format!(
                "duplicate submission for instrument {} but no marker found",
                submission.instrument_id
            ))
        })?;
        Ok(FirstWrite::Conflict(existing))
    }

    async fn replace_responses(
        &self,
        instrument_id: InstrumentId,
        voter_key: &VoterKey,
        records: Vec<ResponseRecord>,
    ) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 1;
        loop {
            session.start_transaction(None).await?;
            let result = match self
                .try_replace(&mut session, instrument_id, voter_key, &records)
                .await
            {
                Ok(()) => commit(&mut session).await,
                Err(e) => {
                    abort(&mut session).await;
                    Err(e)
                }
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if should_retry(&e, attempt) => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn replace_questions(
        &self,
        instrument_id: InstrumentId,
        questions: Vec<Question>,
    ) -> Result<()> {
        let questions = to_bson(&questions).map_err(DbError::from)?;
        // A single-document update, guarded on the lock flag set by the first response.
        let filter = doc! {
            "_id": instrument_id,
            "responded": { "$ne": true },
        };
        let result = self
            .instruments
            .update_one(filter, doc! {"$set": {"questions": questions}}, None)
            .await?;
        if result.matched_count == 1 {
            return Ok(());
        }
        match self.instrument(instrument_id).await? {
            Some(_) => Err(Error::StructureLocked(instrument_id)),
            None => Err(Error::not_found(format!("Instrument {instrument_id}"))),
        }
    }
}

/// These run against the server named by `ROCKET_DB_URI`, which must be a
/// replica set for transactions to work. Without it they do nothing.
#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use log::warn;

    use super::*;
    use crate::model::{common::record::CanonicalRecord, mongodb::ensure_indexes_exist};

    /// A store over a freshly dropped and indexed database.
    async fn fresh_store(name: &str) -> Option<(MongoStore, Database)> {
        let Ok(db_uri) = std::env::var("ROCKET_DB_URI") else {
            warn!("ROCKET_DB_URI not set, skipping MongoDB test {name}");
            return None;
        };
        let client = Client::with_uri_str(&db_uri).await.unwrap();
        let db = client.database(&format!("geopoll_test_{name}"));
        db.drop(None).await.unwrap();
        ensure_indexes_exist(&db).await.unwrap();
        Some((MongoStore::new(client, &db), db))
    }

    fn at(timestamp: &str) -> DateTime<Utc> {
        timestamp.parse().unwrap()
    }

    fn marker(
        instrument_id: InstrumentId,
        voter_key: &VoterKey,
        first_created_at: DateTime<Utc>,
    ) -> Submission {
        Submission {
            instrument_id,
            voter_key: voter_key.clone(),
            first_created_at,
        }
    }

    fn selection(
        instrument_id: InstrumentId,
        voter_key: &VoterKey,
        answer_id: u32,
    ) -> ResponseRecord {
        ResponseRecord::new(
            instrument_id,
            voter_key.clone(),
            CanonicalRecord::selection(None, answer_id),
            at("2026-03-01T09:00:00Z"),
        )
    }

    #[rocket::async_test]
    async fn second_first_write_conflicts() {
        let Some((store, db)) = fresh_store("conflict").await else {
            return;
        };
        store
            .instruments
            .insert_one(Instrument::multiple_choice_example(1), None)
            .await
            .unwrap();
        let key = VoterKey::derive("voter", b"mongo");
        let first = marker(1, &key, at("2026-03-01T09:00:00Z"));
        let records = vec![selection(1, &key, 1), selection(1, &key, 2)];
        assert_eq!(
            store.insert_first(first.clone(), records.clone()).await.unwrap(),
            FirstWrite::Inserted
        );
        assert!(store.instrument(1).await.unwrap().unwrap().responded);

        // Inside the transaction the duplicate marker surfaces as a command error.
        let again = marker(1, &key, at("2026-03-01T09:30:00Z"));
        assert_eq!(
            store
                .insert_first(again, vec![selection(1, &key, 3)])
                .await
                .unwrap(),
            FirstWrite::Conflict(first)
        );
        let mut stored = store.read_responses(1, Some(&key)).await.unwrap();
        stored.sort_by_key(|r| r.answer_id);
        assert_eq!(stored, records);
        assert!(store.has_responses(1).await.unwrap());
        assert!(!store.has_responses(2).await.unwrap());

        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    async fn replace_swaps_one_voters_rows() {
        let Some((store, db)) = fresh_store("replace").await else {
            return;
        };
        let alice = VoterKey::derive("alice", b"mongo");
        let bob = VoterKey::derive("bob", b"mongo");
        let now = at("2026-03-01T09:00:00Z");
        store
            .insert_first(
                marker(1, &alice, now),
                vec![selection(1, &alice, 1), selection(1, &alice, 2)],
            )
            .await
            .unwrap();
        store
            .insert_first(marker(1, &bob, now), vec![selection(1, &bob, 1)])
            .await
            .unwrap();

        store
            .replace_responses(1, &alice, vec![selection(1, &alice, 3)])
            .await
            .unwrap();
        assert_eq!(
            store.read_responses(1, Some(&alice)).await.unwrap(),
            vec![selection(1, &alice, 3)]
        );
        assert_eq!(
            store.read_responses(1, Some(&bob)).await.unwrap(),
            vec![selection(1, &bob, 1)]
        );
        assert_eq!(store.read_responses(1, None).await.unwrap().len(), 2);

        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    async fn questions_lock_after_first_response() {
        let Some((store, db)) = fresh_store("lock").await else {
            return;
        };
        store
            .instruments
            .insert_one(Instrument::survey_example(4), None)
            .await
            .unwrap();
        let first_only = Question::survey_example()[..1].to_vec();
        store.replace_questions(4, first_only.clone()).await.unwrap();
        assert_eq!(
            store.instrument(4).await.unwrap().unwrap().questions,
            first_only
        );

        let key = VoterKey::derive("voter", b"mongo");
        store
            .insert_first(marker(4, &key, at("2026-03-01T09:00:00Z")), Vec::new())
            .await
            .unwrap();
        assert!(matches!(
            store.replace_questions(4, Question::survey_example()).await,
            Err(Error::StructureLocked(4))
        ));
        assert!(matches!(
            store.replace_questions(5, Question::survey_example()).await,
            Err(Error::NotFound(_))
        ));

        db.drop(None).await.unwrap();
    }
}
