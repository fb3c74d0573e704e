use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{Instrument, ResponseRecord, Submission, VoterProfile};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

const INSTRUMENTS: &str = "instruments";
impl MongoCollection for Instrument {
    const NAME: &'static str = INSTRUMENTS;
}

const RESPONSES: &str = "responses";
impl MongoCollection for ResponseRecord {
    const NAME: &'static str = RESPONSES;
}

const SUBMISSIONS: &str = "submissions";
impl MongoCollection for Submission {
    const NAME: &'static str = SUBMISSIONS;
}

const VOTERS: &str = "voters";
impl MongoCollection for VoterProfile {
    const NAME: &'static str = VOTERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    log::debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One first-response marker per voter per instrument.
    let submission_index = IndexModel::builder()
        .keys(doc! {"instrumentId": 1, "voterKey": 1})
        .options(unique)
        .build();
    Coll::<Submission>::from_db(db)
        .create_index(submission_index, None)
        .await?;

    // Responses are read per voter (replace) and per instrument (tally).
    let response_index = IndexModel::builder()
        .keys(doc! {"instrumentId": 1, "voterKey": 1})
        .build();
    Coll::<ResponseRecord>::from_db(db)
        .create_index(response_index, None)
        .await?;

    Ok(())
}
