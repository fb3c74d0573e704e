//! Persistence of instruments and responses.
//!
//! The writer only talks to a [`ResponseStore`]. Every method that writes
//! more than one document does so atomically, and the duplicate check for a
//! voter's first response is part of the same unit as the write itself.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    common::{
        instrument::{InstrumentId, Question, VoterLocation},
        voter::VoterKey,
    },
    db::{Instrument, ResponseRecord, Submission},
};

mod memory;
mod mongo;

pub use self::memory::MemoryStore;
pub use self::mongo::MongoStore;

/// The store held in Rocket's managed state.
pub type Store = Arc<dyn ResponseStore>;

/// Outcome of [`ResponseStore::insert_first`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstWrite {
    /// The marker and all records were written.
    Inserted,
    /// The voter had already responded; nothing was written.
    Conflict(Submission),
}

#[rocket::async_trait]
pub trait ResponseStore: Send + Sync {
    async fn instrument(&self, id: InstrumentId) -> Result<Option<Instrument>>;

    /// The last known location of a voter, if any has been recorded.
    async fn voter_location(&self, voter_id: &str) -> Result<Option<VoterLocation>>;

    /// All records of an instrument, or only one voter's if `voter_key` is given.
    async fn read_responses(
        &self,
        instrument_id: InstrumentId,
        voter_key: Option<&VoterKey>,
    ) -> Result<Vec<ResponseRecord>>;

    /// Has anyone responded to the instrument yet?
    async fn has_responses(&self, instrument_id: InstrumentId) -> Result<bool>;

    /// Record a voter's first response: the marker and every record, or
    /// nothing at all if a marker for the pair already exists.
    async fn insert_first(
        &self,
        submission: Submission,
        records: Vec<ResponseRecord>,
    ) -> Result<FirstWrite>;

    /// Delete all of a voter's records for the instrument and insert
    /// `records` in their place, as one unit. The marker is left alone.
    async fn replace_responses(
        &self,
        instrument_id: InstrumentId,
        voter_key: &VoterKey,
        records: Vec<ResponseRecord>,
    ) -> Result<()>;

    /// Replace a survey's questions. Fails with `StructureLocked` once the
    /// survey has any response.
    async fn replace_questions(
        &self,
        instrument_id: InstrumentId,
        questions: Vec<Question>,
    ) -> Result<()>;
}
