use std::{collections::HashMap, sync::Arc};

use rocket::tokio::sync::Mutex;

use super::{FirstWrite, ResponseStore};
use crate::error::{Error, Result};
use crate::model::{
    common::{
        instrument::{InstrumentId, Question, VoterId, VoterLocation},
        voter::VoterKey,
    },
    db::{Instrument, ResponseRecord, Submission},
};

#[derive(Debug, Default)]
struct MemoryState {
    instruments: HashMap<InstrumentId, Instrument>,
    voters: HashMap<VoterId, VoterLocation>,
    submissions: HashMap<(InstrumentId, VoterKey), Submission>,
    responses: Vec<ResponseRecord>,
}

/// A store that keeps everything in process memory behind one lock, so each
/// operation is trivially atomic. Used for tests and for running the
/// server without a database. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<Mutex<MemoryState>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite an instrument.
    pub async fn insert_instrument(&self, instrument: Instrument) {
        let mut state = self.0.lock().await;
        state.instruments.insert(instrument.id, instrument);
    }

    /// Record where a voter is.
    pub async fn set_voter_location(&self, voter_id: impl Into<VoterId>, location: VoterLocation) {
        let mut state = self.0.lock().await;
        state.voters.insert(voter_id.into(), location);
    }
}

#[rocket::async_trait]
impl ResponseStore for MemoryStore {
    async fn instrument(&self, id: InstrumentId) -> Result<Option<Instrument>> {
        Ok(self.0.lock().await.instruments.get(&id).cloned())
    }

    async fn voter_location(&self, voter_id: &str) -> Result<Option<VoterLocation>> {
        Ok(self.0.lock().await.voters.get(voter_id).cloned())
    }

    async fn read_responses(
        &self,
        instrument_id: InstrumentId,
        voter_key: Option<&VoterKey>,
    ) -> Result<Vec<ResponseRecord>> {
        let state = self.0.lock().await;
        Ok(state
            .responses
            .iter()
            .filter(|r| r.instrument_id == instrument_id)
            .filter(|r| voter_key.map_or(true, |key| &r.voter_key == key))
            .cloned()
            .collect())
    }

    async fn has_responses(&self, instrument_id: InstrumentId) -> Result<bool> {
        let state = self.0.lock().await;
        Ok(state
            .submissions
            .keys()
            .any(|(instrument, _)| *instrument == instrument_id))
    }

    async fn insert_first(
        &self,
        submission: Submission,
        records: Vec<ResponseRecord>,
    ) -> Result<FirstWrite> {
        let mut state = self.0.lock().await;
        let key = (submission.instrument_id, submission.voter_key.clone());
        if let Some(existing) = state.submissions.get(&key) {
            return Ok(FirstWrite::Conflict(existing.clone()));
        }
        if let Some(instrument) = state.instruments.get_mut(&submission.instrument_id) {
            instrument.responded = true;
        }
        state.submissions.insert(key, submission);
        state.responses.extend(records);
        Ok(FirstWrite::Inserted)
    }

    async fn replace_responses(
        &self,
        instrument_id: InstrumentId,
        voter_key: &VoterKey,
        records: Vec<ResponseRecord>,
    ) -> Result<()> {
        let mut state = self.0.lock().await;
        state
            .responses
            .retain(|r| !(r.instrument_id == instrument_id && &r.voter_key == voter_key));
        state.responses.extend(records);
        Ok(())
    }

    async fn replace_questions(
        &self,
        instrument_id: InstrumentId,
        questions: Vec<Question>,
    ) -> Result<()> {
        let mut state = self.0.lock().await;
        let instrument = state
            .instruments
            .get_mut(&instrument_id)
            .ok_or_else(|| Error::not_found(format!("Instrument {instrument_id}")))?;
        if instrument.responded {
            return Err(Error::StructureLocked(instrument_id));
        }
        instrument.questions = questions;
        Ok(())
    }
}
