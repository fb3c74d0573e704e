//! Offline exports of an instrument with all its responses, as consumed by
//! `tally-cli`.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::{
    normalize::{normalize, normalize_flat, parse_legacy_ordering, RawAnswer},
    tally::{tally, Tally},
};
use crate::error::{Error, Result};
use crate::model::{
    common::instrument::QuestionType,
    db::{Instrument, ResponseRecord},
};

/// A stored record, possibly still in the legacy form where the answer was
/// serialised into a free-text `comment` instead of `answerId`/`orderedValue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedRecord {
    #[serde(flatten)]
    pub record: ResponseRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ExportedRecord {
    fn is_legacy(&self) -> bool {
        self.comment.is_some()
            && self.record.answer_id.is_none()
            && self.record.ordered_value.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentExport {
    pub instrument: Instrument,
    pub responses: Vec<ExportedRecord>,
}

/// What [`InstrumentExport::migrate`] changed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Legacy rows that were rewritten.
    pub legacy_rows: usize,
    /// Canonical rows they became.
    pub canonical_rows: usize,
}

impl InstrumentExport {
    /// Tally the canonical records of the export. Legacy rows are skipped by
    /// the tally, so migrate first.
    pub fn tally(&self) -> Result<Tally> {
        self.instrument.validate().map_err(Error::InvalidStructure)?;
        let records: Vec<ResponseRecord> = self
            .responses
            .iter()
            .filter(|r| r.record.instrument_id == self.instrument.id)
            .map(|r| r.record.clone())
            .collect();
        tally(&self.instrument, &records)
    }

    /// Rewrite legacy rows into canonical records. A legacy ranking becomes
    /// one `orderedValue` row; a legacy multiple-choice array becomes one row
    /// per selected option. Fails on the first row that cannot be parsed or
    /// that is not a valid answer, leaving the export untouched.
    pub fn migrate(&mut self) -> Result<MigrationReport> {
        self.instrument.validate().map_err(Error::InvalidStructure)?;
        let mut report = MigrationReport::default();
        let mut migrated = Vec::with_capacity(self.responses.len());

        for exported in &self.responses {
            if !exported.is_legacy() {
                migrated.push(exported.clone());
                continue;
            }
            let comment = exported.comment.as_deref().unwrap_or_default();
            let ids = parse_legacy_ordering(comment).ok_or_else(|| {
                Error::ShapeMismatch(format!("cannot parse legacy answer {comment:?}"))
            })?;

            let record = &exported.record;
            let records = match record.question_id {
                None => {
                    let raw = legacy_raw(self.instrument.kind.flat_question_type(), ids);
                    normalize_flat(&raw, &self.instrument)?
                }
                Some(question_id) => {
                    let question = self
                        .instrument
                        .questions
                        .iter()
                        .find(|q| q.id == question_id)
                        .ok_or(Error::UnknownQuestion(question_id))?;
                    normalize(&legacy_raw(Some(question.question_type), ids), question)?
                }
            };

            report.legacy_rows += 1;
            report.canonical_rows += records.len();
            migrated.extend(records.into_iter().map(|canonical| ExportedRecord {
                record: ResponseRecord::new(
                    record.instrument_id,
                    record.voter_key.clone(),
                    canonical,
                    record.created_at,
                ),
                comment: None,
            }));
        }

        if report.legacy_rows == 0 {
            warn!("No legacy rows found in export of instrument {}", self.instrument.id);
        } else {
            info!(
                "Migrated {} legacy row(s) into {} canonical row(s)",
                report.legacy_rows, report.canonical_rows
            );
        }
        self.responses = migrated;
        Ok(report)
    }
}

/// A single-choice legacy value is a one-element list.
fn legacy_raw(question_type: Option<QuestionType>, mut ids: Vec<u32>) -> RawAnswer {
    match question_type {
        Some(QuestionType::SingleChoice) if ids.len() == 1 => RawAnswer::One(ids.remove(0)),
        _ => RawAnswer::Many(ids),
    }
}
