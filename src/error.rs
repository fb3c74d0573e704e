use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
    serde::json::Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::geo::IneligibleReason;
use crate::model::common::instrument::{InstrumentId, QuestionId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Incomplete ordering: {0}")]
    IncompleteOrdering(String),
    #[error("Question {0} is unknown or not currently visible")]
    UnknownQuestion(QuestionId),
    #[error("Required question missing: {0}")]
    RequiredQuestionMissing(String),
    #[error("Not eligible: {}", .0.code())]
    NotEligible(IneligibleReason),
    #[error("Identity could not be verified")]
    IdentityUnverified,
    #[error("Instrument {0} is not accepting submissions")]
    InstrumentClosed(InstrumentId),
    #[error("The edit window for this response has expired")]
    EditWindowExpired,
    #[error("Already responded to survey {0}")]
    AlreadyResponded(InstrumentId),
    #[error("Survey {0} already has responses; its structure is locked")]
    StructureLocked(InstrumentId),
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Data integrity failure: {0}")]
    Integrity(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Oracle(#[from] reqwest::Error),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Short machine-readable name for this error's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShapeMismatch(_) => "shape-mismatch",
            Self::IncompleteOrdering(_) => "incomplete-ordering",
            Self::UnknownQuestion(_) => "unknown-question",
            Self::RequiredQuestionMissing(_) => "required-question-missing",
            Self::NotEligible(_) => "not-eligible",
            Self::IdentityUnverified => "identity-unverified",
            Self::InstrumentClosed(_) => "instrument-closed",
            Self::EditWindowExpired => "edit-window-expired",
            Self::AlreadyResponded(_) => "already-responded",
            Self::StructureLocked(_) => "structure-locked",
            Self::InvalidStructure(_) => "invalid-structure",
            Self::NotFound(_) => "not-found",
            Self::Integrity(_) => "integrity",
            Self::Db(_) => "database",
            Self::Oracle(_) => "oracle",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::ShapeMismatch(_)
            | Self::IncompleteOrdering(_)
            | Self::UnknownQuestion(_)
            | Self::RequiredQuestionMissing(_)
            | Self::InvalidStructure(_) => Status::BadRequest,
            Self::NotEligible(_) | Self::IdentityUnverified => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::InstrumentClosed(_)
            | Self::EditWindowExpired
            | Self::AlreadyResponded(_)
            | Self::StructureLocked(_) => Status::Conflict,
            Self::Integrity(_) | Self::Db(_) | Self::Oracle(_) => Status::InternalServerError,
        }
    }

    /// The user-facing detail. Server-side failures are not explained to the caller.
    fn reason(&self) -> Option<String> {
        match self {
            Self::NotEligible(reason) => Some(reason.code().to_string()),
            Self::Integrity(_) | Self::Db(_) | Self::Oracle(_) => None,
            other => Some(other.to_string()),
        }
    }
}

/// The structured error body returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Distance outside the geofence, for out-of-radius rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall_km: Option<f64>,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        let shortfall_km = match err {
            Error::NotEligible(IneligibleReason::OutOfRadius { shortfall_km, .. }) => {
                Some(*shortfall_km)
            }
            _ => None,
        };
        Self {
            kind: err.kind().to_string(),
            reason: err.reason(),
            shortfall_km,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        (status, Json(ErrorBody::from(&self))).respond_to(req)
    }
}
