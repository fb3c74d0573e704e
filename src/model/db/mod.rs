//! DB-compatible (e.g. de/serialisable) types.
//!
//! These are the documents held by the store. Datetimes are kept as RFC 3339
//! strings so the same types can be exported and re-imported as JSON.

mod instrument;
pub use instrument::{validate_choices, Instrument, EDIT_WINDOW_MINUTES};

mod response;
pub use response::{ResponseRecord, Submission};

mod voter;
pub use voter::VoterProfile;

#[cfg(test)]
pub use instrument::CREATOR;
