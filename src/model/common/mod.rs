//! Types shared between the database, the API, and the evaluation engine.

pub mod instrument;
pub mod record;
pub mod voter;
