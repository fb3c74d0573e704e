//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Field names are camelCase.
//! - Voter keys are never exposed; responses are returned without them.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod eligibility;
pub mod export;
pub mod health;
pub mod preview;
pub mod response;
pub mod vote;
