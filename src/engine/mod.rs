//! The response-evaluation core: eligibility, answer normalisation, branching,
//! response writing, and tallying.
//!
//! Everything except [`writer`] is pure; the writer is the only component that
//! touches the store.

pub mod branching;
pub mod geo;
pub mod normalize;
pub mod tally;
pub mod writer;
