mod kind;
mod location;
mod question;

pub use kind::{InstrumentKind, QuestionType};
pub use location::{Coordinates, LocationPolicy, VoterLocation};
pub use question::{Answer, Choice, PollOption, Question};

/// Our instrument IDs are integers.
pub type InstrumentId = u32;
/// Our question IDs are integers.
pub type QuestionId = u32;
/// Our answer and option IDs are integers.
pub type AnswerId = u32;
/// Voter IDs are opaque strings handed to us by the identity layer.
pub type VoterId = String;
