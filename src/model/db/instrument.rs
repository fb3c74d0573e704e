use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::instrument::{
    Choice, InstrumentId, InstrumentKind, LocationPolicy, PollOption, Question, VoterId,
};

/// How long a flat-instrument vote may be replaced after it was first cast.
pub const EDIT_WINDOW_MINUTES: i64 = 60;

fn default_edit_window() -> i64 {
    EDIT_WINDOW_MINUTES
}

fn default_active() -> bool {
    true
}

/// A poll or survey, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: InstrumentId,
    /// The voter who created the instrument. They may always respond to it.
    pub creator_id: VoterId,
    pub title: String,
    pub kind: InstrumentKind,
    #[serde(default)]
    pub location_policy: LocationPolicy,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Cleared when the creator closes the instrument early.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Set with the first response; from then on the question structure is locked.
    #[serde(default)]
    pub responded: bool,
    #[serde(default = "default_edit_window")]
    pub edit_window_minutes: i64,
    /// Options of a flat instrument; empty for surveys.
    #[serde(default)]
    pub options: Vec<PollOption>,
    /// Question forest of a survey; empty for flat instruments.
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Instrument {
    /// Is the instrument accepting submissions at `now`?
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.active && self.start_at <= now && now <= self.end_at
    }

    pub fn edit_window(&self) -> Duration {
        Duration::minutes(self.edit_window_minutes)
    }

    pub fn is_owner(&self, voter_id: &str) -> bool {
        self.creator_id == voter_id
    }

    /// Check the instrument's own invariants: exactly one of options and
    /// questions is populated, matching `kind`, and options are well-formed.
    /// The question tree itself is validated when it is loaded for branching.
    pub fn validate(&self) -> Result<(), String> {
        self.location_policy.validate()?;
        if self.end_at < self.start_at {
            return Err(format!("instrument {} ends before it starts", self.id));
        }
        if self.kind.is_survey() {
            if !self.options.is_empty() {
                return Err(format!("survey {} has flat options", self.id));
            }
            if self.questions.is_empty() {
                return Err(format!("survey {} has no questions", self.id));
            }
            Ok(())
        } else {
            if !self.questions.is_empty() {
                return Err(format!("flat instrument {} has survey questions", self.id));
            }
            validate_choices(&self.options)
                .map_err(|e| format!("instrument {} options: {e}", self.id))
        }
    }
}

/// Options must be non-empty, have unique IDs, and a dense 0-based order.
pub fn validate_choices(choices: &[Choice]) -> Result<(), String> {
    if choices.is_empty() {
        return Err("no choices".to_string());
    }
    let mut ids = HashSet::with_capacity(choices.len());
    for choice in choices {
        if !ids.insert(choice.id) {
            return Err(format!("duplicate choice ID {}", choice.id));
        }
    }
    let mut orders: Vec<u32> = choices.iter().map(|c| c.order).collect();
    orders.sort_unstable();
    let dense = orders
        .iter()
        .enumerate()
        .all(|(i, order)| u32::try_from(i).map_or(false, |i| i == *order));
    if !dense {
        return Err(format!("choice orders {orders:?} are not dense from 0"));
    }
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::common::instrument::{QuestionType, VoterLocation};

    pub const CREATOR: &str = "creator";

    impl Instrument {
        fn example_flat(id: InstrumentId, kind: InstrumentKind, texts: &[&str]) -> Self {
            let now = Utc::now();
            Self {
                id,
                creator_id: CREATOR.to_string(),
                title: format!("Example {kind:?} poll"),
                kind,
                location_policy: LocationPolicy::Global,
                start_at: now - Duration::days(1),
                end_at: now + Duration::days(30),
                active: true,
                responded: false,
                edit_window_minutes: EDIT_WINDOW_MINUTES,
                options: texts
                    .iter()
                    .enumerate()
                    .map(|(i, text)| Choice::example(i as u32 + 1, text, i as u32))
                    .collect(),
                questions: Vec::new(),
            }
        }

        /// Single choice, options 1..=3.
        pub fn single_choice_example(id: InstrumentId) -> Self {
            Self::example_flat(id, InstrumentKind::SingleChoice, &["Yes", "No", "Abstain"])
        }

        /// Multiple choice, options 1..=5.
        pub fn multiple_choice_example(id: InstrumentId) -> Self {
            Self::example_flat(
                id,
                InstrumentKind::MultipleChoice,
                &["Parks", "Libraries", "Roads", "Schools", "Transit"],
            )
        }

        /// Ranking, options 1..=3 standing for A, B, C.
        pub fn ranking_example(id: InstrumentId) -> Self {
            Self::example_flat(id, InstrumentKind::Ranking, &["A", "B", "C"])
        }

        /// A survey:
        ///
        /// - Q1 (single, required) answers 10, 11
        ///   - 10 -> Q2 (multiple) answers 20, 21, 22
        ///     - 20 -> Q4 (single) answers 40, 41
        ///     - 21 -> Q5 (ordering) answers 50, 51, 52
        ///   - 11 -> Q3 (single, required) answers 30, 31
        /// - Q6 (single) answers 60, 61
        pub fn survey_example(id: InstrumentId) -> Self {
            let mut survey = Self::example_flat(id, InstrumentKind::Survey, &[]);
            survey.options.clear();
            survey.questions = Question::survey_example();
            survey
        }

        /// Geofence around central Athens with a 5km radius.
        pub fn geofenced(mut self) -> Self {
            self.location_policy = LocationPolicy::Geofenced {
                center_lat: 37.98,
                center_lng: 23.72,
                radius_km: 5.0,
            };
            self
        }
    }

    impl Question {
        pub fn survey_example() -> Vec<Self> {
            use QuestionType::*;
            vec![
                Question::example_root(1, SingleChoice, 0, 10, 2).required(),
                Question::example_child(2, MultipleChoice, 0, 1, 10, 20, 3),
                Question::example_child(3, SingleChoice, 1, 1, 11, 30, 2).required(),
                Question::example_child(4, SingleChoice, 0, 2, 20, 40, 2),
                Question::example_child(5, Ordering, 1, 2, 21, 50, 3),
                Question::example_root(6, SingleChoice, 1, 60, 2),
            ]
        }
    }

    impl VoterLocation {
        /// Roughly 4.4km east of the example geofence center.
        pub fn inside_example() -> Self {
            Self::verified(37.98, 23.77)
        }

        /// Roughly 8.9km south of the example geofence center.
        pub fn outside_example() -> Self {
            Self::verified(37.90, 23.72)
        }
    }
}

#[cfg(test)]
pub use examples::CREATOR;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn examples_are_valid() {
        assert_eq!(Instrument::single_choice_example(1).validate(), Ok(()));
        assert_eq!(Instrument::multiple_choice_example(2).validate(), Ok(()));
        assert_eq!(Instrument::ranking_example(3).validate(), Ok(()));
        assert_eq!(Instrument::survey_example(4).validate(), Ok(()));
    }

    #[test]
    fn options_and_questions_are_exclusive() {
        let mut poll = Instrument::single_choice_example(1);
        poll.questions = Question::survey_example();
        assert!(poll.validate().is_err());

        let mut survey = Instrument::survey_example(2);
        survey.options = Instrument::ranking_example(3).options;
        assert!(survey.validate().is_err());
    }

    #[test]
    fn option_orders_must_be_dense() {
        let mut poll = Instrument::ranking_example(1);
        poll.options[2].order = 5;
        assert!(poll.validate().is_err());

        let mut poll = Instrument::ranking_example(1);
        poll.options[2].id = poll.options[0].id;
        assert!(poll.validate().is_err());
    }

    #[test]
    fn open_window() {
        let mut poll = Instrument::single_choice_example(1);
        let now = Utc::now();
        assert!(poll.is_open(now));
        assert!(!poll.is_open(poll.end_at + Duration::seconds(1)));
        assert!(!poll.is_open(poll.start_at - Duration::seconds(1)));
        poll.active = false;
        assert!(!poll.is_open(now));
    }
}
