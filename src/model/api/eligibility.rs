use serde::{Deserialize, Serialize};

use crate::engine::geo::{Eligibility, IneligibleReason};

/// API-friendly eligibility decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityDesc {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Distance from the geofence center, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    /// How far outside the geofence the voter is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall_km: Option<f64>,
}

impl From<Eligibility> for EligibilityDesc {
    fn from(eligibility: Eligibility) -> Self {
        match eligibility {
            Eligibility::Eligible { distance_km } => Self {
                eligible: true,
                reason: None,
                distance_km,
                shortfall_km: None,
            },
            Eligibility::Ineligible(reason) => {
                let (distance_km, shortfall_km) = match reason {
                    IneligibleReason::OutOfRadius {
                        distance_km,
                        shortfall_km,
                    } => (Some(distance_km), Some(shortfall_km)),
                    _ => (None, None),
                };
                Self {
                    eligible: false,
                    reason: Some(reason.code().to_string()),
                    distance_km,
                    shortfall_km,
                }
            }
        }
    }
}
