use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::common::instrument::{Coordinates, LocationPolicy, VoterLocation};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance between two points, in kilometers.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push `h` fractionally outside [0, 1] for antipodal points.
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();
    (EARTH_RADIUS_KM * c).max(0.0)
}

/// Why a voter may not respond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum IneligibleReason {
    /// We have no location for the voter; the caller should re-prompt for one.
    NeedsLocationDetection,
    /// The voter entered a location by hand and has not confirmed it yet.
    NeedsVerification,
    /// The voter is outside the geofence.
    #[serde(rename_all = "camelCase")]
    OutOfRadius { distance_km: f64, shortfall_km: f64 },
    /// The voter's resolved place does not match a legacy scoped policy.
    OutOfRegion,
}

impl IneligibleReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NeedsLocationDetection => "needs-location-detection",
            Self::NeedsVerification => "needs-verification",
            Self::OutOfRadius { .. } => "out-of-radius",
            Self::OutOfRegion => "out-of-region",
        }
    }
}

/// The outcome of an eligibility check.
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    /// `distance_km` is reported for geofenced policies.
    Eligible { distance_km: Option<f64> },
    Ineligible(IneligibleReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }
}

/// Decide whether a voter at `voter` may respond under `policy`.
///
/// The instrument's creator is always eligible so they can test their own
/// instruments. A point exactly on the geofence boundary is inside it.
pub fn evaluate(policy: &LocationPolicy, voter: &VoterLocation, is_owner: bool) -> Eligibility {
    if is_owner || *policy == LocationPolicy::Global {
        return Eligibility::Eligible { distance_km: None };
    }
    if !voter.confirmed {
        return Eligibility::Ineligible(IneligibleReason::NeedsLocationDetection);
    }
    if !voter.verified {
        return Eligibility::Ineligible(IneligibleReason::NeedsVerification);
    }

    match policy {
        LocationPolicy::Global => Eligibility::Eligible { distance_km: None },
        LocationPolicy::Geofenced {
            center_lat,
            center_lng,
            radius_km,
        } => {
            let center = Coordinates::new(*center_lat, *center_lng);
            let distance_km = haversine_km(center, voter.coordinates());
            debug!("Voter is {distance_km:.3}km from center, radius {radius_km}km");
            if distance_km <= *radius_km {
                Eligibility::Eligible {
                    distance_km: Some(distance_km),
                }
            } else {
                Eligibility::Ineligible(IneligibleReason::OutOfRadius {
                    distance_km,
                    shortfall_km: distance_km - radius_km,
                })
            }
        }
        LocationPolicy::Country { name }
        | LocationPolicy::Region { name }
        | LocationPolicy::City { name } => match &voter.place {
            // Without a resolved place there is nothing to match against.
            None => Eligibility::Ineligible(IneligibleReason::NeedsLocationDetection),
            Some(place) if place.trim().is_empty() => {
                Eligibility::Ineligible(IneligibleReason::NeedsLocationDetection)
            }
            Some(place) if places_match(name, place) => {
                Eligibility::Eligible { distance_km: None }
            }
            Some(_) => Eligibility::Ineligible(IneligibleReason::OutOfRegion),
        },
    }
}

/// Legacy best-effort matching: either name contains the other, ignoring case.
fn places_match(scope: &str, place: &str) -> bool {
    let scope = scope.trim().to_lowercase();
    let place = place.trim().to_lowercase();
    !scope.is_empty() && !place.is_empty() && (place.contains(&scope) || scope.contains(&place))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn athens() -> LocationPolicy {
        LocationPolicy::Geofenced {
            center_lat: 37.98,
            center_lng: 23.72,
            radius_km: 5.0,
        }
    }

    #[test]
    fn haversine_known_distances() {
        let center = Coordinates::new(37.98, 23.72);
        let east = haversine_km(center, Coordinates::new(37.98, 23.77));
        assert!((east - 4.38).abs() < 0.01, "got {east}");
        let south = haversine_km(center, Coordinates::new(37.90, 23.72));
        assert!((south - 8.90).abs() < 0.01, "got {south}");
        assert_eq!(haversine_km(center, center), 0.0);
        // Symmetric.
        assert_eq!(
            haversine_km(center, Coordinates::new(37.90, 23.72)),
            haversine_km(Coordinates::new(37.90, 23.72), center)
        );
    }

    #[test]
    fn geofence_examples() {
        let inside = evaluate(&athens(), &VoterLocation::verified(37.98, 23.77), false);
        assert!(inside.is_eligible());

        match evaluate(&athens(), &VoterLocation::verified(37.90, 23.72), false) {
            Eligibility::Ineligible(IneligibleReason::OutOfRadius {
                distance_km,
                shortfall_km,
            }) => {
                assert!((distance_km - 8.9).abs() < 0.05);
                assert!((shortfall_km - 3.9).abs() < 0.05);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn boundary_is_inclusive() {
        let voter = VoterLocation::verified(37.90, 23.72);
        let distance = haversine_km(Coordinates::new(37.98, 23.72), voter.coordinates());
        let on_boundary = LocationPolicy::Geofenced {
            center_lat: 37.98,
            center_lng: 23.72,
            radius_km: distance,
        };
        assert!(evaluate(&on_boundary, &voter, false).is_eligible());

        let radius_just_short = LocationPolicy::Geofenced {
            center_lat: 37.98,
            center_lng: 23.72,
            radius_km: distance - 1e-9,
        };
        assert!(!evaluate(&radius_just_short, &voter, false).is_eligible());
    }

    #[test]
    fn location_states() {
        assert_eq!(
            evaluate(&athens(), &VoterLocation::unknown(), false),
            Eligibility::Ineligible(IneligibleReason::NeedsLocationDetection)
        );

        let mut manual = VoterLocation::verified(37.98, 23.72);
        manual.verified = false;
        assert_eq!(
            evaluate(&athens(), &manual, false),
            Eligibility::Ineligible(IneligibleReason::NeedsVerification)
        );
    }

    #[test]
    fn owner_and_global_bypass() {
        let far_away = VoterLocation::verified(51.5, -0.12);
        assert!(evaluate(&athens(), &far_away, true).is_eligible());
        assert!(evaluate(&athens(), &VoterLocation::unknown(), true).is_eligible());
        assert!(evaluate(&LocationPolicy::Global, &VoterLocation::unknown(), false).is_eligible());
    }

    #[test]
    fn legacy_scopes_match_by_name() {
        let policy = LocationPolicy::City {
            name: "Athens".to_string(),
        };
        let mut voter = VoterLocation::verified(37.98, 23.72);
        assert_eq!(
            evaluate(&policy, &voter, false),
            Eligibility::Ineligible(IneligibleReason::NeedsLocationDetection)
        );

        voter.place = Some("athens, attica, greece".to_string());
        assert!(evaluate(&policy, &voter, false).is_eligible());

        voter.place = Some("Thessaloniki, Greece".to_string());
        assert_eq!(
            evaluate(&policy, &voter, false),
            Eligibility::Ineligible(IneligibleReason::OutOfRegion)
        );

        // A blank place is contained in every name, but resolves nothing.
        for blank in ["", "   "] {
            voter.place = Some(blank.to_string());
            assert_eq!(
                evaluate(&policy, &voter, false),
                Eligibility::Ineligible(IneligibleReason::NeedsLocationDetection)
            );
        }
        assert!(!places_match("Athens", " "));
    }
}
