use serde::{Deserialize, Serialize};

/// A WGS-84 point in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Are both components finite and within their valid ranges?
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Who may respond to an instrument, by where they are.
///
/// The `country`, `region` and `city` scopes are carried over from the legacy
/// system and only matched by name on a best-effort basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum LocationPolicy {
    Global,
    #[serde(rename_all = "camelCase")]
    Geofenced {
        center_lat: f64,
        center_lng: f64,
        radius_km: f64,
    },
    Country {
        name: String,
    },
    Region {
        name: String,
    },
    City {
        name: String,
    },
}

impl LocationPolicy {
    /// Check the policy is internally consistent.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Geofenced {
                center_lat,
                center_lng,
                radius_km,
            } => {
                if !Coordinates::new(*center_lat, *center_lng).is_valid() {
                    return Err(format!(
                        "geofence center ({center_lat}, {center_lng}) is not a valid coordinate"
                    ));
                }
                if !radius_km.is_finite() || *radius_km <= 0.0 {
                    return Err(format!("geofence radius {radius_km}km must be positive"));
                }
                Ok(())
            }
            Self::Country { name } | Self::Region { name } | Self::City { name } => {
                if name.trim().is_empty() {
                    Err("scoped policy has an empty place name".to_string())
                } else {
                    Ok(())
                }
            }
            Self::Global => Ok(()),
        }
    }
}

impl Default for LocationPolicy {
    fn default() -> Self {
        Self::Global
    }
}

/// What we know about where a voter is, as supplied by the location store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterLocation {
    pub lat: f64,
    pub lng: f64,
    /// The voter supplied some location, by GPS or by hand.
    pub confirmed: bool,
    /// A GPS fix was accepted, or the voter explicitly confirmed manual coordinates.
    pub verified: bool,
    /// Resolved place name, e.g. "Athens, Attica, Greece". Only used by legacy scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
}

impl VoterLocation {
    /// The location of a voter we know nothing about.
    pub fn unknown() -> Self {
        Self {
            lat: 0.0,
            lng: 0.0,
            confirmed: false,
            verified: false,
            place: None,
        }
    }

    /// A location from a GPS fix, which is verified by construction.
    pub fn verified(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            confirmed: true,
            verified: true,
            place: None,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}
