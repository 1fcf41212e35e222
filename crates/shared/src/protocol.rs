use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{LaunchId, RocketId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Launch {
    pub id: LaunchId,
    pub name: String,
    pub date_utc: DateTime<Utc>,
    #[serde(default)]
    pub date_local: Option<String>,
    /// `None` for launches that have not flown yet.
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub flight_number: Option<u32>,
    #[serde(default)]
    pub details: Option<String>,
    pub rocket: RocketId,
    #[serde(default)]
    pub launchpad: Option<String>,
    #[serde(default)]
    pub failures: Vec<LaunchFailure>,
    #[serde(default)]
    pub fairings: Option<Fairings>,
    #[serde(default)]
    pub cores: Vec<LaunchCore>,
    #[serde(default)]
    pub links: LaunchLinks,
    #[serde(default)]
    pub payloads: Vec<String>,
    #[serde(default)]
    pub ships: Vec<String>,
}

impl Launch {
    pub fn patch_small(&self) -> Option<&str> {
        self.links.patch.small.as_deref()
    }

    pub fn patch_large(&self) -> Option<&str> {
        self.links.patch.large.as_deref()
    }

    pub fn has_rocket(&self) -> bool {
        !self.rocket.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchFailure {
    /// Seconds after liftoff.
    pub time: i64,
    #[serde(default)]
    pub altitude: Option<f64>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fairings {
    #[serde(default)]
    pub reused: Option<bool>,
    #[serde(default)]
    pub recovery_attempt: Option<bool>,
    #[serde(default)]
    pub recovered: Option<bool>,
    #[serde(default)]
    pub ships: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchCore {
    #[serde(default)]
    pub core: Option<String>,
    #[serde(default)]
    pub reused: Option<bool>,
    #[serde(default)]
    pub landing_success: Option<bool>,
    #[serde(default)]
    pub landing_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchLinks {
    #[serde(default)]
    pub patch: PatchLinks,
    #[serde(default)]
    pub webcast: Option<String>,
    #[serde(default)]
    pub article: Option<String>,
    #[serde(default)]
    pub wikipedia: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchLinks {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rocket {
    pub id: RocketId,
    pub name: String,
    #[serde(default)]
    pub height: Length,
    #[serde(default)]
    pub mass: Mass,
    #[serde(default)]
    pub description: String,
}

impl Rocket {
    pub fn height_meters(&self) -> Option<f64> {
        self.height.meters
    }

    pub fn mass_kg(&self) -> Option<f64> {
        self.mass.kg
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Length {
    #[serde(default)]
    pub meters: Option<f64>,
    #[serde(default)]
    pub feet: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Mass {
    #[serde(default)]
    pub kg: Option<f64>,
    #[serde(default)]
    pub lb: Option<f64>,
}
