use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of place a news search is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceType {
    #[serde(rename = "PR")]
    PlanningRegion,
    #[serde(rename = "CTY")]
    County,
    #[serde(rename = "AU")]
    AdministrativeUnit,
    #[serde(rename = "LAU")]
    LocalAdministrativeUnit,
}

impl PlaceType {
    pub const ALL: [PlaceType; 4] = [
        PlaceType::PlanningRegion,
        PlaceType::County,
        PlaceType::AdministrativeUnit,
        PlaceType::LocalAdministrativeUnit,
    ];

    /// Code used on the wire and in tool arguments
    pub fn code(&self) -> &'static str {
        match self {
            PlaceType::PlanningRegion => "PR",
            PlaceType::County => "CTY",
            PlaceType::AdministrativeUnit => "AU",
            PlaceType::LocalAdministrativeUnit => "LAU",
        }
    }

    pub fn codes() -> Vec<&'static str> {
        Self::ALL.iter().map(|p| p.code()).collect()
    }
}

impl FromStr for PlaceType {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.code() == s)
            .ok_or_else(|| UnknownCode(s.to_string()))
    }
}

impl std::fmt::Display for PlaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Whether a search is bounded by a date range or by recency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RangeOrRecency {
    Range,
    Recency,
}

impl RangeOrRecency {
    pub const ALL: [RangeOrRecency; 2] = [RangeOrRecency::Range, RangeOrRecency::Recency];

    pub fn code(&self) -> &'static str {
        match self {
            RangeOrRecency::Range => "RANGE",
            RangeOrRecency::Recency => "RECENCY",
        }
    }

    pub fn codes() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.code()).collect()
    }
}

impl FromStr for RangeOrRecency {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.code() == s)
            .ok_or_else(|| UnknownCode(s.to_string()))
    }
}

impl std::fmt::Display for RangeOrRecency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Renewable-energy topic a news item can be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NewsTopic {
    BatteryStorage,
    GridExpansion,
    Solar,
    Hydrogen,
    Wind,
}

impl NewsTopic {
    pub const ALL: [NewsTopic; 5] = [
        NewsTopic::BatteryStorage,
        NewsTopic::GridExpansion,
        NewsTopic::Solar,
        NewsTopic::Hydrogen,
        NewsTopic::Wind,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            NewsTopic::BatteryStorage => "batteryStorage",
            NewsTopic::GridExpansion => "gridExpansion",
            NewsTopic::Solar => "solar",
            NewsTopic::Hydrogen => "hydrogen",
            NewsTopic::Wind => "wind",
        }
    }

    pub fn codes() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.code()).collect()
    }
}

impl FromStr for NewsTopic {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == s)
            .ok_or_else(|| UnknownCode(s.to_string()))
    }
}

impl std::fmt::Display for NewsTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A string that is not a known code of the target enumeration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown code: {0}")]
pub struct UnknownCode(pub String);
