//! Core type definitions used throughout the codebase

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wall-clock time in milliseconds since the Unix epoch
pub type Timestamp = u64;

pub const MINUTE_MS: u64 = 60_000;
pub const HOUR_MS: u64 = 60 * MINUTE_MS;

/// Current wall-clock time
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Opaque identifier of a nation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NationId(pub String);

impl NationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque identifier of a settlement (city or town)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettlementId(pub String);

impl SettlementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SettlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SettlementId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Unique identifier for wars, generated at declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarId(pub String);

impl WarId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WarId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Atomic unit of claimable land: one fixed-size cell in a world
///
/// Serialized as `world:x:z`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TerritoryUnit {
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl TerritoryUnit {
    pub fn new(world: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            z,
        }
    }

    /// The eight surrounding cells in the same world
    pub fn neighbors(&self) -> impl Iterator<Item = TerritoryUnit> + '_ {
        (-1..=1)
            .flat_map(|dx| (-1..=1).map(move |dz| (dx, dz)))
            .filter(|&(dx, dz)| dx != 0 || dz != 0)
            .map(move |(dx, dz)| TerritoryUnit::new(self.world.clone(), self.x + dx, self.z + dz))
    }
}

impl fmt::Display for TerritoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.world, self.x, self.z)
    }
}

impl FromStr for TerritoryUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, ':');
        let z = parts.next().ok_or_else(|| format!("missing z in '{}'", s))?;
        let x = parts.next().ok_or_else(|| format!("missing x in '{}'", s))?;
        let world = parts.next().ok_or_else(|| format!("missing world in '{}'", s))?;
        if world.is_empty() {
            return Err(format!("empty world in '{}'", s));
        }
        let x = x.parse().map_err(|_| format!("bad x coordinate in '{}'", s))?;
        let z = z.parse().map_err(|_| format!("bad z coordinate in '{}'", s))?;
        Ok(Self::new(world, x, z))
    }
}

impl From<TerritoryUnit> for String {
    fn from(unit: TerritoryUnit) -> Self {
        unit.to_string()
    }
}

impl TryFrom<String> for TerritoryUnit {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_territory_unit_parses_world_and_coordinates() {
        let unit: TerritoryUnit = "overworld:-3:12".parse().unwrap();
        assert_eq!(unit, TerritoryUnit::new("overworld", -3, 12));
        assert_eq!(unit.to_string(), "overworld:-3:12");
    }

    #[test]
    fn test_territory_unit_rejects_garbage() {
        assert!("overworld:3".parse::<TerritoryUnit>().is_err());
        assert!("overworld:a:1".parse::<TerritoryUnit>().is_err());
        assert!(":1:1".parse::<TerritoryUnit>().is_err());
    }

    #[test]
    fn test_neighbors_excludes_self() {
        let unit = TerritoryUnit::new("w", 0, 0);
        let neighbors: Vec<_> = unit.neighbors().collect();
        assert_eq!(neighbors.len(), 8);
        assert!(!neighbors.contains(&unit));
        assert!(neighbors.contains(&TerritoryUnit::new("w", 1, -1)));
    }

    #[test]
    fn test_territory_unit_serializes_as_string() {
        let unit = TerritoryUnit::new("nether", 4, 5);
        let json = serde_json::to_string(&unit).unwrap();
        assert_eq!(json, "\"nether:4:5\"");
        let back: TerritoryUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unit);
    }

    #[test]
    fn test_war_ids_are_unique() {
        assert_ne!(WarId::generate(), WarId::generate());
    }
}
