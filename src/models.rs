use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Display label substituted when an observation's linked teacher or tool
/// is missing from the joined metadata.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    English,
    Spanish,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::English => "english",
            Department::Spanish => "spanish",
        }
    }
}

impl FromStr for Department {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "english" => Ok(Department::English),
            "spanish" => Ok(Department::Spanish),
            other => Err(anyhow!("unknown department: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Preprimaria,
    Primaria,
    Bys,
    AreasPracticas,
    Especialidad,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Preprimaria => "preprimaria",
            Level::Primaria => "primaria",
            Level::Bys => "bys",
            Level::AreasPracticas => "areas_practicas",
            Level::Especialidad => "especialidad",
        }
    }
}

impl FromStr for Level {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "preprimaria" => Ok(Level::Preprimaria),
            "primaria" => Ok(Level::Primaria),
            "bys" => Ok(Level::Bys),
            "areas_practicas" => Ok(Level::AreasPracticas),
            "especialidad" => Ok(Level::Especialidad),
            other => Err(anyhow!("unknown level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Inactive,
    OnLeave,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
            Status::OnLeave => "on_leave",
        }
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Status::Active),
            "inactive" => Ok(Status::Inactive),
            "on_leave" => Ok(Status::OnLeave),
            other => Err(anyhow!("unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Teacher {
    pub id: Uuid,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub department: Department,
    pub level: Level,
    pub hire_date: Option<NaiveDate>,
    pub status: Status,
}

impl Teacher {
    pub fn full_name(&self) -> String {
        compose_full_name(
            &self.first_name,
            self.middle_name.as_deref(),
            &self.last_name,
        )
    }
}

/// Non-empty name parts joined by single spaces.
pub fn compose_full_name(first: &str, middle: Option<&str>, last: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in [Some(first), middle, Some(last)].into_iter().flatten() {
        let part = part.trim();
        if !part.is_empty() {
            parts.push(part);
        }
    }
    parts.join(" ")
}

#[derive(Debug, Clone, Serialize)]
pub struct Observer {
    pub id: Uuid,
    pub name: String,
    pub department: Department,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationTool {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub dimensions: Vec<String>,
}

/// Ordered mapping from dimension name to score.
///
/// Iteration yields pairs in the order they were inserted, which for data
/// decoded from a `json` column is the document order. That order carries
/// through to every report, so a plain map type will not do.
///
/// Decoding is lenient: a pair whose value is not numeric is dropped, so a
/// single corrupt entry never discards the whole observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap(Vec<(String, f64)>);

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut map = Self::new();
        for (dimension, score) in pairs {
            map.insert(dimension, score);
        }
        map
    }

    /// Re-inserting an existing dimension replaces its score in place.
    pub fn insert(&mut self, dimension: impl Into<String>, score: f64) {
        let dimension = dimension.into();
        match self.0.iter_mut().find(|(name, _)| *name == dimension) {
            Some(entry) => entry.1 = score,
            None => self.0.push((dimension, score)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(name, score)| (name.as_str(), *score))
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// Mean of all scores, 0 for an empty map.
    pub fn average(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.0.iter().map(|(_, score)| score).sum::<f64>() / self.0.len() as f64
    }

    /// The first dimension holding the minimum score.
    pub fn lowest(&self) -> Option<(&str, f64)> {
        let mut lowest = self.0.first()?.1;
        for (_, score) in &self.0 {
            if *score < lowest {
                lowest = *score;
            }
        }
        self.0
            .iter()
            .find(|(_, score)| *score == lowest)
            .map(|(name, score)| (name.as_str(), *score))
    }
}

impl Serialize for ScoreMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, score) in &self.0 {
            map.serialize_entry(name, score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScoreMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoreMapVisitor;

        impl<'de> Visitor<'de> for ScoreMapVisitor {
            type Value = ScoreMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of dimension names to numeric scores")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = ScoreMap::new();
                while let Some((dimension, value)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    if let Some(score) = value.as_f64() {
                        map.insert(dimension, score);
                    }
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ScoreMapVisitor)
    }
}

/// One observation joined with the display metadata the analyzers need.
/// `teacher_name` and `tool_name` are `None` when the linked row is gone.
#[derive(Debug, Clone, Serialize)]
pub struct ObservationRecord {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub evaluation_tool_id: Uuid,
    pub observer_id: Option<Uuid>,
    pub observation_date: NaiveDate,
    pub scores: ScoreMap,
    pub average_score: f64,
    pub teacher_name: Option<String>,
    pub tool_name: Option<String>,
    pub notes: Option<String>,
}

/// Inclusive date window echoed back on reports exactly as requested.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Period {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_skips_missing_middle_name() {
        assert_eq!(
            compose_full_name("Jennifer", None, "Martínez"),
            "Jennifer Martínez"
        );
        assert_eq!(
            compose_full_name("María", Some("Fernanda"), "Turcios Mogollón"),
            "María Fernanda Turcios Mogollón"
        );
        assert_eq!(compose_full_name("Zoe", Some("  "), "Cifuentes"), "Zoe Cifuentes");
    }

    #[test]
    fn score_map_preserves_document_order() {
        let map: ScoreMap =
            serde_json::from_str(r#"{"G": 2.33, "A": 3.75, "D": 3.0}"#).unwrap();
        let dimensions: Vec<&str> = map.dimensions().collect();
        assert_eq!(dimensions, vec!["G", "A", "D"]);
    }

    #[test]
    fn score_map_drops_non_numeric_values() {
        let map: ScoreMap =
            serde_json::from_str(r#"{"A": 3.5, "B": "n/a", "C": null, "D": 2}"#).unwrap();
        let pairs: Vec<(&str, f64)> = map.iter().collect();
        assert_eq!(pairs, vec![("A", 3.5), ("D", 2.0)]);
    }

    #[test]
    fn score_map_serializes_in_insertion_order() {
        let map = ScoreMap::from_pairs([("B", 2.0), ("A", 4.0)]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"B":2.0,"A":4.0}"#);
    }

    #[test]
    fn average_is_zero_for_empty_scores() {
        assert_eq!(ScoreMap::new().average(), 0.0);
    }

    #[test]
    fn lowest_returns_first_dimension_on_ties() {
        let map = ScoreMap::from_pairs([("A", 3.0), ("B", 2.5), ("C", 2.5)]);
        assert_eq!(map.lowest(), Some(("B", 2.5)));
        assert_eq!(ScoreMap::new().lowest(), None);
    }

    #[test]
    fn enums_round_trip_their_wire_strings() {
        assert_eq!("areas_practicas".parse::<Level>().unwrap(), Level::AreasPracticas);
        assert_eq!(Level::AreasPracticas.as_str(), "areas_practicas");
        assert_eq!("on_leave".parse::<Status>().unwrap(), Status::OnLeave);
        assert!("math".parse::<Department>().is_err());
    }
}
