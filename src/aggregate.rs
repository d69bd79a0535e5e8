use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::models::ObservationRecord;

/// Teachers averaging strictly below this on a dimension are flagged weak.
pub const WEAK_THRESHOLD: f64 = 3.0;
/// Strong performers sit in the closed interval [3.5, 4.0].
pub const STRONG_LOWER_THRESHOLD: f64 = 3.5;
pub const STRONG_UPPER_THRESHOLD: f64 = 4.0;

const TREND_DELTA: f64 = 0.3;

/// Rounding happens once, where a value leaves the engine. Intermediate
/// math stays unrounded so errors do not compound.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of a score list, 0 for the empty list so nothing downstream ever
/// sees a NaN.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Grouping that yields keys in the order they were first pushed.
///
/// Discovery order is part of every report's contract, so the groups ride
/// alongside a key list instead of relying on map iteration order.
#[derive(Debug, Clone)]
pub struct OrderedGroups<K, V> {
    order: Vec<K>,
    groups: HashMap<K, Vec<V>>,
}

impl<K: Eq + Hash + Clone, V> OrderedGroups<K, V> {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            groups: HashMap::new(),
        }
    }

    pub fn push(&mut self, key: K, value: V) {
        if !self.groups.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.groups.entry(key).or_insert_with(Vec::new).push(value);
    }

    /// Groups in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[V])> + '_ {
        self.order.iter().map(|key| (key, self.groups[key].as_slice()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

impl<K: Eq + Hash + Clone, V> Default for OrderedGroups<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Count plus mean/max/min over a set of scores, zeroed for the empty set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreStats {
    pub count: usize,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
}

impl ScoreStats {
    pub fn compute(values: impl IntoIterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut highest = f64::NEG_INFINITY;
        let mut lowest = f64::INFINITY;

        for value in values {
            count += 1;
            sum += value;
            highest = highest.max(value);
            lowest = lowest.min(value);
        }

        if count == 0 {
            return Self {
                count: 0,
                average: 0.0,
                highest: 0.0,
                lowest: 0.0,
            };
        }

        Self {
            count,
            average: round2(sum / count as f64),
            highest: round2(highest),
            lowest: round2(lowest),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DimensionAverage {
    pub dimension: String,
    pub average_score: f64,
    pub count: usize,
}

/// Mean score per dimension across all given observations, flat
/// accumulation, dimensions in discovery order.
pub fn dimension_averages(observations: &[ObservationRecord]) -> Vec<DimensionAverage> {
    let mut groups: OrderedGroups<String, f64> = OrderedGroups::new();
    for observation in observations {
        for (dimension, score) in observation.scores.iter() {
            groups.push(dimension.to_string(), score);
        }
    }

    groups
        .iter()
        .map(|(dimension, scores)| DimensionAverage {
            dimension: dimension.clone(),
            average_score: round2(mean(scores)),
            count: scores.len(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct DimensionAnalysis {
    pub highest_dimension: Option<DimensionAverage>,
    pub lowest_dimension: Option<DimensionAverage>,
    pub all_dimensions: Vec<DimensionAverage>,
}

/// Stable descending sort by average; the first element is the highest
/// dimension and the last the lowest. Equal averages keep discovery order.
pub fn rank_dimensions(mut averages: Vec<DimensionAverage>) -> DimensionAnalysis {
    averages.sort_by(|a, b| {
        b.average_score
            .partial_cmp(&a.average_score)
            .unwrap_or(Ordering::Equal)
    });

    DimensionAnalysis {
        highest_dimension: averages.first().cloned(),
        lowest_dimension: averages.last().cloned(),
        all_dimensions: averages,
    }
}

/// Performance band for a teacher's mean score on one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Weak,
    Typical,
    Strong,
}

/// Band membership is decided on the unrounded mean.
pub fn classify_band(average: f64) -> Band {
    if average < WEAK_THRESHOLD {
        Band::Weak
    } else if (STRONG_LOWER_THRESHOLD..=STRONG_UPPER_THRESHOLD).contains(&average) {
        Band::Strong
    } else {
        Band::Typical
    }
}

/// Coarse movement between the first and second halves of a date-ordered
/// score run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// `scores` must already be in ascending date order. The split point is
/// floor(n/2), so for odd counts the first half is the smaller one. Fewer
/// than two observations cannot support a trend.
pub fn classify_trend(scores: &[f64]) -> Option<Trend> {
    if scores.len() < 2 {
        return None;
    }

    let midpoint = scores.len() / 2;
    let delta = mean(&scores[midpoint..]) - mean(&scores[..midpoint]);

    if delta > TREND_DELTA {
        Some(Trend::Improving)
    } else if delta < -TREND_DELTA {
        Some(Trend::Declining)
    } else {
        Some(Trend::Stable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreMap;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn observation(scores: ScoreMap) -> ObservationRecord {
        let average_score = scores.average();
        ObservationRecord {
            id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            evaluation_tool_id: Uuid::new_v4(),
            observer_id: None,
            observation_date: NaiveDate::from_ymd_opt(2025, 11, 7).unwrap(),
            scores,
            average_score,
            teacher_name: Some("Cesar Arana".to_string()),
            tool_name: Some("ELEOT".to_string()),
            notes: None,
        }
    }

    #[test]
    fn round2_keeps_two_fractional_digits() {
        assert_eq!(round2(2.336), 2.34);
        assert_eq!(round2(2.333), 2.33);
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(3.0), 3.0);
    }

    #[test]
    fn mean_of_empty_list_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn ordered_groups_keep_discovery_order() {
        let mut groups = OrderedGroups::new();
        groups.push("Zeta", 1);
        groups.push("Alpha", 2);
        groups.push("Zeta", 3);
        groups.push("Mid", 4);

        let keys: Vec<&&str> = groups.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![&"Zeta", &"Alpha", &"Mid"]);
        let (_, zeta) = groups.iter().next().unwrap();
        assert_eq!(zeta, &[1, 3]);
    }

    #[test]
    fn score_stats_zeroed_for_empty_input() {
        let stats = ScoreStats::compute(std::iter::empty());
        assert_eq!(
            stats,
            ScoreStats {
                count: 0,
                average: 0.0,
                highest: 0.0,
                lowest: 0.0
            }
        );
    }

    #[test]
    fn score_stats_rounds_at_the_boundary() {
        let stats = ScoreStats::compute([2.93, 3.36, 3.89]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.average, 3.39);
        assert_eq!(stats.highest, 3.89);
        assert_eq!(stats.lowest, 2.93);
    }

    #[test]
    fn dimension_averages_follow_first_appearance() {
        let observations = vec![
            observation(ScoreMap::from_pairs([("G", 2.0), ("A", 4.0)])),
            observation(ScoreMap::from_pairs([("B", 3.0), ("G", 3.0)])),
        ];

        let averages = dimension_averages(&observations);
        let names: Vec<&str> = averages.iter().map(|a| a.dimension.as_str()).collect();
        assert_eq!(names, vec!["G", "A", "B"]);
        assert_eq!(averages[0].average_score, 2.5);
        assert_eq!(averages[0].count, 2);
    }

    #[test]
    fn rank_dimensions_is_stable_on_ties() {
        let averages = vec![
            DimensionAverage {
                dimension: "A".to_string(),
                average_score: 3.0,
                count: 2,
            },
            DimensionAverage {
                dimension: "B".to_string(),
                average_score: 4.0,
                count: 2,
            },
            DimensionAverage {
                dimension: "C".to_string(),
                average_score: 3.0,
                count: 2,
            },
        ];

        let analysis = rank_dimensions(averages);
        let names: Vec<&str> = analysis
            .all_dimensions
            .iter()
            .map(|a| a.dimension.as_str())
            .collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert_eq!(analysis.highest_dimension.unwrap().dimension, "B");
        assert_eq!(analysis.lowest_dimension.unwrap().dimension, "C");
    }

    #[test]
    fn rank_dimensions_of_nothing_has_no_extremes() {
        let analysis = rank_dimensions(Vec::new());
        assert!(analysis.highest_dimension.is_none());
        assert!(analysis.lowest_dimension.is_none());
        assert!(analysis.all_dimensions.is_empty());
    }

    #[test]
    fn single_dimension_is_both_highest_and_lowest() {
        let analysis = rank_dimensions(vec![DimensionAverage {
            dimension: "A".to_string(),
            average_score: 3.2,
            count: 5,
        }]);
        assert_eq!(analysis.highest_dimension, analysis.lowest_dimension);
    }

    #[test]
    fn band_thresholds_are_exact() {
        assert_eq!(classify_band(2.99), Band::Weak);
        assert_eq!(classify_band(3.0), Band::Typical);
        assert_eq!(classify_band(3.2), Band::Typical);
        assert_eq!(classify_band(3.5), Band::Strong);
        assert_eq!(classify_band(4.0), Band::Strong);
        assert_eq!(classify_band(4.01), Band::Typical);
    }

    #[test]
    fn trend_follows_the_delta_rule() {
        assert_eq!(classify_trend(&[2.0, 4.0]), Some(Trend::Improving));
        assert_eq!(classify_trend(&[4.0, 2.0]), Some(Trend::Declining));
        assert_eq!(classify_trend(&[3.0, 3.2]), Some(Trend::Stable));
        assert_eq!(classify_trend(&[3.0]), None);
        assert_eq!(classify_trend(&[]), None);
    }

    #[test]
    fn trend_splits_odd_counts_with_the_smaller_first_half() {
        // First half [2.0, 2.0], second half [2.0, 2.0, 4.0]: delta 0.67.
        assert_eq!(
            classify_trend(&[2.0, 2.0, 2.0, 2.0, 4.0]),
            Some(Trend::Improving)
        );
        // Boundary: delta exactly 0.3 is stable, not improving.
        assert_eq!(classify_trend(&[3.0, 3.3]), Some(Trend::Stable));
    }
}
