use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::aggregate::{classify_band, mean, round2, Band, OrderedGroups};
use crate::models::{ObservationRecord, UNKNOWN_LABEL};

/// Weakness and strength breakdown for one dimension across every teacher
/// observed on it. Serialized keys match the analytics API wire format.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DimensionReport {
    pub dimension: String,
    pub average_score: f64,
    pub weak_count: usize,
    pub weak_teachers: Vec<TeacherScore>,
    pub strong_count: usize,
    pub strong_teachers: Vec<TeacherScore>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TeacherScore {
    pub name: String,
    pub score: f64,
}

/// Cross-teacher, cross-tool weakness report.
///
/// Dimensions are emitted in the order they first appear while walking the
/// input; teachers group by full-name string, with `"Unknown"` standing in
/// for a missing teacher link. Weak lists sort ascending (worst first) and
/// strong lists descending, ties keeping encounter order.
pub fn analyze_dimension_weakness(observations: &[ObservationRecord]) -> Vec<DimensionReport> {
    let mut dimension_scores: OrderedGroups<String, f64> = OrderedGroups::new();
    let mut teacher_scores: HashMap<String, OrderedGroups<String, f64>> = HashMap::new();

    for observation in observations {
        let teacher = observation
            .teacher_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

        for (dimension, score) in observation.scores.iter() {
            dimension_scores.push(dimension.to_string(), score);
            teacher_scores
                .entry(dimension.to_string())
                .or_default()
                .push(teacher.clone(), score);
        }
    }

    let mut reports = Vec::with_capacity(dimension_scores.len());

    for (dimension, scores) in dimension_scores.iter() {
        let mut weak_teachers = Vec::new();
        let mut strong_teachers = Vec::new();

        if let Some(by_teacher) = teacher_scores.get(dimension) {
            for (name, teacher_dimension_scores) in by_teacher.iter() {
                let average = mean(teacher_dimension_scores);
                let entry = TeacherScore {
                    name: name.clone(),
                    score: round2(average),
                };
                match classify_band(average) {
                    Band::Weak => weak_teachers.push(entry),
                    Band::Strong => strong_teachers.push(entry),
                    Band::Typical => {}
                }
            }
        }

        weak_teachers.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));
        strong_teachers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        reports.push(DimensionReport {
            dimension: dimension.clone(),
            average_score: round2(mean(scores)),
            weak_count: weak_teachers.len(),
            weak_teachers,
            strong_count: strong_teachers.len(),
            strong_teachers,
        });
    }

    reports
}
