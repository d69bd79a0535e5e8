use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{
    classify_trend, dimension_averages, mean, rank_dimensions, round2, DimensionAnalysis,
    OrderedGroups, ScoreStats, Trend,
};
use crate::models::{Department, Level, ObservationRecord, Period, Teacher, UNKNOWN_LABEL};

/// Cross-time dashboard for a single teacher.
#[derive(Debug, Clone, Serialize)]
pub struct TeacherReport {
    pub teacher: TeacherProfile,
    pub period: Period,
    pub filters: AppliedFilters,
    pub overall_stats: PerformanceStats,
    pub scores_over_time: Vec<TimelinePoint>,
    pub dimension_analysis: DimensionAnalysis,
    pub tool_breakdown: Vec<ToolBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherProfile {
    pub id: Uuid,
    pub name: String,
    pub department: Department,
    pub level: Level,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedFilters {
    pub evaluation_tool_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub total_observations: usize,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub trend: Option<Trend>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub average_score: f64,
    pub evaluation_tool: String,
    pub observation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolBreakdown {
    pub tool_id: Uuid,
    pub tool_name: String,
    pub average_score: f64,
    pub observations_count: usize,
}

/// Track one teacher's scores over time.
///
/// `observations` must already be filtered to the teacher plus any window
/// and tool filter; ordering them by date is this analyzer's job, and every
/// downstream step (timeline, trend halves) reads that order. Observations
/// sharing a date keep their fetched relative order.
pub fn analyze_teacher_performance(
    teacher: &Teacher,
    period: Period,
    evaluation_tool_id: Option<Uuid>,
    observations: &[ObservationRecord],
) -> TeacherReport {
    let mut ordered: Vec<ObservationRecord> = observations.to_vec();
    ordered.sort_by(|a, b| a.observation_date.cmp(&b.observation_date));

    let stats = ScoreStats::compute(ordered.iter().map(|o| o.average_score));
    let averages: Vec<f64> = ordered.iter().map(|o| o.average_score).collect();
    let trend = classify_trend(&averages);

    let scores_over_time = ordered
        .iter()
        .map(|observation| TimelinePoint {
            date: observation.observation_date,
            average_score: round2(observation.average_score),
            evaluation_tool: observation
                .tool_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            observation_id: observation.id,
        })
        .collect();

    let analysis = rank_dimensions(dimension_averages(&ordered));

    let mut by_tool: OrderedGroups<Uuid, &ObservationRecord> = OrderedGroups::new();
    for observation in &ordered {
        by_tool.push(observation.evaluation_tool_id, observation);
    }

    // First-encountered tool first; no re-sort.
    let tool_breakdown = by_tool
        .iter()
        .map(|(tool_id, group)| {
            let scores: Vec<f64> = group.iter().map(|o| o.average_score).collect();
            ToolBreakdown {
                tool_id: *tool_id,
                tool_name: group
                    .iter()
                    .find_map(|o| o.tool_name.clone())
                    .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
                average_score: round2(mean(&scores)),
                observations_count: group.len(),
            }
        })
        .collect();

    TeacherReport {
        teacher: TeacherProfile {
            id: teacher.id,
            name: teacher.full_name(),
            department: teacher.department,
            level: teacher.level,
            subject: teacher.subject.clone(),
        },
        period,
        filters: AppliedFilters { evaluation_tool_id },
        overall_stats: PerformanceStats {
            total_observations: stats.count,
            average_score: stats.average,
            highest_score: stats.highest,
            lowest_score: stats.lowest,
            trend,
        },
        scores_over_time,
        dimension_analysis: analysis,
        tool_breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScoreMap, Status};

    fn teacher() -> Teacher {
        Teacher {
            id: Uuid::new_v4(),
            first_name: "Jennifer".to_string(),
            middle_name: None,
            last_name: "Martínez".to_string(),
            email: None,
            subject: Some("Maestra de Preparatoria Ingles".to_string()),
            department: Department::English,
            level: Level::Primaria,
            hire_date: NaiveDate::from_ymd_opt(2022, 8, 15),
            status: Status::Active,
        }
    }

    fn observation(day: u32, tool: Option<(&str, Uuid)>, scores: ScoreMap) -> ObservationRecord {
        let average_score = scores.average();
        ObservationRecord {
            id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            evaluation_tool_id: tool.map(|(_, id)| id).unwrap_or_else(Uuid::new_v4),
            observer_id: None,
            observation_date: NaiveDate::from_ymd_opt(2025, 11, day).unwrap(),
            scores,
            average_score,
            teacher_name: Some("Jennifer Martínez".to_string()),
            tool_name: tool.map(|(name, _)| name.to_string()),
            notes: None,
        }
    }

    #[test]
    fn empty_history_reports_zeroed_stats_and_no_trend() {
        let report =
            analyze_teacher_performance(&teacher(), Period::default(), None, &[]);

        assert_eq!(report.overall_stats.total_observations, 0);
        assert_eq!(report.overall_stats.average_score, 0.0);
        assert_eq!(report.overall_stats.highest_score, 0.0);
        assert_eq!(report.overall_stats.lowest_score, 0.0);
        assert!(report.overall_stats.trend.is_none());
        assert!(report.scores_over_time.is_empty());
        assert!(report.dimension_analysis.highest_dimension.is_none());
        assert!(report.tool_breakdown.is_empty());
        assert_eq!(report.teacher.name, "Jennifer Martínez");
    }

    #[test]
    fn timeline_is_sorted_ascending_regardless_of_input_order() {
        let eleot = ("ELEOT", Uuid::new_v4());
        let observations = vec![
            observation(20, Some(eleot), ScoreMap::from_pairs([("A", 4.0)])),
            observation(3, Some(eleot), ScoreMap::from_pairs([("A", 2.0)])),
            observation(12, Some(eleot), ScoreMap::from_pairs([("A", 3.0)])),
        ];

        let report =
            analyze_teacher_performance(&teacher(), Period::default(), None, &observations);
        let days: Vec<u32> = report
            .scores_over_time
            .iter()
            .map(|p| chrono::Datelike::day(&p.date))
            .collect();
        assert_eq!(days, vec![3, 12, 20]);
        assert_eq!(report.scores_over_time[0].average_score, 2.0);
    }

    #[test]
    fn single_observation_has_no_trend() {
        let observations = vec![observation(3, None, ScoreMap::from_pairs([("A", 3.0)]))];
        let report =
            analyze_teacher_performance(&teacher(), Period::default(), None, &observations);
        assert_eq!(report.overall_stats.total_observations, 1);
        assert!(report.overall_stats.trend.is_none());
    }

    #[test]
    fn rising_scores_classify_as_improving() {
        let eleot = ("ELEOT", Uuid::new_v4());
        let observations = vec![
            observation(20, Some(eleot), ScoreMap::from_pairs([("A", 4.0)])),
            observation(3, Some(eleot), ScoreMap::from_pairs([("A", 2.0)])),
        ];

        let report =
            analyze_teacher_performance(&teacher(), Period::default(), None, &observations);
        assert_eq!(report.overall_stats.trend, Some(Trend::Improving));
    }

    #[test]
    fn falling_scores_classify_as_declining() {
        let observations = vec![
            observation(3, None, ScoreMap::from_pairs([("A", 4.0)])),
            observation(20, None, ScoreMap::from_pairs([("A", 2.0)])),
        ];

        let report =
            analyze_teacher_performance(&teacher(), Period::default(), None, &observations);
        assert_eq!(report.overall_stats.trend, Some(Trend::Declining));
    }

    #[test]
    fn small_moves_classify_as_stable() {
        let observations = vec![
            observation(3, None, ScoreMap::from_pairs([("A", 3.0)])),
            observation(20, None, ScoreMap::from_pairs([("A", 3.2)])),
        ];

        let report =
            analyze_teacher_performance(&teacher(), Period::default(), None, &observations);
        assert_eq!(report.overall_stats.trend, Some(Trend::Stable));
    }

    #[test]
    fn tool_breakdown_keeps_first_encounter_order() {
        let eleot = ("ELEOT", Uuid::new_v4());
        let tot = ("TOT", Uuid::new_v4());
        let observations = vec![
            observation(3, Some(tot), ScoreMap::from_pairs([("H", 3.0)])),
            observation(10, Some(eleot), ScoreMap::from_pairs([("A", 4.5)])),
            observation(17, Some(tot), ScoreMap::from_pairs([("H", 4.0)])),
        ];

        let report =
            analyze_teacher_performance(&teacher(), Period::default(), None, &observations);
        let names: Vec<&str> = report
            .tool_breakdown
            .iter()
            .map(|t| t.tool_name.as_str())
            .collect();

        // TOT first despite ELEOT's higher average.
        assert_eq!(names, vec!["TOT", "ELEOT"]);
        assert_eq!(report.tool_breakdown[0].average_score, 3.5);
        assert_eq!(report.tool_breakdown[0].observations_count, 2);
    }

    #[test]
    fn missing_tool_link_renders_unknown() {
        let observations = vec![observation(3, None, ScoreMap::from_pairs([("A", 3.0)]))];
        let report =
            analyze_teacher_performance(&teacher(), Period::default(), None, &observations);
        assert_eq!(report.scores_over_time[0].evaluation_tool, "Unknown");
        assert_eq!(report.tool_breakdown[0].tool_name, "Unknown");
    }

    #[test]
    fn filters_and_trend_serialize_on_the_wire() {
        let tool_id = Uuid::new_v4();
        let observations = vec![
            observation(3, None, ScoreMap::from_pairs([("A", 2.0)])),
            observation(20, None, ScoreMap::from_pairs([("A", 4.0)])),
        ];

        let report = analyze_teacher_performance(
            &teacher(),
            Period::default(),
            Some(tool_id),
            &observations,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall_stats"]["trend"], "improving");
        assert_eq!(
            json["filters"]["evaluation_tool_id"],
            serde_json::json!(tool_id)
        );
        assert_eq!(json["teacher"]["department"], "english");
    }
}
