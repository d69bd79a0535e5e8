use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{
    dimension_averages, mean, rank_dimensions, round2, DimensionAnalysis, OrderedGroups,
    ScoreStats,
};
use crate::models::{EvaluationTool, ObservationRecord, Period, UNKNOWN_LABEL};

/// Cross-teacher dashboard for a single evaluation tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    pub evaluation_tool: ToolSummary,
    pub period: Period,
    pub overall_stats: OverallStats,
    pub dimension_analysis: DimensionAnalysis,
    pub teacher_comparison: Vec<TeacherComparison>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub dimensions: Vec<String>,
}

impl From<&EvaluationTool> for ToolSummary {
    fn from(tool: &EvaluationTool) -> Self {
        Self {
            id: tool.id,
            name: tool.name.clone(),
            description: tool.description.clone(),
            dimensions: tool.dimensions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallStats {
    pub total_observations: usize,
    pub overall_average: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TeacherComparison {
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub average_score: f64,
    pub observations_count: usize,
}

/// Compare every teacher observed with one tool over an optional window.
///
/// `observations` must already be filtered to the tool and window; the tool
/// row itself is resolved upstream, which is also where its existence is
/// validated. Teacher groups form in first-encountered order and then sort
/// descending by mean score, ties keeping that order.
pub fn analyze_tool(
    tool: &EvaluationTool,
    period: Period,
    observations: &[ObservationRecord],
) -> ToolReport {
    let stats = ScoreStats::compute(observations.iter().map(|o| o.average_score));
    let analysis = rank_dimensions(dimension_averages(observations));

    let mut by_teacher: OrderedGroups<Uuid, &ObservationRecord> = OrderedGroups::new();
    for observation in observations {
        by_teacher.push(observation.teacher_id, observation);
    }

    let mut teacher_comparison: Vec<TeacherComparison> = by_teacher
        .iter()
        .map(|(teacher_id, group)| {
            let scores: Vec<f64> = group.iter().map(|o| o.average_score).collect();
            TeacherComparison {
                teacher_id: *teacher_id,
                teacher_name: group
                    .iter()
                    .find_map(|o| o.teacher_name.clone())
                    .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
                average_score: round2(mean(&scores)),
                observations_count: group.len(),
            }
        })
        .collect();

    teacher_comparison.sort_by(|a, b| {
        b.average_score
            .partial_cmp(&a.average_score)
            .unwrap_or(Ordering::Equal)
    });

    ToolReport {
        evaluation_tool: ToolSummary::from(tool),
        period,
        overall_stats: OverallStats {
            total_observations: stats.count,
            overall_average: stats.average,
            highest_score: stats.highest,
            lowest_score: stats.lowest,
        },
        dimension_analysis: analysis,
        teacher_comparison,
    }
}
