use std::fmt::Write;

use crate::models::{ObservationRecord, Period, UNKNOWN_LABEL};
use crate::weakness;

pub fn build_report(period: &Period, observations: &[ObservationRecord]) -> String {
    let dimension_reports = weakness::analyze_dimension_weakness(observations);

    let mut output = String::new();

    let window = match (period.start_date, period.end_date) {
        (Some(start), Some(end)) => format!("{start} through {end}"),
        (Some(start), None) => format!("{start} onward"),
        (None, Some(end)) => format!("up to {end}"),
        (None, None) => "all dates".to_string(),
    };

    let _ = writeln!(output, "# Classroom Observation Report");
    let _ = writeln!(output, "Generated for {window}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Dimension Overview");

    if dimension_reports.is_empty() {
        let _ = writeln!(output, "No observations recorded for this window.");
    } else {
        for report in &dimension_reports {
            let _ = writeln!(
                output,
                "- {}: average {:.2} ({} weak, {} strong)",
                report.dimension, report.average_score, report.weak_count, report.strong_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Teachers Needing Support");

    let mut weak_entries: Vec<(f64, &str, &str)> = Vec::new();
    for report in &dimension_reports {
        for teacher in &report.weak_teachers {
            weak_entries.push((teacher.score, teacher.name.as_str(), report.dimension.as_str()));
        }
    }
    weak_entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    if weak_entries.is_empty() {
        let _ = writeln!(output, "No teachers flagged in this window.");
    } else {
        for (score, name, dimension) in weak_entries.iter().take(10) {
            let _ = writeln!(output, "- {name}: {dimension} at {score:.2}");
        }
    }

    let mut recent = observations.to_vec();
    recent.sort_by(|a, b| b.observation_date.cmp(&a.observation_date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Observations");

    if recent.is_empty() {
        let _ = writeln!(output, "No observations recorded for this window.");
    } else {
        for observation in recent.iter().take(5) {
            let teacher = observation.teacher_name.as_deref().unwrap_or(UNKNOWN_LABEL);
            let tool = observation.tool_name.as_deref().unwrap_or(UNKNOWN_LABEL);
            let _ = write!(
                output,
                "- {} ({}) on {}: average {:.2}",
                teacher,
                tool,
                observation.observation_date,
                observation.average_score
            );
            if let Some(notes) = observation.notes.as_deref() {
                let _ = write!(output, " ({notes})");
            }
            let _ = writeln!(output);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreMap;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn observation(teacher: &str, day: u32, scores: ScoreMap) -> ObservationRecord {
        let average_score = scores.average();
        ObservationRecord {
            id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            evaluation_tool_id: Uuid::new_v4(),
            observer_id: None,
            observation_date: NaiveDate::from_ymd_opt(2025, 11, day).unwrap(),
            scores,
            average_score,
            teacher_name: Some(teacher.to_string()),
            tool_name: Some("ELEOT".to_string()),
            notes: None,
        }
    }

    #[test]
    fn report_lists_weak_teachers_worst_first() {
        let observations = vec![
            observation("Cinthia Morales", 7, ScoreMap::from_pairs([("Clarity", 2.5)])),
            observation("Indira Ordoñez", 14, ScoreMap::from_pairs([("Clarity", 1.5)])),
        ];

        let report = build_report(&Period::default(), &observations);
        assert!(report.contains("# Classroom Observation Report"));
        assert!(report.contains("Generated for all dates"));
        assert!(report.contains("- Clarity: average 2.00 (2 weak, 0 strong)"));

        let indira = report.find("Indira Ordoñez: Clarity at 1.50").unwrap();
        let cinthia = report.find("Cinthia Morales: Clarity at 2.50").unwrap();
        assert!(indira < cinthia);
    }

    #[test]
    fn empty_window_reports_fallback_lines() {
        let period = Period {
            start_date: NaiveDate::from_ymd_opt(2025, 11, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 11, 30),
        };

        let report = build_report(&period, &[]);
        assert!(report.contains("Generated for 2025-11-01 through 2025-11-30"));
        assert!(report.contains("No observations recorded for this window."));
        assert!(report.contains("No teachers flagged in this window."));
    }

    #[test]
    fn recent_observations_come_newest_first_with_notes() {
        let mut with_notes = observation("Misael Tale", 21, ScoreMap::from_pairs([("Clarity", 3.8)]));
        with_notes.notes = Some("Strong questioning routine".to_string());
        let observations = vec![
            observation("Cesar Arana", 3, ScoreMap::from_pairs([("Clarity", 3.6)])),
            with_notes,
        ];

        let report = build_report(&Period::default(), &observations);
        let misael = report
            .find("Misael Tale (ELEOT) on 2025-11-21: average 3.80 (Strong questioning routine)")
            .unwrap();
        let cesar = report.find("Cesar Arana (ELEOT) on 2025-11-03").unwrap();
        assert!(misael < cesar);
    }
}
