use crate::models::{
    ComparisonAnalysis, ParameterComparison, PatientSummary, Priority, Recommendation,
    ResultStatus, Trend,
};

use super::values::parse_numeric_value;

/// Aggregate classified comparisons into the cross-report analysis.
pub fn summarize(comparisons: &[ParameterComparison]) -> ComparisonAnalysis {
    let stable_parameters: Vec<String> = comparisons
        .iter()
        .filter(|c| c.trend == Trend::Stable)
        .map(|c| c.parameter.clone())
        .collect();
    let concerning: Vec<&ParameterComparison> =
        comparisons.iter().filter(|c| c.is_concerning).collect();
    let improved: Vec<&ParameterComparison> =
        comparisons.iter().filter(|c| is_improved(c)).collect();

    let key_changes: Vec<String> = comparisons.iter().filter_map(key_change).collect();
    let recommendations = recommendations(&concerning, &improved, comparisons.is_empty());

    let overall_trend = match (
        comparisons.is_empty(),
        concerning.is_empty(),
        improved.is_empty(),
    ) {
        (true, _, _) => "insufficient_data",
        (false, true, false) => "improving",
        (false, false, true) => "worsening",
        (false, false, false) => "mixed",
        (false, true, true) => "stable",
    }
    .to_string();

    let patient_summary = patient_summary(
        comparisons.len(),
        &concerning,
        &improved,
        stable_parameters.len(),
        &recommendations,
    );

    ComparisonAnalysis {
        overall_trend,
        key_changes,
        concerning_parameters: concerning.iter().map(|c| c.parameter.clone()).collect(),
        improved_parameters: improved.iter().map(|c| c.parameter.clone()).collect(),
        stable_parameters,
        recommendations,
        patient_summary,
    }
}

/// Latest reading Normal after an earlier High, Low or Abnormal reading.
pub fn is_improved(comparison: &ParameterComparison) -> bool {
    match comparison.values.split_last() {
        Some((latest, earlier)) => {
            latest.status == ResultStatus::Normal && earlier.iter().any(|v| v.status.is_flagged())
        }
        None => false,
    }
}

/// Priority of the follow-up for one concerning parameter.
///
/// Abnormal is high. High/Low is medium, escalated to high when the trend is
/// still moving further in the flagged direction. Concern raised by the trend
/// alone is low.
pub fn recommendation_priority(comparison: &ParameterComparison) -> Priority {
    match (comparison.latest_status(), comparison.trend) {
        (ResultStatus::Abnormal, _) => Priority::High,
        (ResultStatus::High, Trend::Increasing) | (ResultStatus::Low, Trend::Decreasing) => {
            Priority::High
        }
        (ResultStatus::High, _) | (ResultStatus::Low, _) => Priority::Medium,
        _ => Priority::Low,
    }
}

fn key_change(comparison: &ParameterComparison) -> Option<String> {
    let verb = match comparison.trend {
        Trend::Increasing => "increased",
        Trend::Decreasing => "decreased",
        _ => return None,
    };
    let numeric: Vec<f64> = comparison
        .values
        .iter()
        .filter_map(|v| parse_numeric_value(&v.value))
        .collect();
    let (first, last) = (*numeric.first()?, *numeric.last()?);
    let unit = comparison
        .unit
        .as_deref()
        .filter(|u| !u.is_empty())
        .map(|u| format!(" {}", u))
        .unwrap_or_default();

    let mut line = format!(
        "{} {} from {} to {}{}",
        comparison.parameter, verb, first, last, unit
    );
    if first != 0.0 {
        let percent = (last - first) / first.abs() * 100.0;
        line.push_str(&format!(" ({:+.1}%)", percent));
    }
    Some(line)
}

fn recommendations(
    concerning: &[&ParameterComparison],
    improved: &[&ParameterComparison],
    no_parameters: bool,
) -> Vec<Recommendation> {
    let mut recs: Vec<Recommendation> = concerning
        .iter()
        .map(|c| {
            let priority = recommendation_priority(c);
            let (category, action) = match priority {
                Priority::High => (
                    "Medical review",
                    format!(
                        "Review {} with the treating physician and repeat the test",
                        c.parameter
                    ),
                ),
                Priority::Medium => (
                    "Follow-up testing",
                    format!(
                        "Repeat {} to confirm the {} result",
                        c.parameter,
                        c.latest_status().as_str().to_lowercase()
                    ),
                ),
                Priority::Low => (
                    "Monitoring",
                    format!("Keep tracking {} in upcoming reports", c.parameter),
                ),
            };
            Recommendation {
                category: category.to_string(),
                action,
                priority,
                timeline: priority.timeline().to_string(),
            }
        })
        .collect();

    if !improved.is_empty() {
        let names: Vec<&str> = improved.iter().map(|c| c.parameter.as_str()).collect();
        recs.push(Recommendation {
            category: "Monitoring".to_string(),
            action: format!(
                "Continue current management; improvement seen in {}",
                names.join(", ")
            ),
            priority: Priority::Low,
            timeline: Priority::Low.timeline().to_string(),
        });
    }

    if concerning.is_empty() && !no_parameters {
        recs.push(Recommendation {
            category: "Routine care".to_string(),
            action: "Continue routine monitoring at regular intervals".to_string(),
            priority: Priority::Low,
            timeline: Priority::Low.timeline().to_string(),
        });
    }

    // Stable sort keeps parameter order within a priority.
    recs.sort_by(|a, b| b.priority.cmp(&a.priority));
    recs
}

fn patient_summary(
    total: usize,
    concerning: &[&ParameterComparison],
    improved: &[&ParameterComparison],
    stable_count: usize,
    recommendations: &[Recommendation],
) -> PatientSummary {
    if total == 0 {
        return PatientSummary {
            overall_status: "No comparable lab values were found in the uploaded reports"
                .to_string(),
            main_findings: Vec::new(),
            next_steps: vec![
                "Check that the uploaded documents are lab reports with readable values"
                    .to_string(),
            ],
        };
    }

    let overall_status = format!(
        "{} of {} parameters need attention; {} stable, {} improved",
        concerning.len(),
        total,
        stable_count,
        improved.len()
    );

    let mut main_findings: Vec<String> = concerning
        .iter()
        .map(|c| format!("{}: {}", c.parameter, c.trend_analysis))
        .collect();
    main_findings.extend(
        improved
            .iter()
            .map(|c| format!("{} is back to normal", c.parameter)),
    );
    if main_findings.is_empty() {
        main_findings.push("No parameters were flagged across the compared reports".to_string());
    }

    PatientSummary {
        overall_status,
        main_findings,
        next_steps: recommendations.iter().map(|r| r.action.clone()).collect(),
    }
}
