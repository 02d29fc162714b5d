use crate::models::{ParameterComparison, Trend, ValuePoint};

use super::reference_range::{RangePosition, ReferenceRange};
use super::values::parse_numeric_value;
use super::TrendPolicy;

/// Result of classifying one parameter series.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendAssessment {
    pub trend: Trend,
    pub trend_analysis: String,
    pub is_concerning: bool,
    pub clinical_significance: Option<String>,
}

/// Classify a date-ordered series.
///
/// Values that do not parse as numbers are skipped. With fewer than two
/// numeric values the trend is `insufficient_data`. Otherwise, with a
/// tolerance of `policy.stable_tolerance × |mean|`:
/// every step within tolerance is `stable`; no step falling beyond tolerance
/// is `increasing`; no step rising beyond tolerance is `decreasing`; anything
/// else is `fluctuating`.
///
/// The series is concerning when the latest reading is flagged High, Low or
/// Abnormal, or when a rising (falling) trend ends above (below) the
/// reference range.
pub fn classify_trend(
    values: &[ValuePoint],
    reference_range: Option<&str>,
    unit: Option<&str>,
    policy: &TrendPolicy,
) -> TrendAssessment {
    let numeric: Vec<f64> = values
        .iter()
        .filter_map(|v| parse_numeric_value(&v.value))
        .collect();
    let latest = values.last();
    let latest_flagged = latest.is_some_and(|v| v.status.is_flagged());

    // Range position follows the last reading that parsed, so a trailing
    // "hemolyzed" or "pending" does not hide where the series ended up.
    let last_reading = values
        .iter()
        .rev()
        .find(|v| parse_numeric_value(&v.value).is_some());
    let range = reference_range.and_then(ReferenceRange::parse);
    let position = match (range, numeric.last()) {
        (Some(range), Some(value)) => Some(range.position(*value)),
        _ => None,
    };

    let trend = direction(&numeric, policy.stable_tolerance);

    let moved_out_of_range = matches!(
        (trend, position),
        (Trend::Increasing, Some(RangePosition::Above))
            | (Trend::Decreasing, Some(RangePosition::Below))
    );
    let is_concerning = latest_flagged || moved_out_of_range;

    let trend_analysis = describe(trend, numeric.len(), position);
    let clinical_significance = if is_concerning {
        latest.map(|point| {
            significance(point, last_reading.unwrap_or(point), unit, range, position, trend)
        })
    } else {
        None
    };

    TrendAssessment {
        trend,
        trend_analysis,
        is_concerning,
        clinical_significance,
    }
}

/// Apply [`classify_trend`] to an aligned comparison in place.
pub fn classify(comparison: &mut ParameterComparison, policy: &TrendPolicy) {
    let assessment = classify_trend(
        &comparison.values,
        comparison.reference_range.as_deref(),
        comparison.unit.as_deref(),
        policy,
    );
    comparison.trend = assessment.trend;
    comparison.trend_analysis = assessment.trend_analysis;
    comparison.is_concerning = assessment.is_concerning;
    comparison.clinical_significance = assessment.clinical_significance;
}

fn direction(values: &[f64], stable_tolerance: f64) -> Trend {
    if values.len() < 2 {
        return Trend::InsufficientData;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let tolerance = stable_tolerance * mean.abs();
    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    if deltas.iter().all(|d| d.abs() <= tolerance) {
        Trend::Stable
    } else if deltas.iter().all(|d| *d >= -tolerance) {
        Trend::Increasing
    } else if deltas.iter().all(|d| *d <= tolerance) {
        Trend::Decreasing
    } else {
        Trend::Fluctuating
    }
}

fn describe(trend: Trend, numeric_count: usize, position: Option<RangePosition>) -> String {
    let base = match trend {
        Trend::InsufficientData => {
            return match numeric_count {
                0 => "no numeric values to compare".to_string(),
                _ => "only one numeric value; a trend needs at least two reports".to_string(),
            };
        }
        Trend::Increasing => format!("rising across {} reports", numeric_count),
        Trend::Decreasing => format!("falling across {} reports", numeric_count),
        Trend::Stable => format!("stable across {} reports", numeric_count),
        Trend::Fluctuating => format!("fluctuating across {} reports", numeric_count),
    };

    match position {
        Some(RangePosition::Above) => format!("{}, now above reference range", base),
        Some(RangePosition::Below) => format!("{}, now below reference range", base),
        Some(RangePosition::Within) => format!("{}, within reference range", base),
        None => base,
    }
}

fn significance(
    latest: &ValuePoint,
    reading: &ValuePoint,
    unit: Option<&str>,
    range: Option<ReferenceRange>,
    position: Option<RangePosition>,
    trend: Trend,
) -> String {
    let mut text = match unit {
        Some(unit) if !unit.is_empty() => format!("latest reading {} {}", reading.value, unit),
        _ => format!("latest reading {}", reading.value),
    };
    if latest.status.is_flagged() {
        text.push_str(&format!(" flagged {}", latest.status));
    }
    if let Some(range) = range {
        match position {
            Some(RangePosition::Above) => {
                text.push_str(&format!(", above reference range {}", range))
            }
            Some(RangePosition::Below) => {
                text.push_str(&format!(", below reference range {}", range))
            }
            _ => {}
        }
    }
    match trend {
        Trend::Increasing => text.push_str(", with a rising trend"),
        Trend::Decreasing => text.push_str(", with a falling trend"),
        Trend::Fluctuating => text.push_str(", with fluctuating values"),
        _ => {}
    }
    text
}
