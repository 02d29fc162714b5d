//! Cross-report analysis: align parameters, classify trends, summarize.

pub mod align;
pub mod normalize;
pub mod reference_range;
pub mod summarize;
pub mod trend;
pub mod values;

pub use align::{align_reports, mismatched_units, order_reports};
pub use normalize::normalize_parameter_name;
pub use reference_range::{RangePosition, ReferenceRange};
pub use summarize::{recommendation_priority, summarize};
pub use trend::{classify, classify_trend, TrendAssessment};
pub use values::parse_numeric_value;

use crate::models::{ComparisonAnalysis, ParameterComparison, Report};

pub const DEFAULT_STABLE_TOLERANCE: f64 = 0.05;

/// Tuning for trend classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPolicy {
    /// Relative band around the series mean inside which steps count as noise.
    pub stable_tolerance: f64,
}

impl Default for TrendPolicy {
    fn default() -> Self {
        Self {
            stable_tolerance: DEFAULT_STABLE_TOLERANCE,
        }
    }
}

/// Run the full pipeline over date-ordered reports.
pub fn compare_reports(
    reports: &[Report],
    policy: &TrendPolicy,
) -> (Vec<ParameterComparison>, ComparisonAnalysis) {
    let mut comparisons = align_reports(reports);
    for comparison in comparisons.iter_mut() {
        classify(comparison, policy);

        let mismatched = mismatched_units(comparison, reports);
        if !mismatched.is_empty() {
            log::warn!(
                "Parameter '{}' reported in {} and {}",
                comparison.parameter,
                comparison.unit.as_deref().unwrap_or_default(),
                mismatched.join(", ")
            );
            comparison.trend_analysis.push_str(&format!(
                "; unit differs across reports ({}), values not converted",
                mismatched.join(", ")
            ));
        }
    }

    let analysis = summarize(&comparisons);
    log::debug!(
        "Compared {} reports: {} parameters, overall trend {}",
        reports.len(),
        comparisons.len(),
        analysis.overall_trend
    );
    (comparisons, analysis)
}
