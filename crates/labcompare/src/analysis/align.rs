use std::collections::HashMap;

use crate::models::{ParameterComparison, Report, Trend, ValuePoint};

use super::normalize::{display_name, normalize_parameter_name};

/// Sort reports for trend purposes: by analysis date, ties broken by upload order.
pub fn order_reports(reports: &mut [Report]) {
    reports.sort_by(|a, b| {
        a.analysis_date
            .cmp(&b.analysis_date)
            .then(a.upload_order.cmp(&b.upload_order))
    });
}

/// Merge each report's results into one series per distinct parameter.
///
/// `reports` must already be in date order (see [`order_reports`]); the
/// position in the slice becomes `report_index`. Parameters appear in the
/// order they are first seen. Unit and reference range come from the first
/// report containing the parameter. A report missing a parameter contributes
/// nothing to that series. If one report lists the same parameter twice, the
/// first entry wins.
///
/// The returned comparisons are unclassified (`trend = insufficient_data`).
pub fn align_reports(reports: &[Report]) -> Vec<ParameterComparison> {
    let mut comparisons: Vec<ParameterComparison> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for (report_index, report) in reports.iter().enumerate() {
        for result in &report.test_results {
            let key = normalize_parameter_name(&result.parameter);
            if key.is_empty() {
                continue;
            }

            let slot = match index_by_key.get(&key) {
                Some(&slot) => slot,
                None => {
                    comparisons.push(ParameterComparison {
                        parameter: display_name(&result.parameter),
                        key: key.clone(),
                        unit: result.unit.clone(),
                        reference_range: result.reference_range.clone(),
                        values: Vec::new(),
                        trend: Trend::InsufficientData,
                        trend_analysis: String::new(),
                        is_concerning: false,
                        clinical_significance: None,
                    });
                    index_by_key.insert(key, comparisons.len() - 1);
                    comparisons.len() - 1
                }
            };

            let series = &mut comparisons[slot].values;
            if series.last().is_some_and(|v| v.report_index == report_index) {
                log::debug!(
                    "Duplicate parameter '{}' in {}, keeping first value",
                    result.parameter,
                    report.file_name
                );
                continue;
            }

            series.push(ValuePoint {
                report_index,
                date: report.analysis_date,
                value: result.value.clone(),
                status: result.status,
                file_name: report.file_name.clone(),
            });
        }
    }

    comparisons
}

/// Units of later readings that disagree with the series unit.
///
/// Alignment never converts units; callers surface the mismatch instead.
pub fn mismatched_units(comparison: &ParameterComparison, reports: &[Report]) -> Vec<String> {
    let Some(unit) = comparison.unit.as_deref() else {
        return Vec::new();
    };

    let mut mismatched: Vec<String> = Vec::new();
    for point in &comparison.values {
        let Some(report) = reports.get(point.report_index) else {
            continue;
        };
        let other = report
            .test_results
            .iter()
            .find(|r| normalize_parameter_name(&r.parameter) == comparison.key)
            .and_then(|r| r.unit.as_deref());
        if let Some(other) = other {
            if !super::normalize::same_unit(unit, other) && !mismatched.iter().any(|m| m == other)
            {
                mismatched.push(other.to_string());
            }
        }
    }
    mismatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResultStatus, TestResult};
    use chrono::{TimeZone, Utc};

    fn report(name: &str, order: usize, month: u32, results: Vec<TestResult>) -> Report {
        Report {
            file_name: name.to_string(),
            file_type: "application/pdf".to_string(),
            upload_order: order,
            analysis_date: Utc.with_ymd_and_hms(2026, month, 1, 9, 0, 0).unwrap(),
            test_name: "CBC".to_string(),
            test_results: results,
        }
    }

    fn result(parameter: &str, value: &str) -> TestResult {
        TestResult::new(
            parameter,
            value,
            Some("g/dL"),
            Some("13.5-17.5"),
            ResultStatus::Normal,
        )
    }

    #[test]
    fn test_shared_parameter_yields_one_series_in_date_order() {
        let reports = vec![
            report("jan.pdf", 0, 1, vec![result("Hemoglobin", "14.1")]),
            report("mar.pdf", 1, 3, vec![result("  hemoglobin ", "13.2")]),
        ];

        let aligned = align_reports(&reports);
        assert_eq!(aligned.len(), 1);
        let hb = &aligned[0];
        assert_eq!(hb.parameter, "Hemoglobin");
        assert_eq!(hb.key, "hemoglobin");
        assert_eq!(hb.values.len(), 2);
        assert_eq!(hb.values[0].value, "14.1");
        assert_eq!(hb.values[0].file_name, "jan.pdf");
        assert_eq!(hb.values[1].value, "13.2");
        assert_eq!(hb.values[1].report_index, 1);
        assert!(hb.values[0].date < hb.values[1].date);
    }

    #[test]
    fn test_missing_parameter_is_absent_not_zero() {
        let reports = vec![
            report(
                "a.pdf",
                0,
                1,
                vec![result("Hemoglobin", "14.1"), result("Ferritin", "80")],
            ),
            report("b.pdf", 1, 2, vec![result("Hemoglobin", "13.9")]),
            report("c.pdf", 2, 3, vec![result("Hemoglobin", "13.7")]),
        ];

        let aligned = align_reports(&reports);
        assert_eq!(aligned.len(), 2);
        let ferritin = aligned.iter().find(|c| c.key == "ferritin").unwrap();
        assert_eq!(ferritin.values.len(), 1);
        assert_eq!(ferritin.values[0].report_index, 0);
        assert_eq!(ferritin.trend, Trend::InsufficientData);
    }

    #[test]
    fn test_unit_and_range_from_first_report() {
        let mut later = result("Glucose", "110");
        later.unit = Some("mmol/L".to_string());
        later.reference_range = Some("3.9-5.5".to_string());
        let mut first = result("Glucose", "95");
        first.unit = Some("mg/dL".to_string());
        first.reference_range = Some("70-99".to_string());

        let reports = vec![
            report("a.pdf", 0, 1, vec![first]),
            report("b.pdf", 1, 2, vec![later]),
        ];
        let aligned = align_reports(&reports);
        assert_eq!(aligned[0].unit.as_deref(), Some("mg/dL"));
        assert_eq!(aligned[0].reference_range.as_deref(), Some("70-99"));
        assert_eq!(mismatched_units(&aligned[0], &reports), vec!["mmol/L"]);
    }

    #[test]
    fn test_duplicate_within_report_keeps_first() {
        let reports = vec![report(
            "a.pdf",
            0,
            1,
            vec![result("Hemoglobin", "14.1"), result("HEMOGLOBIN", "99")],
        )];
        let aligned = align_reports(&reports);
        assert_eq!(aligned[0].values.len(), 1);
        assert_eq!(aligned[0].values[0].value, "14.1");
    }

    #[test]
    fn test_order_reports_by_date_not_upload() {
        let mut reports = vec![
            report("jun.pdf", 0, 6, vec![]),
            report("jan.pdf", 1, 1, vec![]),
            report("mar.pdf", 2, 3, vec![]),
        ];
        order_reports(&mut reports);
        let names: Vec<_> = reports.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["jan.pdf", "mar.pdf", "jun.pdf"]);
    }

    #[test]
    fn test_no_reports_no_comparisons() {
        assert!(align_reports(&[]).is_empty());
        let empty = vec![report("a.pdf", 0, 1, vec![]), report("b.pdf", 1, 2, vec![])];
        assert!(align_reports(&empty).is_empty());
    }
}
