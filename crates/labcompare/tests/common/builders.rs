//! Test data builders.

use chrono::NaiveDate;
use labcompare::extract::FixtureAnalyzer;
use labcompare::models::{ResultStatus, StructuredReport, TestResult};
use labcompare::UploadFile;

/// Builder for analyzer output.
pub struct ReportBuilder {
    report: StructuredReport,
}

impl ReportBuilder {
    pub fn new(test_name: &str) -> Self {
        Self {
            report: StructuredReport {
                test_name: test_name.to_string(),
                report_date: None,
                results: Vec::new(),
            },
        }
    }

    pub fn dated(mut self, year: i32, month: u32, day: u32) -> Self {
        self.report.report_date = NaiveDate::from_ymd_opt(year, month, day);
        self
    }

    pub fn result(
        mut self,
        parameter: &str,
        value: &str,
        unit: Option<&str>,
        reference_range: Option<&str>,
        status: ResultStatus,
    ) -> Self {
        self.report.results.push(TestResult::new(
            parameter,
            value,
            unit,
            reference_range,
            status,
        ));
        self
    }

    pub fn build(self) -> StructuredReport {
        self.report
    }
}

pub fn pdf(name: &str) -> UploadFile {
    UploadFile::new(name, "application/pdf", b"%PDF-1.4 test".to_vec())
}

/// Hemoglobin falling from 13.5 to 10.8 g/dL over January, March and June.
///
/// Files are returned in upload order: June first, so ordering by report
/// date is exercised.
pub fn hemoglobin_decline() -> (FixtureAnalyzer, Vec<UploadFile>) {
    let hb = |builder: ReportBuilder, value: &str, status| {
        builder
            .result("Hemoglobin", value, Some("g/dL"), Some("13.5-17.5"), status)
            .result("WBC", "7.1", Some("10^3/uL"), Some("4.0-11.0"), ResultStatus::Normal)
            .build()
    };

    let analyzer = FixtureAnalyzer::new()
        .with_report(
            "jan.pdf",
            hb(ReportBuilder::new("CBC").dated(2026, 1, 12), "13.5", ResultStatus::Normal),
        )
        .with_report(
            "mar.pdf",
            hb(ReportBuilder::new("CBC").dated(2026, 3, 9), "12.0", ResultStatus::Low),
        )
        .with_report(
            "jun.pdf",
            hb(ReportBuilder::new("CBC").dated(2026, 6, 15), "10.8", ResultStatus::Low),
        );

    (analyzer, vec![pdf("jun.pdf"), pdf("jan.pdf"), pdf("mar.pdf")])
}
