use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use labcompare::analysis::{compare_reports, order_reports};
use labcompare::config::Config;
use labcompare::extract::parse_structured_report;
use labcompare::models::{ComparisonStatus, DateRange, ListFilter};
use labcompare::{
    ComparisonApi, ComparisonSession, ConfigError, Database, HttpComparisonApi, LabCompareError,
    LocalBackend, PollEvent, SidecarAnalyzer, UploadFile,
};
use serde_json::json;

use crate::error::CliError;
use crate::output::print_json;

/// Resolved configuration plus the backend every command talks to.
pub struct Context {
    config: Config,
    api: Arc<dyn ComparisonApi>,
    local: Option<Arc<LocalBackend>>,
}

impl Context {
    pub fn http(config: Config) -> Result<Self, CliError> {
        let api = HttpComparisonApi::from_config(&config.api)?;
        log::debug!("Using comparison service at {}", config.api.base_url);
        Ok(Self {
            config,
            api: Arc::new(api),
            local: None,
        })
    }

    /// Local SQLite backend reading structured reports from `sidecar_dir`.
    pub fn local(config: Config, sidecar_dir: PathBuf) -> Result<Self, CliError> {
        let path = config.database_path().ok_or_else(|| {
            LabCompareError::from(ConfigError::Validation {
                message: "database_path is not set and no home directory was found".to_string(),
            })
        })?;
        let db = Database::open(&path).map_err(LabCompareError::from)?;
        log::debug!(
            "Using local backend at {} with sidecars from {}",
            path.display(),
            sidecar_dir.display()
        );
        let backend = Arc::new(LocalBackend::new(
            db,
            Arc::new(SidecarAnalyzer::new(sidecar_dir)),
            config.trend_policy(),
        ));
        Ok(Self {
            config,
            api: backend.clone(),
            local: Some(backend),
        })
    }

    fn api(&self) -> Arc<dyn ComparisonApi> {
        Arc::clone(&self.api)
    }

    fn session(&self) -> ComparisonSession {
        ComparisonSession::from_config(self.api(), &self.config)
    }

    /// Let in-process work finish before the runtime shuts down.
    pub async fn finish(&self) {
        if let Some(backend) = &self.local {
            backend.wait_idle().await;
        }
    }
}

fn read_upload(path: &Path) -> Result<UploadFile, CliError> {
    UploadFile::from_path(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn submit(
    ctx: &Context,
    files: &[PathBuf],
    patient_id: &str,
    name: Option<&str>,
    prompt: Option<&str>,
    no_wait: bool,
) -> Result<(), CliError> {
    let uploads = files
        .iter()
        .map(|path| read_upload(path))
        .collect::<Result<Vec<_>, _>>()?;

    let session = ctx.session();
    let (response, watch) = session.submit(uploads, patient_id, name, prompt).await?;
    eprintln!(
        "Submitted {} reports as comparison {}",
        response.report_count, response.comparison_id
    );

    if no_wait {
        session.teardown();
        print_json(&response)?;
        return Ok(());
    }

    let outcome = session.wait(watch).await;
    render_outcome(&response.comparison_id, outcome)
}

pub async fn status(ctx: &Context, id: &str) -> Result<(), CliError> {
    let comparison = ctx.api().get(id).await?;
    print_json(&comparison)
}

pub async fn wait(ctx: &Context, id: &str) -> Result<(), CliError> {
    let session = ctx.session();
    let watch = session.track(id);
    let outcome = session.wait(watch).await;
    render_outcome(id, outcome)
}

fn render_outcome(id: &str, outcome: Option<PollEvent>) -> Result<(), CliError> {
    match outcome {
        Some(PollEvent::Completed { comparison, .. }) => print_json(&comparison),
        Some(PollEvent::Failed { error_message, .. }) => Err(CliError::JobUnsuccessful(format!(
            "Comparison {} failed: {}",
            id,
            error_message.as_deref().unwrap_or("no error message")
        ))),
        Some(PollEvent::TimedOut { attempts, .. }) => Err(CliError::JobUnsuccessful(format!(
            "Comparison {id} is still processing after {attempts} checks; \
             run `labcompare status {id}` later"
        ))),
        Some(PollEvent::Cancelled { .. }) => Err(CliError::JobUnsuccessful(format!(
            "Stopped tracking comparison {id}"
        ))),
        Some(PollEvent::Progress { .. }) | None => Err(CliError::JobUnsuccessful(format!(
            "Polling ended before comparison {id} settled"
        ))),
    }
}

/// Filter options as typed on the command line.
pub struct ListArgs {
    pub status: Option<ComparisonStatus>,
    pub patient: Option<String>,
    pub doctor: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

fn parse_day(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| CliError::InvalidDate(raw.to_string()))
}

impl ListArgs {
    /// Dates cover whole days: `from` starts at midnight, `to` runs to the end of the day.
    pub fn into_filter(self) -> Result<ListFilter, CliError> {
        let from_date = self
            .from
            .as_deref()
            .map(parse_day)
            .transpose()?
            .map(|day| day.and_time(NaiveTime::MIN).and_utc());
        let to_date = match self.to.as_deref().map(parse_day).transpose()? {
            Some(day) => Some(
                day.and_hms_micro_opt(23, 59, 59, 999_999)
                    .ok_or_else(|| CliError::InvalidDate(day.to_string()))?
                    .and_utc(),
            ),
            None => None,
        };
        Ok(ListFilter {
            status: self.status,
            patient_id: self.patient,
            doctor_id: self.doctor,
            from_date,
            to_date,
            page: self.page,
            limit: self.limit,
        })
    }
}

pub async fn list(ctx: &Context, args: ListArgs) -> Result<(), CliError> {
    let page = ctx.session().list(args.into_filter()?).await?;
    print_json(&page)
}

pub async fn delete(ctx: &Context, id: &str) -> Result<(), CliError> {
    ctx.session().delete(id).await?;
    print_json(&json!({ "deleted": id }))
}

pub async fn stats(ctx: &Context) -> Result<(), CliError> {
    let stats = ctx.session().stats().await?;
    print_json(&stats)
}

/// Run the comparison pipeline over structured report JSON files, offline.
pub fn analyze(config: &Config, files: &[PathBuf]) -> Result<(), CliError> {
    let received_at = Utc::now();
    let mut reports = Vec::with_capacity(files.len());
    for (order, path) in files.iter().enumerate() {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let structured =
            parse_structured_report(&file_name, &content).map_err(LabCompareError::from)?;
        reports.push(structured.into_report(&file_name, "application/json", order, received_at));
    }
    order_reports(&mut reports);

    let (parameter_comparisons, comparison_analysis) =
        compare_reports(&reports, &config.trend_policy());
    print_json(&json!({
        "date_range": DateRange::from_reports(&reports),
        "individual_analyses": reports,
        "parameter_comparisons": parameter_comparisons,
        "comparison_analysis": comparison_analysis,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(from: Option<&str>, to: Option<&str>) -> ListArgs {
        ListArgs {
            status: None,
            patient: Some("P1".to_string()),
            doctor: None,
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            page: Some(2),
            limit: None,
        }
    }

    #[test]
    fn test_filter_covers_whole_days() {
        let filter = args(Some("2026-01-01"), Some("2026-01-31"))
            .into_filter()
            .unwrap();
        assert_eq!(
            filter.from_date.unwrap().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );
        assert_eq!(
            filter.to_date.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2026-01-31 23:59:59"
        );
        assert_eq!(filter.patient_id.as_deref(), Some("P1"));
        assert_eq!(filter.page, Some(2));
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let err = args(Some("01/02/2026"), None).into_filter().unwrap_err();
        assert!(matches!(err, CliError::InvalidDate(ref raw) if raw == "01/02/2026"));
    }

    #[test]
    fn test_unsuccessful_outcomes_exit_with_two() {
        let err = render_outcome(
            "c1",
            Some(PollEvent::TimedOut {
                job_id: "c1".to_string(),
                attempts: 31,
            }),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("labcompare status c1"));

        let err = render_outcome(
            "c1",
            Some(PollEvent::Failed {
                job_id: "c1".to_string(),
                error_message: Some("Report 2 is unreadable".to_string()),
            }),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Comparison c1 failed: Report 2 is unreadable");
    }
}
