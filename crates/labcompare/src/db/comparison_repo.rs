//! Comparison repository: CRUD for the `comparisons` table.

use rusqlite::{params, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::models::{Comparison, ComparisonStatus, DateRange, ListFilter, ProcessingStage};

/// A comparison as stored: JSON columns for nested data, text timestamps.
#[derive(Debug, Clone)]
pub struct ComparisonRow {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub comparison_name: String,
    pub report_count: i64,
    pub status: String,
    pub processing_stage: String,
    pub error_message: Option<String>,
    pub custom_prompt: Option<String>,
    pub date_range_start: Option<String>,
    pub date_range_end: Option<String>,
    pub uploaded_files: String,
    pub individual_analyses: String,
    pub parameter_comparisons: String,
    pub comparison_analysis: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn to_json<T: Serialize + ?Sized>(
    column: &'static str,
    value: &T,
) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Encode {
        column,
        reason: e.to_string(),
    })
}

fn from_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::Corrupt {
        column,
        reason: e.to_string(),
    })
}

fn stage_name(stage: ProcessingStage) -> Result<String, DatabaseError> {
    // Serialized form is a quoted snake_case string.
    Ok(to_json("processing_stage", &stage)?.trim_matches('"').to_string())
}

impl ComparisonRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            patient_id: row.get("patient_id")?,
            doctor_id: row.get("doctor_id")?,
            comparison_name: row.get("comparison_name")?,
            report_count: row.get("report_count")?,
            status: row.get("status")?,
            processing_stage: row.get("processing_stage")?,
            error_message: row.get("error_message")?,
            custom_prompt: row.get("custom_prompt")?,
            date_range_start: row.get("date_range_start")?,
            date_range_end: row.get("date_range_end")?,
            uploaded_files: row.get("uploaded_files")?,
            individual_analyses: row.get("individual_analyses")?,
            parameter_comparisons: row.get("parameter_comparisons")?,
            comparison_analysis: row.get("comparison_analysis")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn from_comparison(c: &Comparison) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: c.id.clone(),
            patient_id: c.patient_id.clone(),
            doctor_id: c.doctor_id.clone(),
            comparison_name: c.comparison_name.clone(),
            report_count: c.report_count as i64,
            status: c.status.as_str().to_string(),
            processing_stage: stage_name(c.processing_stage)?,
            error_message: c.error_message.clone(),
            custom_prompt: c.custom_prompt.clone(),
            date_range_start: c.date_range.map(|r| format_timestamp(&r.start)),
            date_range_end: c.date_range.map(|r| format_timestamp(&r.end)),
            uploaded_files: to_json("uploaded_files", &c.uploaded_files)?,
            individual_analyses: to_json("individual_analyses", &c.individual_analyses)?,
            parameter_comparisons: to_json("parameter_comparisons", &c.parameter_comparisons)?,
            comparison_analysis: c
                .comparison_analysis
                .as_ref()
                .map(|a| to_json("comparison_analysis", a))
                .transpose()?,
            created_at: format_timestamp(&c.created_at),
            updated_at: format_timestamp(&c.updated_at),
        })
    }

    pub fn into_comparison(self) -> Result<Comparison, DatabaseError> {
        let status =
            ComparisonStatus::parse(&self.status).ok_or_else(|| DatabaseError::Corrupt {
                column: "status",
                reason: format!("unknown status '{}'", self.status),
            })?;
        let processing_stage: ProcessingStage = from_json(
            "processing_stage",
            &format!("\"{}\"", self.processing_stage),
        )?;
        let date_range = match (&self.date_range_start, &self.date_range_end) {
            (Some(start), Some(end)) => Some(DateRange {
                start: parse_timestamp("date_range_start", start)?,
                end: parse_timestamp("date_range_end", end)?,
            }),
            _ => None,
        };

        Ok(Comparison {
            report_count: usize::try_from(self.report_count).map_err(|_| {
                DatabaseError::Corrupt {
                    column: "report_count",
                    reason: format!("negative count {}", self.report_count),
                }
            })?,
            uploaded_files: from_json("uploaded_files", &self.uploaded_files)?,
            individual_analyses: from_json("individual_analyses", &self.individual_analyses)?,
            parameter_comparisons: from_json("parameter_comparisons", &self.parameter_comparisons)?,
            comparison_analysis: self
                .comparison_analysis
                .as_deref()
                .map(|raw| from_json("comparison_analysis", raw))
                .transpose()?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            comparison_name: self.comparison_name,
            date_range,
            custom_prompt: self.custom_prompt,
            status,
            processing_stage,
            error_message: self.error_message,
        })
    }
}

pub fn insert(db: &Database, comparison: &Comparison) -> Result<(), DatabaseError> {
    let row = ComparisonRow::from_comparison(comparison)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO comparisons (id, patient_id, doctor_id, comparison_name, report_count,
             status, processing_stage, error_message, custom_prompt, date_range_start,
             date_range_end, uploaded_files, individual_analyses, parameter_comparisons,
             comparison_analysis, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                row.id,
                row.patient_id,
                row.doctor_id,
                row.comparison_name,
                row.report_count,
                row.status,
                row.processing_stage,
                row.error_message,
                row.custom_prompt,
                row.date_range_start,
                row.date_range_end,
                row.uploaded_files,
                row.individual_analyses,
                row.parameter_comparisons,
                row.comparison_analysis,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Overwrite everything except `id`, `patient_id` and `created_at`.
///
/// Returns false when the row no longer exists.
pub fn update(db: &Database, comparison: &Comparison) -> Result<bool, DatabaseError> {
    let row = ComparisonRow::from_comparison(comparison)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE comparisons SET doctor_id=?2, comparison_name=?3, report_count=?4,
             status=?5, processing_stage=?6, error_message=?7, custom_prompt=?8,
             date_range_start=?9, date_range_end=?10, uploaded_files=?11,
             individual_analyses=?12, parameter_comparisons=?13, comparison_analysis=?14,
             updated_at=?15
             WHERE id=?1",
            params![
                row.id,
                row.doctor_id,
                row.comparison_name,
                row.report_count,
                row.status,
                row.processing_stage,
                row.error_message,
                row.custom_prompt,
                row.date_range_start,
                row.date_range_end,
                row.uploaded_files,
                row.individual_analyses,
                row.parameter_comparisons,
                row.comparison_analysis,
                row.updated_at,
            ],
        )?;
        Ok(changed > 0)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Comparison>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM comparisons WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ComparisonRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })?;
    row.map(ComparisonRow::into_comparison).transpose()
}

/// Filtered, newest-first page of comparisons plus the total match count.
pub fn query(db: &Database, filter: &ListFilter) -> Result<(Vec<Comparison>, u64), DatabaseError> {
    let (rows, total) = db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(ref patient_id) = filter.patient_id {
            conditions.push(format!("patient_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(patient_id.clone()));
        }
        if let Some(ref doctor_id) = filter.doctor_id {
            conditions.push(format!("doctor_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(doctor_id.clone()));
        }
        if let Some(ref from_date) = filter.from_date {
            conditions.push(format!("created_at >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(format_timestamp(from_date)));
        }
        if let Some(ref to_date) = filter.to_date {
            conditions.push(format!("created_at <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(format_timestamp(to_date)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM comparisons {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: i64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        param_values.push(Box::new(i64::try_from(filter.limit()).unwrap_or(i64::MAX)));
        param_values.push(Box::new(i64::try_from(filter.offset()).unwrap_or(i64::MAX)));
        let query_sql = format!(
            "SELECT * FROM comparisons {} ORDER BY created_at DESC, id LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<ComparisonRow> = stmt
            .query_map(params_ref.as_slice(), ComparisonRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total.max(0) as u64))
    })?;

    let comparisons = rows
        .into_iter()
        .map(ComparisonRow::into_comparison)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((comparisons, total))
}

/// Returns whether a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let removed = conn.execute("DELETE FROM comparisons WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    })
}
