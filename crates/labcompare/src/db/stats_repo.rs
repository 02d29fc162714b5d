//! Aggregate counts over the `comparisons` table.

use super::{Database, DatabaseError};
use crate::models::{ComparisonStats, ComparisonStatus, MonthCount, StatusCounts};

/// Number of comparisons per status.
pub fn counts_by_status(db: &Database) -> Result<StatusCounts, DatabaseError> {
    let rows: Vec<(String, i64)> = db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM comparisons GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    let mut counts = StatusCounts::default();
    for (raw, count) in rows {
        match ComparisonStatus::parse(&raw) {
            Some(status) => counts.add(status, count.max(0) as u64),
            None => log::warn!("Skipping {} comparisons with unknown status '{}'", count, raw),
        }
    }
    Ok(counts)
}

/// Comparisons created per calendar month, oldest first.
pub fn counts_by_month(db: &Database) -> Result<Vec<MonthCount>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT substr(created_at, 1, 7) AS month, COUNT(*)
             FROM comparisons GROUP BY month ORDER BY month ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok(MonthCount {
                    month: row.get(0)?,
                    count: count.max(0) as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn summary(db: &Database) -> Result<ComparisonStats, DatabaseError> {
    let by_status = counts_by_status(db)?;
    let by_month = counts_by_month(db)?;
    let total = by_status.pending + by_status.processing + by_status.completed + by_status.failed;
    Ok(ComparisonStats {
        total,
        by_status,
        by_month,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::comparison_repo::{self, tests::sample};
    use chrono::{TimeZone, Utc};

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_empty_stats() {
        let stats = summary(&test_db()).unwrap();
        assert_eq!(stats, ComparisonStats::default());
    }

    #[test]
    fn test_counts_by_status_and_month() {
        let db = test_db();
        comparison_repo::insert(&db, &sample("a", 1)).unwrap();
        let mut done = sample("b", 2);
        done.status = ComparisonStatus::Completed;
        comparison_repo::insert(&db, &done).unwrap();
        let mut march = sample("c", 3);
        march.status = ComparisonStatus::Failed;
        march.created_at = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        comparison_repo::insert(&db, &march).unwrap();

        let stats = summary(&db).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status.pending, 1);
        assert_eq!(stats.by_status.completed, 1);
        assert_eq!(stats.by_status.failed, 1);
        assert_eq!(
            stats.by_month,
            vec![
                MonthCount {
                    month: "2026-01".to_string(),
                    count: 2
                },
                MonthCount {
                    month: "2026-03".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_unknown_status_is_skipped() {
        let db = test_db();
        comparison_repo::insert(&db, &sample("a", 1)).unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE comparisons SET status = 'archived'", [])?;
            Ok(())
        })
        .unwrap();
        let counts = counts_by_status(&db).unwrap();
        assert_eq!(counts, StatusCounts::default());
    }
}
