//! CSV ingestion: parsing, header projection, imputation, and identity
//! resolution. The output of this module is a batch of [`ResolvedRow`]s
//! ready for transactional commit.

pub(crate) mod columns;
pub(crate) mod identity;
pub(crate) mod parser;

use crate::pipeline::store::StoreError;
use chrono::NaiveDate;

pub use columns::{NormalizedRow, ValidationError};
pub use parser::RawTable;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("upload rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error("upload is not parseable as CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Returned to the caller after a batch commits.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestReceipt {
    pub batch_id: String,
    pub rows_processed: u64,
}

/// A normalized row with its deterministic identities attached and its
/// elapsed processing time computed against the ingestion clock.
#[derive(Debug, Clone)]
pub struct ResolvedRow {
    pub candidate_id: String,
    pub job_id: String,
    pub days_in_process: i64,
    pub row: NormalizedRow,
}

/// Attach candidate/job ids and elapsed days to every normalized row.
/// Future-dated start dates clamp to zero rather than going negative.
pub fn resolve_rows(rows: Vec<NormalizedRow>, today: NaiveDate) -> Vec<ResolvedRow> {
    rows.into_iter()
        .map(|row| ResolvedRow {
            candidate_id: identity::candidate_id(&row.email),
            job_id: identity::job_id(&row.job_title),
            days_in_process: (today - row.start_date).num_days().max(0),
            row,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_row(start: NaiveDate) -> NormalizedRow {
        NormalizedRow {
            name: "דנה לוי".to_string(),
            email: "dana@example.com".to_string(),
            job_title: "מפתח Backend".to_string(),
            status: "חדש".to_string(),
            recruiter: "יעל".to_string(),
            start_date: start,
            department: "R&D".to_string(),
            source: "LinkedIn".to_string(),
        }
    }

    #[test]
    fn elapsed_days_clamp_at_zero_for_future_dates() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let resolved = resolve_rows(
            vec![
                sample_row(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
                sample_row(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
            ],
            today,
        );
        assert_eq!(resolved[0].days_in_process, 14);
        assert_eq!(resolved[1].days_in_process, 0);
    }

    #[test]
    fn identities_come_from_the_natural_keys() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let resolved = resolve_rows(
            vec![sample_row(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())],
            today,
        );
        assert_eq!(
            resolved[0].candidate_id,
            identity::candidate_id("dana@example.com")
        );
        assert_eq!(resolved[0].job_id, identity::job_id("מפתח Backend"));
    }
}
