use chrono::{NaiveDate, NaiveDateTime};
use talent_core::pipeline::{PipelineService, ScrubOutcome, SqliteStore};
use tempfile::TempDir;

fn service_in(dir: &TempDir) -> PipelineService {
    let store = SqliteStore::open(dir.path().join("pipeline.db")).expect("store opens");
    PipelineService::new(store, true)
}

fn at(date: (i32, u32, u32)) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

const WEEK_ONE: &str = "\
שם מועמד,דוא\"ל,שם המשרה,מצב שיוך למשרה,מגייס,תחילת גיוס,רמה 2,מקור הגעה
דנה לוי,dana@example.com,מפתח Backend,חדש,יעל,2025-05-01,פיתוח,LinkedIn
נעם כהן,noam@example.com,אנליסט נתונים,סינון טלפוני,דני,2025-05-03,מו\"פ,חבר מביא חבר
";

const WEEK_TWO: &str = "\
שם מועמד,דוא\"ל,שם המשרה,מצב שיוך למשרה,מגייס,תחילת גיוס,רמה 2,מקור הגעה
דנה לוי,dana@example.com,מפתח Backend,ראיון HR,רות,2025-06-01,פיתוח,LinkedIn
";

#[test]
fn reingesting_the_same_export_does_not_duplicate() {
    let dir = TempDir::new().expect("tempdir");
    let service = service_in(&dir);

    let first = service
        .ingest_csv("week1.csv", WEEK_ONE, at((2025, 5, 10)))
        .expect("first upload");
    assert_eq!(first.rows_processed, 2);

    let second = service
        .ingest_csv("week1.csv", WEEK_ONE, at((2025, 5, 10)))
        .expect("second upload");
    assert_ne!(first.batch_id, second.batch_id);

    let rows = service.rows().expect("rows");
    assert_eq!(rows.len(), 2, "same natural keys must reconcile, not duplicate");
}

#[test]
fn start_date_sticks_while_status_and_recruiter_follow_the_latest_upload() {
    let dir = TempDir::new().expect("tempdir");
    let service = service_in(&dir);

    service
        .ingest_csv("week1.csv", WEEK_ONE, at((2025, 5, 10)))
        .expect("week one");
    service
        .ingest_csv("week2.csv", WEEK_TWO, at((2025, 6, 7)))
        .expect("week two");

    let rows = service.rows().expect("rows");
    let dana = rows
        .iter()
        .find(|row| row.candidate_name == "דנה לוי")
        .expect("dana present");

    assert_eq!(dana.start_date, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
    assert_eq!(dana.status, "ראיון HR");
    assert_eq!(dana.recruiter, "רות");
}

#[test]
fn revert_removes_exactly_the_batch_and_is_idempotent() {
    let dir = TempDir::new().expect("tempdir");
    let service = service_in(&dir);

    service
        .ingest_csv("week1.csv", WEEK_ONE, at((2025, 5, 10)))
        .expect("week one");
    let second = service
        .ingest_csv("week2.csv", WEEK_TWO, at((2025, 6, 7)))
        .expect("week two");

    let receipt = service
        .revert_batch(&second.batch_id, at((2025, 6, 8)))
        .expect("revert");
    // Dana's application was restamped by week two, so the revert takes
    // it out; Noam's untouched application survives.
    assert_eq!(receipt.applications_removed, 1);

    let rows = service.rows().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].candidate_name, "נעם כהן");

    let again = service
        .revert_batch(&second.batch_id, at((2025, 6, 9)))
        .expect("second revert");
    assert_eq!(again.applications_removed, 0);
}

#[test]
fn rejected_upload_persists_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let service = service_in(&dir);

    let err = service
        .ingest_csv(
            "broken.csv",
            "שם מועמד,סטטוס\nדנה,חדש\n",
            at((2025, 5, 10)),
        )
        .expect_err("missing job title column");
    assert!(err.to_string().contains("job title"));

    assert!(service.rows().expect("rows").is_empty());
    assert!(service.batch_history(10).expect("history").is_empty());
}

#[test]
fn missing_email_yields_a_stable_placeholder_identity() {
    let dir = TempDir::new().expect("tempdir");
    let service = service_in(&dir);

    let csv = "שם מועמד,שם המשרה\nרון ברק,מהנדס QA\n";
    service
        .ingest_csv("a.csv", csv, at((2025, 5, 10)))
        .expect("first");
    service
        .ingest_csv("b.csv", csv, at((2025, 5, 17)))
        .expect("second");

    let rows = service.rows().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].email, "רון.ברק@unknown.com");
}

#[test]
fn sensitive_columns_are_masked_and_audited_during_ingestion() {
    let dir = TempDir::new().expect("tempdir");
    let service = service_in(&dir);

    let csv = "\
שם מועמד,שם המשרה,טלפון נייד
דנה לוי,מפתח Backend,052-1234567
";
    service
        .ingest_csv("pii.csv", csv, at((2025, 5, 10)))
        .expect("upload");

    let logs = service.audit_trail(10).expect("audit");
    let mask_entry = logs
        .iter()
        .find(|entry| entry.action == "column_mask")
        .expect("mask audited");
    assert!(mask_entry.details.contains("טלפון נייד"));
    assert!(!mask_entry.details.contains("052-1234567"));
}

#[test]
fn scrubber_kill_switch_persists_across_service_instances() {
    let dir = TempDir::new().expect("tempdir");

    {
        let service = service_in(&dir);
        assert!(service.scrubber_status().expect("status"));
        service
            .set_scrubber(false, at((2025, 5, 10)))
            .expect("disable");
        match service.scrub("ת.ז 305123456", at((2025, 5, 10))).expect("scrub") {
            ScrubOutcome::Disabled => {}
            ScrubOutcome::Scrubbed(_) => panic!("scrub must be refused while disabled"),
        }
    }

    let service = service_in(&dir);
    assert!(
        !service.scrubber_status().expect("status"),
        "persisted setting outranks the configured default"
    );

    service.set_scrubber(true, at((2025, 5, 11))).expect("enable");
    match service.scrub("ת.ז 305123456", at((2025, 5, 11))).expect("scrub") {
        ScrubOutcome::Scrubbed(report) => {
            assert_eq!(report.counts.id_numbers, 1);
            assert!(!report.text.contains("305123456"));
        }
        ScrubOutcome::Disabled => panic!("scrub must run once re-enabled"),
    }
}

#[test]
fn data_health_penalizes_unassigned_records() {
    let dir = TempDir::new().expect("tempdir");
    let service = service_in(&dir);

    let csv = "\
שם מועמד,שם המשרה,מגייס
דנה לוי,מפתח Backend,יעל
נעם כהן,אנליסט נתונים,
";
    service
        .ingest_csv("week.csv", csv, at((2025, 5, 10)))
        .expect("upload");

    let health = service.data_health().expect("health");
    assert!(health.health_score < 100);
    assert_eq!(health.total_records, 2);
    assert!(!health.missing_data.is_empty());
    assert_eq!(health.logs.len(), 1);
}
