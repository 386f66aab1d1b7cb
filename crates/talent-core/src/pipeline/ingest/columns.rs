use super::parser::RawTable;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Canonical fields every ingested row is projected onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Email,
    JobTitle,
    Status,
    Recruiter,
    StartDate,
    Department,
    Source,
}

impl Field {
    /// Human-readable name used in validation errors.
    pub const fn display_name(self) -> &'static str {
        match self {
            Field::Name => "candidate name",
            Field::Email => "email",
            Field::JobTitle => "job title",
            Field::Status => "status",
            Field::Recruiter => "recruiter",
            Field::StartDate => "start date",
            Field::Department => "department",
            Field::Source => "source",
        }
    }
}

/// A row after normalization: every canonical field populated, defaults
/// applied, department label rewritten to its canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub name: String,
    pub email: String,
    pub job_title: String,
    pub status: String,
    pub recruiter: String,
    pub start_date: NaiveDate,
    pub department: String,
    pub source: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),
    #[error("row {row}: required field '{field}' is empty")]
    EmptyField { row: usize, field: &'static str },
}

static HEADER_SYNONYMS: OnceLock<HashMap<String, Field>> = OnceLock::new();

/// Resolve a raw header to a canonical field, if it is a known synonym.
pub fn resolve_header(header: &str) -> Option<Field> {
    header_synonyms().get(&normalize_header(header)).copied()
}

fn header_synonyms() -> &'static HashMap<String, Field> {
    HEADER_SYNONYMS.get_or_init(|| {
        const SYNONYMS: &[(&str, Field)] = &[
            // Candidate name
            ("שם מועמד", Field::Name),
            ("שם", Field::Name),
            ("name", Field::Name),
            ("candidate name", Field::Name),
            // Email
            ("דוא\"ל", Field::Email),
            ("אימייל", Field::Email),
            ("מייל", Field::Email),
            ("email", Field::Email),
            // Job title
            ("שם המשרה", Field::JobTitle),
            ("משרה", Field::JobTitle),
            ("job_title", Field::JobTitle),
            ("job title", Field::JobTitle),
            // Status
            ("מצב שיוך למשרה", Field::Status),
            ("סטטוס", Field::Status),
            ("status", Field::Status),
            // Recruiter
            ("מגייס", Field::Recruiter),
            ("מגייסת", Field::Recruiter),
            ("recruiter", Field::Recruiter),
            // Start date
            ("תחילת גיוס", Field::StartDate),
            ("תאריך פתיחה", Field::StartDate),
            ("start_date", Field::StartDate),
            ("start date", Field::StartDate),
            // Department (the export uses org-hierarchy level labels)
            ("רמה 2", Field::Department),
            ("מחלקה", Field::Department),
            ("חטיבה", Field::Department),
            ("department", Field::Department),
            // Source channel
            ("מקור הגעה", Field::Source),
            ("מקור", Field::Source),
            ("source", Field::Source),
        ];

        let mut map = HashMap::with_capacity(SYNONYMS.len());
        for (header, field) in SYNONYMS {
            map.insert(normalize_header(header), *field);
        }
        map
    })
}

pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Fixed rewrite dictionary collapsing variant department spellings onto one
/// canonical label. Applied after imputation so defaulted rows pass through.
fn canonical_department(label: &str) -> String {
    const DEPARTMENT_REWRITES: &[(&str, &str)] = &[
        ("מו\"פ", "R&D"),
        ("פיתוח", "R&D"),
        ("משאבי אנוש", "HR"),
        ("משאבי-אנוש", "HR"),
        ("מכירות ושירות", "Sales & Service"),
        ("שירות", "Sales & Service"),
    ];

    let trimmed = label.trim();
    for (variant, canonical) in DEPARTMENT_REWRITES {
        if trimmed == *variant {
            return (*canonical).to_string();
        }
    }
    trimmed.to_string()
}

const DEFAULT_SOURCE: &str = "Organic / Unknown";
const DEFAULT_DEPARTMENT: &str = "General";
const DEFAULT_STATUS: &str = "חדש";
const DEFAULT_RECRUITER: &str = "לא שויך";

/// Deterministic placeholder address for rows lacking an email: spaces in
/// the name become dots, so distinct names with distinct spacing stay
/// distinct identities.
pub fn placeholder_email(name: &str) -> String {
    format!("{}@unknown.com", name.trim().replace(' ', "."))
}

fn parse_start_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%d/%m/%Y") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    None
}

/// Project a raw table onto the canonical schema.
///
/// Missing required columns (candidate name, job title) and empty required
/// cells fail validation; optional fields fall back to the documented
/// defaults, with `now` standing in for absent start dates.
pub fn normalize_table(
    table: &RawTable,
    now: NaiveDateTime,
) -> Result<Vec<NormalizedRow>, ValidationError> {
    let mut positions: HashMap<Field, usize> = HashMap::new();
    for (idx, header) in table.headers.iter().enumerate() {
        if let Some(field) = resolve_header(header) {
            // First matching column wins; duplicates are ignored.
            positions.entry(field).or_insert(idx);
        }
    }

    let mut missing = Vec::new();
    for required in [Field::Name, Field::JobTitle] {
        if !positions.contains_key(&required) {
            missing.push(required.display_name());
        }
    }
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns(missing));
    }

    let cell = |row: usize, field: Field| -> Option<&str> {
        positions
            .get(&field)
            .map(|col| table.cell(row, *col))
            .filter(|value| !value.is_empty())
    };

    let mut rows = Vec::with_capacity(table.rows.len());
    for row_idx in 0..table.rows.len() {
        let name = cell(row_idx, Field::Name)
            .ok_or(ValidationError::EmptyField {
                row: row_idx + 1,
                field: Field::Name.display_name(),
            })?
            .to_string();
        let job_title = cell(row_idx, Field::JobTitle)
            .ok_or(ValidationError::EmptyField {
                row: row_idx + 1,
                field: Field::JobTitle.display_name(),
            })?
            .to_string();

        let email = cell(row_idx, Field::Email)
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_email(&name));
        let source = cell(row_idx, Field::Source)
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let status = cell(row_idx, Field::Status)
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_STATUS.to_string());
        let recruiter = cell(row_idx, Field::Recruiter)
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_RECRUITER.to_string());
        let start_date = cell(row_idx, Field::StartDate)
            .and_then(parse_start_date)
            .unwrap_or_else(|| now.date());
        let department = canonical_department(
            cell(row_idx, Field::Department).unwrap_or(DEFAULT_DEPARTMENT),
        );

        rows.push(NormalizedRow {
            name,
            email,
            job_title,
            status,
            recruiter,
            start_date,
            department,
            source,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::super::parser;
    use super::*;
    use std::io::Cursor;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn normalize(csv: &str) -> Result<Vec<NormalizedRow>, ValidationError> {
        let table = parser::parse_table(Cursor::new(csv)).expect("parse");
        normalize_table(&table, fixed_now())
    }

    #[test]
    fn hebrew_headers_map_to_canonical_fields() {
        let rows = normalize(
            "שם מועמד,שם המשרה,מצב שיוך למשרה,מגייס,תחילת גיוס,רמה 2,מקור הגעה\n\
             דנה לוי,מפתח Backend,ראיון HR,יעל,2025-05-01,פיתוח,LinkedIn\n",
        )
        .expect("normalizes");

        let row = &rows[0];
        assert_eq!(row.name, "דנה לוי");
        assert_eq!(row.job_title, "מפתח Backend");
        assert_eq!(row.status, "ראיון HR");
        assert_eq!(row.department, "R&D");
        assert_eq!(row.source, "LinkedIn");
        assert_eq!(row.start_date, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
    }

    #[test]
    fn missing_optional_fields_get_documented_defaults() {
        let rows = normalize("שם,משרה\nנעם כהן,אנליסט נתונים\n").expect("normalizes");
        let row = &rows[0];
        assert_eq!(row.email, "נעם.כהן@unknown.com");
        assert_eq!(row.source, "Organic / Unknown");
        assert_eq!(row.status, "חדש");
        assert_eq!(row.recruiter, "לא שויך");
        assert_eq!(row.department, "General");
        assert_eq!(row.start_date, fixed_now().date());
    }

    #[test]
    fn missing_required_columns_are_named() {
        let err = normalize("שם מועמד,סטטוס\nדנה,חדש\n").expect_err("must fail");
        match err {
            ValidationError::MissingColumns(fields) => {
                assert_eq!(fields, vec!["job title"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_required_cell_aborts_with_row_number() {
        let err = normalize("שם,משרה\nדנה לוי,\n").expect_err("must fail");
        match err {
            ValidationError::EmptyField { row, field } => {
                assert_eq!(row, 1);
                assert_eq!(field, "job title");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn department_rewrite_collapses_variant_spellings() {
        let rows = normalize(
            "שם,משרה,מחלקה\nא,תפקיד,משאבי-אנוש\nב,תפקיד,שירות\nג,תפקיד,כספים\n",
        )
        .expect("normalizes");
        assert_eq!(rows[0].department, "HR");
        assert_eq!(rows[1].department, "Sales & Service");
        assert_eq!(rows[2].department, "כספים");
    }

    #[test]
    fn start_date_formats_and_fallback() {
        let rows = normalize(
            "שם,משרה,תחילת גיוס\nא,ת,2025-03-02\nב,ת,02/03/2025\nג,ת,לא תאריך\n",
        )
        .expect("normalizes");
        assert_eq!(rows[0].start_date, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!(rows[1].start_date, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!(rows[2].start_date, fixed_now().date());
    }

    #[test]
    fn unmatched_headers_are_ignored_by_projection() {
        let rows = normalize("שם,משרה,הערות פנימיות\nדנה,תפקיד,סודי\n").expect("normalizes");
        assert_eq!(rows.len(), 1);
    }
}
