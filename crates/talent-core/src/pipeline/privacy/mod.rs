//! PII masking: structural column masking applied during ingestion, and
//! regex scrubbing of free text submitted for analysis.

use crate::pipeline::ingest::columns::resolve_header;
use crate::pipeline::ingest::parser::RawTable;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Header fragments that flag a column as sensitive. Substring match,
/// case-insensitive, mirroring the source system's masking list.
pub const SENSITIVE_HEADER_KEYWORDS: &[&str] =
    &["ת.ז", "תעודת זהות", "id", "טלפון", "נייד", "phone", "כתובת"];

const MASKED_SUFFIX: &str = "_MASKED_SECURE";
const MASK_LEN: usize = 12;
const REDACTED: &str = "[REDACTED]";

/// One-way hash of a cell value, truncated so masked columns keep a uniform
/// width. Stable across invocations, never reversible.
pub fn mask_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest)[..MASK_LEN].to_string()
}

fn is_sensitive_header(header: &str) -> bool {
    // Canonical columns are never masked; the generic "id" fragment would
    // otherwise swallow headers like "Candidate Name".
    if resolve_header(header).is_some() {
        return false;
    }
    let lowered = header.to_lowercase();
    SENSITIVE_HEADER_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Replace every value in sensitive columns with its truncated hash and
/// rename the column so downstream consumers can tell it was masked.
/// Returns the original names of the columns that were masked.
pub fn mask_sensitive_columns(table: &mut RawTable) -> Vec<String> {
    let mut masked = Vec::new();

    for col in 0..table.headers.len() {
        if !is_sensitive_header(&table.headers[col]) {
            continue;
        }

        for row in table.rows.iter_mut() {
            if let Some(cell) = row.get_mut(col) {
                if !cell.trim().is_empty() {
                    *cell = mask_value(cell);
                }
            }
        }

        let original = table.headers[col].clone();
        table.headers[col] = format!("{original}{MASKED_SUFFIX}");
        masked.push(original);
    }

    masked
}

/// Per-category redaction counts returned alongside scrubbed text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrubCounts {
    pub emails: u32,
    pub phones: u32,
    pub id_numbers: u32,
}

impl ScrubCounts {
    pub fn total(&self) -> u32 {
        self.emails + self.phones + self.id_numbers
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrubReport {
    pub text: String,
    pub counts: ScrubCounts,
}

struct ScrubPatterns {
    email: Regex,
    phone: Regex,
    id_number: Regex,
}

fn patterns() -> &'static ScrubPatterns {
    static PATTERNS: OnceLock<ScrubPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ScrubPatterns {
        email: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
            .expect("email pattern"),
        phone: Regex::new(r"\b05\d[-\s]?\d{3}[-\s]?\d{4}\b").expect("phone pattern"),
        id_number: Regex::new(r"\b\d{9}\b").expect("id pattern"),
    })
}

/// Redact emails, Israeli mobile numbers, and 9-digit national IDs from
/// free text. Phones are scrubbed before IDs so the ID pattern cannot eat
/// the first nine digits of a ten-digit mobile number.
pub fn scrub_text(text: &str) -> ScrubReport {
    let patterns = patterns();
    let mut counts = ScrubCounts::default();

    counts.emails = patterns.email.find_iter(text).count() as u32;
    let pass = patterns.email.replace_all(text, REDACTED);

    counts.phones = patterns.phone.find_iter(&pass).count() as u32;
    let pass = patterns.phone.replace_all(&pass, REDACTED);

    counts.id_numbers = patterns.id_number.find_iter(&pass).count() as u32;
    let scrubbed = patterns.id_number.replace_all(&pass, REDACTED);

    ScrubReport {
        text: scrubbed.into_owned(),
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingest::parser;
    use std::io::Cursor;

    #[test]
    fn phone_column_is_hashed_and_renamed() {
        let mut table = parser::parse_table(Cursor::new(
            "שם,משרה,Phone\nדנה,תפקיד,050-1234567\n",
        ))
        .expect("parse");

        let masked = mask_sensitive_columns(&mut table);
        assert_eq!(masked, vec!["Phone"]);
        assert!(table.headers.contains(&"Phone_MASKED_SECURE".to_string()));
        assert!(!table.headers.contains(&"Phone".to_string()));

        let cell = table.cell(0, 2).to_string();
        assert_eq!(cell.len(), 12);
        assert_eq!(cell, mask_value("050-1234567"));
    }

    #[test]
    fn canonical_columns_survive_the_generic_id_keyword() {
        let mut table = parser::parse_table(Cursor::new(
            "Candidate Name,שם המשרה,תעודת זהות\nDana,Backend,123456789\n",
        ))
        .expect("parse");

        let masked = mask_sensitive_columns(&mut table);
        assert_eq!(masked, vec!["תעודת זהות"]);
        assert_eq!(table.cell(0, 0), "Dana");
        assert_ne!(table.cell(0, 2), "123456789");
    }

    #[test]
    fn mask_value_is_stable_across_invocations() {
        assert_eq!(mask_value("305123456"), mask_value("305123456"));
        assert_ne!(mask_value("305123456"), mask_value("305123457"));
    }

    #[test]
    fn scrub_counts_each_category() {
        let report = scrub_text(
            "המועמדת דנה, ת.ז 305123456, נייד 052-1234567, dana@example.com",
        );
        assert_eq!(report.counts.emails, 1);
        assert_eq!(report.counts.phones, 1);
        assert_eq!(report.counts.id_numbers, 1);
        assert!(!report.text.contains("305123456"));
        assert!(!report.text.contains("052-1234567"));
        assert!(!report.text.contains("dana@example.com"));
        assert_eq!(report.text.matches("[REDACTED]").count(), 3);
    }

    #[test]
    fn phone_is_not_half_eaten_by_the_id_pattern() {
        let report = scrub_text("חייגו 0521234567 בבקשה");
        assert_eq!(report.counts.phones, 1);
        assert_eq!(report.counts.id_numbers, 0);
    }

    #[test]
    fn clean_text_passes_through_unchanged() {
        let report = scrub_text("סיכום ראיון ללא פרטים מזהים");
        assert_eq!(report.counts.total(), 0);
        assert_eq!(report.text, "סיכום ראיון ללא פרטים מזהים");
    }
}
