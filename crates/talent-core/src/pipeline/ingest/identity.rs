use uuid::Uuid;

/// Stable candidate identifier derived from the normalized email address.
/// The same natural key yields the same id across processes and uploads.
pub fn candidate_id(email: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, normalize_email(email).as_bytes()).to_string()
}

/// Stable job identifier derived from the normalized job title.
pub fn job_id(title: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, normalize_title(title).as_bytes()).to_string()
}

fn normalize_email(value: &str) -> String {
    collapse_whitespace(value).to_lowercase()
}

fn normalize_title(value: &str) -> String {
    collapse_whitespace(value)
}

fn collapse_whitespace(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_id_is_deterministic_and_case_insensitive() {
        let a = candidate_id("Dana.Levi@example.com");
        let b = candidate_id("  dana.levi@example.com ");
        assert_eq!(a, b);
        assert_ne!(a, candidate_id("dana.levy@example.com"));
    }

    #[test]
    fn job_id_collapses_internal_whitespace_but_keeps_case() {
        assert_eq!(job_id("מפתח  Backend"), job_id("מפתח Backend"));
        assert_ne!(job_id("מפתח Backend"), job_id("מפתח Frontend"));
    }
}
