//! Keyword classification of free-text status and department strings.
//!
//! The rule tables below are ordered substring matches, not a state machine.
//! Funnel stages are cumulative "has reached at least this stage" indicators
//! and their keyword sets overlap on purpose, so one status string may count
//! toward several stages. That approximation is inherited from the source
//! reports and kept in one auditable place here instead of being scattered
//! through the aggregation code.

/// Closed-status keywords, checked in order. Any case-insensitive substring
/// match closes the application; no match means it is still active.
pub const CLOSED_STATUS_KEYWORDS: &[&str] =
    &["קליטה", "גיוס", "דחייה", "הסרה", "ויתור", "הקפאה"];

/// Departments matching these keywords are "front line" and carry a shorter
/// SLA threshold than back-office or technology departments. Both the raw
/// Hebrew labels and the canonical rewritten English ones must match.
pub const FRONT_LINE_KEYWORDS: &[&str] =
    &["שירות", "מכירות", "מוקדים", "sales", "service", "call center"];

const FRONT_LINE_SLA_DAYS: i64 = 29;
const STANDARD_SLA_DAYS: i64 = 44;

pub fn is_active(status: &str) -> bool {
    !contains_any(status, CLOSED_STATUS_KEYWORDS)
}

pub fn is_hired(status: &str) -> bool {
    reaches_stage(status, FunnelStage::Hired)
}

pub fn is_front_line(department: &str) -> bool {
    contains_any(department, FRONT_LINE_KEYWORDS)
}

/// Days an active application may sit in process before it counts as an
/// SLA breach, adapted to the department's classification.
pub fn sla_threshold_days(department: &str) -> i64 {
    if is_front_line(department) {
        FRONT_LINE_SLA_DAYS
    } else {
        STANDARD_SLA_DAYS
    }
}

/// The five cumulative pipeline milestones inferred from status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunnelStage {
    Sourced,
    Screened,
    Interviewed,
    Offered,
    Hired,
}

impl FunnelStage {
    pub const fn ordered() -> [FunnelStage; 5] {
        [
            FunnelStage::Sourced,
            FunnelStage::Screened,
            FunnelStage::Interviewed,
            FunnelStage::Offered,
            FunnelStage::Hired,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            FunnelStage::Sourced => "קורות חיים (Sourcing)",
            FunnelStage::Screened => "סינון ראשוני / טלפוני",
            FunnelStage::Interviewed => "ראיונות (HR + מקצועי)",
            FunnelStage::Offered => "הצעות שכר",
            FunnelStage::Hired => "קליטות בפועל",
        }
    }

    const fn keywords(self) -> &'static [&'static str] {
        match self {
            FunnelStage::Sourced => &[],
            FunnelStage::Screened => &["טלפוני", "ראשוני", "ראיון hr", "מנהל"],
            FunnelStage::Interviewed => &[
                "ראיון hr",
                "משאבי אנוש",
                "ראיון מנהל",
                "מקצועי",
                "מרכז הערכה",
            ],
            FunnelStage::Offered => &["הצעת שכר", "חוזה", "ממתין לחתימה"],
            FunnelStage::Hired => &["קליטה", "גיוס"],
        }
    }
}

/// Every application has been sourced; later stages require a keyword hit.
pub fn reaches_stage(status: &str, stage: FunnelStage) -> bool {
    match stage {
        FunnelStage::Sourced => true,
        _ => contains_any(status, stage.keywords()),
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_keywords_deactivate_case_insensitively() {
        assert!(is_active("ראיון HR"));
        assert!(is_active("חדש"));
        assert!(!is_active("דחייה - לא מתאים"));
        assert!(!is_active("בתהליך קליטה"));
        assert!(!is_active("הקפאה זמנית"));
    }

    #[test]
    fn funnel_stages_are_cumulative_and_may_overlap() {
        let status = "ראיון HR שני";
        assert!(reaches_stage(status, FunnelStage::Sourced));
        assert!(reaches_stage(status, FunnelStage::Screened));
        assert!(reaches_stage(status, FunnelStage::Interviewed));
        assert!(!reaches_stage(status, FunnelStage::Offered));
    }

    #[test]
    fn hired_keywords_match_substrings() {
        assert!(is_hired("קליטה מתוכננת"));
        assert!(is_hired("גיוס הושלם"));
        assert!(!is_hired("הצעת שכר"));
    }

    #[test]
    fn front_line_departments_get_shorter_sla() {
        assert_eq!(sla_threshold_days("מכירות ושירות"), 29);
        assert_eq!(sla_threshold_days("Sales & Service"), 29);
        assert_eq!(sla_threshold_days("מוקדים ארציים"), 29);
        assert_eq!(sla_threshold_days("R&D"), 44);
        assert_eq!(sla_threshold_days("General"), 44);
    }
}
