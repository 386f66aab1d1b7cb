//! Serializable report shapes returned by the analytics endpoints.

use serde::Serialize;

/// One bar of the monthly volume chart, labeled with the abbreviated
/// English month name the frontend keys drilldowns on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthVolume {
    pub name: String,
    pub candidates: u64,
}

/// Headline dashboard numbers plus the monthly chart.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_candidates: u64,
    pub hired_this_month: u64,
    pub avg_days: i64,
    pub sla_alerts: u64,
    pub chart_data: Vec<MonthVolume>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateRow {
    pub candidate_name: String,
    pub email: String,
    pub job_title: String,
    pub department: String,
    pub status: String,
    pub recruiter: String,
    pub source: String,
    pub days_in_process: i64,
}

/// One page of the searchable candidate table.
#[derive(Debug, Clone, Serialize)]
pub struct CandidatePage {
    pub data: Vec<CandidateRow>,
    pub page: usize,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    Good,
    Warning,
    Danger,
}

/// Per-job rollup of the active pipeline, worst bottlenecks first.
#[derive(Debug, Clone, Serialize)]
pub struct JobRollup {
    pub job_title: String,
    pub department: String,
    pub recruiter: String,
    pub active_candidates: u64,
    pub avg_days: i64,
    pub max_days: i64,
    pub sla_breaches: u64,
    pub health: HealthTier,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bottleneck {
    pub job: String,
    pub breaches: u64,
    pub recruiter: String,
}

/// Morning-brief summary with a canned Hebrew insight line.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveBrief {
    pub date: String,
    pub total_active: u64,
    pub hired_this_month: u64,
    pub sla_breaches: u64,
    pub top_bottlenecks: Vec<Bottleneck>,
    pub insight: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunnelStageEntry {
    pub stage: &'static str,
    pub count: u64,
    pub percentage: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct GhostingRisk {
    pub candidate: String,
    pub job: String,
    pub days: i64,
    pub risk_score: u8,
    pub recruiter: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Baseline {
    pub avg_days: i64,
    pub current_hires: u64,
}

/// Funnel, ghosting radar, and pipeline baseline in one payload.
#[derive(Debug, Clone, Serialize)]
pub struct IntelligenceReport {
    pub funnel: Vec<FunnelStageEntry>,
    pub ghosting_risks: Vec<GhostingRisk>,
    pub baseline: Baseline,
}

/// One candidate row of a month drilldown, longest-waiting first.
#[derive(Debug, Clone, Serialize)]
pub struct DrilldownRow {
    pub candidate_name: String,
    pub job_title: String,
    pub status: String,
    pub recruiter: String,
    pub days_in_process: i64,
}

/// Distinct filter values for the dashboard slicers.
#[derive(Debug, Clone, Serialize)]
pub struct MetaView {
    pub departments: Vec<String>,
    pub recruiters: Vec<String>,
}
