//! Pure aggregation over the flattened pipeline rows.
//!
//! Every function takes an explicit `today` so reports are reproducible in
//! tests; nothing in here touches the wall clock or the database. Elapsed
//! days are recomputed per call from the stored start dates, which keeps
//! snapshots honest no matter how stale the last upload is.

use super::views::{
    Baseline, Bottleneck, CandidatePage, CandidateRow, DashboardStats, DrilldownRow,
    ExecutiveBrief, FunnelStageEntry, GhostingRisk, HealthTier, IntelligenceReport, JobRollup,
    MetaView, MonthVolume,
};
use crate::pipeline::classify::{self, FunnelStage};
use crate::pipeline::store::PipelineRow;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

const GHOSTING_STALL_DAYS: i64 = 14;
const GHOSTING_RADAR_SIZE: usize = 8;
const NO_DATA_INSIGHT: &str = "אין מספיק נתונים פעילים להפקת תובנות.";

/// Reporting window applied on top of the slicer filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    #[default]
    All,
    Last30Days,
    CurrentYear,
}

impl Timeframe {
    /// Unknown values fall back to the unbounded window.
    pub fn parse(value: &str) -> Timeframe {
        match value {
            "30days" => Timeframe::Last30Days,
            "year" => Timeframe::CurrentYear,
            _ => Timeframe::All,
        }
    }
}

/// Dashboard slicers. `None` means "all".
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub timeframe: Timeframe,
    pub department: Option<String>,
    pub recruiter: Option<String>,
}

/// Parameters of the paged candidate table.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub page: usize,
    pub limit: usize,
    pub search: Option<String>,
    pub sort_by: String,
    pub sort_dir: String,
}

impl Default for CandidateQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 50,
            search: None,
            sort_by: "days_in_process".to_string(),
            sort_dir: "desc".to_string(),
        }
    }
}

/// Days an application has been in process as of `today`, clamped at zero
/// for future-dated starts.
pub fn days_in_process(row: &PipelineRow, today: NaiveDate) -> i64 {
    (today - row.start_date).num_days().max(0)
}

fn apply_filters<'a>(
    rows: &'a [PipelineRow],
    filters: &QueryFilters,
    today: NaiveDate,
) -> Vec<&'a PipelineRow> {
    rows.iter()
        .filter(|row| match &filters.department {
            Some(department) => row.department == *department,
            None => true,
        })
        .filter(|row| match &filters.recruiter {
            Some(recruiter) => row.recruiter == *recruiter,
            None => true,
        })
        .filter(|row| match filters.timeframe {
            Timeframe::All => true,
            Timeframe::Last30Days => row.start_date >= today - Duration::days(30),
            Timeframe::CurrentYear => row.start_date.year() == today.year(),
        })
        .collect()
}

fn month_label(date: NaiveDate) -> String {
    date.format("%b").to_string()
}

fn breaches_sla(row: &PipelineRow, today: NaiveDate) -> bool {
    days_in_process(row, today) > classify::sla_threshold_days(&row.department)
}

fn mean_days(rows: &[&PipelineRow], today: NaiveDate) -> i64 {
    if rows.is_empty() {
        return 0;
    }
    let sum: i64 = rows.iter().map(|row| days_in_process(row, today)).sum();
    sum / rows.len() as i64
}

/// Headline numbers and the monthly volume chart.
///
/// With the unbounded timeframe the hired/SLA/chart figures still restrict
/// themselves to the current and previous calendar year, so stale history
/// cannot drown out the live pipeline; the total stays unrestricted.
pub fn dashboard_stats(
    rows: &[PipelineRow],
    filters: &QueryFilters,
    today: NaiveDate,
) -> DashboardStats {
    let filtered = apply_filters(rows, filters, today);
    let total_candidates = filtered.len() as u64;

    let recent: Vec<&PipelineRow> = match filters.timeframe {
        Timeframe::All => filtered
            .iter()
            .copied()
            .filter(|row| row.start_date.year() >= today.year() - 1)
            .collect(),
        _ => filtered.clone(),
    };

    let hired: Vec<&PipelineRow> = recent
        .iter()
        .copied()
        .filter(|row| classify::is_hired(&row.status))
        .collect();
    let hired_this_month = hired
        .iter()
        .filter(|row| row.start_date.month() == today.month())
        .count() as u64;
    let avg_days = mean_days(&hired, today);

    let sla_alerts = recent
        .iter()
        .filter(|row| classify::is_active(&row.status) && breaches_sla(row, today))
        .count() as u64;

    let mut by_month: BTreeMap<u32, (String, u64)> = BTreeMap::new();
    for row in &recent {
        let entry = by_month
            .entry(row.start_date.month())
            .or_insert_with(|| (month_label(row.start_date), 0));
        entry.1 += 1;
    }
    let chart_data = by_month
        .into_values()
        .map(|(name, candidates)| MonthVolume { name, candidates })
        .collect();

    DashboardStats {
        total_candidates,
        hired_this_month,
        avg_days,
        sla_alerts,
        chart_data,
    }
}

/// Search, sort, and page the candidate table under the shared slicer
/// filters. Unknown sort columns fall back to elapsed days; search matches
/// name, job title, or recruiter.
pub fn candidate_page(
    rows: &[PipelineRow],
    filters: &QueryFilters,
    query: &CandidateQuery,
    today: NaiveDate,
) -> CandidatePage {
    let needle = query
        .search
        .as_deref()
        .map(str::to_lowercase)
        .filter(|s| !s.is_empty());

    let mut matched: Vec<&PipelineRow> = apply_filters(rows, filters, today)
        .into_iter()
        .filter(|row| match &needle {
            Some(needle) => {
                row.candidate_name.to_lowercase().contains(needle)
                    || row.job_title.to_lowercase().contains(needle)
                    || row.recruiter.to_lowercase().contains(needle)
            }
            None => true,
        })
        .collect();

    let sort_key = match query.sort_by.as_str() {
        key @ ("candidate_name" | "job_title" | "status" | "recruiter" | "department") => key,
        _ => "days_in_process",
    };
    matched.sort_by(|a, b| match sort_key {
        "candidate_name" => a.candidate_name.cmp(&b.candidate_name),
        "job_title" => a.job_title.cmp(&b.job_title),
        "status" => a.status.cmp(&b.status),
        "recruiter" => a.recruiter.cmp(&b.recruiter),
        "department" => a.department.cmp(&b.department),
        _ => days_in_process(a, today).cmp(&days_in_process(b, today)),
    });
    if query.sort_dir != "asc" {
        matched.reverse();
    }

    let total = matched.len() as u64;
    let page = query.page.max(1);
    let offset = (page - 1) * query.limit;
    let data = matched
        .into_iter()
        .skip(offset)
        .take(query.limit)
        .map(|row| CandidateRow {
            candidate_name: row.candidate_name.clone(),
            email: row.email.clone(),
            job_title: row.job_title.clone(),
            department: row.department.clone(),
            status: row.status.clone(),
            recruiter: row.recruiter.clone(),
            source: row.source.clone(),
            days_in_process: days_in_process(row, today),
        })
        .collect();

    CandidatePage { data, page, total }
}

/// Active pipeline grouped by job, bottlenecks first, under the shared
/// slicer filters. Breach counts use the department-adaptive SLA threshold.
pub fn job_rollups(
    rows: &[PipelineRow],
    filters: &QueryFilters,
    today: NaiveDate,
) -> Vec<JobRollup> {
    let mut groups: BTreeMap<&str, Vec<&PipelineRow>> = BTreeMap::new();
    for row in apply_filters(rows, filters, today)
        .into_iter()
        .filter(|row| classify::is_active(&row.status))
    {
        groups.entry(&row.job_title).or_default().push(row);
    }

    let mut rollups: Vec<JobRollup> = groups
        .into_iter()
        .map(|(job_title, group)| {
            let sla_breaches = group.iter().filter(|row| breaches_sla(row, today)).count() as u64;
            let max_days = group
                .iter()
                .map(|row| days_in_process(row, today))
                .max()
                .unwrap_or(0);
            let health = if sla_breaches > 2 {
                HealthTier::Danger
            } else if sla_breaches > 0 {
                HealthTier::Warning
            } else {
                HealthTier::Good
            };
            JobRollup {
                job_title: job_title.to_string(),
                department: group[0].department.clone(),
                recruiter: group[0].recruiter.clone(),
                active_candidates: group.len() as u64,
                avg_days: mean_days(&group, today),
                max_days,
                sla_breaches,
                health,
            }
        })
        .collect();

    rollups.sort_by(|a, b| {
        (b.sla_breaches, b.max_days).cmp(&(a.sla_breaches, a.max_days))
    });
    rollups
}

/// Morning-brief snapshot with the three worst bottleneck jobs and a canned
/// insight line chosen from the breach percentage and hire pace. Honors the
/// same slicer filters as the rest of the dashboard.
pub fn executive_brief(
    rows: &[PipelineRow],
    filters: &QueryFilters,
    today: NaiveDate,
) -> ExecutiveBrief {
    let filtered = apply_filters(rows, filters, today);
    let active: Vec<&PipelineRow> = filtered
        .iter()
        .copied()
        .filter(|row| classify::is_active(&row.status))
        .collect();
    let total_active = active.len() as u64;
    let sla_breaches = active.iter().filter(|row| breaches_sla(row, today)).count() as u64;

    let hired_this_month = filtered
        .iter()
        .filter(|row| {
            classify::is_hired(&row.status)
                && row.start_date.month() == today.month()
                && row.start_date.year() == today.year()
        })
        .count() as u64;

    let mut by_job: BTreeMap<&str, Vec<&PipelineRow>> = BTreeMap::new();
    for row in &active {
        by_job.entry(&row.job_title).or_default().push(row);
    }
    let mut bottlenecks: Vec<Bottleneck> = by_job
        .into_iter()
        .filter_map(|(job, group)| {
            let breaches = group.iter().filter(|row| breaches_sla(row, today)).count() as u64;
            (breaches > 0).then(|| Bottleneck {
                job: job.to_string(),
                breaches,
                recruiter: group[0].recruiter.clone(),
            })
        })
        .collect();
    bottlenecks.sort_by(|a, b| b.breaches.cmp(&a.breaches));
    bottlenecks.truncate(3);

    let insight = if total_active > 0 {
        let breach_percentage = (sla_breaches * 100 / total_active) as i64;
        if breach_percentage > 15 {
            format!(
                "⚠️ שימו לב: {breach_percentage}% מהצנרת הפעילה נמצאת בחריגת SLA. יש למקד מאמצי גיוס בשחרור צווארי הבקבוק במשרות המובילות."
            )
        } else if hired_this_month > 10 {
            format!(
                "✅ קצב הגיוסים החודש מעולה. חריגות ה-SLA עומדות על רמה תקינה של {breach_percentage}%."
            )
        } else {
            format!(
                "ℹ️ הצנרת יציבה. יש לשים דגש על {} המשרות המעכבות את הממוצע הארגוני.",
                bottlenecks.len()
            )
        }
    } else {
        NO_DATA_INSIGHT.to_string()
    };

    ExecutiveBrief {
        date: today.format("%d/%m/%Y").to_string(),
        total_active,
        hired_this_month,
        sla_breaches,
        top_bottlenecks: bottlenecks,
        insight,
    }
}

/// Conversion funnel, ghosting radar, and baseline in one report, under the
/// shared slicer filters.
pub fn intelligence(
    rows: &[PipelineRow],
    filters: &QueryFilters,
    today: NaiveDate,
) -> IntelligenceReport {
    let filtered = apply_filters(rows, filters, today);
    let total = filtered.len() as u64;

    let funnel = FunnelStage::ordered()
        .into_iter()
        .map(|stage| {
            let count = filtered
                .iter()
                .filter(|row| classify::reaches_stage(&row.status, stage))
                .count() as u64;
            let percentage = if total > 0 {
                (count * 100 / total) as u8
            } else {
                0
            };
            FunnelStageEntry {
                stage: stage.label(),
                count,
                percentage,
            }
        })
        .collect();

    let active: Vec<&PipelineRow> = filtered
        .iter()
        .copied()
        .filter(|row| classify::is_active(&row.status))
        .collect();

    let mut stalled: Vec<&PipelineRow> = active
        .iter()
        .copied()
        .filter(|row| days_in_process(row, today) > GHOSTING_STALL_DAYS)
        .collect();
    stalled.sort_by(|a, b| days_in_process(b, today).cmp(&days_in_process(a, today)));
    stalled.truncate(GHOSTING_RADAR_SIZE);

    let ghosting_risks = stalled
        .into_iter()
        .map(|row| {
            let days = days_in_process(row, today);
            // Risk climbs 3 points per stalled day past the threshold,
            // capped at 99.
            let risk_score = (40 + (days - GHOSTING_STALL_DAYS) * 3).min(99) as u8;
            GhostingRisk {
                candidate: row.candidate_name.clone(),
                job: row.job_title.clone(),
                days,
                risk_score,
                recruiter: row.recruiter.clone(),
            }
        })
        .collect();

    let current_hires = filtered
        .iter()
        .filter(|row| classify::is_hired(&row.status))
        .count() as u64;

    IntelligenceReport {
        funnel,
        ghosting_risks,
        baseline: Baseline {
            avg_days: mean_days(&active, today),
            current_hires,
        },
    }
}

/// Candidates behind one bar of the monthly chart, under the same slicer
/// filters, longest-waiting first. The month is matched by its abbreviated
/// English label, exactly as charted.
pub fn month_drilldown(
    rows: &[PipelineRow],
    filters: &QueryFilters,
    month_name: &str,
    today: NaiveDate,
) -> Vec<DrilldownRow> {
    let mut matched: Vec<&PipelineRow> = apply_filters(rows, filters, today)
        .into_iter()
        .filter(|row| month_label(row.start_date) == month_name)
        .collect();
    matched.sort_by(|a, b| days_in_process(b, today).cmp(&days_in_process(a, today)));

    matched
        .into_iter()
        .map(|row| DrilldownRow {
            candidate_name: row.candidate_name.clone(),
            job_title: row.job_title.clone(),
            status: row.status.clone(),
            recruiter: row.recruiter.clone(),
            days_in_process: days_in_process(row, today),
        })
        .collect()
}

/// Distinct departments and recruiters, sorted, for the slicer dropdowns.
pub fn meta(rows: &[PipelineRow]) -> MetaView {
    let departments: BTreeSet<&str> = rows.iter().map(|row| row.department.as_str()).collect();
    let recruiters: BTreeSet<&str> = rows.iter().map(|row| row.recruiter.as_str()).collect();
    MetaView {
        departments: departments.into_iter().map(String::from).collect(),
        recruiters: recruiters.into_iter().map(String::from).collect(),
    }
}
