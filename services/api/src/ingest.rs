use chrono::Local;
use clap::Args;
use std::path::PathBuf;
use talent_core::config::AppConfig;
use talent_core::error::AppError;
use talent_core::pipeline::metrics::engine::{self, QueryFilters};
use talent_core::pipeline::{PipelineService, SqliteStore};

#[derive(Args, Debug)]
pub(crate) struct IngestArgs {
    /// CSV export to ingest
    pub(crate) file: PathBuf,
    /// Override the configured database path
    #[arg(long)]
    pub(crate) db: Option<PathBuf>,
}

pub(crate) fn run_ingest(args: IngestArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let db_path = args.db.unwrap_or(config.storage.db_path);
    let store = SqliteStore::open(db_path)?;
    let service = PipelineService::new(store, config.privacy.scrubber_enabled_default);

    let filename = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());
    let csv_text = std::fs::read_to_string(&args.file)?;
    let now = Local::now().naive_local();

    let receipt = service.ingest_csv(&filename, &csv_text, now)?;
    println!(
        "Batch {} committed ({} rows)",
        receipt.batch_id, receipt.rows_processed
    );

    let rows = service.rows()?;
    let stats = engine::dashboard_stats(&rows, &QueryFilters::default(), now.date());
    println!(
        "Pipeline: {} candidates | {} SLA alerts | avg {} days to hire",
        stats.total_candidates, stats.sla_alerts, stats.avg_days
    );

    let health = service.data_health()?;
    println!("Data health score: {}%", health.health_score);
    for missing in &health.missing_data {
        println!("- {}: {}", missing.field, missing.count);
    }

    Ok(())
}
