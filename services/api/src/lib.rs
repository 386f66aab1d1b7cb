mod cli;
mod infra;
mod ingest;
mod routes;
mod server;

use talent_core::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
