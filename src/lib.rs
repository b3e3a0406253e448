//! TransportPro: a marketplace where drivers publish cargo and passenger
//! vehicles and customers search them. Publishing requires a paid or demo
//! subscription.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;

mod cli;
mod routes;
mod server;

use error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
