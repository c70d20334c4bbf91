//! Proctoring Simulator - Main Entry Point
//!
//! Usage: `proctor-sim [settings.toml]`

use proctor::{init_logging, sim, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1);
    let settings = Settings::load(path.as_deref())?;
    init_logging(&settings)?;

    info!("=== Proctor simulator v{} ===", env!("CARGO_PKG_VERSION"));

    let snapshot = sim::simulate(&settings).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
