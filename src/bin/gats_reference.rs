use anyhow::Result;
use esrscraper::{gats::fetch_reference, Config, Fetcher};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let prefix = &config.gats_hs_prefix;
    let fetcher = Fetcher::new(&config)?;

    match fetch_reference(&fetcher, prefix).await {
        Ok(reference) => {
            info!(
                prefix = %prefix,
                commodities = reference.commodities.len(),
                units = reference.units_of_measure.len(),
                "GATS reference data"
            );
            let columns = reference.commodities.columns();
            for row in reference.commodities.records(columns) {
                info!(?row, "commodity");
            }
        }
        Err(e) => error!("GATS reference fetch failed: {:#}", e),
    }
    Ok(())
}
