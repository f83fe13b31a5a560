use anyhow::Result;
use esrscraper::{Config, Exporter};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) config from .env / environment ───────────────────────────
    let config = Config::from_env()?;
    info!(
        base = %config.base_url,
        countries = %config.country_codes_path.display(),
        exports = %config.exports_path.display(),
        "configured"
    );

    // ─── 3) run the ESR export ───────────────────────────────────────
    // A failed run is reported, not turned into an exit code.
    let exporter = Exporter::new(config)?;
    match exporter.run().await {
        Ok(summary) => info!(
            countries = summary.countries,
            rows = summary.export_rows,
            batches = summary.export_batches,
            "all done"
        ),
        Err(e) => error!("export aborted: {:#}", e),
    }

    Ok(())
}
