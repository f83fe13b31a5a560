// src/export.rs

use anyhow::{Context, Result};
use std::{ops::RangeInclusive, path::Path};
use tempfile::{Builder, TempPath};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::{
    config::Config,
    fetch::Fetcher,
    table::Table,
    write::{ensure_parent, write_table, BatchedCsvWriter},
};

pub const COUNTRIES_PATH: &str = "/api/esr/countries";

/// Loop indices for the market-year fetches, inclusive on both ends.
pub const MARKET_YEAR_INDICES: RangeInclusive<u32> = 2..=23;

/// Two-digit market-year suffixes, one per fetch, in request order.
///
/// Indices up to 10 are shifted by ten and the rest pass through, so the
/// sequence is 12..=20 followed by 11..=23.
pub fn market_year_suffixes() -> impl Iterator<Item = u32> {
    MARKET_YEAR_INDICES.map(|i| if i <= 10 { i + 10 } else { i })
}

/// Path of the all-countries export query for one commodity and year suffix.
pub fn export_path(commodity_code: u32, suffix: u32) -> String {
    format!(
        "/api/esr/exports/commodityCode/{}/allCountries/marketYear/20{:02}",
        commodity_code, suffix
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    /// Rows in the country reference table.
    pub countries: usize,
    /// Market-year pages fetched.
    pub pages: usize,
    pub export_rows: u64,
    pub export_batches: usize,
}

/// Reference list, market-year loop, then the two CSV writes.
/// Any failed fetch ends the run before either target file is touched.
pub struct Exporter {
    fetcher: Fetcher,
    config: Config,
}

impl Exporter {
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self { fetcher, config })
    }

    #[instrument(level = "info", skip(self), fields(commodity = self.config.commodity_code))]
    pub async fn run(&self) -> Result<ExportSummary> {
        let start = Instant::now();

        // ─── 1) country reference list ─────────────────────────────────
        let url = self.fetcher.url_for(COUNTRIES_PATH)?;
        let countries = self
            .fetcher
            .get(&url)
            .await
            .context("fetching country reference list")?;
        let countries = Table::from_json(countries).context("reading country reference list")?;
        info!(rows = countries.len(), "fetched country codes");

        // ─── 2) market-year loop, streamed into a staging file ─────────
        let exports_path = &self.config.exports_path;
        let staging = staging_path(exports_path)?;
        let mut writer = BatchedCsvWriter::new(&*staging, self.config.batch_size);
        let mut pages = 0;

        for suffix in market_year_suffixes() {
            let url = self
                .fetcher
                .url_for(&export_path(self.config.commodity_code, suffix))?;
            let data = self
                .fetcher
                .get(&url)
                .await
                .with_context(|| format!("fetching exports for market year 20{:02}", suffix))?;
            let page = Table::from_json(data)
                .with_context(|| format!("reading exports for market year 20{:02}", suffix))?;
            info!(year = 2000 + suffix, rows = page.len(), "fetched exports");

            writer.push_page(&page)?;
            pages += 1;
        }

        // ─── 3) reference table: full overwrite ────────────────────────
        write_table(&self.config.country_codes_path, &countries)?;
        info!(path = %self.config.country_codes_path.display(), "wrote country codes");

        // ─── 4) export table: batched, then moved into place ───────────
        let batches = writer.finish()?;
        if batches.batches == 0 {
            warn!(path = %exports_path.display(), "no export rows; leaving file untouched");
        } else {
            staging
                .persist(exports_path)
                .with_context(|| format!("moving staged exports to {:?}", exports_path))?;
            info!(
                path = %exports_path.display(),
                rows = batches.rows,
                batches = batches.batches,
                "wrote exports"
            );
        }

        let summary = ExportSummary {
            countries: countries.len(),
            pages,
            export_rows: batches.rows,
            export_batches: batches.batches,
        };
        info!(?summary, elapsed = ?start.elapsed(), "export complete");
        Ok(summary)
    }
}

/// Hidden file beside `target`; removed on drop unless persisted.
fn staging_path(target: &Path) -> Result<TempPath> {
    let dir = ensure_parent(target)?;
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "exports.csv".to_string());
    let file = Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".partial")
        .tempfile_in(dir)
        .with_context(|| format!("creating staging file in {:?}", dir))?;
    Ok(file.into_temp_path())
}
