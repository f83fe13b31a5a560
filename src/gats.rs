// src/gats.rs
//! Reference data for the Global Agricultural Trade System (GATS) endpoints.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::{fetch::Fetcher, table::Table};

pub const COMMODITIES_PATH: &str = "/api/gats/commodities";
pub const UNITS_OF_MEASURE_PATH: &str = "/api/gats/unitsOfMeasure";
pub const HS10_CODE_COLUMN: &str = "hS10Code";
/// HS heading 1001: wheat and meslin.
pub const WHEAT_HS_PREFIX: &str = "1001";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatsReference {
    /// Commodities whose HS-10 code starts with the requested prefix.
    pub commodities: Table,
    pub units_of_measure: Table,
}

/// Commodity list (filtered by HS-10 prefix) and units of measure.
/// Writes nothing.
#[instrument(level = "info", skip(fetcher))]
pub async fn fetch_reference(fetcher: &Fetcher, hs_prefix: &str) -> Result<GatsReference> {
    let url = fetcher.url_for(COMMODITIES_PATH)?;
    let data = fetcher
        .get(&url)
        .await
        .context("fetching GATS commodity list")?;
    let mut commodities = Table::from_json(data).context("reading GATS commodity list")?;
    let total = commodities.len();
    commodities.retain_prefix(HS10_CODE_COLUMN, hs_prefix);
    info!(total, kept = commodities.len(), prefix = hs_prefix, "filtered commodities");

    let url = fetcher.url_for(UNITS_OF_MEASURE_PATH)?;
    let data = fetcher
        .get(&url)
        .await
        .context("fetching GATS units of measure")?;
    let units_of_measure = Table::from_json(data).context("reading GATS units of measure")?;
    info!(rows = units_of_measure.len(), "fetched units of measure");

    Ok(GatsReference {
        commodities,
        units_of_measure,
    })
}
