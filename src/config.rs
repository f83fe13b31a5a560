// src/config.rs

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};
use url::Url;

use crate::gats::WHEAT_HS_PREFIX;

pub const API_KEY_VAR: &str = "USDA_PSD_API_KEY";
pub const BASE_URL_VAR: &str = "ESR_BASE_URL";
pub const OUTPUT_DIR_VAR: &str = "ESR_OUTPUT_DIR";
pub const GATS_HS_PREFIX_VAR: &str = "GATS_HS_PREFIX";
pub const DOTENV_FILE: &str = ".env";

pub const DEFAULT_BASE_URL: &str = "https://api.fas.usda.gov";
pub const DEFAULT_OUTPUT_DIR: &str = "data/raw";
pub const COUNTRY_CODES_FILE: &str = "USDA_ESR_countryCodes.csv";
pub const WHEAT_EXPORTS_FILE: &str = "USDA_ESR_wheatExports.csv";

/// All Wheat, measured in metric tons.
pub const WHEAT_COMMODITY_CODE: u32 = 107;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Everything the fetcher and exporter need, passed in explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Sent as `X-Api-Key`. `None` sends an empty header.
    pub api_key: Option<String>,
    pub base_url: Url,
    pub timeout: Duration,
    pub commodity_code: u32,
    /// Rows per write against the export file.
    pub batch_size: usize,
    pub country_codes_path: PathBuf,
    pub exports_path: PathBuf,
    /// HS-10 prefix the GATS commodity list is filtered on.
    pub gats_hs_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        let out = Path::new(DEFAULT_OUTPUT_DIR);
        Self {
            api_key: None,
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL should parse"),
            timeout: DEFAULT_TIMEOUT,
            commodity_code: WHEAT_COMMODITY_CODE,
            batch_size: DEFAULT_BATCH_SIZE,
            country_codes_path: out.join(COUNTRY_CODES_FILE),
            exports_path: out.join(WHEAT_EXPORTS_FILE),
            gats_hs_prefix: WHEAT_HS_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Read the process environment, falling back to `.env` in the working directory.
    pub fn from_env() -> Result<Self> {
        Self::from_dotenv(DOTENV_FILE, |name| env::var(name).ok())
    }

    /// Like `from_lookup`, with values in the dotenv file at `path` filling
    /// whatever `env` leaves unset. A missing file is not an error.
    pub fn from_dotenv<P, F>(path: P, env: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let file = read_dotenv(path)?;
        debug!(path = %path.display(), vars = file.len(), "read dotenv file");
        Self::from_lookup(|name| env(name).or_else(|| file.get(name).cloned()))
    }

    /// Build a config from an arbitrary name → value lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        cfg.api_key = lookup(API_KEY_VAR).filter(|k| !k.trim().is_empty());
        if cfg.api_key.is_none() {
            warn!("{} is not set; requests will carry an empty API key", API_KEY_VAR);
        }

        if let Some(base) = lookup(BASE_URL_VAR) {
            cfg.base_url =
                Url::parse(&base).with_context(|| format!("parsing {}={}", BASE_URL_VAR, base))?;
        }

        if let Some(dir) = lookup(OUTPUT_DIR_VAR) {
            cfg = cfg.with_output_dir(dir);
        }

        if let Some(prefix) = lookup(GATS_HS_PREFIX_VAR).filter(|p| !p.trim().is_empty()) {
            cfg.gats_hs_prefix = prefix.trim().to_string();
        }

        Ok(cfg)
    }

    /// Re-root both output files under `dir`, keeping their file names.
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.country_codes_path = dir.join(COUNTRY_CODES_FILE);
        self.exports_path = dir.join(WHEAT_EXPORTS_FILE);
        self
    }
}

/// `KEY=value` pairs from a dotenv file, without touching the process environment.
fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            debug!(path = %path.display(), "no dotenv file; using process environment");
            return Ok(HashMap::new());
        }
        Err(e) => return Err(e).with_context(|| format!("opening {:?}", path)),
    };
    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.with_context(|| format!("parsing {:?}", path))?;
        vars.insert(key, value);
    }
    Ok(vars)
}
