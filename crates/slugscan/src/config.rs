use std::env;
use std::fs;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use slugscan_core::TierLabel;
use slugscan_sheets::{FetchMode, RetryPolicy, SheetsClientOptions};

/// Fixed tier order as the widget shipped it; each tab is named after its
/// tier. Overridable per deployment via the YAML config.
const DEFAULT_TIERS: [&str; 9] = [
    "チャージ確定",
    "チャージ早押し",
    "企画確定",
    "企画早押し",
    "NFT確定",
    "NFT早押し",
    "挨拶確定",
    "挨拶早押し②",
    "挨拶早押し①",
];

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
    pub label: TierLabel,
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_gap_ms")]
    pub gap_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            gap_ms: default_gap_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_tiers() -> Vec<TierConfig> {
    DEFAULT_TIERS
        .iter()
        .map(|label| TierConfig {
            label: TierLabel::new(*label),
            sheet: None,
        })
        .collect()
}

fn default_mode() -> String {
    "batched".to_string()
}

fn default_gap_ms() -> u64 {
    250
}

fn default_cache_ttl_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    8
}

impl RunConfig {
    pub fn load(path: &str) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?;
        let mut cfg: RunConfig = serde_yaml::from_str(&raw).context("invalid slugscan config")?;
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(id) = env::var("SLUGSCAN_SPREADSHEET_ID") {
            if !id.trim().is_empty() {
                self.spreadsheet_id = id.trim().to_string();
            }
        }
        if let Ok(mode) = env::var("SLUGSCAN_FETCH_MODE") {
            if !mode.trim().is_empty() {
                self.fetch.mode = mode.trim().to_string();
            }
        }
        if let Some(gap) = env_u64("SLUGSCAN_GAP_MS") {
            self.fetch.gap_ms = gap;
        }
        if let Some(ttl) = env_u64("SLUGSCAN_CACHE_TTL_SECS") {
            self.fetch.cache_ttl_secs = ttl;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(anyhow!(
                "config must set spreadsheet_id (or SLUGSCAN_SPREADSHEET_ID)"
            ));
        }
        if self.tiers.is_empty() {
            return Err(anyhow!("config must declare at least one tier"));
        }
        self.fetch_mode()?;
        Ok(())
    }

    /// Tier labels in configured order, each paired with its sheet tab name.
    /// A tier without an explicit `sheet` uses its label as the tab name.
    pub fn tabs(&self) -> Vec<(TierLabel, String)> {
        self.tiers
            .iter()
            .map(|tier| {
                let sheet = tier.sheet.clone().unwrap_or_else(|| tier.label.0.clone());
                (tier.label.clone(), sheet)
            })
            .collect()
    }

    pub fn fetch_mode(&self) -> Result<FetchMode> {
        match self.fetch.mode.to_lowercase().as_str() {
            "parallel" => Ok(FetchMode::Parallel),
            "serial" => Ok(FetchMode::Serial),
            "batched" => Ok(FetchMode::Batched {
                gap: Duration::from_millis(self.fetch.gap_ms),
            }),
            other => Err(anyhow!("unknown fetch mode {other:?}")),
        }
    }

    pub fn client_options(&self) -> Result<SheetsClientOptions> {
        let mut options = SheetsClientOptions::new(self.spreadsheet_id.clone());
        options.mode = self.fetch_mode()?;
        options.cache_ttl = Duration::from_secs(self.fetch.cache_ttl_secs);
        options.attempt_timeout = Duration::from_secs(self.fetch.timeout_secs);
        options.policy = RetryPolicy {
            max_attempts: self.fetch.max_attempts,
            base_delay: Duration::from_millis(self.fetch.base_delay_ms),
            ..RetryPolicy::default()
        };
        Ok(options)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
