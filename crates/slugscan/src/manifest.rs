use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::Deserialize;

use slugscan_sheets::TextFetcher;

use crate::logging;

/// `YYYY-M-D_name_###` with an optional extension, matched against the last
/// path segment of the image file name.
static CAPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{4})-(\d{1,2})-(\d{1,2})_([^_/]+)_(\d{3})(?:\.[a-z0-9]+)?/?$").unwrap()
});

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    images: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

pub fn peek(manifest_url: String) -> Result<()> {
    let fetcher = TextFetcher::with_defaults()?;
    let raw = fetcher.fetch_url_blocking(&manifest_url)?;
    let manifest: Manifest = serde_json::from_str(&raw)?;
    logging::verbose(format!("manifest lists {} images", manifest.images.len()));
    let entry = pick(&manifest.images).ok_or_else(|| anyhow!("manifest lists no images"))?;
    println!("{}", caption(&entry.file));
    if let Some(author) = &entry.author {
        println!("  by {author}");
    }
    if let Some(date) = &entry.date {
        println!("  taken {date}");
    }
    Ok(())
}

/// Uniform random pick; a fresh one per invocation, like the widget picked a
/// fresh image per page refresh.
pub fn pick(entries: &[ManifestEntry]) -> Option<&ManifestEntry> {
    entries.choose(&mut rand::thread_rng())
}

/// Render `2024-3-7_hana_012.jpg` as `2024年3月7日hana(012)`; anything that
/// does not match the shape falls back to the raw name.
pub fn caption(file: &str) -> String {
    let segment = file.rsplit('/').next().unwrap_or(file);
    match CAPTION_RE.captures(segment) {
        Some(caps) => {
            let year: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let day: u32 = caps[3].parse().unwrap_or(0);
            format!("{year}年{month}月{day}日{}({})", &caps[4], &caps[5])
        }
        None => segment.to_string(),
    }
}
