//! Asset list files
//!
//! Roster and scan files hold one asset identifier per line. Blank lines
//! and lines starting with `#` are skipped. A file with a `.json`
//! extension is read as a JSON array of strings instead.

use std::path::Path;

use anyhow::{Context, Result};
use stocktake_core::domain::AssetId;

/// Reads an asset list from `path`
pub fn read_asset_ids(path: &Path) -> Result<Vec<AssetId>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

    let ids = if is_json {
        parse_json_list(&content)
    } else {
        parse_line_list(&content)
    }
    .with_context(|| format!("Invalid asset list in {}", path.display()))?;

    tracing::debug!(path = %path.display(), count = ids.len(), "Read asset list");
    Ok(ids)
}

fn parse_line_list(content: &str) -> Result<Vec<AssetId>> {
    let mut ids = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id = AssetId::new(line).with_context(|| format!("line {}", idx + 1))?;
        ids.push(id);
    }
    Ok(ids)
}

fn parse_json_list(content: &str) -> Result<Vec<AssetId>> {
    let raw: Vec<String> = serde_json::from_str(content).context("expected a JSON array of strings")?;
    raw.into_iter()
        .enumerate()
        .map(|(idx, s)| AssetId::new(s).with_context(|| format!("element {idx}")))
        .collect()
}
