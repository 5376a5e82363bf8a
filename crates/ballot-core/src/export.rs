// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT - EXPORT STAGE
//
// Whole-document JSON persistence plus the wallet → space-name table.
// Every save rewrites the full document through a sibling temp file and a
// rename, so readers never observe a half-written file.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::Result;
use crate::index::RemoteIndex;
use crate::types::{EnrichedRecommendations, ProposalId, RecommendationMap, Wallet};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TABLE_HEADER: &str = "wallet,spaces";

/// Separator between space names inside the second column
pub const SPACE_SEPARATOR: &str = "; ";

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Pretty-print `value` to `path`, replacing any previous document
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    write_atomic(path, content.as_bytes())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// wallet → proposal ids, dropping the inference detail
pub fn flatten(enriched: &EnrichedRecommendations) -> RecommendationMap {
    enriched
        .iter()
        .map(|(wallet, bucket)| (wallet.clone(), bucket.keys().cloned().collect()))
        .collect()
}

/// Memoised proposal → owning space display name.
///
/// Proposals shared by several wallets are looked up once.
pub struct SpaceNameCache<'a, I: RemoteIndex> {
    index: &'a I,
    names: BTreeMap<ProposalId, String>,
}

impl<'a, I: RemoteIndex> SpaceNameCache<'a, I> {
    pub fn new(index: &'a I) -> Self {
        Self {
            index,
            names: BTreeMap::new(),
        }
    }

    pub fn space_name(&mut self, proposal: &str) -> Result<String> {
        if let Some(name) = self.names.get(proposal) {
            return Ok(name.clone());
        }
        let name = self.index.proposal(proposal)?.space.name;
        debug!("{} belongs to {}", proposal, name);
        self.names.insert(proposal.to_string(), name.clone());
        Ok(name)
    }

    /// Number of distinct proposals resolved so far
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One table row per wallet, space names in proposal order
pub fn space_rows<I: RemoteIndex>(
    recommendations: &RecommendationMap,
    cache: &mut SpaceNameCache<'_, I>,
) -> Result<Vec<(Wallet, Vec<String>)>> {
    let mut rows = Vec::with_capacity(recommendations.len());
    for (wallet, proposals) in recommendations {
        let mut names = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            names.push(cache.space_name(proposal)?);
        }
        rows.push((wallet.clone(), names));
    }
    Ok(rows)
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render rows as comma-delimited text with a header line
pub fn render_table(rows: &[(Wallet, Vec<String>)]) -> String {
    let mut out = String::from(TABLE_HEADER);
    out.push('\n');
    for (wallet, names) in rows {
        out.push_str(&quote_field(wallet));
        out.push(',');
        out.push_str(&quote_field(&names.join(SPACE_SEPARATOR)));
        out.push('\n');
    }
    out
}

pub fn write_table(path: &Path, rows: &[(Wallet, Vec<String>)]) -> Result<()> {
    write_atomic(path, render_table(rows).as_bytes())
}

/// Re-render the space-name table from a previously exported recommendation
/// document
pub fn export_readable_csv<I: RemoteIndex>(json_path: &Path, csv_path: &Path, index: &I) -> Result<usize> {
    let recommendations: RecommendationMap = read_json(json_path)?;
    let mut cache = SpaceNameCache::new(index);
    let rows = space_rows(&recommendations, &mut cache)?;
    write_table(csv_path, &rows)?;
    info!(
        "Wrote {} row(s) to {} ({} distinct proposal(s) resolved)",
        rows.len(),
        csv_path.display(),
        cache.len()
    );
    Ok(rows.len())
}
