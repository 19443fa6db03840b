// src/store/corpus.rs
//
// JSON records on disk and the capture-side workflows that produce them.
//
// Record format (one object, or an array of objects, per *.json file):
//   { "label": "RIGHT A 1", "keypoints": [...], "vectorLength": 441,
//     "timestamp": "2026-01-01T12:00:00+00:00" }
//
// The store never writes. Averaging, mirroring and new captures build
// records here and the caller persists them, then reinitializes the store.

use super::ReferenceStore;
use crate::labels::{ReferenceLabel, SignKey, Variant};
use crate::matching::VectorCodec;
use crate::types::Hand;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRecord {
    pub label: String,
    #[serde(default)]
    pub keypoints: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ReferenceRecord {
    /// A record ready to persist: stamped with its length and creation time
    pub fn new(label: &ReferenceLabel, keypoints: Vec<f32>) -> Self {
        Self::with_label(label.to_string(), keypoints)
    }

    /// Same as [`ReferenceRecord::new`] with the wire label given verbatim
    pub fn with_label(label: String, keypoints: Vec<f32>) -> Self {
        Self {
            label,
            vector_length: Some(keypoints.len()),
            keypoints,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Many(Vec<ReferenceRecord>),
    One(ReferenceRecord),
}

/// All *.json files under `dir`, sorted so load order is stable
pub fn find_corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Corpus directory {} does not exist", dir.display());
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    Ok(files)
}

pub async fn load_corpus(dir: &Path) -> Result<Vec<ReferenceRecord>> {
    let files = find_corpus_files(dir)?;
    let mut records = Vec::new();
    for path in &files {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match serde_json::from_str::<RecordFile>(&contents) {
            Ok(RecordFile::Many(batch)) => records.extend(batch),
            Ok(RecordFile::One(record)) => records.push(record),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    info!("Read {} records from {} files in {}", records.len(), files.len(), dir.display());
    Ok(records)
}

/// Write one record as `<dir>/<HAND>_<SYMBOL>_<VARIANT>.json`
pub async fn save_record(dir: &Path, record: &ReferenceRecord) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}.json", record.label.replace(' ', "_")));
    let json = serde_json::to_string_pretty(record)?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("💾 Saved {} → {}", record.label, path.display());
    Ok(path)
}

/// Averaged-variant record for a sign, from its numbered captures
pub fn average_record(store: &ReferenceStore, codec: &VectorCodec, key: &SignKey) -> Result<ReferenceRecord> {
    let Some(mean) = store.compute_average(key) else {
        bail!("No numbered captures for {} to average", key);
    };
    let label = ReferenceLabel::new(key.hand, key.symbol.clone(), Variant::Average);
    Ok(ReferenceRecord::new(&label, codec.round_all(&mean)))
}

/// Opposite-hand copies of every entry recorded with `from`.
///
/// Only the hand token changes; symbol and variant are written back exactly
/// as they were stored.
pub fn mirrored_records(store: &ReferenceStore, codec: &VectorCodec, from: Hand) -> Result<Vec<ReferenceRecord>> {
    store
        .entries()
        .iter()
        .filter(|e| e.label.hand == from)
        .map(|e| {
            let label = format!("{} {} {}", from.opposite(), e.label.symbol, e.variant_token());
            Ok(ReferenceRecord::with_label(label, codec.mirror(&e.vector)?))
        })
        .collect()
}

/// Label for the next numbered capture of a sign.
///
/// Refused once an averaged entry exists for the sign.
pub fn next_capture_label(store: &ReferenceStore, key: &SignKey) -> Result<ReferenceLabel> {
    if store.has_average(key) {
        bail!("{} already has an AVERAGE entry; delete it before capturing more samples", key);
    }
    let next = store
        .entries_for(key)
        .filter_map(|e| match e.label.variant {
            Variant::Sample(n) => Some(n),
            Variant::Average => None,
        })
        .max()
        .unwrap_or(0)
        + 1;
    Ok(ReferenceLabel::new(key.hand, key.symbol.clone(), Variant::Sample(next)))
}
