// src/store/mod.rs
//
// Reference corpus and similarity search.
//
// The store is built once at startup and passed by reference to whatever
// needs it. After loading it is read-only: both lookups take &self and
// never mutate, so it can be shared across attempts. Per-(hand, symbol)
// group means are computed during load, not on query.

pub mod corpus;
pub mod similarity;

pub use corpus::ReferenceRecord;
pub use similarity::cosine_similarity;

use crate::labels::{ReferenceLabel, SignKey, Variant};
use ndarray::{Array2, ArrayView1, Axis};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub label: ReferenceLabel,
    /// Label exactly as it was stored
    pub raw_label: String,
    pub vector: Vec<f32>,
}

impl ReferenceEntry {
    /// Variant exactly as stored, e.g. "avg" where the parsed label says AVERAGE
    pub fn variant_token(&self) -> &str {
        self.raw_label.rsplit(' ').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub label: ReferenceLabel,
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub accepted: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone)]
struct GroupMean {
    key: SignKey,
    mean: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct ReferenceStore {
    entries: Vec<ReferenceEntry>,
    groups: Vec<GroupMean>,
    dimensions: Option<usize>,
    loaded: bool,
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load records. A store that has already loaded ignores further
    /// calls; use [`ReferenceStore::reinitialize`] to refresh.
    pub fn load(&mut self, records: Vec<ReferenceRecord>) -> LoadReport {
        if self.loaded {
            warn!(
                "Reference store already holds {} entries, ignoring load of {} records",
                self.entries.len(),
                records.len()
            );
            return LoadReport::default();
        }

        let mut report = LoadReport::default();
        for record in records {
            match self.accept(record) {
                Some(entry) => {
                    self.entries.push(entry);
                    report.accepted += 1;
                }
                None => report.discarded += 1,
            }
        }
        self.groups = self.build_group_means();
        self.loaded = true;

        info!(
            "✓ Reference store loaded: {} entries, {} signs, {} discarded, dims={:?}",
            report.accepted,
            self.groups.len(),
            report.discarded,
            self.dimensions
        );
        report
    }

    /// Drop everything and load again, e.g. after entries were deleted
    pub fn reinitialize(&mut self, records: Vec<ReferenceRecord>) -> LoadReport {
        info!("Reinitializing reference store");
        self.entries.clear();
        self.groups.clear();
        self.dimensions = None;
        self.loaded = false;
        self.load(records)
    }

    fn accept(&mut self, record: ReferenceRecord) -> Option<ReferenceEntry> {
        if record.keypoints.is_empty() {
            warn!("Discarding {:?}: empty vector", record.label);
            return None;
        }
        if let Some(declared) = record.vector_length {
            if declared != record.keypoints.len() {
                warn!(
                    "Discarding {:?}: declares {} components but has {}",
                    record.label,
                    declared,
                    record.keypoints.len()
                );
                return None;
            }
        }
        let label: ReferenceLabel = match record.label.parse() {
            Ok(label) => label,
            Err(e) => {
                warn!("Discarding record: {}", e);
                return None;
            }
        };

        let dims = *self.dimensions.get_or_insert(record.keypoints.len());
        if record.keypoints.len() != dims {
            warn!(
                "Discarding {:?}: {} components, store uses {}",
                record.label,
                record.keypoints.len(),
                dims
            );
            return None;
        }

        Some(ReferenceEntry {
            label,
            raw_label: record.label,
            vector: record.keypoints,
        })
    }

    fn build_group_means(&self) -> Vec<GroupMean> {
        let Some(dims) = self.dimensions else {
            return Vec::new();
        };

        let mut order: Vec<SignKey> = Vec::new();
        let mut members: HashMap<SignKey, Vec<&[f32]>> = HashMap::new();
        for entry in &self.entries {
            let key = entry.label.key();
            if !members.contains_key(&key) {
                order.push(key.clone());
            }
            members.entry(key).or_default().push(&entry.vector);
        }

        order
            .into_iter()
            .filter_map(|key| {
                let vectors = members.get(&key)?;
                let mean = mean_vector(vectors, dims)?;
                debug!("Group {} averaged over {} entries", key, vectors.len());
                Some(GroupMean { key, mean })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn entries_for<'a>(&'a self, key: &'a SignKey) -> impl Iterator<Item = &'a ReferenceEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.label.hand == key.hand && e.label.symbol == key.symbol)
    }

    pub fn has_entries(&self, key: &SignKey) -> bool {
        self.entries_for(key).next().is_some()
    }

    pub fn has_average(&self, key: &SignKey) -> bool {
        self.entries_for(key).any(|e| e.label.variant.is_average())
    }

    fn accepts_query(&self, query: &[f32]) -> bool {
        !self.entries.is_empty() && self.dimensions == Some(query.len())
    }

    /// Best single entry by cosine similarity. Ties keep the first loaded.
    pub fn find_best_match(&self, query: &[f32]) -> Option<MatchResult> {
        if !self.accepts_query(query) {
            return None;
        }
        let mut best: Option<(&ReferenceEntry, f32)> = None;
        for entry in &self.entries {
            let sim = cosine_similarity(query, &entry.vector);
            if best.map_or(true, |(_, b)| sim > b) {
                best = Some((entry, sim));
            }
        }
        best.filter(|(_, sim)| *sim > 0.0).map(|(entry, similarity)| MatchResult {
            label: entry.label.clone(),
            similarity,
        })
    }

    /// Best (hand, symbol) group by similarity to the group's mean vector.
    pub fn find_best_match_averaged(&self, query: &[f32]) -> Option<MatchResult> {
        if !self.accepts_query(query) {
            return None;
        }
        let mut best: Option<(&GroupMean, f32)> = None;
        for group in &self.groups {
            let sim = cosine_similarity(query, &group.mean);
            if best.map_or(true, |(_, b)| sim > b) {
                best = Some((group, sim));
            }
        }
        best.filter(|(_, sim)| *sim > 0.0).map(|(group, similarity)| MatchResult {
            label: ReferenceLabel::new(group.key.hand, group.key.symbol.clone(), Variant::Average),
            similarity,
        })
    }

    /// Mean of the numbered captures for a sign, excluding any averaged entry.
    pub fn compute_average(&self, key: &SignKey) -> Option<Vec<f32>> {
        let dims = self.dimensions?;
        let vectors: Vec<&[f32]> = self
            .entries_for(key)
            .filter(|e| !e.label.variant.is_average())
            .map(|e| e.vector.as_slice())
            .collect();
        mean_vector(&vectors, dims)
    }
}

fn mean_vector(vectors: &[&[f32]], dims: usize) -> Option<Vec<f32>> {
    if vectors.is_empty() {
        return None;
    }
    let mut stacked = Array2::<f32>::zeros((vectors.len(), dims));
    for (mut row, v) in stacked.rows_mut().into_iter().zip(vectors) {
        row.assign(&ArrayView1::from(*v));
    }
    stacked.mean_axis(Axis(0)).map(|m| m.to_vec())
}
