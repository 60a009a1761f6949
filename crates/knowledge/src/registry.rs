//! Registry of ingested files and their chunk counts.

use std::collections::BTreeMap;

use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::types::UploadedFileRecord;

/// Behaviour when a filename that is already registered is ingested again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    /// Keep earlier chunks and add the new batch's count to the record.
    #[default]
    Accumulate,
    /// Refuse the ingestion before anything is extracted or indexed.
    Reject,
}

/// Per-file chunk counts. Kept equal in aggregate to the index size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRegistry {
    files: BTreeMap<String, usize>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the per-file counts reported by the index.
    pub fn from_counts(counts: BTreeMap<String, usize>) -> Self {
        Self { files: counts }
    }

    /// Fail if `filename` may not be ingested under `policy`.
    pub fn check(&self, filename: &str, policy: ReingestPolicy) -> AppResult<()> {
        if policy == ReingestPolicy::Reject && self.files.contains_key(filename) {
            return Err(AppError::Validation(format!(
                "File '{}' has already been ingested; reset the knowledge base to replace it",
                filename
            )));
        }
        Ok(())
    }

    /// Record a committed batch of `chunk_count` chunks for `filename`.
    pub fn record(
        &mut self,
        filename: &str,
        chunk_count: usize,
        policy: ReingestPolicy,
    ) -> AppResult<()> {
        self.check(filename, policy)?;
        *self.files.entry(filename.to_string()).or_insert(0) += chunk_count;
        Ok(())
    }

    pub fn chunk_count(&self, filename: &str) -> Option<usize> {
        self.files.get(filename).copied()
    }

    /// Records sorted by filename.
    pub fn files(&self) -> Vec<UploadedFileRecord> {
        self.files
            .iter()
            .map(|(filename, chunk_count)| UploadedFileRecord {
                filename: filename.clone(),
                chunk_count: *chunk_count,
            })
            .collect()
    }

    pub fn as_map(&self) -> &BTreeMap<String, usize> {
        &self.files
    }

    pub fn total_chunks(&self) -> usize {
        self.files.values().sum()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_adds_batches() {
        let mut registry = FileRegistry::new();
        registry.record("a.pdf", 4, ReingestPolicy::Accumulate).unwrap();
        registry.record("a.pdf", 3, ReingestPolicy::Accumulate).unwrap();
        registry.record("b.pdf", 2, ReingestPolicy::Accumulate).unwrap();

        assert_eq!(registry.chunk_count("a.pdf"), Some(7));
        assert_eq!(registry.total_chunks(), 9);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reject_duplicate_filename() {
        let mut registry = FileRegistry::new();
        registry.record("a.pdf", 4, ReingestPolicy::Reject).unwrap();

        assert!(registry.check("b.pdf", ReingestPolicy::Reject).is_ok());
        let err = registry.record("a.pdf", 1, ReingestPolicy::Reject).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(registry.chunk_count("a.pdf"), Some(4));
    }

    #[test]
    fn test_files_sorted_by_name() {
        let mut counts = BTreeMap::new();
        counts.insert("z.pdf".to_string(), 1);
        counts.insert("a.txt".to_string(), 2);
        let registry = FileRegistry::from_counts(counts);

        let names: Vec<_> = registry.files().into_iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["a.txt", "z.pdf"]);
    }

    #[test]
    fn test_clear() {
        let mut registry = FileRegistry::new();
        registry.record("a.pdf", 1, ReingestPolicy::Accumulate).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.total_chunks(), 0);
    }

    #[test]
    fn test_policy_serde() {
        let policy: ReingestPolicy = serde_yaml::from_str("reject").unwrap();
        assert_eq!(policy, ReingestPolicy::Reject);
        assert_eq!(ReingestPolicy::default(), ReingestPolicy::Accumulate);
    }
}
