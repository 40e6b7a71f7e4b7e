use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::photo::PhotoCategory;

/// A file exactly as the user picked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    /// Declared MIME type; may be empty when the picker could not tell.
    pub content_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// One unit of work for the scheduler. Immutable once created.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub file: SelectedFile,
    pub category: PhotoCategory,
    /// Position within the batch; embedded in the storage key.
    pub ordinal: usize,
    pub annotation: Option<String>,
}

/// A file the validator refused before the batch started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// Outcome of one scheduler run.
///
/// `failures.len() + succeeded_keys.len() == total_count` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub succeeded_keys: Vec<String>,
    /// Original filename → reason.
    pub failures: BTreeMap<String, String>,
    pub uploaded_count: usize,
    pub total_count: usize,
}

impl BatchResult {
    pub fn new(total_count: usize) -> Self {
        Self {
            total_count,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, key: String) {
        self.succeeded_keys.push(key);
        self.uploaded_count = self.succeeded_keys.len();
    }

    /// Record a failure under the original filename. A batch can carry two
    /// files with the same name, so a repeated name is qualified with the
    /// ordinal to keep one entry per task.
    pub fn record_failure(&mut self, name: &str, ordinal: usize, reason: impl Into<String>) {
        self.insert_failure(name.to_string(), ordinal, reason.into());
    }

    /// Insert under `name`, or under the first free `"name (#n)"` with
    /// `n >= hint`. An existing entry is never overwritten.
    fn insert_failure(&mut self, name: String, hint: usize, reason: String) {
        if !self.failures.contains_key(&name) {
            self.failures.insert(name, reason);
            return;
        }
        let mut n = hint;
        let entry = loop {
            let candidate = format!("{} (#{})", name, n);
            if !self.failures.contains_key(&candidate) {
                break candidate;
            }
            n += 1;
        };
        self.failures.insert(entry, reason);
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && self.uploaded_count == self.total_count
    }

    /// Fold another batch's outcome into this one.
    pub fn merge(&mut self, other: BatchResult) {
        self.total_count += other.total_count;
        self.succeeded_keys.extend(other.succeeded_keys);
        self.uploaded_count = self.succeeded_keys.len();
        for (name, reason) in other.failures {
            let hint = self.failures.len();
            self.insert_failure(name, hint, reason);
        }
    }

    /// Up to `limit` `"name: reason"` strings for a user-facing banner.
    pub fn representative_failures(&self, limit: usize) -> Vec<String> {
        self.failures
            .iter()
            .take(limit)
            .map(|(name, reason)| format!("{}: {}", name, reason))
            .collect()
    }
}

/// A storage object with no metadata row. Synthesized, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrphanRecord {
    pub booking_id: Uuid,
    pub file_path: String,
    pub file_name: String,
    pub category: PhotoCategory,
}
