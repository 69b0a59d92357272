//! Inline data embedded in a modlist (verbatim files and patches)

use std::collections::{BTreeMap, HashSet};

use crate::hashing::Hash;

/// One embedded blob; the id is derived from the bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineBlob {
    pub id: String,
    pub data: Vec<u8>,
}

impl InlineBlob {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            id: Hash::of(&data).to_hex(),
            data,
        }
    }
}

/// Blob store keyed by id, iterated in id order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a blob and return its id. Identical content is stored once.
    pub fn insert(&mut self, blob: InlineBlob) -> String {
        let id = blob.id.clone();
        self.blobs.entry(blob.id).or_insert(blob.data);
        id
    }

    pub fn insert_raw(&mut self, id: String, data: Vec<u8>) {
        self.blobs.insert(id, data);
    }

    pub fn get(&self, id: &str) -> Option<&[u8]> {
        self.blobs.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.blobs.iter().map(|(id, data)| (id.as_str(), data.as_slice()))
    }

    /// Drop every blob not in `referenced`
    pub fn retain_referenced(&mut self, referenced: &HashSet<&str>) {
        self.blobs.retain(|id, _| referenced.contains(id.as_str()));
    }

    /// Total size of stored data in bytes
    pub fn total_size(&self) -> u64 {
        self.blobs.values().map(|d| d.len() as u64).sum()
    }
}
