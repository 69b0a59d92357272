//! NoMatch directive
//!
//! Produced by the catch-all step for files nothing else could reproduce.
//! The compiler reports these as failures instead of storing them.

use serde::{Deserialize, Serialize};

use crate::hashing::Hash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoMatch {
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Hash")]
    pub hash: Hash,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "Reason")]
    pub reason: String,
}
