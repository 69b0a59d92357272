//! IgnoredDirectly directive
//!
//! Result of an exclusion rule. Never stored in a modlist.

use serde::{Deserialize, Serialize};

use crate::hashing::Hash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredDirectly {
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Hash")]
    pub hash: Hash,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "Reason")]
    pub reason: String,
}
