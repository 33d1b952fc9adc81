// src/models/page.rs

use serde::{Deserialize, Serialize};

/// Pagination metadata reported by an upstream response.
///
/// Transient: only consulted by the provider to decide when a crawl is
/// exhausted, never persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub num_entries: u32,
}
