//! Boundary types for the surrounding bot machinery.
//!
//! The parser itself only ever sees a content string; revisions and edit
//! requests are the bookkeeping callers attach around it. This binary
//! realizes the fetch side from local files so workflows can run without
//! a wiki connection, and emits edit requests as JSON instead of issuing
//! them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// One fetched page revision. Timestamps are seconds since the Unix
/// epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRevision {
    pub content: String,
    pub base_timestamp: Option<u64>,
    pub cur_timestamp: Option<u64>,
    pub rev_id: Option<u64>,
    pub page_id: Option<u64>,
}

/// Result of a revision fetch: the page may exist, be missing, or the
/// request itself may have failed.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(PageRevision),
    Missing,
    Failed(String),
}

/// Reads a page revision from a local file, standing in for the API
/// fetch. The file's mtime plays the base timestamp.
pub fn fetch_page_file(path: &Path) -> FetchOutcome {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return FetchOutcome::Missing,
        Err(e) => return FetchOutcome::Failed(e.to_string()),
    };
    let base_timestamp = fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());
    let cur_timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs());
    FetchOutcome::Fetched(PageRevision {
        content,
        base_timestamp,
        cur_timestamp,
        rev_id: None,
        page_id: None,
    })
}

/// The parameters an edit operation takes. Never sent anywhere by this
/// binary; printed for the caller to act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub title: String,
    pub text: String,
    pub summary: String,
    pub minor: bool,
    pub bot: bool,
    pub base_timestamp: Option<u64>,
    pub start_timestamp: Option<u64>,
}
