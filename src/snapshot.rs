//! Membership snapshot files
//!
//! A snapshot file is a JSON array of members, used for offline dry runs:
//!
//! ```json
//! [
//!   { "id": 1, "joined_at": "2024-05-01T12:00:00Z", "roles": [100], "bot": false }
//! ]
//! ```
//!
//! `joined_at`, `roles` and `bot` may be omitted.

use crate::platform::Member;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Snapshot file errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to write snapshot '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot lists member {0} more than once")]
    DuplicateMember(u64),
}

/// Parse a snapshot from JSON text.
pub fn parse_snapshot(path: &Path, contents: &str) -> Result<Vec<Member>, SnapshotError> {
    let members: Vec<Member> =
        serde_json::from_str(contents).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut seen = HashSet::with_capacity(members.len());
    for member in &members {
        if !seen.insert(member.id) {
            return Err(SnapshotError::DuplicateMember(member.id.0));
        }
    }
    Ok(members)
}

/// Load a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<Vec<Member>, SnapshotError> {
    let contents = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot(path, &contents)
}

/// Write `members` as a pretty-printed snapshot file.
pub fn save_snapshot(path: &Path, members: &[Member]) -> Result<(), SnapshotError> {
    let contents = serde_json::to_string_pretty(members).map_err(SnapshotError::Encode)?;
    fs::write(path, contents).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })
}
